//! The local pipeline: scan, run the preset's passes, wrap
//!
//! Purely synchronous; each call builds its own namespace and RNG, so one
//! `Pipeline` can serve any number of independent requests.

use std::path::Path;

use anyhow::Result as AnyResult;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, SeedMode};
use crate::error::Result;
use crate::names::{Namespace, ReservedWords};
use crate::pass::{run_passes, ControlFlow, DeadCode, Rename, StringTablePass, Strip, Transform, Unit};
use crate::preset::PassPlan;
use crate::request::{ObfuscationRequest, ObfuscationResult};
use crate::scanner::{render, scan};
use crate::seed::Seed;
use crate::wrapper::Wrapper;

/// Local obfuscation pipeline with its configuration tables
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    reserved: ReservedWords,
    /// Compiled regex patterns for debug stripping
    debug_patterns: Vec<Regex>,
}

impl Pipeline {
    /// Create a pipeline with the given configuration
    ///
    /// Fails with `ObfuscateError::Config` when a probability is outside
    /// [0, 1] or the snippet table is empty.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create a pipeline with default configuration
    pub fn with_defaults() -> Self {
        Self::build(PipelineConfig::default())
    }

    /// Load configuration from a TOML file
    pub fn from_config_file(path: &Path) -> AnyResult<Self> {
        Ok(Self::new(PipelineConfig::from_file(path)?)?)
    }

    fn build(config: PipelineConfig) -> Self {
        let debug_patterns = config
            .strip
            .debug_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping invalid debug pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            reserved: ReservedWords::from_config(&config.reserved),
            config,
            debug_patterns,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Obfuscate with a seed chosen by the configured seed mode
    pub fn obfuscate(&self, request: &ObfuscationRequest) -> Result<ObfuscationResult> {
        let seed = match self.config.seed_mode {
            SeedMode::Random => Seed::generate(),
            SeedMode::Input => Seed::from_source(
                &request.source_code,
                request.preset.as_str(),
                request.language_variant.as_str(),
            ),
        };
        self.obfuscate_with_seed(request, &seed)
    }

    /// Obfuscate with an explicit seed
    pub fn obfuscate_with_seed(&self, request: &ObfuscationRequest, seed: &Seed) -> Result<ObfuscationResult> {
        request.validate()?;
        let plan = request.preset.plan();
        debug!("Running {} ({}) with seed {:?}", request.preset, plan, seed);

        let spans = scan(&request.source_code)?;
        let namespace = Namespace::new(&self.reserved, &spans);
        let mut unit = Unit::new(spans, namespace, request.language_variant);
        let mut rng = seed.create_rng();

        run_passes(&mut unit, &self.passes(plan), &mut rng)?;

        let body = render(&unit.spans);
        let stub_name = unit.namespace.fresh_helper(&mut rng);
        let output = Wrapper::new(request.preset, request.language_variant).wrap(&unit.prelude, &body, &stub_name);

        let mut result = ObfuscationResult::from_output(request, output);
        result.metadata.stats = Some(unit.stats);
        Ok(result)
    }

    fn passes(&self, plan: PassPlan) -> Vec<Box<dyn Transform + '_>> {
        let mut passes: Vec<Box<dyn Transform + '_>> = vec![
            Box::new(Strip {
                debug_patterns: &self.debug_patterns,
            }),
            Box::new(StringTablePass {
                encrypt: plan.encrypt_strings,
            }),
        ];
        if let Some(strength) = plan.rename {
            passes.push(Box::new(Rename { strength }));
        }
        if plan.control_flow {
            passes.push(Box::new(ControlFlow {
                probability: self.config.control_flow.probability,
            }));
        }
        if plan.dead_code {
            passes.push(Box::new(DeadCode {
                probability: self.config.dead_code.probability,
                snippets: &self.config.dead_code.snippets,
            }));
        }
        passes
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}
