//! Pass plumbing shared by every local transform

use rand::rngs::StdRng;
use regex::Regex;
use tracing::debug;

use crate::control_flow::{obfuscate_control_flow, OpaquePredicate};
use crate::dead_code::inject_dead_code;
use crate::error::Result;
use crate::names::Namespace;
use crate::renamer::{rename_identifiers, RenameStrength};
use crate::request::{LanguageVariant, PassStats};
use crate::scanner::Span;
use crate::string_table::build_string_table;
use crate::strip::strip;

/// Everything one invocation's passes read and rewrite
#[derive(Debug)]
pub struct Unit<'a> {
    pub spans: Vec<Span>,
    pub namespace: Namespace<'a>,
    pub variant: LanguageVariant,
    /// Declarations emitted ahead of the body, in order
    pub prelude: Vec<String>,
    pub stats: PassStats,
}

impl<'a> Unit<'a> {
    pub fn new(spans: Vec<Span>, namespace: Namespace<'a>, variant: LanguageVariant) -> Self {
        Self {
            spans,
            namespace,
            variant,
            prelude: Vec::new(),
            stats: PassStats::default(),
        }
    }
}

/// A single source-to-source transform
pub trait Transform {
    /// Short name for logs
    fn name(&self) -> &'static str;
    /// Rewrite the unit, returning whether anything changed
    fn apply(&self, unit: &mut Unit<'_>, rng: &mut StdRng) -> Result<bool>;
}

/// Run `passes` in order over `unit`
pub fn run_passes(unit: &mut Unit<'_>, passes: &[Box<dyn Transform + '_>], rng: &mut StdRng) -> Result<()> {
    for pass in passes {
        let changed = pass.apply(unit, rng)?;
        debug!("{:>14} changed={} stats={:?}", pass.name(), changed, unit.stats);
    }
    Ok(())
}

pub struct Strip<'p> {
    pub debug_patterns: &'p [Regex],
}

impl Transform for Strip<'_> {
    fn name(&self) -> &'static str {
        "strip"
    }

    fn apply(&self, unit: &mut Unit<'_>, _rng: &mut StdRng) -> Result<bool> {
        let (spans, report) = strip(std::mem::take(&mut unit.spans), self.debug_patterns);
        unit.spans = spans;
        unit.stats.comments_removed += report.comments_removed;
        unit.stats.debug_stripped += report.debug_stripped;
        Ok(report != Default::default())
    }
}

pub struct StringTablePass {
    pub encrypt: bool,
}

impl Transform for StringTablePass {
    fn name(&self) -> &'static str {
        "string-table"
    }

    fn apply(&self, unit: &mut Unit<'_>, rng: &mut StdRng) -> Result<bool> {
        let (table, spans) = build_string_table(
            std::mem::take(&mut unit.spans),
            self.encrypt,
            unit.variant,
            &mut unit.namespace,
            rng,
        );
        unit.spans = spans;
        unit.stats.strings_extracted += table.entries.len();
        unit.prelude.push(table.declaration());
        Ok(!table.entries.is_empty())
    }
}

pub struct Rename {
    pub strength: RenameStrength,
}

impl Transform for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, unit: &mut Unit<'_>, rng: &mut StdRng) -> Result<bool> {
        let (spans, bindings) = rename_identifiers(
            std::mem::take(&mut unit.spans),
            self.strength,
            &mut unit.namespace,
            rng,
        );
        unit.spans = spans;
        unit.stats.identifiers_renamed += bindings.len();
        Ok(!bindings.is_empty())
    }
}

pub struct ControlFlow {
    pub probability: f64,
}

impl Transform for ControlFlow {
    fn name(&self) -> &'static str {
        "control-flow"
    }

    fn apply(&self, unit: &mut Unit<'_>, rng: &mut StdRng) -> Result<bool> {
        let predicate = OpaquePredicate::choose(&mut unit.namespace, rng);
        let (spans, inserted) =
            obfuscate_control_flow(std::mem::take(&mut unit.spans), self.probability, &predicate, rng);
        unit.spans = spans;
        if inserted > 0 {
            unit.prelude.push(predicate.declaration());
        }
        unit.stats.predicates_inserted += inserted;
        Ok(inserted > 0)
    }
}

pub struct DeadCode<'p> {
    pub probability: f64,
    pub snippets: &'p [String],
}

impl Transform for DeadCode<'_> {
    fn name(&self) -> &'static str {
        "dead-code"
    }

    fn apply(&self, unit: &mut Unit<'_>, rng: &mut StdRng) -> Result<bool> {
        let (spans, injected) = inject_dead_code(
            std::mem::take(&mut unit.spans),
            self.snippets,
            self.probability,
            &mut unit.namespace,
            rng,
        );
        unit.spans = spans;
        unit.stats.dead_statements += injected;
        Ok(injected > 0)
    }
}
