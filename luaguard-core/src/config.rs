//! Pipeline configuration loaded from luaguard.toml
//!
//! Hard-coded tables (reserved names, dead-code snippets) live here as
//! defaults so a deployment can extend them without touching pass logic.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ObfuscateError;

/// Configuration for the local pipeline
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Names that must never be renamed or shadowed
    #[serde(default)]
    pub reserved: ReservedConfig,
    /// Comment/whitespace/debug stripping
    #[serde(default)]
    pub strip: StripConfig,
    /// Opaque predicate wrapping
    #[serde(default)]
    pub control_flow: ControlFlowConfig,
    /// Inert statement injection
    #[serde(default)]
    pub dead_code: DeadCodeConfig,
    /// Where each invocation's seed comes from
    #[serde(default)]
    pub seed_mode: SeedMode,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: PipelineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ObfuscateError> {
        for (name, p) in [
            ("control_flow.probability", self.control_flow.probability),
            ("dead_code.probability", self.dead_code.probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ObfuscateError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.dead_code.snippets.is_empty() {
            return Err(ObfuscateError::Config(
                "dead_code.snippets must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Seed source for one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedMode {
    /// Fresh entropy every call
    #[default]
    Random,
    /// Hash of the request, so identical requests give identical output
    Input,
}

/// Reserved-name configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReservedConfig {
    /// Globals that must never be shadowed by a generated name
    #[serde(default = "default_sensitive_globals")]
    pub globals: Vec<String>,
    /// Extra names appended by the deployment
    #[serde(default)]
    pub extra: Vec<String>,
}

impl Default for ReservedConfig {
    fn default() -> Self {
        Self {
            globals: default_sensitive_globals(),
            extra: Vec::new(),
        }
    }
}

fn default_sensitive_globals() -> Vec<String> {
    [
        // Lua base library
        "_G", "_ENV", "_VERSION", "self", "assert", "collectgarbage", "dofile", "error",
        "getfenv", "setfenv", "getmetatable", "setmetatable", "ipairs", "pairs", "load",
        "loadfile", "loadstring", "module", "next", "pcall", "xpcall", "print", "rawequal",
        "rawget", "rawset", "rawlen", "require", "select", "tonumber", "tostring", "type",
        "unpack", "newproxy", "gcinfo",
        // Standard libraries
        "coroutine", "debug", "io", "math", "os", "package", "string", "table", "utf8",
        "bit32", "buffer",
        // Luau / Roblox environment
        "typeof", "export", "game", "workspace", "script", "plugin", "shared", "task", "wait",
        "spawn", "delay", "tick", "time", "warn", "settings", "Enum", "Instance", "Vector2",
        "Vector3", "CFrame", "Color3", "UDim", "UDim2", "BrickColor", "Ray", "TweenInfo",
        "NumberRange", "NumberSequence", "ColorSequence", "Rect", "Region3",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Stripping configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripConfig {
    /// Regex patterns for lines to remove entirely
    #[serde(default)]
    pub debug_patterns: Vec<String>,
}

/// Control-flow obfuscation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ControlFlowConfig {
    /// Chance that an eligible statement is wrapped in an opaque predicate
    #[serde(default = "default_control_flow_probability")]
    pub probability: f64,
}

impl Default for ControlFlowConfig {
    fn default() -> Self {
        Self {
            probability: default_control_flow_probability(),
        }
    }
}

fn default_control_flow_probability() -> f64 {
    0.35
}

/// Dead-code injection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DeadCodeConfig {
    /// Chance of injecting a snippet at each statement boundary
    #[serde(default = "default_dead_code_probability")]
    pub probability: f64,
    /// Snippet templates; `{name}` becomes a fresh local, `{n}` a random integer
    #[serde(default = "default_dead_code_snippets")]
    pub snippets: Vec<String>,
}

impl Default for DeadCodeConfig {
    fn default() -> Self {
        Self {
            probability: default_dead_code_probability(),
            snippets: default_dead_code_snippets(),
        }
    }
}

fn default_dead_code_probability() -> f64 {
    0.3
}

fn default_dead_code_snippets() -> Vec<String> {
    // Each snippet opens its own block so injected locals never pile up
    // against the per-function local limit.
    [
        "do local {name} = {n} end",
        "do local {name} = {} end",
        "do local {name} = ({n} * 3) % 7 end",
        "do local {name} = nil end",
        "do local {name} = function() return {n} end end",
        "do local {name} = {n} if {name} < 0 then {name} = -{name} end end",
        "do local {name} = #\"{n}\" end",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
