//! Request and result types shared by the local pipeline and the coordinator

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ObfuscateError, Result};
use crate::preset::Preset;

/// Target dialect of the input script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageVariant {
    /// Plain Lua 5.1
    Lua51,
    /// Roblox Luau
    Luau,
}

impl LanguageVariant {
    pub const ALL: [LanguageVariant; 2] = [LanguageVariant::Lua51, LanguageVariant::Luau];

    /// Name used on the wire and in the output header
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageVariant::Lua51 => "lua51",
            LanguageVariant::Luau => "luau",
        }
    }
}

impl fmt::Display for LanguageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageVariant {
    type Err = ObfuscateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lua51" | "lua" | "lua5.1" => Ok(LanguageVariant::Lua51),
            "luau" | "roblox" => Ok(LanguageVariant::Luau),
            other => Err(ObfuscateError::Validation(format!(
                "unrecognized language variant '{}'",
                other
            ))),
        }
    }
}

/// A single obfuscation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscationRequest {
    pub source_code: String,
    pub language_variant: LanguageVariant,
    pub preset: Preset,
}

impl ObfuscationRequest {
    pub fn new(source_code: impl Into<String>, language_variant: LanguageVariant, preset: Preset) -> Self {
        Self {
            source_code: source_code.into(),
            language_variant,
            preset,
        }
    }

    /// Build a request from loosely typed input (e.g. form fields), validating it
    pub fn parse(source_code: impl Into<String>, variant: &str, preset: &str) -> Result<Self> {
        let request = Self::new(source_code, variant.parse()?, preset.parse()?);
        request.validate()?;
        Ok(request)
    }

    /// Reject requests no pass should ever see
    pub fn validate(&self) -> Result<()> {
        if self.source_code.trim().is_empty() {
            return Err(ObfuscateError::Validation(
                "source code must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-pass counters collected during one local run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassStats {
    pub strings_extracted: usize,
    pub identifiers_renamed: usize,
    pub predicates_inserted: usize,
    pub dead_statements: usize,
    pub comments_removed: usize,
    pub debug_stripped: usize,
}

impl PassStats {
    pub fn total_transforms(&self) -> usize {
        self.strings_extracted
            + self.identifiers_renamed
            + self.predicates_inserted
            + self.dead_statements
            + self.comments_removed
            + self.debug_stripped
    }
}

/// Metadata describing an obfuscation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub language_variant: LanguageVariant,
    pub preset: Preset,
    pub original_size: usize,
    pub output_size: usize,
    /// Only present for locally produced output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<PassStats>,
}

/// Result of obfuscating one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscationResult {
    pub output_code: String,
    pub metadata: ResultMetadata,
}

impl ObfuscationResult {
    /// Wrap output produced elsewhere (e.g. the remote transformer)
    pub fn from_output(request: &ObfuscationRequest, output_code: String) -> Self {
        let output_size = output_code.len();
        Self {
            output_code,
            metadata: ResultMetadata {
                language_variant: request.language_variant,
                preset: request.preset,
                original_size: request.source_code.len(),
                output_size,
                stats: None,
            },
        }
    }
}
