//! Protection presets
//!
//! A preset is a fixed selection of passes for one invocation; nothing
//! carries over between calls.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ObfuscateError, Result};
use crate::renamer::RenameStrength;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Minify,
    Weak,
    Medium,
    Strong,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Minify, Preset::Weak, Preset::Medium, Preset::Strong];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Minify => "minify",
            Preset::Weak => "weak",
            Preset::Medium => "medium",
            Preset::Strong => "strong",
        }
    }

    /// Passes this preset runs after scanning
    pub fn plan(&self) -> PassPlan {
        match self {
            Preset::Minify => PassPlan {
                encrypt_strings: false,
                rename: None,
                control_flow: false,
                dead_code: false,
            },
            Preset::Weak => PassPlan {
                encrypt_strings: true,
                rename: Some(RenameStrength::Low),
                control_flow: false,
                dead_code: false,
            },
            Preset::Medium => PassPlan {
                encrypt_strings: true,
                rename: Some(RenameStrength::Medium),
                control_flow: true,
                dead_code: false,
            },
            Preset::Strong => PassPlan {
                encrypt_strings: true,
                rename: Some(RenameStrength::High),
                control_flow: true,
                dead_code: true,
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ObfuscateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minify" => Ok(Preset::Minify),
            "weak" => Ok(Preset::Weak),
            "medium" => Ok(Preset::Medium),
            "strong" => Ok(Preset::Strong),
            other => Err(ObfuscateError::Validation(format!(
                "unrecognized preset '{}'",
                other
            ))),
        }
    }
}

/// Pipeline configuration selected by a preset
///
/// Stripping and string-table extraction always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPlan {
    pub encrypt_strings: bool,
    pub rename: Option<RenameStrength>,
    pub control_flow: bool,
    pub dead_code: bool,
}

impl fmt::Display for PassPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut passes = vec!["strip", "string-table"];
        if self.encrypt_strings {
            passes.push("encrypt");
        }
        if let Some(strength) = self.rename {
            passes.push(match strength {
                RenameStrength::Low => "rename(low)",
                RenameStrength::Medium => "rename(medium)",
                RenameStrength::High => "rename(high)",
            });
        }
        if self.control_flow {
            passes.push("control-flow");
        }
        if self.dead_code {
            passes.push("dead-code");
        }
        passes.push("wrap");
        f.write_str(&passes.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_cumulative() {
        let plans: Vec<PassPlan> = Preset::ALL.iter().map(Preset::plan).collect();
        assert!(!plans[0].encrypt_strings && plans[0].rename.is_none());
        assert_eq!(plans[1].rename, Some(RenameStrength::Low));
        assert!(plans[2].control_flow && !plans[2].dead_code);
        assert!(plans[3].control_flow && plans[3].dead_code);
        assert_eq!(plans[3].rename, Some(RenameStrength::High));
    }

    #[test]
    fn test_round_trip_names() {
        for preset in Preset::ALL {
            assert_eq!(preset.as_str().parse::<Preset>().unwrap(), preset);
        }
        assert!("STRONG".parse::<Preset>().is_ok());
    }

    #[test]
    fn test_plan_display() {
        assert_eq!(Preset::Minify.plan().to_string(), "strip -> string-table -> wrap");
        assert!(Preset::Strong.plan().to_string().contains("dead-code"));
    }
}
