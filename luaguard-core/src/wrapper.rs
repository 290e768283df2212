//! Final assembly: metadata header, integrity stub, prelude, body

use chrono::{DateTime, SecondsFormat, Utc};
use sha3::{Digest, Sha3_256};

use crate::preset::Preset;
use crate::request::LanguageVariant;

pub const TOOL_NAME: &str = "LuaGuard";
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Assembles the output of one invocation
#[derive(Debug, Clone)]
pub struct Wrapper {
    pub preset: Preset,
    pub variant: LanguageVariant,
    pub generated_at: DateTime<Utc>,
}

impl Wrapper {
    pub fn new(preset: Preset, variant: LanguageVariant) -> Self {
        Self {
            preset,
            variant,
            generated_at: Utc::now(),
        }
    }

    pub fn header(&self) -> String {
        format!(
            "-- Protected with {} v{} | preset: {} | variant: {}\n-- Generated: {}\n",
            TOOL_NAME,
            TOOL_VERSION,
            self.preset,
            self.variant,
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    /// A check that compares a body-derived constant with itself; never fires
    pub fn integrity_stub(&self, body: &str, name: &str) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(body.as_bytes());
        let digest = hex::encode(&hasher.finalize()[..8]);
        format!(
            "do local {name} = \"{digest}\" if {name} ~= \"{digest}\" then error(\"integrity check failed\", 0) end end\n"
        )
    }

    /// Header, stub and prelude declarations followed by the body
    pub fn wrap(&self, prelude: &[String], body: &str, stub_name: &str) -> String {
        let mut out = self.header();
        out.push_str(&self.integrity_stub(body, stub_name));
        for declaration in prelude {
            out.push_str(declaration);
            out.push('\n');
        }
        out.push_str(body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn wrapper() -> Wrapper {
        Wrapper {
            preset: Preset::Medium,
            variant: LanguageVariant::Luau,
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_header() {
        let header = wrapper().header();
        assert!(header.starts_with("-- Protected with LuaGuard v"));
        assert!(header.contains("preset: medium | variant: luau"));
        assert!(header.contains("-- Generated: 2024-03-01T12:00:00Z"));
    }

    #[test]
    fn test_stub_compares_constant_with_itself() {
        let stub = wrapper().integrity_stub("print(1)", "_abcd");
        let constants: Vec<&str> = stub.split('"').skip(1).step_by(2).collect();
        assert_eq!(constants[0], constants[1]);
        assert_eq!(constants[0].len(), 16);
        assert!(stub.starts_with("do local _abcd = "));
    }

    #[test]
    fn test_wrap_order() {
        let out = wrapper().wrap(&["local _t = {}".to_string()], "print(_t)", "_s");
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("-- Protected"));
        assert!(lines[1].starts_with("-- Generated"));
        assert!(lines[2].starts_with("do local _s"));
        assert_eq!(lines[3], "local _t = {}");
        assert_eq!(lines[4], "print(_t)");
    }
}
