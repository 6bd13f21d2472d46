//! Configuration sources and the settings resolved from them.
//!
//! The engine only talks to the [`ConfigSource`] trait. [`IniConfig`] is the
//! file-backed implementation used by the command-line front end; tests build
//! sources from inline strings.

mod ini;
mod settings;

pub use ini::IniConfig;
pub use settings::{
    DEFAULT_INTERVAL_MS, DEFAULT_PROC_PATH, DEFAULT_SYS_PATH, EngineConfig, EngineOptions,
    ModuleSettings, module_section,
};

use crate::error::{Result, SysmonError};

/// Read-only lookup of `section.key` string values.
pub trait ConfigSource {
    /// Returns the raw value for `key` in `section`, if present.
    fn get(&self, section: &str, key: &str) -> Option<&str>;

    /// Reads a boolean. Accepts `1/0`, `true/false`, `yes/no`, `on/off`
    /// (case-insensitive). Missing or unrecognized values yield `default`.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get(section, key)
            .and_then(parse_bool)
            .unwrap_or(default)
    }

    /// Reads an unsigned 32-bit integer. Missing or empty values yield
    /// `default`; anything non-numeric or out of range is a `Parse` error.
    fn get_u32(&self, section: &str, key: &str, default: u32) -> Result<u32> {
        match self.get(section, key) {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                SysmonError::parse(format!(
                    "invalid {}.{} = {:?} (must be an unsigned 32-bit integer)",
                    section, key, raw
                ))
            }),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["1", "true", "yes", "on"];
    const FALSE: [&str; 4] = ["0", "false", "no", "off"];

    if TRUE.iter().any(|t| value.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSE.iter().any(|f| value.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn source(text: &str) -> IniConfig {
        IniConfig::parse_str(text).unwrap()
    }

    #[test]
    fn test_get_bool_variants() {
        let cfg = source(
            "[s]\na = 1\nb = FALSE\nc = Yes\nd = off\ne = On\nf = maybe\ng =\n",
        );
        assert!(cfg.get_bool("s", "a", false));
        assert!(!cfg.get_bool("s", "b", true));
        assert!(cfg.get_bool("s", "c", false));
        assert!(!cfg.get_bool("s", "d", true));
        assert!(cfg.get_bool("s", "e", false));
        assert!(cfg.get_bool("s", "f", true));
        assert!(!cfg.get_bool("s", "f", false));
        assert!(cfg.get_bool("s", "g", true));
        assert!(cfg.get_bool("s", "missing", true));
    }

    #[test]
    fn test_get_u32_defaults_and_values() {
        let cfg = source("[s]\nn = 250\nempty =\nmax = 4294967295\n");
        assert_eq!(cfg.get_u32("s", "n", 0).unwrap(), 250);
        assert_eq!(cfg.get_u32("s", "empty", 7).unwrap(), 7);
        assert_eq!(cfg.get_u32("s", "missing", 9).unwrap(), 9);
        assert_eq!(cfg.get_u32("s", "max", 0).unwrap(), u32::MAX);
    }

    #[test]
    fn test_get_u32_rejects_garbage() {
        let cfg = source("[s]\nword = fast\nneg = -1\nbig = 4294967296\ntail = 10ms\n");
        for key in ["word", "neg", "big", "tail"] {
            let err = cfg.get_u32("s", key, 0).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "key {}", key);
        }
    }
}
