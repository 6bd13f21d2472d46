//! Loader for the `[section]` / `key = value` configuration format.

use std::path::Path;

use super::ConfigSource;
use crate::error::{Result, SysmonError};

#[derive(Debug, Clone, PartialEq)]
struct IniEntry {
    section: String,
    key: String,
    value: String,
}

/// Parsed configuration file.
///
/// Keys that appear before any section header belong to the empty section.
/// When a key is repeated within a section, the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniConfig {
    entries: Vec<IniEntry>,
}

impl IniConfig {
    /// Reads and parses a configuration file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SysmonError::io(format!("failed to open config file {}", path.display()), e)
        })?;
        Self::parse_str(&content)
    }

    /// Parses configuration text.
    pub fn parse_str(content: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut section = String::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let end = rest.find(']').ok_or_else(|| {
                    SysmonError::parse(format!("config line {}: missing ']'", line_no))
                })?;
                section = rest[..end].trim().to_string();
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                SysmonError::parse(format!("config line {}: expected key=value", line_no))
            })?;

            entries.push(IniEntry {
                section: section.clone(),
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigSource for IniConfig {
    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.section == section && e.key == key)
            .map(|e| e.value.as_str())
    }
}
