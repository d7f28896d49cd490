//! Interpreter configuration
//!
//! Loaded from an optional TOML file. Every field has a default, so an empty
//! file (or no file at all) gives the behavior of a stock MS-DOS interpreter
//! with an 80x24 screen.

use crate::cache::Eviction;
use crate::error::ZError;
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Interpreter number reported in the header (6 = IBM PC)
pub const INTERP_MSDOS: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Number of 512 byte cache blocks; 0 loads the whole story into memory
    pub cache_slots: usize,
    pub eviction: Eviction,
    pub screen_rows: u8,
    pub screen_cols: u8,
    pub interpreter_number: u8,
    /// Interpreter version letter, e.g. "B"
    pub interpreter_version: char,
    /// Fixed seed for the random number generator and cache eviction
    pub random_seed: Option<u64>,
    /// Whether the host can draw a status line for version 1-3 stories
    pub status_line: bool,
    /// Lowest and highest story versions accepted
    pub min_version: u8,
    pub max_version: u8,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            cache_slots: 0,
            eviction: Eviction::Random,
            screen_rows: 24,
            screen_cols: 80,
            interpreter_number: INTERP_MSDOS,
            interpreter_version: 'B',
            random_seed: None,
            status_line: true,
            min_version: 1,
            max_version: 8,
        }
    }
}

impl InterpreterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ZError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ZError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::parse(&text)?;
        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ZError> {
        toml::from_str(text).map_err(|e| ZError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = InterpreterConfig::parse("").unwrap();
        assert_eq!(config, InterpreterConfig::default());
        assert_eq!(config.interpreter_number, 6);
        assert_eq!(config.interpreter_version, 'B');
    }

    #[test]
    fn test_partial_config() {
        let config = InterpreterConfig::parse(
            r#"
cache_slots = 8
eviction = "lru"
random_seed = 42
screen_cols = 64
"#,
        )
        .unwrap();
        assert_eq!(config.cache_slots, 8);
        assert_eq!(config.eviction, Eviction::Lru);
        assert_eq!(config.random_seed, Some(42));
        assert_eq!(config.screen_cols, 64);
        assert_eq!(config.screen_rows, 24);
    }

    #[test]
    fn test_bad_config_is_reported() {
        assert!(matches!(
            InterpreterConfig::parse("eviction = \"fifo\""),
            Err(ZError::Config(_))
        ));
    }
}
