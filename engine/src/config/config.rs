use serde::Deserialize;
use shared::constants::{DEFAULT_MAX_FILE_LENGTH, HEADER_LEN, INITIAL_LENGTH};
use shared::errors::ConfigError;
use std::fs;
use std::path::Path;

/// Tunables for a `QueueFile`, loaded from TOML or built programmatically with
/// [`QueueFileConfig::default`].
///
/// None of these fields change the persisted format (see `shared::constants` for the fixed
/// header layout); they only bound how a fresh file is sized and how aggressively the engine
/// scrubs reclaimed bytes.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct QueueFileConfig {
    /// Total length of a freshly created file, including the 16-byte header.
    #[serde(default = "default_initial_length")]
    pub initial_length: u32,
    /// Upper bound `expand_if_necessary` will refuse to cross.
    #[serde(default = "default_max_file_length")]
    pub max_file_length: u32,
    /// Whether `remove`/`clear` best-effort zero the bytes they reclaim.
    #[serde(default = "default_zero_on_remove")]
    pub zero_on_remove: bool,
}

fn default_initial_length() -> u32 {
    INITIAL_LENGTH
}

fn default_max_file_length() -> u32 {
    DEFAULT_MAX_FILE_LENGTH
}

fn default_zero_on_remove() -> bool {
    true
}

impl Default for QueueFileConfig {
    fn default() -> Self {
        Self {
            initial_length: default_initial_length(),
            max_file_length: default_max_file_length(),
            zero_on_remove: default_zero_on_remove(),
        }
    }
}

impl QueueFileConfig {
    /// Load, parse, and validate a `QueueFileConfig` from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&s)
    }

    fn parse(toml: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(toml).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the config, returning a descriptive error for the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_length < HEADER_LEN + 4 {
            return Err(ConfigError::Validation(format!(
                "initial_length must be at least {} bytes (header + one empty element), got {}",
                HEADER_LEN + 4,
                self.initial_length
            )));
        }
        if self.max_file_length < self.initial_length {
            return Err(ConfigError::Validation(format!(
                "max_file_length ({}) must be >= initial_length ({})",
                self.max_file_length, self.initial_length
            )));
        }
        if self.max_file_length > DEFAULT_MAX_FILE_LENGTH {
            return Err(ConfigError::Validation(format!(
                "max_file_length ({}) exceeds the implementation ceiling ({})",
                self.max_file_length, DEFAULT_MAX_FILE_LENGTH
            )));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn from_str(toml: &str) -> Result<Self, ConfigError> {
        Self::parse(toml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = QueueFileConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.initial_length, INITIAL_LENGTH);
        assert!(cfg.zero_on_remove);
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let cfg = QueueFileConfig::from_str("initial_length = 8192\n").expect("should parse");
        assert_eq!(cfg.initial_length, 8192);
        assert_eq!(cfg.max_file_length, DEFAULT_MAX_FILE_LENGTH);
        assert!(cfg.zero_on_remove);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
            initial_length = 65536
            max_file_length = 1048576
            zero_on_remove = false
        "#;
        let cfg = QueueFileConfig::from_str(toml).expect("should parse");
        assert_eq!(cfg.initial_length, 65536);
        assert_eq!(cfg.max_file_length, 1_048_576);
        assert!(!cfg.zero_on_remove);
    }

    #[test]
    fn rejects_initial_length_too_small() {
        let toml = "initial_length = 4\n";
        assert!(matches!(
            QueueFileConfig::from_str(toml).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn rejects_max_below_initial() {
        let toml = "initial_length = 8192\nmax_file_length = 4096\n";
        assert!(matches!(
            QueueFileConfig::from_str(toml).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn rejects_garbage_toml() {
        let toml = "not valid toml {{{";
        assert!(matches!(
            QueueFileConfig::from_str(toml).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
