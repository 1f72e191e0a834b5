//! Configuration management for the inspector.

use datatypes_engine::FormatId;
use std::env;
use std::path::PathBuf;

/// Inspector configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path to the payload file
    pub payload: PathBuf,
    /// Format id to resolve; the root format when absent
    pub format_id: Option<FormatId>,
    /// Pretty-print the report
    pub pretty: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let payload = lookup("DATATYPES_PAYLOAD")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingPayload)?;

        let format_id = lookup("DATATYPES_FORMAT_ID")
            .map(|raw| raw.trim().parse().map_err(|_| ConfigError::InvalidFormatId(raw)))
            .transpose()?;

        let pretty = match lookup("DATATYPES_PRETTY") {
            None => true,
            Some(raw) => match raw.trim() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ConfigError::InvalidPretty(raw)),
            },
        };

        Ok(Self {
            payload,
            format_id,
            pretty,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATATYPES_PAYLOAD environment variable is required")]
    MissingPayload,

    #[error("Invalid DATATYPES_FORMAT_ID value: {0}")]
    InvalidFormatId(String),

    #[error("Invalid DATATYPES_PRETTY value: {0}")]
    InvalidPretty(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATATYPES_PAYLOAD", "family.json")]).unwrap();
        assert_eq!(config.payload, PathBuf::from("family.json"));
        assert_eq!(config.format_id, None);
        assert!(config.pretty);
    }

    #[test]
    fn test_all_values() {
        let config = load(&[
            ("DATATYPES_PAYLOAD", "/tmp/p.json"),
            ("DATATYPES_FORMAT_ID", " 7 "),
            ("DATATYPES_PRETTY", "false"),
        ])
        .unwrap();
        assert_eq!(config.format_id, Some(7));
        assert!(!config.pretty);
    }

    #[test]
    fn test_missing_payload() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingPayload)));
        assert!(matches!(
            load(&[("DATATYPES_PAYLOAD", "")]),
            Err(ConfigError::MissingPayload)
        ));
    }

    #[test]
    fn test_invalid_values() {
        let result = load(&[("DATATYPES_PAYLOAD", "p"), ("DATATYPES_FORMAT_ID", "-1")]);
        assert!(matches!(result, Err(ConfigError::InvalidFormatId(v)) if v == "-1"));

        let result = load(&[("DATATYPES_PAYLOAD", "p"), ("DATATYPES_PRETTY", "yes")]);
        assert!(matches!(result, Err(ConfigError::InvalidPretty(_))));
    }
}
