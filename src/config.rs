//! Demo binary configuration loading.
//!
//! TOML is the sole config source; no environment variable overlay.
//!
//! # Required fields
//! - `schema_version = 1`
//! - `role` ("upstream" or "downstream")
//! - `topic_prefix`

use std::path::Path;

use serde::Deserialize;

/// Top-level demo configuration.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub schema_version: u32,
    pub role: Role,
    pub topic_prefix: String,
    pub arena_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Upstream,
    Downstream,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    schema_version: Option<u32>,
    role: Option<String>,
    topic_prefix: Option<String>,
    arena_capacity: Option<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "missing required field: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load demo config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<DemoConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_config_from_str(&toml_str)
}

/// Load demo config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<DemoConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let schema_version = raw
        .schema_version
        .ok_or_else(|| ConfigError::MissingField("schema_version".to_owned()))?;
    if schema_version != 1 {
        return Err(ConfigError::InvalidValue(format!(
            "schema_version must be 1, got {schema_version}"
        )));
    }

    let role_str = raw.role.ok_or_else(|| ConfigError::MissingField("role".to_owned()))?;
    let role = match role_str.as_str() {
        "upstream" => Role::Upstream,
        "downstream" => Role::Downstream,
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "role must be \"upstream\" or \"downstream\", got \"{other}\""
            )))
        }
    };

    let topic_prefix = raw
        .topic_prefix
        .ok_or_else(|| ConfigError::MissingField("topic_prefix".to_owned()))?;

    Ok(DemoConfig {
        schema_version,
        role,
        topic_prefix,
        arena_capacity: raw.arena_capacity.unwrap_or(4096),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config() {
        let cfg = load_config_from_str(
            r#"
            schema_version = 1
            role = "upstream"
            topic_prefix = "h/"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.role, Role::Upstream);
        assert_eq!(cfg.topic_prefix, "h/");
        assert_eq!(cfg.arena_capacity, 4096);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let err = load_config_from_str("schema_version = 2\nrole = \"upstream\"\ntopic_prefix = \"h/\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn rejects_missing_role() {
        let err = load_config_from_str("schema_version = 1\ntopic_prefix = \"h/\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn rejects_unknown_role_value() {
        let err = load_config_from_str("schema_version = 1\nrole = \"sideways\"\ntopic_prefix = \"h/\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }
}
