//! Startup configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! is a valid configuration:
//!
//! ```toml
//! base_path    = "/api"
//! bind_address = "0.0.0.0:8080"
//! access_log   = true
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouterConfig {
    /// Prefix every request path must carry, e.g. `/api`. Empty for none.
    pub base_path: String,

    /// `host:port` the [`Server`](crate::Server) listens on.
    pub bind_address: String,

    /// Install the [`AccessLog`](crate::AccessLog) post-processor.
    pub access_log: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            bind_address: "0.0.0.0:8080".to_owned(),
            access_log: true,
        }
    }
}

impl RouterConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Collects every problem rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if !self.base_path.is_empty() {
            if !self.base_path.starts_with('/') {
                problems.push(format!("base_path `{}` must start with `/`", self.base_path));
            }
            if self.base_path.ends_with('/') {
                problems.push(format!("base_path `{}` must not end with `/`", self.base_path));
            }
        }

        if self.bind_address.parse::<SocketAddr>().is_err() {
            problems.push(format!("bind_address `{}` is not a host:port address", self.bind_address));
        }

        if problems.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(problems)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RouterConfig::from_toml_str("").unwrap();
        assert_eq!(config, RouterConfig::default());
        assert!(config.access_log);
        assert_eq!(config.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn reads_all_fields() {
        let config = RouterConfig::from_toml_str(
            r#"
            base_path = "/api"
            bind_address = "127.0.0.1:9000"
            access_log = false
            "#,
        )
        .unwrap();
        assert_eq!(config.base_path, "/api");
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert!(!config.access_log);
    }

    #[test]
    fn reports_every_problem() {
        let err = RouterConfig::from_toml_str(
            r#"
            base_path = "api/"
            bind_address = "nowhere"
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::Invalid(problems) => assert_eq!(problems.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            RouterConfig::from_toml_str("base_path = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            RouterConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
