//! Configuration management for redfish-collector
//!
//! Handles loading and validating the settings file. The `redfish` section
//! holds the directive tree that [`crate::builder::load_config`] turns into a
//! [`crate::model::Registry`].

mod item;

pub use item::{ConfigItem, ConfigValue};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Directive key not valid at this level
    #[error("Invalid configuration option \"{key}\"")]
    UnknownDirective { key: String },

    /// Directive needs exactly one string argument
    #[error("Option \"{key}\" requires exactly one string argument")]
    ExpectedString { key: String },

    /// List directive contains a non-string argument
    #[error("Option \"{key}\" requires string arguments")]
    ExpectedStrings { key: String },

    /// List directive has no arguments
    #[error("Option \"{key}\" requires at least one argument")]
    MissingArgument { key: String },

    /// Block is missing a mandatory option
    #[error("{directive} \"{name}\" is missing required option \"{option}\"")]
    MissingOption {
        directive: &'static str,
        name: String,
        option: &'static str,
    },

    /// Block was given an empty name
    #[error("{directive} name must not be empty")]
    EmptyName { directive: &'static str },

    /// Two queries share a name
    #[error("Query \"{0}\" is defined more than once")]
    DuplicateQuery(String),

    /// Two services share a name
    #[error("Service \"{0}\" is defined more than once")]
    DuplicateService(String),

    /// Two sibling resources share a name
    #[error("Resource \"{resource}\" is defined more than once in \"{parent}\"")]
    DuplicateResource { parent: String, resource: String },

    /// Two properties of one resource share a name
    #[error("Property \"{property}\" is defined more than once in resource \"{resource}\"")]
    DuplicateProperty { resource: String, property: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between polling cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Per-request timeout handed to the HTTP transport, in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Verify the TLS certificate of each service
    #[serde(default = "default_verify_peer")]
    pub verify_peer: bool,

    /// How long shutdown waits for in-flight fetches, in milliseconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,

    /// Query and Service directives
    #[serde(default)]
    pub redfish: Vec<ConfigItem>,
}

// Default value functions
fn default_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    5000
}

fn default_verify_peer() -> bool {
    true
}

fn default_shutdown_grace() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            timeout_ms: default_timeout(),
            verify_peer: default_verify_peer(),
            shutdown_grace_ms: default_shutdown_grace(),
            redfish: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or fails validation.
    /// The directive tree itself is checked later by the builder.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
