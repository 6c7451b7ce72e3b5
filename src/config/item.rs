//! Generic directive tree
//!
//! The plugin block of the configuration is a tree of `key values... { children }`
//! directives. Parsing the textual format is somebody else's job; this module
//! only models the already-parsed tree and the typed accessors the builder needs.

use serde::{Deserialize, Deserializer, Serialize};

use super::ConfigError;

/// Scalar argument of a directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean argument
    Boolean(bool),
    /// Numeric argument
    Number(f64),
    /// String argument
    String(String),
}

impl ConfigValue {
    /// Borrow the string payload, if this is a string argument
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Number(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

/// One directive: a key, its arguments and nested directives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    /// Directive name (matched case-insensitively)
    pub key: String,

    /// Arguments; YAML accepts either a single scalar or a list
    #[serde(default, deserialize_with = "one_or_many")]
    pub values: Vec<ConfigValue>,

    /// Nested directives
    #[serde(default)]
    pub children: Vec<ConfigItem>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<ConfigValue>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(ConfigValue),
        Many(Vec<ConfigValue>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(v)) => vec![v],
        Some(OneOrMany::Many(v)) => v,
    })
}

impl ConfigItem {
    /// Create a directive with no arguments and no children
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append one argument
    pub fn with_value(mut self, value: impl Into<ConfigValue>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Append one nested directive
    pub fn with_child(mut self, child: ConfigItem) -> Self {
        self.children.push(child);
        self
    }

    /// Shorthand for `key "value"` leaf directives
    pub fn leaf(key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Self::new(key).with_value(value)
    }

    /// Case-insensitive key comparison
    pub fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }

    /// The single string argument of this directive
    ///
    /// # Errors
    /// `ExpectedString` unless there is exactly one argument and it is a string.
    pub fn get_string(&self) -> Result<String, ConfigError> {
        match self.values.as_slice() {
            [ConfigValue::String(s)] => Ok(s.clone()),
            _ => Err(ConfigError::ExpectedString {
                key: self.key.clone(),
            }),
        }
    }

    /// All arguments as strings, requiring at least one
    ///
    /// # Errors
    /// `MissingArgument` when there are no arguments, `ExpectedStrings` when any
    /// argument is not a string.
    pub fn get_strings(&self) -> Result<Vec<String>, ConfigError> {
        if self.values.is_empty() {
            return Err(ConfigError::MissingArgument {
                key: self.key.clone(),
            });
        }

        self.values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::ExpectedStrings {
                        key: self.key.clone(),
                    })
            })
            .collect()
    }
}
