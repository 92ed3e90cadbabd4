//! Module descriptors.
//!
//! A descriptor defines:
//! - Module identity (GUID and display name)
//! - Which URL hashes the module applies to
//! - Whether the module is enabled before the user touches it
//! - Options (user-configurable settings with defaults and validation)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ModuleGuid;
use crate::error::{PagePlusError, PagePlusResult};
use crate::options::{ModuleOptions, ENABLED_KEY};

/// Static description of a module, owned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleDescriptor {
    /// Unique identifier, also the key in the options tree.
    pub guid: ModuleGuid,

    /// Human-readable display name.
    pub name: String,

    /// Short description.
    #[serde(default)]
    pub description: String,

    /// Whether the module is enabled when no option says otherwise.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Hashes the module applies to.
    #[serde(default)]
    pub hashes: Vec<HashPattern>,

    /// Recognized options by key.
    #[serde(default)]
    pub options: BTreeMap<String, OptionSchema>,
}

fn default_enabled() -> bool {
    true
}

impl ModuleDescriptor {
    pub fn new(guid: impl Into<ModuleGuid>, name: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            hashes: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_hashes(mut self, patterns: &[&str]) -> Self {
        self.hashes = patterns.iter().map(|p| HashPattern::parse(p)).collect();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, schema: OptionSchema) -> Self {
        self.options.insert(key.into(), schema);
        self
    }

    pub fn disabled_by_default(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether any of the module's hash patterns matches `hash`.
    pub fn matches_hash(&self, hash: &str) -> bool {
        self.hashes.iter().any(|p| p.matches(hash))
    }

    /// The `enabled` flag plus every option default.
    pub fn default_options(&self) -> ModuleOptions {
        let mut opts = ModuleOptions::new();
        opts.insert(ENABLED_KEY.to_string(), Value::Bool(self.enabled));
        for (key, schema) in &self.options {
            opts.insert(key.clone(), schema.default.clone());
        }
        opts
    }

    /// Validate the descriptor for required fields and constraints.
    pub fn validate(&self) -> PagePlusResult<()> {
        if self.guid.is_empty() {
            return Err(PagePlusError::Config("module guid is required".to_string()));
        }

        // Flattened option keys are split at the first '.'
        if self.guid.contains('.') {
            return Err(PagePlusError::Config(format!(
                "module guid '{}' must not contain '.'",
                self.guid
            )));
        }

        if self.name.is_empty() {
            return Err(PagePlusError::Config(format!(
                "module '{}' requires a name",
                self.guid
            )));
        }

        if self.options.contains_key(ENABLED_KEY) {
            return Err(PagePlusError::Config(format!(
                "module '{}' must not declare a reserved '{}' option",
                self.guid, ENABLED_KEY
            )));
        }

        for (key, schema) in &self.options {
            self.check_value(key, schema, &schema.default)?;
        }

        Ok(())
    }

    /// Check a value for one of this module's options against its schema.
    pub fn validate_option(&self, key: &str, value: &Value) -> PagePlusResult<()> {
        if key == ENABLED_KEY {
            return if value.is_boolean() {
                Ok(())
            } else {
                Err(self.invalid(key, "expected a boolean"))
            };
        }

        let schema = self
            .options
            .get(key)
            .ok_or_else(|| self.invalid(key, "unknown option"))?;
        self.check_value(key, schema, value)
    }

    fn check_value(&self, key: &str, schema: &OptionSchema, value: &Value) -> PagePlusResult<()> {
        schema.check(value).map_err(|message| self.invalid(key, message))
    }

    fn invalid(&self, key: &str, message: impl Into<String>) -> PagePlusError {
        PagePlusError::InvalidOption {
            module: self.guid.clone(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Schema for one user-configurable option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionSchema {
    /// Human-readable title.
    pub name: String,

    /// Value type.
    #[serde(rename = "type")]
    pub kind: OptionKind,

    /// Value used when the user has not set one.
    pub default: Value,

    /// Inclusive lower bound for numbers.
    #[serde(default)]
    pub min: Option<f64>,

    /// Inclusive upper bound for numbers.
    #[serde(default)]
    pub max: Option<f64>,

    /// Choices for select type.
    #[serde(default)]
    pub choices: Vec<String>,

    /// Extra check applied after the type and bounds.
    #[serde(default)]
    pub validator: Option<Validator>,
}

impl OptionSchema {
    pub fn number(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, OptionKind::Number, Value::from(default))
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, OptionKind::Boolean, Value::Bool(default))
    }

    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name, OptionKind::String, Value::String(default.into()))
    }

    pub fn select(name: impl Into<String>, choices: &[&str], default: impl Into<String>) -> Self {
        let mut schema = Self::new(name, OptionKind::Select, Value::String(default.into()));
        schema.choices = choices.iter().map(|c| c.to_string()).collect();
        schema
    }

    fn new(name: impl Into<String>, kind: OptionKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            min: None,
            max: None,
            choices: Vec::new(),
            validator: None,
        }
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            OptionKind::Number => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| format!("expected a number, got {}", value))?;
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("{} is below the minimum {}", n, min));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("{} is above the maximum {}", n, max));
                    }
                }
            }
            OptionKind::Boolean => {
                if !value.is_boolean() {
                    return Err(format!("expected a boolean, got {}", value));
                }
            }
            OptionKind::String => {
                if !value.is_string() {
                    return Err(format!("expected a string, got {}", value));
                }
            }
            OptionKind::Select => {
                let s = value
                    .as_str()
                    .ok_or_else(|| format!("expected a string, got {}", value))?;
                if !self.choices.iter().any(|c| c == s) {
                    return Err(format!("'{}' is not one of {:?}", s, self.choices));
                }
            }
        }

        match self.validator {
            Some(validator) if !validator.accepts(value) => {
                Err(format!("{} fails the {} check", value, validator))
            }
            _ => Ok(()),
        }
    }
}

/// Option value type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Number,
    Boolean,
    String,
    Select,
}

/// Additional value checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Validator {
    /// Whole numbers only.
    Integer,
}

impl Validator {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Validator::Integer => value.as_f64().is_some_and(|n| n.floor() == n),
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Integer => write!(f, "integer"),
        }
    }
}

/// Which hashes a module applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HashPattern {
    /// `*`: every hash.
    Any,
    /// `#message*`: hashes starting with the prefix.
    Prefix(String),
    /// Exactly this hash.
    Exact(String),
}

impl HashPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            HashPattern::Any
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            HashPattern::Prefix(prefix.to_string())
        } else {
            HashPattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, hash: &str) -> bool {
        match self {
            HashPattern::Any => true,
            HashPattern::Prefix(prefix) => hash.starts_with(prefix.as_str()),
            HashPattern::Exact(exact) => hash == exact,
        }
    }
}

impl From<String> for HashPattern {
    fn from(s: String) -> Self {
        HashPattern::parse(&s)
    }
}

impl From<HashPattern> for String {
    fn from(p: HashPattern) -> Self {
        match p {
            HashPattern::Any => "*".to_string(),
            HashPattern::Prefix(prefix) => format!("{}*", prefix),
            HashPattern::Exact(exact) => exact,
        }
    }
}
