//! Domain models for the authorization stack.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LoadError;

/// Kind of a gated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => f.write_str("project"),
            Self::Group => f.write_str("group"),
        }
    }
}

/// A project or group subject to an access decision.
///
/// Only identity and kind are known to the stack; contents stay with the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
}

impl Entity {
    #[must_use]
    pub fn project(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Project,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Group,
            name: name.into(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// Caller-supplied identity (username or equivalent principal string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Principal {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// PAM-style combinator governing how one entry's verdict affects the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ControlFlag {
    /// Failure denies, evaluation continues.
    Required,
    /// Failure denies and stops evaluation.
    Requisite,
    /// Success allows and stops evaluation unless a failure was already recorded.
    Sufficient,
    /// Counts only when nothing else decided.
    Optional,
}

impl ControlFlag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::Requisite => "REQUISITE",
            Self::Sufficient => "SUFFICIENT",
            Self::Optional => "OPTIONAL",
        }
    }
}

impl fmt::Display for ControlFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "requisite" => Ok(Self::Requisite),
            "sufficient" => Ok(Self::Sufficient),
            "optional" => Ok(Self::Optional),
            other => Err(format!("unknown control flag '{other}'")),
        }
    }
}

impl TryFrom<String> for ControlFlag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ControlFlag> for String {
    fn from(value: ControlFlag) -> Self {
        value.as_str().to_owned()
    }
}

/// Static parameters handed to [`crate::AuthorizationPlugin::load`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginParams(Map<String, Value>);

impl PluginParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, mostly for tests and programmatic stacks.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the string value of `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidParameter`] when the value is not a string.
    pub fn optional_str(&self, key: &str) -> Result<Option<&str>, LoadError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(LoadError::invalid(
                key,
                format!("expected a string, got {other}"),
            )),
        }
    }

    /// Returns the string value of a mandatory `key`.
    ///
    /// # Errors
    ///
    /// - [`LoadError::MissingParameter`] when absent
    /// - [`LoadError::InvalidParameter`] when not a string
    pub fn require_str(&self, key: &str) -> Result<&str, LoadError> {
        self.optional_str(key)?
            .ok_or_else(|| LoadError::missing(key))
    }

    /// Returns a mandatory identifier made of ASCII letters and digits only.
    ///
    /// The value ends up inside directory filter expressions, hence the strict pattern.
    ///
    /// # Errors
    ///
    /// - [`LoadError::MissingParameter`] when absent
    /// - [`LoadError::InvalidParameter`] when empty or containing other characters
    pub fn require_alphanumeric(&self, key: &str) -> Result<&str, LoadError> {
        let value = self.require_str(key)?;
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LoadError::invalid(
                key,
                format!("'{value}' contains non-alphanumeric characters"),
            ));
        }
        Ok(value)
    }

    /// Splits a comma separated value into trimmed, non-empty items.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidParameter`] when the value is not a string.
    pub fn optional_list(&self, key: &str) -> Result<Option<Vec<String>>, LoadError> {
        Ok(self.optional_str(key)?.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        }))
    }

    /// Like [`Self::optional_list`] but the key is mandatory and the list non-empty.
    ///
    /// # Errors
    ///
    /// - [`LoadError::MissingParameter`] when absent
    /// - [`LoadError::InvalidParameter`] when not a string or yielding no items
    pub fn require_list(&self, key: &str) -> Result<Vec<String>, LoadError> {
        let items = self
            .optional_list(key)?
            .ok_or_else(|| LoadError::missing(key))?;
        if items.is_empty() {
            return Err(LoadError::invalid(key, "list is empty"));
        }
        Ok(items)
    }

    /// Returns these parameters layered over `base`; keys present here win.
    #[must_use]
    pub fn merged_over(&self, base: &PluginParams) -> PluginParams {
        let mut merged = base.0.clone();
        for (k, v) in &self.0 {
            merged.insert(k.clone(), v.clone());
        }
        PluginParams(merged)
    }
}

impl From<Map<String, Value>> for PluginParams {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// One configured stack entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginDescriptorConfig {
    /// Registry identifier of the plugin.
    pub name: String,
    /// Control flag.
    pub flag: ControlFlag,
    /// Plugin-specific parameters.
    #[serde(default)]
    pub parameters: PluginParams,
}

impl PluginDescriptorConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, flag: ControlFlag, parameters: PluginParams) -> Self {
        Self {
            name: name.into(),
            flag,
            parameters,
        }
    }
}

/// Ordered stack configuration consumed by reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Parameters shared by every entry; entry parameters override them.
    pub setup: PluginParams,
    /// Entries in evaluation order.
    pub stack: Vec<PluginDescriptorConfig>,
}

impl StackConfig {
    #[must_use]
    pub fn new(stack: Vec<PluginDescriptorConfig>) -> Self {
        Self {
            setup: PluginParams::default(),
            stack,
        }
    }
}

/// Outcome of a successful reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    /// Monotonic generation of the published stack.
    pub generation: u64,
    /// Number of entries in the published stack.
    pub entries: usize,
}
