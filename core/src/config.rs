use std::{borrow::Cow, path::Path};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{Result, StoreError};

/// Version used when a configuration does not name one.
pub const DEFAULT_VERSION: &str = "v1";

/// An ordered, arbitrarily nested configuration mapping backed by YAML.
///
/// Only two keys carry meaning for the store: `name` selects the experiment folder and
/// `version` prefixes every artifact. Everything else is free-form and can be pulled out
/// into typed structs with [`Configuration::get_as`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(Mapping);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from any serializable value that encodes as a mapping.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        match serde_yaml::to_value(value)? {
            Value::Mapping(mapping) => Ok(Self(mapping)),
            other => Err(StoreError::InvalidKey {
                key: "(root)".to_string(),
                reason: format!("expected a mapping, found {}", value_kind(&other)),
            }),
        }
    }

    /// Parse a YAML document. An empty document is an empty configuration.
    pub(crate) fn from_yaml_str(contents: &str, path: &Path) -> Result<Self> {
        match serde_yaml::from_str::<Value>(contents)? {
            Value::Mapping(mapping) => Ok(Self(mapping)),
            Value::Null => Ok(Self::new()),
            _ => Err(StoreError::InvalidConfiguration {
                path: path.to_path_buf(),
            }),
        }
    }

    pub(crate) fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a value, returning the previous one under `key` if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(Value::String(key.into()), value.into())
    }

    /// Return a copy of the nested mapping stored under `key`.
    pub fn section(&self, key: &str) -> Result<Configuration> {
        match self.get(key) {
            Some(Value::Mapping(mapping)) => Ok(Self(mapping.clone())),
            Some(other) => Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: format!("expected a mapping, found {}", value_kind(other)),
            }),
            None => Err(StoreError::MissingKey {
                key: key.to_string(),
            }),
        }
    }

    /// Deserialize the value under `key` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key).ok_or_else(|| StoreError::MissingKey {
            key: key.to_string(),
        })?;
        serde_yaml::from_value(value.clone()).map_err(|err| StoreError::InvalidKey {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    /// The experiment folder name. Numbers and booleans are used in their YAML text form.
    pub fn name(&self) -> Result<Cow<'_, str>> {
        self.scalar_key("name")?.ok_or_else(|| StoreError::MissingKey {
            key: "name".to_string(),
        })
    }

    /// The artifact version prefix, `"v1"` when absent. `version: 2` yields `"2"`.
    pub fn version(&self) -> Result<Cow<'_, str>> {
        Ok(self
            .scalar_key("version")?
            .unwrap_or(Cow::Borrowed(DEFAULT_VERSION)))
    }

    fn scalar_key(&self, key: &str) -> Result<Option<Cow<'_, str>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(Cow::Borrowed(value.as_str()))),
            Some(Value::Number(value)) => Ok(Some(Cow::Owned(value.to_string()))),
            Some(Value::Bool(value)) => Ok(Some(Cow::Owned(value.to_string()))),
            Some(other) => Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: format!("expected a scalar, found {}", value_kind(other)),
            }),
        }
    }
}

impl From<Mapping> for Configuration {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

/// Render a configuration as an indented outline.
///
/// Each nesting level sits two spaces deeper than its parent. Scalars and lists follow
/// their key on the same line; nested mappings open their own block.
pub fn render_configuration(config: &Configuration, indent: usize) -> String {
    let mut output = String::new();
    render_mapping(&mut output, config.as_mapping(), indent);
    output
}

/// Print [`render_configuration`] to standard output.
pub fn print_configuration(config: &Configuration, indent: usize) {
    print!("{}", render_configuration(config, indent));
}

fn render_mapping(output: &mut String, mapping: &Mapping, indent: usize) {
    for (key, value) in mapping {
        let pad = " ".repeat(indent);
        let key = render_inline(key);
        match value {
            Value::Mapping(nested) => {
                output.push_str(&format!("{pad}{key}:\n"));
                render_mapping(output, nested, indent + 2);
            }
            other => {
                output.push_str(&format!("{pad}{key}: {}\n", render_inline(other)));
            }
        }
    }
}

fn render_inline(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(render_inline).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(mapping) => {
            let entries: Vec<String> = mapping
                .iter()
                .map(|(k, v)| format!("{}: {}", render_inline(k), render_inline(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Tagged(tagged) => format!("{} {}", tagged.tag, render_inline(&tagged.value)),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
