//! Function schema derivation
//!
//! Turns a function's declared argument shape into the JSON-schema-like
//! descriptor that is advertised to the model as a tool declaration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Longest function name accepted by OpenAI-compatible providers
const MAX_NAME_LEN: usize = 64;

/// Declared primitive kind of a function parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    Array,
    Object,
    /// Optional value; unwrapped before mapping
    Nullable(Box<ParamKind>),
}

impl ParamKind {
    pub fn nullable(inner: ParamKind) -> Self {
        ParamKind::Nullable(Box::new(inner))
    }

    /// Map to the JSON type advertised to the model
    pub fn json_type(&self) -> JsonType {
        match self {
            ParamKind::Nullable(inner) => inner.json_type(),
            ParamKind::String => JsonType::String,
            ParamKind::Integer | ParamKind::Float | ParamKind::Decimal => JsonType::Number,
            ParamKind::Boolean => JsonType::Boolean,
            ParamKind::Array => JsonType::Array,
            ParamKind::Object => JsonType::Object,
        }
    }
}

/// JSON type names used in descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Boolean,
    Array,
    #[default]
    Object,
}

/// One declared parameter of a callable function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Name the model sees, independent of the implementation's field name
    pub name: String,
    pub kind: ParamKind,
    pub description: Option<String>,
    pub enum_values: Option<Vec<String>>,
    pub required: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            enum_values: None,
            required: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Decimal)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict the value to a fixed set of strings
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| (*v).to_string()).collect());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema for a single property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub json_type: JsonType,
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Schema for a function's argument object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub json_type: JsonType,
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl ParameterSchema {
    /// Derive a parameter schema from declared parameters.
    ///
    /// Never fails. A repeated parameter name overwrites the earlier
    /// property, so `required` always names existing properties.
    pub fn derive(params: &[ParamSpec]) -> Self {
        let mut properties = BTreeMap::new();
        let mut required: Vec<String> = Vec::new();

        for param in params {
            let enum_values = param
                .enum_values
                .as_ref()
                .filter(|values| !values.is_empty())
                .cloned();
            properties.insert(
                param.name.clone(),
                PropertySchema {
                    json_type: param.kind.json_type(),
                    description: param.description.clone().unwrap_or_default(),
                    enum_values,
                },
            );
            if param.required && !required.contains(&param.name) {
                required.push(param.name.clone());
            }
        }

        Self {
            json_type: JsonType::Object,
            properties,
            required,
        }
    }

    /// Check that every required name is a declared property
    pub fn is_consistent(&self) -> bool {
        self.required
            .iter()
            .all(|name| self.properties.contains_key(name))
    }
}

/// Descriptor advertised to the model for one callable function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("function name must not be empty")]
    EmptyName,
    #[error("function name {0:?} must be at most 64 characters of [A-Za-z0-9_-]")]
    InvalidName(String),
    #[error("function {function} declares parameter {param:?} more than once")]
    DuplicateParameter { function: String, param: String },
    #[error("function {function} has a parameter with an empty name")]
    EmptyParameterName { function: String },
}

impl FunctionDescriptor {
    /// Build a descriptor, rejecting names the model cannot address
    /// and argument shapes with ambiguous property names.
    pub fn describe(
        name: &str,
        description: &str,
        params: &[ParamSpec],
    ) -> Result<Self, SchemaError> {
        validate_name(name)?;

        let mut seen = HashSet::new();
        for param in params {
            if param.name.is_empty() {
                return Err(SchemaError::EmptyParameterName {
                    function: name.to_string(),
                });
            }
            if !seen.insert(param.name.as_str()) {
                return Err(SchemaError::DuplicateParameter {
                    function: name.to_string(),
                    param: param.name.clone(),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: ParameterSchema::derive(params),
        })
    }
}

fn validate_name(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() {
        return Err(SchemaError::EmptyName);
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_chars || name.len() > MAX_NAME_LEN {
        return Err(SchemaError::InvalidName(name.to_string()));
    }
    Ok(())
}
