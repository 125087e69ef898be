//! Minimally-typed `OpenAPI` document tree.
//!
//! A loaded spec is kept as a `serde_json::Value` (object / array / scalar) rather than a full
//! `OpenAPI` object model. Only `info`, `servers`, `paths`, and local `$ref` targets are ever read,
//! through the accessors below. Object key order follows the source document.

use crate::error::{OpenApiToolsError, Result};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

/// Serialized form of a spec document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml` / `.yml` select YAML; every other name (including none) selects JSON.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            DocumentFormat::Yaml
        } else {
            DocumentFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocument {
    root: Value,
}

impl SpecDocument {
    /// Wrap an already-parsed tree. The root must be a mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a JSON object.
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(OpenApiToolsError::Document(
                "document root is not a mapping".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// Parse document text in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON/YAML or the root is not a mapping.
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self> {
        let root = match format {
            DocumentFormat::Json => serde_json::from_str(content)
                .map_err(|e| OpenApiToolsError::Document(format!("invalid JSON: {e}")))?,
            DocumentFormat::Yaml => {
                let mut yaml: serde_yaml::Value = serde_yaml::from_str(content)
                    .map_err(|e| OpenApiToolsError::Document(format!("invalid YAML: {e}")))?;
                yaml.apply_merge().map_err(|e| {
                    OpenApiToolsError::Document(format!("invalid YAML merge: {e}"))
                })?;
                yaml_to_json(yaml)?
            }
        };
        Self::from_value(root)
    }

    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    fn info_str(&self, key: &str) -> Option<&str> {
        self.root.get("info")?.get(key)?.as_str()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.info_str("title")
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.info_str("version")
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.info_str("description")
    }

    #[must_use]
    pub fn servers(&self) -> &[Value] {
        self.root
            .get("servers")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// URL of the first declared server, or `""` when there is none.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.servers()
            .first()
            .and_then(|s| s.get("url"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    #[must_use]
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths")?.as_object()
    }

    /// Follow local `$ref`s (`#/components/...`) until a non-reference value is reached.
    ///
    /// Values without a `$ref` are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error for external refs, dangling pointers, and reference cycles.
    pub fn resolve<'a>(&'a self, value: &'a Value) -> Result<&'a Value> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = value;

        while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
            if !seen.insert(reference) {
                return Err(OpenApiToolsError::Document(format!(
                    "Cyclic $ref detected while resolving: {reference}"
                )));
            }
            let Some(pointer) = reference.strip_prefix('#') else {
                return Err(OpenApiToolsError::Document(format!(
                    "Unsupported external $ref '{reference}'"
                )));
            };
            current = self.root.pointer(pointer).ok_or_else(|| {
                OpenApiToolsError::Document(format!("Unresolved $ref '{reference}'"))
            })?;
        }

        Ok(current)
    }
}

/// Loose truthiness used for the `x-ai-tool` flag: `false`, `0`, `""`, `[]`, `{}`, and `null`
/// are falsy; everything else is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Convert a YAML tree to the JSON tree the rest of the crate works on.
///
/// YAML allows non-string mapping keys (`200:` in `responses` is an integer); those are
/// stringified. Tags are dropped.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number_to_json(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut out = Map::new();
            for (k, v) in mapping {
                out.insert(yaml_key_to_string(k)?, yaml_to_json(v)?);
            }
            Value::Object(out)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number_to_json(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

fn yaml_key_to_string(key: serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key_to_string(tagged.value),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => Err(
            OpenApiToolsError::Document("unsupported non-scalar mapping key".to_string()),
        ),
    }
}
