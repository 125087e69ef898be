//! The tool descriptor model: what the registry stores and what the LLM sees.

use crate::error::HttpToolsError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// HTTP methods an `OpenAPI` operation can be exposed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Every method, in the order path items are scanned.
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Map a path-item key (`get`, `post`, ...) to a method.
    ///
    /// Only the lowercase spellings used by `OpenAPI` path items match; anything else
    /// (`parameters`, `summary`, `servers`, vendor extensions) is not an operation.
    #[must_use]
    pub fn from_path_item_key(key: &str) -> Option<Self> {
        match key {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            _ => None,
        }
    }

    /// Methods whose arguments travel in the query string rather than a JSON body.
    #[must_use]
    pub fn uses_query_string(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = HttpToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| HttpToolsError::UnsupportedMethod(s.trim().to_string()))
    }
}

/// Marker that always serializes as `"object"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    #[serde(rename = "object")]
    Object,
}

/// Flat JSON-Schema-like parameter signature of a tool.
///
/// `required` is a list, not a set: duplicates coming from the source document are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type", default)]
    pub kind: ObjectType,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    /// Required names that have no matching entry in `properties`.
    #[must_use]
    pub fn dangling_required(&self) -> Vec<&str> {
        self.required
            .iter()
            .filter(|name| !self.properties.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Where a tool call is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTarget {
    /// URL template, e.g. `http://localhost:5001/users/{id}`.
    pub url: String,
    pub method: HttpMethod,
}

/// Registry record pairing a tool's schema with its HTTP dispatch target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: ParameterSchema,
    pub endpoint: EndpointTarget,
}

impl ToolDescriptor {
    /// Render the descriptor in the function-calling shape chat models accept:
    /// `{"type": "function", "function": {name, description, parameters}}`.
    #[must_use]
    pub fn to_function_tool(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ToolDescriptor {
        let mut properties = Map::new();
        properties.insert("a".to_string(), json!({"type": "number"}));
        properties.insert("b".to_string(), json!({"type": "number"}));
        ToolDescriptor {
            name: "post_calculate_add".to_string(),
            description: "Add two numbers".to_string(),
            parameters: ParameterSchema {
                kind: ObjectType::Object,
                properties,
                required: vec!["a".to_string(), "b".to_string()],
            },
            endpoint: EndpointTarget {
                url: "http://localhost:5001/calculate/add".to_string(),
                method: HttpMethod::Post,
            },
        }
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" Patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        let err = "OPTIONS".parse::<HttpMethod>().unwrap_err();
        assert!(matches!(err, HttpToolsError::UnsupportedMethod(m) if m == "OPTIONS"));
    }

    #[test]
    fn path_item_keys_must_be_lowercase_methods() {
        assert_eq!(HttpMethod::from_path_item_key("delete"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::from_path_item_key("GET"), None);
        assert_eq!(HttpMethod::from_path_item_key("parameters"), None);
        assert_eq!(HttpMethod::from_path_item_key("options"), None);
    }

    #[test]
    fn descriptor_serializes_in_catalog_shape() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["name"], "post_calculate_add");
        assert_eq!(v["parameters"]["type"], "object");
        assert_eq!(v["parameters"]["required"], json!(["a", "b"]));
        assert_eq!(v["endpoint"]["method"], "POST");
        assert_eq!(v["endpoint"]["url"], "http://localhost:5001/calculate/add");
    }

    #[test]
    fn empty_parameters_keep_object_shape() {
        let v = serde_json::to_value(ParameterSchema::default()).unwrap();
        assert_eq!(v, json!({"type": "object", "properties": {}, "required": []}));
    }

    #[test]
    fn descriptor_deserializes_with_missing_optional_fields() {
        let d: ToolDescriptor = serde_json::from_value(json!({
            "name": "get_health",
            "endpoint": {"url": "http://x/health", "method": "GET"}
        }))
        .unwrap();
        assert_eq!(d.description, "");
        assert!(d.parameters.properties.is_empty());
    }

    #[test]
    fn dangling_required_reports_names_without_properties() {
        let mut d = sample();
        assert!(d.parameters.dangling_required().is_empty());
        d.parameters.required.push("c".to_string());
        assert_eq!(d.parameters.dangling_required(), vec!["c"]);
    }

    #[test]
    fn function_tool_wraps_schema() {
        let f = sample().to_function_tool();
        assert_eq!(f["type"], "function");
        assert_eq!(f["function"]["name"], "post_calculate_add");
        assert_eq!(f["function"]["description"], "Add two numbers");
        assert_eq!(f["function"]["parameters"]["properties"]["a"]["type"], "number");
    }
}
