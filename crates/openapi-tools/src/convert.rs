//! Endpoint descriptor -> flat tool descriptor.

use crate::extract::EndpointDescriptor;
use openmcp_http_tools::descriptor::{
    EndpointTarget, HttpMethod, ObjectType, ParameterSchema, ToolDescriptor,
};
use serde_json::{Map, Value};

/// Canonical tool name for an operation: `post` + `/calculate/add` -> `post_calculate_add`.
///
/// Pure function of its inputs; re-registering the same operation always targets the same
/// registry entry. Two specs exposing the same method and path collide by design of the scheme.
#[must_use]
pub fn tool_name_of(method: HttpMethod, path: &str) -> String {
    let slug = path.replace('/', "_");
    let name = format!(
        "{}_{}",
        method.as_str().to_ascii_lowercase(),
        slug.trim_matches('_')
    );
    name.trim_matches('_').to_string()
}

/// AI description, else operation description, else `""`.
#[must_use]
pub fn tool_description(endpoint: &EndpointDescriptor) -> String {
    endpoint
        .ai_metadata
        .as_ref()
        .map(|m| m.description.clone())
        .or_else(|| endpoint.description.clone())
        .unwrap_or_default()
}

/// Flatten declared parameters and the JSON body into one object schema.
///
/// Parameters go in first, in declaration order. Properties of an object-typed request body are
/// merged last and win on name conflicts. `required` is extended, not deduplicated, but body
/// `required` names with no matching property are dropped with a warning.
#[must_use]
pub fn parameter_schema(endpoint: &EndpointDescriptor) -> ParameterSchema {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in &endpoint.parameters {
        properties.insert(param.name.clone(), param.schema.clone());
        if param.required {
            required.push(param.name.clone());
        }
    }

    if let Some(body) = endpoint.request_body_schema.as_ref()
        && body.get("type").and_then(Value::as_str) == Some("object")
    {
        if let Some(body_props) = body.get("properties").and_then(Value::as_object) {
            for (name, schema) in body_props {
                properties.insert(name.clone(), schema.clone());
            }
        }
        if let Some(body_required) = body.get("required").and_then(Value::as_array) {
            for name in body_required.iter().filter_map(Value::as_str) {
                if properties.contains_key(name) {
                    required.push(name.to_string());
                } else {
                    tracing::warn!(
                        "Dropping required '{}' from {} {}: no such property",
                        name,
                        endpoint.method,
                        endpoint.path
                    );
                }
            }
        }
    }

    ParameterSchema {
        kind: ObjectType::Object,
        properties,
        required,
    }
}

#[must_use]
pub fn to_tool_descriptor(endpoint: &EndpointDescriptor) -> ToolDescriptor {
    ToolDescriptor {
        name: tool_name_of(endpoint.method, &endpoint.path),
        description: tool_description(endpoint),
        parameters: parameter_schema(endpoint),
        endpoint: EndpointTarget {
            url: endpoint.url(),
            method: endpoint.method,
        },
    }
}
