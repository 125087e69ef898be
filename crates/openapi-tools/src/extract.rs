//! Walk a spec's `paths` tree and collect the operations opted into tool exposure.
//!
//! An operation is a candidate iff it carries a truthy `x-ai-tool` extension. A candidate that
//! fails to parse (bad parameter, unresolvable `$ref`, wrongly-typed extension) is skipped and
//! reported in [`Extraction::skipped`]; the rest of the batch still goes through.

use crate::document::{SpecDocument, is_truthy};
use crate::error::{OpenApiToolsError, Result};
use openmcp_http_tools::descriptor::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

pub const AI_TOOL_EXTENSION: &str = "x-ai-tool";
pub const AI_DESCRIPTION_EXTENSION: &str = "x-ai-description";
pub const AI_CATEGORY_EXTENSION: &str = "x-ai-category";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiMetadata {
    pub enabled: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamLocation {
    type Err = OpenApiToolsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "path" => Ok(ParamLocation::Path),
            "query" => Ok(ParamLocation::Query),
            "header" => Ok(ParamLocation::Header),
            "cookie" => Ok(ParamLocation::Cookie),
            other => Err(OpenApiToolsError::Document(format!(
                "unknown parameter location '{other}'"
            ))),
        }
    }
}

/// One declared operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Normalized view of one tool-candidate operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub path: String,
    pub base_url: String,
    pub method: HttpMethod,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// `None` when the operation is flagged but declares no `x-ai-description`.
    pub ai_metadata: Option<AiMetadata>,
    /// Declaration order is kept.
    pub parameters: Vec<ParamSpec>,
    pub request_body_schema: Option<Value>,
    pub responses: Map<String, Value>,
}

impl EndpointDescriptor {
    /// Public URL template: `base_url + path`, concatenated as-is.
    ///
    /// A base URL ending in `/` yields a doubled slash; that is left alone.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOperation {
    pub method: HttpMethod,
    pub path: String,
    pub reason: String,
}

/// Batch result of [`extract_tools`]: everything that parsed, plus what did not and why.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub endpoints: Vec<EndpointDescriptor>,
    pub skipped: Vec<SkippedOperation>,
}

/// Collect every tool-candidate operation of `doc`, in document order.
#[must_use]
pub fn extract_tools(doc: &SpecDocument) -> Extraction {
    let mut out = Extraction::default();
    let Some(paths) = doc.paths() else {
        return out;
    };
    let base_url = doc.base_url();

    for (path, path_item) in paths {
        let Some(operations) = path_item.as_object() else {
            tracing::warn!(path = %path, "Skipping path item that is not a mapping");
            continue;
        };

        for (key, operation) in operations {
            let Some(method) = HttpMethod::from_path_item_key(key) else {
                continue;
            };
            if !is_tool_candidate(operation) {
                continue;
            }

            match parse_operation(doc, base_url, path, method, operation) {
                Ok(endpoint) => out.endpoints.push(endpoint),
                Err(e) => {
                    tracing::warn!("Skipping {} {}: {}", method, path, e);
                    out.skipped.push(SkippedOperation {
                        method,
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    out
}

fn is_tool_candidate(operation: &Value) -> bool {
    operation.get(AI_TOOL_EXTENSION).is_some_and(is_truthy)
}

fn parse_operation(
    doc: &SpecDocument,
    base_url: &str,
    path: &str,
    method: HttpMethod,
    operation: &Value,
) -> Result<EndpointDescriptor> {
    let op = operation
        .as_object()
        .ok_or_else(|| OpenApiToolsError::Document("operation is not a mapping".to_string()))?;

    let parameters = match op.get("parameters") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|raw| parse_parameter(doc, raw))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(OpenApiToolsError::Document(
                "'parameters' must be a list".to_string(),
            ));
        }
    };

    let request_body_schema = match op.get("requestBody") {
        None | Some(Value::Null) => None,
        Some(raw) => json_body_schema(doc, raw)?,
    };

    Ok(EndpointDescriptor {
        path: path.to_string(),
        base_url: base_url.to_string(),
        method,
        summary: optional_str(op, "summary"),
        description: optional_str(op, "description"),
        ai_metadata: parse_ai_metadata(op, method, path)?,
        parameters,
        request_body_schema,
        responses: op
            .get("responses")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_ai_metadata(
    op: &Map<String, Value>,
    method: HttpMethod,
    path: &str,
) -> Result<Option<AiMetadata>> {
    let description = match op.get(AI_DESCRIPTION_EXTENSION) {
        None | Some(Value::Null) => {
            tracing::warn!(
                "{} {} is flagged {} but has no {}; falling back to the operation description",
                method,
                path,
                AI_TOOL_EXTENSION,
                AI_DESCRIPTION_EXTENSION
            );
            return Ok(None);
        }
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(OpenApiToolsError::Document(format!(
                "'{AI_DESCRIPTION_EXTENSION}' must be a string"
            )));
        }
    };

    let category = match op.get(AI_CATEGORY_EXTENSION) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(OpenApiToolsError::Document(format!(
                "'{AI_CATEGORY_EXTENSION}' must be a string"
            )));
        }
    };

    Ok(Some(AiMetadata {
        enabled: true,
        description,
        category,
    }))
}

fn parse_parameter(doc: &SpecDocument, raw: &Value) -> Result<ParamSpec> {
    let param = doc
        .resolve(raw)?
        .as_object()
        .ok_or_else(|| OpenApiToolsError::Document("parameter is not a mapping".to_string()))?;

    let name = param
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| OpenApiToolsError::Document("parameter has no name".to_string()))?;

    let location: ParamLocation = param
        .get("in")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            OpenApiToolsError::Document(format!("parameter '{name}' has no location ('in')"))
        })?
        .parse()?;

    let schema = match param.get("schema") {
        None => json!({}),
        Some(raw_schema) => {
            let schema = doc.resolve(raw_schema)?;
            if !schema.is_object() {
                return Err(OpenApiToolsError::Document(format!(
                    "schema of parameter '{name}' is not a mapping"
                )));
            }
            schema.clone()
        }
    };

    Ok(ParamSpec {
        name: name.to_string(),
        location,
        required: param.get("required").is_some_and(is_truthy),
        schema,
        description: optional_str(param, "description"),
    })
}

/// Schema of the `application/json` request body, if the operation declares one.
fn json_body_schema(doc: &SpecDocument, raw: &Value) -> Result<Option<Value>> {
    let body = doc.resolve(raw)?;
    if !body.is_object() {
        return Err(OpenApiToolsError::Document(
            "requestBody is not a mapping".to_string(),
        ));
    }

    let Some(schema) = body
        .get("content")
        .and_then(|c| c.get("application/json"))
        .and_then(|media| media.get("schema"))
    else {
        return Ok(None);
    };

    Ok(Some(doc.resolve(schema)?.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentFormat;

    fn yaml(src: &str) -> SpecDocument {
        SpecDocument::parse(src, DocumentFormat::Yaml).unwrap()
    }

    const CALCULATOR: &str = r#"
openapi: 3.0.0
info:
  title: Calculator API
  version: 1.0.0
servers:
  - url: http://localhost:5001
paths:
  /health:
    get:
      summary: Health check
      responses:
        200:
          description: ok
  /calculate/add:
    post:
      summary: Add
      description: Adds a and b
      x-ai-tool: true
      x-ai-description: Add two numbers
      x-ai-category: math
      requestBody:
        content:
          application/json:
            schema:
              type: object
              properties:
                a: {type: number}
                b: {type: number}
              required: [a, b]
      responses:
        200:
          description: Sum
"#;

    #[test]
    fn only_flagged_operations_are_extracted() {
        let extraction = extract_tools(&yaml(CALCULATOR));
        assert!(extraction.skipped.is_empty());
        assert_eq!(extraction.endpoints.len(), 1);

        let ep = &extraction.endpoints[0];
        assert_eq!(ep.method, HttpMethod::Post);
        assert_eq!(ep.path, "/calculate/add");
        assert_eq!(ep.url(), "http://localhost:5001/calculate/add");
        assert_eq!(ep.summary.as_deref(), Some("Add"));
        assert_eq!(
            ep.ai_metadata,
            Some(AiMetadata {
                enabled: true,
                description: "Add two numbers".to_string(),
                category: Some("math".to_string()),
            })
        );
        assert_eq!(ep.request_body_schema.as_ref().unwrap()["required"], json!(["a", "b"]));
        assert!(ep.responses.contains_key("200"));
    }

    #[test]
    fn falsy_flag_is_not_a_candidate() {
        let doc = yaml(
            r"
paths:
  /a:
    get:
      x-ai-tool: false
      x-ai-description: nope
  /b:
    get:
      x-ai-tool: 0
",
        );
        let extraction = extract_tools(&doc);
        assert!(extraction.endpoints.is_empty());
        assert!(extraction.skipped.is_empty());
    }

    #[test]
    fn non_method_keys_are_ignored() {
        let doc = yaml(
            r"
paths:
  /items/{id}:
    parameters:
      - name: id
        in: path
    summary: shared
    options:
      x-ai-tool: true
    get:
      x-ai-tool: yes
      x-ai-description: Get item
",
        );
        let extraction = extract_tools(&doc);
        assert_eq!(extraction.endpoints.len(), 1);
        assert_eq!(extraction.endpoints[0].method, HttpMethod::Get);
        assert!(extraction.endpoints[0].parameters.is_empty());
    }

    #[test]
    fn missing_server_gives_empty_base_url() {
        let doc = yaml(
            r"
paths:
  /ping:
    get:
      x-ai-tool: true
      x-ai-description: Ping
",
        );
        let extraction = extract_tools(&doc);
        assert_eq!(extraction.endpoints[0].url(), "/ping");
    }

    #[test]
    fn trailing_slash_base_url_is_not_normalized() {
        let doc = yaml(
            r"
servers:
  - url: http://api.local/
paths:
  /ping:
    get:
      x-ai-tool: true
      x-ai-description: Ping
",
        );
        assert_eq!(
            extract_tools(&doc).endpoints[0].url(),
            "http://api.local//ping"
        );
    }

    #[test]
    fn malformed_operation_is_skipped_and_batch_continues() {
        let doc = yaml(
            r"
paths:
  /bad:
    get:
      x-ai-tool: true
      x-ai-description: Broken
      parameters:
        - in: query
  /worse:
    post:
      x-ai-tool: true
      x-ai-description: [not, a, string]
  /good:
    get:
      x-ai-tool: true
      x-ai-description: Fine
      parameters:
        - name: q
          in: query
          required: true
          schema: {type: string}
",
        );
        let extraction = extract_tools(&doc);
        assert_eq!(extraction.endpoints.len(), 1);
        assert_eq!(extraction.endpoints[0].path, "/good");
        assert_eq!(extraction.endpoints[0].parameters[0].location, ParamLocation::Query);
        assert!(extraction.endpoints[0].parameters[0].required);

        let skipped: Vec<&str> = extraction.skipped.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(skipped, vec!["/bad", "/worse"]);
        assert!(extraction.skipped[0].reason.contains("no name"));
    }

    #[test]
    fn unknown_parameter_location_skips_operation() {
        let doc = yaml(
            r"
paths:
  /a:
    get:
      x-ai-tool: true
      x-ai-description: A
      parameters:
        - name: x
          in: body
",
        );
        let extraction = extract_tools(&doc);
        assert!(extraction.endpoints.is_empty());
        assert!(extraction.skipped[0].reason.contains("body"));
    }

    #[test]
    fn missing_ai_description_leaves_metadata_empty() {
        let doc = yaml(
            r"
paths:
  /a:
    get:
      x-ai-tool: true
      description: Operation text
",
        );
        let ep = &extract_tools(&doc).endpoints[0];
        assert!(ep.ai_metadata.is_none());
        assert_eq!(ep.description.as_deref(), Some("Operation text"));
    }

    #[test]
    fn local_refs_are_resolved_for_parameters_and_bodies() {
        let doc = yaml(
            r"
components:
  parameters:
    Limit:
      name: limit
      in: query
      schema:
        $ref: '#/components/schemas/Count'
  schemas:
    Count: {type: integer}
    NewUser:
      type: object
      properties:
        name: {type: string}
  requestBodies:
    UserBody:
      content:
        application/json:
          schema:
            $ref: '#/components/schemas/NewUser'
paths:
  /users:
    post:
      x-ai-tool: true
      x-ai-description: Create user
      parameters:
        - $ref: '#/components/parameters/Limit'
      requestBody:
        $ref: '#/components/requestBodies/UserBody'
",
        );
        let extraction = extract_tools(&doc);
        let ep = &extraction.endpoints[0];
        assert_eq!(ep.parameters[0].name, "limit");
        assert_eq!(ep.parameters[0].schema, json!({"type": "integer"}));
        assert!(!ep.parameters[0].required);
        assert_eq!(
            ep.request_body_schema.as_ref().unwrap()["properties"]["name"]["type"],
            "string"
        );
    }

    #[test]
    fn dangling_ref_skips_operation() {
        let doc = yaml(
            r"
paths:
  /a:
    get:
      x-ai-tool: true
      x-ai-description: A
      parameters:
        - $ref: '#/components/parameters/Nope'
",
        );
        let extraction = extract_tools(&doc);
        assert!(extraction.endpoints.is_empty());
        assert_eq!(extraction.skipped.len(), 1);
    }

    #[test]
    fn non_json_request_body_is_ignored() {
        let doc = yaml(
            r"
paths:
  /upload:
    put:
      x-ai-tool: true
      x-ai-description: Upload
      requestBody:
        content:
          text/plain:
            schema: {type: string}
",
        );
        assert!(extract_tools(&doc).endpoints[0].request_body_schema.is_none());
    }

    #[test]
    fn operations_keep_document_order() {
        let doc = yaml(
            r"
paths:
  /z:
    delete: {x-ai-tool: true, x-ai-description: Z}
    get: {x-ai-tool: true, x-ai-description: Z}
  /a:
    patch: {x-ai-tool: true, x-ai-description: A}
",
        );
        let order: Vec<(HttpMethod, String)> = extract_tools(&doc)
            .endpoints
            .into_iter()
            .map(|e| (e.method, e.path))
            .collect();
        assert_eq!(
            order,
            vec![
                (HttpMethod::Delete, "/z".to_string()),
                (HttpMethod::Get, "/z".to_string()),
                (HttpMethod::Patch, "/a".to_string()),
            ]
        );
    }
}
