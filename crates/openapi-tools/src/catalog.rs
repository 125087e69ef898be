//! Registration, catalog, and execution facade over loader, extractor, registry, and dispatcher.
//!
//! This is the surface a serving layer (CLI, HTTP API, chat loop) talks to. The registry is
//! shared by `Arc` and can be handed in from outside via [`ToolCatalog::with_registry`].

use crate::convert::to_tool_descriptor;
use crate::error::{OpenApiToolsError, Result};
use crate::extract::extract_tools;
use crate::loader::{LoaderConfig, ScanReport, SpecLoader, SpecSource};
use openmcp_http_tools::descriptor::ToolDescriptor;
use openmcp_http_tools::registry::ToolRegistry;
use openmcp_http_tools::runtime::{DispatchConfig, Dispatcher, ExecutionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    pub loader: LoaderConfig,
    pub dispatch: DispatchConfig,
}

/// Registration input as it arrives from a serving layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
}

impl RegisterRequest {
    /// `spec_path` takes precedence when both are set.
    ///
    /// # Errors
    ///
    /// Returns a validation error if neither location is present, or a config error if the
    /// chosen location cannot be parsed.
    pub fn source(&self) -> Result<SpecSource> {
        let location = self
            .spec_path
            .as_deref()
            .or(self.spec_url.as_deref())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                OpenApiToolsError::Validation("Missing spec_path or spec_url".to_string())
            })?;
        SpecSource::parse(location)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationSummary {
    pub spec_title: String,
    pub tools_discovered: usize,
    pub tools_registered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecSummary {
    pub id: String,
    pub title: String,
    pub version: String,
    pub description: String,
    pub servers: Vec<Value>,
}

/// A tool from [`ToolCatalog::discover`], tagged with the spec it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<String>,
    #[serde(flatten)]
    pub tool: ToolDescriptor,
}

pub struct ToolCatalog {
    loader: SpecLoader,
    registry: Arc<ToolRegistry>,
    dispatcher: Dispatcher,
}

impl ToolCatalog {
    /// Build a catalog with a fresh, empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be constructed.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(ToolRegistry::new()))
    }

    /// Build a catalog over an existing registry.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be constructed.
    pub fn with_registry(config: CatalogConfig, registry: Arc<ToolRegistry>) -> Result<Self> {
        let loader = SpecLoader::new(config.loader)?;
        let dispatcher = Dispatcher::new(Arc::clone(&registry), config.dispatch)?;
        Ok(Self {
            loader,
            registry,
            dispatcher,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn loader(&self) -> &SpecLoader {
        &self.loader
    }

    /// # Errors
    ///
    /// See [`RegisterRequest::source`] and [`Self::register_spec`].
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegistrationSummary> {
        let source = request.source()?;
        self.register_spec(&source).await
    }

    /// Load a spec, convert every tool candidate, and upsert the results into the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be loaded. Individual malformed operations are
    /// skipped, not reported as errors.
    pub async fn register_spec(&self, source: &SpecSource) -> Result<RegistrationSummary> {
        let spec = self.loader.load(source).await?;
        let extraction = extract_tools(&spec.document);

        let mut tools_registered = 0;
        for endpoint in &extraction.endpoints {
            self.registry.register(to_tool_descriptor(endpoint));
            tools_registered += 1;
        }

        tracing::info!(
            spec = %spec.id,
            discovered = extraction.endpoints.len(),
            registered = tools_registered,
            skipped = extraction.skipped.len(),
            "registered tools from spec"
        );

        Ok(RegistrationSummary {
            spec_title: spec.document.title().unwrap_or("Unknown").to_string(),
            tools_discovered: extraction.endpoints.len(),
            tools_registered,
        })
    }

    /// Register a pre-built descriptor directly, bypassing spec loading.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is empty or `required` names a missing property.
    pub fn register_tool(&self, descriptor: ToolDescriptor) -> Result<String> {
        if descriptor.name.trim().is_empty() {
            return Err(OpenApiToolsError::Validation(
                "Missing tool name".to_string(),
            ));
        }
        let dangling = descriptor.parameters.dangling_required();
        if !dangling.is_empty() {
            return Err(OpenApiToolsError::Validation(format!(
                "Tool {} requires undeclared parameters: {}",
                descriptor.name,
                dangling.join(", ")
            )));
        }
        Ok(self.registry.register(descriptor))
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list()
    }

    pub async fn execute_tool(&self, name: &str, arguments: &Map<String, Value>) -> ExecutionResult {
        self.dispatcher.execute(name, arguments).await
    }

    /// # Errors
    ///
    /// Returns an error if `dir` does not exist.
    pub async fn scan(&self, dir: &Path) -> Result<ScanReport> {
        self.loader.scan(dir).await
    }

    /// Summaries of every loaded spec, ordered by id.
    #[must_use]
    pub fn specs(&self) -> Vec<SpecSummary> {
        self.loader
            .specs()
            .into_iter()
            .map(|spec| {
                let doc = &spec.document;
                SpecSummary {
                    id: spec.id.clone(),
                    title: doc.title().unwrap_or("Unknown").to_string(),
                    version: doc.version().unwrap_or("1.0.0").to_string(),
                    description: doc.description().unwrap_or_default().to_string(),
                    servers: doc.servers().to_vec(),
                }
            })
            .collect()
    }

    /// Every tool derivable from the loaded specs, followed by registered tools not already
    /// listed under the same name.
    #[must_use]
    pub fn discover(&self) -> Vec<DiscoveredTool> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for spec in self.loader.specs() {
            for endpoint in &extract_tools(&spec.document).endpoints {
                let tool = to_tool_descriptor(endpoint);
                seen.insert(tool.name.clone());
                out.push(DiscoveredTool {
                    spec_id: Some(spec.id.clone()),
                    tool,
                });
            }
        }

        for tool in self.registry.list() {
            if !seen.contains(&tool.name) {
                out.push(DiscoveredTool {
                    spec_id: None,
                    tool,
                });
            }
        }

        out
    }
}
