//! `OpenAPI` -> LLM tool conversion.
//!
//! Pipeline (registration path):
//! [`loader::SpecLoader`] -> [`extract::extract_tools`] -> [`convert::to_tool_descriptor`] ->
//! [`openmcp_http_tools::registry::ToolRegistry`].
//!
//! [`catalog::ToolCatalog`] wires the pipeline and the dispatcher together for callers that just
//! want "register a spec, list tools, execute a tool".
//!
//! Only operations that opt in with the `x-ai-tool` extension become tools.

pub mod catalog;
pub mod convert;
pub mod document;
pub mod error;
pub mod extract;
pub mod loader;
