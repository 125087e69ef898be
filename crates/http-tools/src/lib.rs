//! Tool descriptors, the in-memory tool registry, and HTTP dispatch.
//!
//! This crate is intended to be used by:
//! - `openmcp-openapi-tools` (descriptors produced from `OpenAPI` operations)
//! - the `openmcp` CLI (tool execution)
//!
//! It intentionally knows **nothing** about `OpenAPI` documents; a [`descriptor::ToolDescriptor`]
//! is the only contract between spec conversion and dispatch.

pub mod descriptor;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod safety;
