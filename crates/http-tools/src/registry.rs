//! In-memory tool registry.
//!
//! One registry is created per process (or per test) and shared by reference (`Arc`) between
//! whoever registers tools and the [`crate::runtime::Dispatcher`]. All reads and writes go through
//! a single lock, so concurrent `register` calls never lose updates and `list` always observes a
//! consistent snapshot.

use crate::descriptor::ToolDescriptor;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    /// Descriptors in first-registration order.
    tools: Vec<ToolDescriptor>,
    /// Tool name -> index into `tools`.
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor by name and return the name it was stored under.
    ///
    /// Replacement overwrites the whole descriptor (no merging) and keeps the tool's original
    /// position in [`Self::list`].
    pub fn register(&self, descriptor: ToolDescriptor) -> String {
        let name = descriptor.name.clone();
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let replaced = match inner.index.get(&name).copied() {
            Some(idx) => {
                inner.tools[idx] = descriptor;
                true
            }
            None => {
                inner.index.insert(name.clone(), inner.tools.len());
                inner.tools.push(descriptor);
                false
            }
        };
        drop(guard);

        tracing::debug!(tool = %name, replaced, "registered tool");
        name
    }

    /// Look a tool up by name. Absence is not an error.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolDescriptor> {
        let inner = self.inner.read();
        inner.index.get(name).map(|&idx| inner.tools[idx].clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().index.contains_key(name)
    }

    /// Snapshot of every registered tool, in first-registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.inner.read().tools.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
