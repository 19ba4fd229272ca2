//! Index of every loaded tool keyed by its fully qualified name.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use umcp_primitives::{Catalog, ToolDefinition};

use crate::schema::input_schema;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors produced while registering catalogs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two tools resolved to the same fully qualified name.
    #[error("duplicate tool name `{name}`")]
    DuplicateTool {
        /// The colliding fully qualified name.
        name: String,
    },
}

/// A tool paired with the catalog that declared it.
#[derive(Clone, Debug)]
pub struct RegisteredTool {
    name: String,
    catalog: Arc<Catalog>,
    index: usize,
}

impl RegisteredTool {
    /// Returns the fully qualified `<catalog>_<tool>` name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns a shared handle to the owning catalog.
    #[must_use]
    pub fn catalog_handle(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// Returns the tool definition.
    #[must_use]
    pub fn definition(&self) -> &ToolDefinition {
        &self.catalog.tools()[self.index]
    }

    /// Returns the `tools/list` descriptor for this tool.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        let tool = self.definition();
        json!({
            "name": self.name,
            "description": tool.description(),
            "inputSchema": input_schema(tool),
        })
    }
}

/// Registry of loaded catalogs.
///
/// Catalogs are registered once at startup; afterwards the registry is
/// read-only and lists tools in load and declaration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    catalogs: Vec<Arc<Catalog>>,
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every tool of a catalog.
    ///
    /// Either all of the catalog's tools are registered or none are.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateTool`] if a fully qualified name is
    /// already registered or repeats within the catalog.
    pub fn register_catalog(&mut self, catalog: Catalog) -> RegistryResult<()> {
        let catalog = Arc::new(catalog);
        let mut pending: Vec<RegisteredTool> = Vec::with_capacity(catalog.tools().len());
        for (index, tool) in catalog.tools().iter().enumerate() {
            let name = catalog.qualified_name(tool);
            if self.by_name.contains_key(&name) || pending.iter().any(|p| p.name == name) {
                return Err(RegistryError::DuplicateTool { name });
            }
            pending.push(RegisteredTool {
                name,
                catalog: Arc::clone(&catalog),
                index,
            });
        }

        for tool in pending {
            self.by_name.insert(tool.name.clone(), self.tools.len());
            self.tools.push(tool);
        }
        debug!(catalog = %catalog.name(), tools = catalog.tools().len(), "registered catalog");
        self.catalogs.push(catalog);
        Ok(())
    }

    /// Returns the tool matching the fully qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.by_name.get(name).map(|&index| &self.tools[index])
    }

    /// Returns every registered tool in load order.
    #[must_use]
    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    /// Returns every loaded catalog in load order.
    #[must_use]
    pub fn catalogs(&self) -> &[Arc<Catalog>] {
        &self.catalogs
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
