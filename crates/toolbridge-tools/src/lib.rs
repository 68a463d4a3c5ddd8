//! # toolbridge-tools
//!
//! Tool discovery and execution for the bridge.
//!
//! ## Core Components
//!
//! - [`openapi::extract`]: turns an OpenAPI document into tool declarations
//! - [`ApiClient`]: the shared HTTP session for the target API
//! - [`HttpOperationTool`]: a tool backed by one POST operation
//! - [`ToolImplementation`]: trait every executable tool implements
//! - [`ToolRegistry`]: name-unique registry of tools
//! - [`ToolInvoker`]: runs a named tool and always returns a
//!   [`ToolInvocationResult`], never an error
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::{Map, json};
//! use toolbridge_tools::{ApiClient, ToolInvoker, discover_tools};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let api = ApiClient::new("http://localhost:8001")?;
//! let invoker = ToolInvoker::from_tools(discover_tools(&api).await?)?;
//!
//! let mut args = Map::new();
//! args.insert("a".into(), json!(3));
//! args.insert("b".into(), json!(4));
//! let result = invoker.invoke("multiply", &args).await;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! The [`ToolRegistry`] uses `DashMap`, so it can be shared by reference
//! without additional synchronization.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{info, warn};
use serde_json::{Map, Value};

use toolbridge_common::{Tool, ToolInvocationResult};

pub mod error;
pub mod http;
pub mod openapi;

pub use error::{SchemaError, ToolInvocationError};
pub use http::{
    ApiClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT, HttpOperationTool, OPENAPI_PATH,
    discover_tools,
};
pub use openapi::{ExtractedOperation, OpenApiDocument, extract};

/// An executable tool.
#[async_trait]
pub trait ToolImplementation: Send + Sync {
    /// The declaration sent to the model.
    fn get_definition(&self) -> Tool;

    /// Runs the tool with model-supplied arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolInvocationError`] describing why the call failed.
    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, ToolInvocationError>;
}

/// Registry of tools keyed by their unique name.
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn ToolImplementation>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
        }
    }

    /// Registers a tool under its declared name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateToolName`] if the name is taken; the
    /// registered tool is left in place.
    pub fn register(&self, tool: Arc<dyn ToolImplementation>) -> Result<(), SchemaError> {
        let name = tool.get_definition().function.name;
        match self.tools.entry(name) {
            Entry::Occupied(entry) => Err(SchemaError::DuplicateToolName {
                name: entry.key().clone(),
                detail: "a tool with this name is already registered".to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(tool);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.get(name).map(|r| r.value().clone())
    }

    /// All tool declarations, ordered by name.
    #[must_use]
    pub fn get_all_definitions(&self) -> Vec<Tool> {
        let mut definitions: Vec<Tool> = self.tools.iter().map(|t| t.get_definition()).collect();
        definitions.sort_by(|a, b| a.name().cmp(b.name()));
        definitions
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, ordered.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Executes tool calls by name.
///
/// Every outcome, including an unknown name, comes back as a
/// [`ToolInvocationResult`] so the caller can relay it to the model.
#[derive(Default)]
pub struct ToolInvoker {
    registry: ToolRegistry,
}

impl ToolInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    /// Builds an invoker holding every tool in `tools`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateToolName`] if two tools share a name.
    pub fn from_tools<T, I>(tools: I) -> Result<Self, SchemaError>
    where
        T: ToolImplementation + 'static,
        I: IntoIterator<Item = T>,
    {
        let invoker = Self::new();
        for tool in tools {
            invoker.add_tool(tool)?;
        }
        Ok(invoker)
    }

    /// Adds a tool.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateToolName`] if the name is taken.
    pub fn add_tool<T: ToolImplementation + 'static>(&self, tool: T) -> Result<(), SchemaError> {
        self.registry.register(Arc::new(tool))
    }

    /// Adds a shared tool.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateToolName`] if the name is taken.
    pub fn add_tool_arc(&self, tool: Arc<dyn ToolImplementation>) -> Result<(), SchemaError> {
        self.registry.register(tool)
    }

    /// Tool declarations to send to the model, ordered by name.
    #[must_use]
    pub fn get_all_tools(&self) -> Vec<Tool> {
        self.registry.get_all_definitions()
    }

    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs `tool_name` with `args`.
    ///
    /// Never fails: an unknown name is reported without touching the network,
    /// and execution errors become a failed result.
    pub async fn invoke(&self, tool_name: &str, args: &Map<String, Value>) -> ToolInvocationResult {
        let Some(tool) = self.registry.get(tool_name) else {
            warn!("Model requested unknown tool '{tool_name}'");
            return ToolInvocationResult::failure(
                tool_name,
                ToolInvocationError::UnknownTool(tool_name.to_string()).to_string(),
            );
        };

        info!("Executing tool '{tool_name}'");
        match tool.execute(args).await {
            Ok(payload) => ToolInvocationResult::success(tool_name, payload),
            Err(e) => {
                let description = e.describe();
                warn!("Tool '{tool_name}' failed: {description}");
                ToolInvocationResult::failure(tool_name, description)
            }
        }
    }
}
