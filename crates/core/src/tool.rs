//! Capability trait and registry — the agent's menu of external lookups.
//!
//! A capability is a black box: a query string goes in, text comes out, or
//! the call fails. Capabilities are registered once at startup; after that
//! the registry is wrapped in an `Arc` and only ever read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ToolError;
use crate::provider::CapabilityDescriptor;

/// The core Capability trait.
///
/// Each external tool (arxiv, wikipedia, web search) implements this trait.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique identifier the model uses to request this capability.
    fn identifier(&self) -> &str;

    /// A description of what this capability does (sent to the model).
    fn description(&self) -> &str;

    /// Run the capability against a free-text query.
    async fn invoke(&self, query: &str) -> std::result::Result<String, ToolError>;

    /// Menu entry for this capability.
    fn to_descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            identifier: self.identifier().to_string(),
            description: self.description().to_string(),
        }
    }
}

type InvokeFuture = Pin<Box<dyn Future<Output = std::result::Result<String, ToolError>> + Send>>;

/// A capability backed by a closure.
pub struct FnCapability {
    identifier: String,
    description: String,
    invoke: Box<dyn Fn(String) -> InvokeFuture + Send + Sync>,
}

impl FnCapability {
    pub fn new<F, Fut>(identifier: impl Into<String>, description: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
    {
        Self {
            identifier: identifier.into(),
            description: description.into(),
            invoke: Box::new(move |query| Box::pin(invoke(query))),
        }
    }
}

#[async_trait]
impl Capability for FnCapability {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, query: &str) -> std::result::Result<String, ToolError> {
        (self.invoke)(query.to_string()).await
    }
}

/// A registry of available capabilities, kept in registration order.
///
/// The agent loop uses this to:
/// 1. Present the capability menu to the model
/// 2. Look up the capability the model asked for
pub struct CapabilityRegistry {
    entries: Vec<Arc<dyn Capability>>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a capability. Identifiers are unique for the session.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> std::result::Result<(), ToolError> {
        let identifier = capability.identifier().to_string();
        if self.index.contains_key(&identifier) {
            return Err(ToolError::DuplicateCapability(identifier));
        }
        self.index.insert(identifier, self.entries.len());
        self.entries.push(capability);
        Ok(())
    }

    /// Register a closure-backed capability.
    pub fn register_fn<F, Fut>(
        &mut self,
        identifier: impl Into<String>,
        description: impl Into<String>,
        invoke: F,
    ) -> std::result::Result<(), ToolError>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
    {
        self.register(Arc::new(FnCapability::new(identifier, description, invoke)))
    }

    /// Get a capability by identifier.
    pub fn get(&self, identifier: &str) -> std::result::Result<Arc<dyn Capability>, ToolError> {
        self.index
            .get(identifier)
            .map(|&i| Arc::clone(&self.entries[i]))
            .ok_or_else(|| ToolError::UnknownCapability(identifier.to_string()))
    }

    /// The capability menu, in registration order.
    pub fn describe_all(&self) -> Vec<CapabilityDescriptor> {
        self.entries.iter().map(|c| c.to_descriptor()).collect()
    }

    /// All registered identifiers, in registration order.
    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.identifier()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
