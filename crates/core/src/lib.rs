//! # toolchat core
//!
//! Domain types, traits, and error definitions for the toolchat dialogue agent.
//! This crate has **no HTTP or runtime dependencies** — it defines the domain
//! model that the provider, tool, and agent crates implement against.
//!
//! ## Layout
//!
//! - [`message`] — turns and the append-only conversation log
//! - [`tool`] — the `Capability` trait and the read-only capability registry
//! - [`provider`] — the model boundary and the `DecisionOutcome` it produces
//! - [`agent`] — the settings record a session is constructed with
//! - [`event`] — domain events broadcast while the control loop runs

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentSettings, InvocationFailurePolicy, LoopPolicy};
pub use error::{LoopFailure, ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Role, Turn};
pub use provider::{
    CapabilityDescriptor, CompletionRequest, DecisionOutcome, Provider, ProviderResponse, Usage,
};
pub use tool::{Capability, CapabilityRegistry, FnCapability};
