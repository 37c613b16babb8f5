//! Agent settings and loop policies.
//!
//! `AgentSettings` is the opaque configuration record a session is created
//! with. It is built by the config crate; the core never reads the
//! environment itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default system instruction prepended to every rendered conversation.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful research assistant. \
When a question needs current events, encyclopedic background, or academic papers, \
call one of the available tools; otherwise answer directly. \
Ground your answers in any tool results you are given and say so when they are inconclusive.";

/// Configuration for the agent's behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Model identifier sent to the provider
    pub model: String,

    #[serde(default = "default_temp")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Fixed instruction rendered ahead of the stored turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    /// Maximum capability invocations per user turn (safety limit)
    #[serde(default = "default_max_invocations")]
    pub max_invocations: u32,

    #[serde(default)]
    pub loop_policy: LoopPolicy,

    #[serde(default)]
    pub failure_policy: InvocationFailurePolicy,

    /// Upper bound on a single model call
    #[serde(default = "default_model_timeout", with = "duration_secs")]
    pub model_timeout: Duration,

    /// Upper bound on a single capability call
    #[serde(default = "default_tool_timeout", with = "duration_secs")]
    pub tool_timeout: Duration,
}

fn default_temp() -> f32 {
    0.7
}
fn default_max_invocations() -> u32 {
    3
}
fn default_model_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_tool_timeout() -> Duration {
    Duration::from_secs(30)
}

impl AgentSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temp(),
            max_tokens: None,
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            max_invocations: default_max_invocations(),
            loop_policy: LoopPolicy::default(),
            failure_policy: InvocationFailurePolicy::default(),
            model_timeout: default_model_timeout(),
            tool_timeout: default_tool_timeout(),
        }
    }

    pub fn with_loop_policy(mut self, policy: LoopPolicy) -> Self {
        self.loop_policy = policy;
        self
    }

    pub fn with_failure_policy(mut self, policy: InvocationFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_max_invocations(mut self, max: u32) -> Self {
        self.max_invocations = max;
        self
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    pub fn with_timeouts(mut self, model: Duration, tool: Duration) -> Self {
        self.model_timeout = model;
        self.tool_timeout = tool;
        self
    }
}

/// What happens after a capability result has been integrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPolicy {
    /// One tool round-trip, then a tool-less answer call ends the turn (default)
    #[default]
    SinglePass,
    /// Return to the decision step, allowing chained tool use
    KeepDeciding,
}

/// What happens when a capability call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationFailurePolicy {
    /// Record the failure as evidence and carry on (default)
    #[default]
    Report,
    /// Retry once, then behave like `Report`
    RetryOnce,
    /// Record the failure as evidence and end the turn with an apology
    Halt,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_have_documented_defaults() {
        assert_eq!(LoopPolicy::default(), LoopPolicy::SinglePass);
        assert_eq!(
            InvocationFailurePolicy::default(),
            InvocationFailurePolicy::Report
        );
    }

    #[test]
    fn new_settings_bound_invocations_at_three() {
        let settings = AgentSettings::new("llama-3.1-8b-instant");
        assert_eq!(settings.max_invocations, 3);
        assert_eq!(settings.tool_timeout, Duration::from_secs(30));
        assert!(settings.system_instruction.is_some());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let json = r#"{"model":"m","loop_policy":"keep_deciding","model_timeout":5}"#;
        let settings: AgentSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.loop_policy, LoopPolicy::KeepDeciding);
        assert_eq!(settings.model_timeout, Duration::from_secs(5));
        assert_eq!(settings.tool_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_invocations, 3);
    }
}
