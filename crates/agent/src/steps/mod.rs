//! The three steps the control loop alternates between.
//!
//! Each step takes the conversation snapshot by reference and hands back an
//! extended copy inside its outcome. Failures never escape a step: they come
//! back as a [`LoopFailure`] and the loop turns them into a fallback turn.

pub mod decision;
pub mod integration;
pub mod invocation;

use chrono::Utc;
use toolchat_core::agent::AgentSettings;
use toolchat_core::error::LoopFailure;
use toolchat_core::event::{DomainEvent, EventBus};
use toolchat_core::message::{Conversation, Turn};
use toolchat_core::provider::{CompletionRequest, DecisionOutcome, Provider};
use toolchat_core::tool::CapabilityRegistry;
use tracing::debug;

/// Shared read-only context for one run of the loop.
pub struct StepContext<'a> {
    pub provider: &'a dyn Provider,
    pub registry: &'a CapabilityRegistry,
    pub settings: &'a AgentSettings,
    pub events: Option<&'a EventBus>,
    pub conversation_id: String,
}

impl StepContext<'_> {
    pub(crate) fn publish(&self, event: DomainEvent) {
        if let Some(bus) = self.events {
            bus.publish(event);
        }
    }

    /// Call the model over the rendered conversation.
    ///
    /// With `offer_capabilities` unset the model gets no menu, so anything
    /// other than an answer is treated as a malformed response.
    pub(crate) async fn call_model(
        &self,
        conversation: &Conversation,
        offer_capabilities: bool,
    ) -> Result<DecisionOutcome, LoopFailure> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            turns: conversation.render(self.settings.system_instruction.as_deref()),
            capabilities: if offer_capabilities {
                self.registry.describe_all()
            } else {
                Vec::new()
            },
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        debug!(
            conversation_id = %self.conversation_id,
            turns = request.turns.len(),
            capabilities = request.capabilities.len(),
            "Calling model"
        );

        let response = tokio::time::timeout(
            self.settings.model_timeout,
            self.provider.complete(request),
        )
        .await
        .map_err(|_| {
            LoopFailure::TransportFailure(format!(
                "model call timed out after {}s",
                self.settings.model_timeout.as_secs()
            ))
        })??;

        if let Some(usage) = &response.usage {
            self.publish(DomainEvent::ResponseGenerated {
                conversation_id: self.conversation_id.clone(),
                model: response.model.clone(),
                tokens_used: usage.total_tokens,
                timestamp: Utc::now(),
            });
        }

        match response.outcome {
            DecisionOutcome::UseCapability(id) if !offer_capabilities => Err(
                LoopFailure::MalformedModelResponse(format!(
                    "asked for capability '{id}' when none were offered"
                )),
            ),
            outcome => Ok(outcome),
        }
    }
}

pub(crate) const TRANSPORT_APOLOGY: &str = "I'm sorry, I ran into an error while working on that. \
Please try again in a moment.";

pub(crate) const MALFORMED_APOLOGY: &str = "I'm sorry, I hit an error making sense of the model's reply. \
Please try again.";

pub(crate) const REPHRASE_REQUEST: &str = "I looked this up several times without reaching an answer. \
Could you please rephrase your question?";

/// The assistant turn a failure is replaced with. Carries no error detail.
pub(crate) fn fallback_turn(failure: &LoopFailure) -> Turn {
    let text = match failure {
        LoopFailure::TransportFailure(_) => TRANSPORT_APOLOGY,
        LoopFailure::MalformedModelResponse(_) | LoopFailure::UnknownCapability(_) => {
            MALFORMED_APOLOGY
        }
        LoopFailure::InvocationLimitExceeded { .. } => REPHRASE_REQUEST,
    };
    Turn::assistant(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_turns_hide_error_detail() {
        let turn = fallback_turn(&LoopFailure::TransportFailure(
            "connection refused (os error 111)".into(),
        ));
        assert!(!turn.content.contains("os error"));
        assert!(turn.content.contains("error"));
        assert!(turn.content.contains("try again"));
    }

    #[test]
    fn limit_fallback_asks_to_rephrase() {
        let turn = fallback_turn(&LoopFailure::InvocationLimitExceeded { limit: 3 });
        assert!(turn.content.contains("please rephrase"));
    }
}
