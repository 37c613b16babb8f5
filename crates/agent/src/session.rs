//! The caller-facing agent: start a session, send messages, get answers.

use chrono::Utc;
use std::sync::Arc;
use toolchat_core::agent::AgentSettings;
use toolchat_core::event::{DomainEvent, EventBus};
use toolchat_core::message::{Conversation, Turn};
use toolchat_core::provider::Provider;
use toolchat_core::tool::CapabilityRegistry;
use tracing::info;

use crate::loop_runner;
use crate::steps::StepContext;

/// Owns the model client and the capability menu for any number of sessions.
///
/// Cheap to share: wrap it in an `Arc` and hand it to as many concurrent
/// sessions as needed. Each session has its own [`Conversation`].
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: Arc<CapabilityRegistry>,
    settings: AgentSettings,
    events: Option<Arc<EventBus>>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<CapabilityRegistry>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            registry,
            settings,
            events: None,
        }
    }

    /// Publish domain events to this bus while running.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// A fresh, empty conversation.
    pub fn start_session(&self) -> Conversation {
        Conversation::new()
    }

    /// Answer `user_text` in the context of `conversation`.
    ///
    /// Returns the conversation extended by the user turn, any tool
    /// evidence, and a final assistant turn. Never fails: every error along
    /// the way is turned into an assistant turn.
    pub async fn send_message(&self, conversation: &Conversation, user_text: &str) -> Conversation {
        let conversation_id = conversation.id.to_string();

        info!(
            conversation_id = %conversation_id,
            turns = conversation.len(),
            "Processing user turn"
        );

        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::TurnReceived {
                conversation_id: conversation_id.clone(),
                content_preview: user_text.chars().take(80).collect(),
                timestamp: Utc::now(),
            });
        }

        let ctx = StepContext {
            provider: self.provider.as_ref(),
            registry: &self.registry,
            settings: &self.settings,
            events: self.events.as_deref(),
            conversation_id,
        };

        loop_runner::run(&ctx, conversation.append(Turn::user(user_text)))
            .await
            .conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use toolchat_core::agent::LoopPolicy;
    use toolchat_core::error::ProviderError;
    use toolchat_core::message::Role;

    fn agent(provider: ScriptedProvider, settings: AgentSettings) -> (Agent, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let agent = Agent::new(
            Arc::clone(&provider) as Arc<dyn Provider>,
            Arc::new(stub_registry()),
            settings,
        );
        (agent, provider)
    }

    #[tokio::test]
    async fn scenario_greeting_is_answered_directly() {
        let (agent, _) = agent(ScriptedProvider::new(vec![answer("Hi there!")]), test_settings());
        let session = agent.start_session();
        assert!(session.is_empty());

        let next = agent.send_message(&session, "Hello").await;
        let turns = next.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!((turns[0].role, turns[0].content.as_str()), (Role::User, "Hello"));
        assert_eq!(
            (turns[1].role, turns[1].content.as_str()),
            (Role::Assistant, "Hi there!")
        );
        assert_eq!(next.id, session.id);
    }

    #[tokio::test]
    async fn scenario_lookup_is_grounded_in_evidence() {
        let (agent, provider) = agent(
            ScriptedProvider::new(vec![
                use_capability("wikipedia"),
                answer("Quantum computing uses qubits."),
            ]),
            test_settings(),
        );

        let next = agent
            .send_message(&agent.start_session(), "What is quantum computing?")
            .await;
        let turns = next.turns();
        assert_eq!(turns[1].role, Role::ToolEvidence);
        assert_eq!(
            turns[1].content,
            "Capability wikipedia returned: Quantum computing is..."
        );
        assert_eq!(turns[2].role, Role::Assistant);

        // The answer call saw the evidence, rendered after the system instruction
        let last_request = provider.requests().pop().unwrap();
        assert_eq!(last_request.turns[0].role, Role::System);
        assert!(last_request.turns.iter().any(|t| t.content == turns[1].content));
    }

    #[tokio::test]
    async fn scenario_transport_failure_never_reaches_caller() {
        let (agent, _) = agent(
            ScriptedProvider::new(vec![Err(ProviderError::Network("connection refused".into()))]),
            test_settings(),
        );

        let next = agent.send_message(&agent.start_session(), "Hello").await;
        let last = next.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.content.contains("error"));
        assert!(last.content.contains("try again"));
        assert!(!last.content.contains("connection refused"));
    }

    #[tokio::test]
    async fn scenario_unknown_capability_is_survivable() {
        let (agent, provider) = agent(
            ScriptedProvider::new(vec![use_capability("unknown_tool"), answer("Hello!")]),
            test_settings(),
        );

        let next = agent.send_message(&agent.start_session(), "Hi").await;
        assert!(next.turns()[1].content.contains("unknown_tool"));
        assert_eq!(next.last().unwrap().content, "Hello!");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn scenario_runaway_requests_are_bounded() {
        let (agent, provider) = agent(
            ScriptedProvider::new((0..5).map(|_| use_capability("wikipedia")).collect()),
            test_settings().with_loop_policy(LoopPolicy::KeepDeciding),
        );

        let next = agent.send_message(&agent.start_session(), "Tell me everything").await;
        assert!(next.last().unwrap().content.contains("please rephrase"));
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn prior_turns_are_preserved_as_prefix() {
        let (agent, _) = agent(
            ScriptedProvider::new(vec![answer("First."), answer("Second.")]),
            test_settings(),
        );

        let first = agent.send_message(&agent.start_session(), "one").await;
        let second = agent.send_message(&first, "two").await;

        assert!(second.len() >= first.len() + 2);
        assert_eq!(&second.turns()[..first.len()], first.turns());
        assert_eq!(second.turns()[first.len()].content, "two");
        // The input snapshot is untouched
        assert_eq!(first.len(), 2);
    }

    #[tokio::test]
    async fn events_trace_the_path_taken() {
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        let (agent, _) = agent(
            ScriptedProvider::new(vec![use_capability("arxiv"), answer("Done.")]),
            test_settings(),
        );
        let agent = agent.with_event_bus(Arc::clone(&bus));

        agent.send_message(&agent.start_session(), "Papers on attention?").await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(match event.as_ref() {
                DomainEvent::TurnReceived { .. } => "turn_received",
                DomainEvent::DecisionMade { .. } => "decision_made",
                DomainEvent::CapabilityInvoked { .. } => "capability_invoked",
                DomainEvent::ResponseGenerated { .. } => "response_generated",
                DomainEvent::FallbackIssued { .. } => "fallback_issued",
                DomainEvent::LoopFinished { .. } => "loop_finished",
            });
        }
        assert_eq!(
            seen,
            vec![
                "turn_received",
                "response_generated",
                "decision_made",
                "capability_invoked",
                "response_generated",
                "decision_made",
                "loop_finished",
            ]
        );
    }

    #[tokio::test]
    async fn sessions_run_concurrently() {
        let provider = Arc::new(ScriptedProvider::new(vec![answer("a"), answer("b")]));
        let agent = Arc::new(Agent::new(
            provider as Arc<dyn Provider>,
            Arc::new(stub_registry()),
            test_settings(),
        ));

        let (a, b) = (agent.start_session(), agent.start_session());
        let (one, two) = tokio::join!(
            agent.send_message(&a, "first"),
            agent.send_message(&b, "second"),
        );
        assert_ne!(one.id, two.id);
        assert_eq!(one.len(), 2);
        assert_eq!(two.len(), 2);
    }
}
