//! Conversation engine — advances a conversation by one user utterance.
//!
//! Each turn runs a fixed sequence of guards; the first guard that rejects
//! the input ends the turn with its message and leaves the step pointer
//! where it was:
//!
//! 1. rate limit (identified user out of turns)
//! 2. blocking validation (steps flagged `block_on_invalid`)
//! 3. topic check (skipped for the step identifying the user)
//! 4. field validation
//!
//! Input that clears every guard is committed to the record, the cursor moves
//! to the next step, and the step's follow-up question is emitted. The engine
//! performs no I/O: when the CRM should receive the record it says so through
//! [`Turn::handoff`] and leaves the call to the session layer.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::catalog::{StepCatalog, StepDefinition};
use super::policy::QualificationPolicy;
use super::prompts;
use super::record::LeadRecord;
use super::state::ConversationState;
use super::topic::TopicFilter;
use crate::config::IntakeConfig;
use crate::error::ConfigError;

/// Author of an outbound message. The engine only ever speaks as the
/// assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
}

/// A message for the transport to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub role: Role,
    pub text: String,
}

impl OutboundMessage {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TurnOutcome {
    /// The answer was stored for `step`.
    Committed { step: String },
    /// A blocking step rejected the answer.
    InvalidBlocked,
    OffTopic,
    /// The step's validator rejected the answer.
    ValidationFailed,
    RateLimited,
    /// Input arrived after the last step.
    AlreadyComplete,
}

impl TurnOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Why the record should go to the CRM now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffReason {
    /// Catalog exhausted with a qualified record.
    Completed,
    /// Turn cap reached with a qualified record.
    RateLimited,
}

/// Request to push `record` to the CRM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRequest {
    pub record: LeadRecord,
    pub reason: HandoffReason,
}

/// Result of one `advance` call.
#[derive(Debug, Clone)]
pub struct Turn {
    pub state: ConversationState,
    pub messages: Vec<OutboundMessage>,
    pub outcome: TurnOutcome,
    pub handoff: Option<HandoffRequest>,
}

/// A guard's verdict when it stops the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rejection {
    outcome: TurnOutcome,
    text: String,
}

impl Rejection {
    fn new(outcome: TurnOutcome, text: impl Into<String>) -> Self {
        Self {
            outcome,
            text: text.into(),
        }
    }

    fn into_turn(self, state: ConversationState) -> Turn {
        Turn {
            state,
            messages: vec![OutboundMessage::assistant(self.text)],
            outcome: self.outcome,
            handoff: None,
        }
    }
}

/// The conversation state machine over a step catalog.
#[derive(Debug, Clone)]
pub struct ConversationEngine {
    catalog: StepCatalog,
    policy: QualificationPolicy,
    topics: TopicFilter,
}

impl ConversationEngine {
    pub fn new(catalog: StepCatalog, policy: QualificationPolicy, topics: TopicFilter) -> Self {
        Self {
            catalog,
            policy,
            topics,
        }
    }

    /// Engine over the shipped questionnaire with the given policy config.
    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(
            StepCatalog::default_catalog(),
            QualificationPolicy::from_config(config),
            TopicFilter::from_config(config),
        )
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &QualificationPolicy {
        &self.policy
    }

    /// Open a conversation: initial state plus the first question.
    pub fn start(&self) -> (ConversationState, Vec<OutboundMessage>) {
        let state = ConversationState::initial(&self.catalog);
        let opening = OutboundMessage::assistant(self.catalog.first().prompt.clone());
        (state, vec![opening])
    }

    /// Discard everything and start over. There is no partial reset.
    pub fn reset(&self) -> (ConversationState, Vec<OutboundMessage>) {
        self.start()
    }

    /// Process one non-empty user utterance.
    ///
    /// Fails only when `state` points at a step the catalog doesn't know,
    /// which means the state was built against a different catalog.
    pub fn advance(&self, mut state: ConversationState, text: &str) -> Result<Turn, ConfigError> {
        let step = self.catalog.resolve(&state.cursor)?;

        if self.policy.is_rate_limited(&state) {
            warn!(
                message_count = state.message_count,
                cursor = %state.cursor,
                "Conversation rate limited"
            );
            // A finished conversation only hands off through a retry.
            let handoff = if state.is_complete() {
                None
            } else {
                self.pending_handoff(&state, HandoffReason::RateLimited)
            };
            let mut turn =
                Rejection::new(TurnOutcome::RateLimited, prompts::RATE_LIMITED).into_turn(state);
            turn.handoff = handoff;
            return Ok(turn);
        }

        let Some(step) = step else {
            return Ok(Rejection::new(TurnOutcome::AlreadyComplete, prompts::ALREADY_COMPLETE)
                .into_turn(state));
        };

        if let Some(rejection) = check_blocking(step, text) {
            debug!(step = %step.id, "Blocking step rejected answer");
            return Ok(rejection.into_turn(state));
        }

        if step.identifies_user {
            state.identified_email = step.accepts(text).then(|| text.to_string());
        }

        if let Some(rejection) = self.check_topic(step, text) {
            debug!(step = %step.id, "Off-topic answer");
            return Ok(rejection.into_turn(state));
        }

        if let Some(rejection) = check_field(step, text) {
            debug!(step = %step.id, "Answer failed validation");
            return Ok(rejection.into_turn(state));
        }

        self.commit(state, step, text)
    }

    /// Hand-off that is due but hasn't succeeded yet, if any. Used to retry
    /// after a CRM failure.
    pub fn handoff_due(&self, state: &ConversationState) -> Option<HandoffRequest> {
        if state.is_complete() {
            self.pending_handoff(state, HandoffReason::Completed)
        } else if self.policy.is_rate_limited(state) {
            self.pending_handoff(state, HandoffReason::RateLimited)
        } else {
            None
        }
    }

    fn check_topic(&self, step: &StepDefinition, text: &str) -> Option<Rejection> {
        if step.identifies_user || self.topics.is_on_topic(text) {
            return None;
        }
        Some(Rejection::new(TurnOutcome::OffTopic, prompts::OFF_TOPIC))
    }

    fn commit(
        &self,
        mut state: ConversationState,
        step: &StepDefinition,
        text: &str,
    ) -> Result<Turn, ConfigError> {
        state.record.insert(step.target_field, text);
        state.cursor = self.catalog.next(&step.id)?;
        state.qualified = self.policy.is_qualified(&state.record);
        state.message_count = state.message_count.saturating_add(1);

        info!(
            step = %step.id,
            next = %state.cursor,
            qualified = state.qualified,
            "Answer committed"
        );

        let messages = step
            .follow_up
            .iter()
            .map(OutboundMessage::assistant)
            .collect();

        let handoff = if state.is_complete() {
            self.pending_handoff(&state, HandoffReason::Completed)
        } else {
            None
        };

        Ok(Turn {
            state,
            messages,
            outcome: TurnOutcome::Committed {
                step: step.id.clone(),
            },
            handoff,
        })
    }

    fn pending_handoff(
        &self,
        state: &ConversationState,
        reason: HandoffReason,
    ) -> Option<HandoffRequest> {
        let qualified = self.policy.is_qualified(&state.record);
        (qualified && !state.handed_off).then(|| HandoffRequest {
            record: state.record.clone(),
            reason,
        })
    }
}

impl Default for ConversationEngine {
    fn default() -> Self {
        Self::from_config(&IntakeConfig::default())
    }
}

fn check_blocking(step: &StepDefinition, text: &str) -> Option<Rejection> {
    if !step.block_on_invalid || step.accepts(text) {
        return None;
    }
    let message = step
        .invalid_text
        .as_deref()
        .unwrap_or(prompts::INVALID_BLOCKED);
    Some(Rejection::new(TurnOutcome::InvalidBlocked, message))
}

fn check_field(step: &StepDefinition, text: &str) -> Option<Rejection> {
    if step.accepts(text) {
        return None;
    }
    Some(Rejection::new(
        TurnOutcome::ValidationFailed,
        prompts::verify_field(step.target_field),
    ))
}
