//! Hand-off trigger — pushes a qualified record to the CRM.

use std::sync::Arc;

use super::engine::{HandoffRequest, OutboundMessage};
use super::prompts;
use super::state::ConversationState;
use crate::crm::{CrmClient, CrmReceipt};

/// What happened when the record was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    Submitted(CrmReceipt),
    /// The CRM call failed; the record is kept for a later retry.
    Failed { reason: String },
}

impl HandoffOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }

    /// Record the outcome on `state` and produce the message for the user.
    ///
    /// Only success changes the state; a failure leaves it untouched so the
    /// same record can be submitted again.
    pub fn settle(&self, state: &mut ConversationState) -> OutboundMessage {
        match self {
            Self::Submitted(_) => {
                state.handed_off = true;
                OutboundMessage::assistant(prompts::HANDOFF_CONFIRMED)
            }
            Self::Failed { .. } => OutboundMessage::assistant(prompts::HANDOFF_FAILED),
        }
    }
}

/// Calls the CRM once per request.
#[derive(Clone)]
pub struct HandoffTrigger {
    crm: Arc<dyn CrmClient>,
}

impl HandoffTrigger {
    pub fn new(crm: Arc<dyn CrmClient>) -> Self {
        Self { crm }
    }

    pub async fn submit(&self, request: &HandoffRequest) -> HandoffOutcome {
        match self.crm.submit_lead(&request.record).await {
            Ok(receipt) => {
                tracing::info!(
                    crm = self.crm.name(),
                    contact_id = %receipt.contact_id,
                    reason = ?request.reason,
                    "Lead handed off"
                );
                HandoffOutcome::Submitted(receipt)
            }
            Err(e) => {
                tracing::warn!(crm = self.crm.name(), reason = ?request.reason, "Lead hand-off failed: {}", e);
                HandoffOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
