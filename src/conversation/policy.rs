//! Qualification and rate-limit policy.

use super::record::{LeadField, LeadRecord};
use super::state::ConversationState;
use crate::config::IntakeConfig;

/// Pure predicates deciding when a lead is qualified and when a conversation
/// has run out of turns.
#[derive(Debug, Clone)]
pub struct QualificationPolicy {
    min_criteria: Vec<LeadField>,
    max_messages_per_email: u32,
}

impl QualificationPolicy {
    pub fn new(min_criteria: Vec<LeadField>, max_messages_per_email: u32) -> Self {
        Self {
            min_criteria,
            max_messages_per_email,
        }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(
            config.min_qualification_criteria.clone(),
            config.max_messages_per_email,
        )
    }

    /// Every minimum-criteria field holds a non-empty value.
    pub fn is_qualified(&self, record: &LeadRecord) -> bool {
        self.min_criteria.iter().all(|&field| record.has_value(field))
    }

    /// The user is identified and has used up their turns.
    pub fn is_rate_limited(&self, state: &ConversationState) -> bool {
        state.identified_email.is_some() && state.message_count >= self.max_messages_per_email
    }

    pub fn min_criteria(&self) -> &[LeadField] {
        &self.min_criteria
    }
}

impl Default for QualificationPolicy {
    fn default() -> Self {
        Self::from_config(&IntakeConfig::default())
    }
}
