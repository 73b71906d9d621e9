//! Conversation state — everything one session knows about its lead.

use serde::{Deserialize, Serialize};

use super::catalog::{StepCatalog, StepCursor};
use super::record::LeadRecord;

/// Per-session conversation state.
///
/// Passed into the engine by value and handed back updated; the engine keeps
/// nothing between turns. Serialises to plain JSON so a session can be
/// resumed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Current step, or the terminal sentinel.
    pub cursor: StepCursor,
    pub record: LeadRecord,
    /// Committed turns, counting the opening prompt.
    pub message_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identified_email: Option<String>,
    /// Qualification as of the last commit.
    pub qualified: bool,
    /// Set once the record has been accepted by the CRM.
    #[serde(default)]
    pub handed_off: bool,
}

impl ConversationState {
    /// Fresh state positioned on the first step.
    pub fn initial(catalog: &StepCatalog) -> Self {
        Self {
            cursor: StepCursor::At(catalog.first().id.clone()),
            record: LeadRecord::new(),
            message_count: 1,
            identified_email: None,
            qualified: false,
            handed_off: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_terminal()
    }

    pub fn current_step_id(&self) -> Option<&str> {
        self.cursor.step_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::record::LeadField;

    #[test]
    fn initial_state() {
        let catalog = StepCatalog::default_catalog();
        let state = ConversationState::initial(&catalog);
        assert_eq!(state.current_step_id(), Some("email"));
        assert!(state.record.is_empty());
        assert_eq!(state.message_count, 1);
        assert!(state.identified_email.is_none());
        assert!(!state.qualified);
        assert!(!state.handed_off);
        assert!(!state.is_complete());
    }

    #[test]
    fn state_serde_roundtrip() {
        let mut record = LeadRecord::new();
        record.insert(LeadField::Email, "jane@firm.com");
        let state = ConversationState {
            cursor: StepCursor::At("lastname".into()),
            record,
            message_count: 2,
            identified_email: Some("jane@firm.com".into()),
            qualified: false,
            handed_off: false,
        };

        let json = serde_json::to_string(&state).unwrap();
        let parsed: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn older_snapshots_without_handoff_flag_load() {
        let parsed: ConversationState = serde_json::from_value(serde_json::json!({
            "cursor": "complete",
            "record": {"email": "jane@firm.com", "address": "1 rue de Paris"},
            "message_count": 3,
            "qualified": true
        }))
        .unwrap();
        assert!(parsed.is_complete());
        assert!(!parsed.handed_off);
        assert!(parsed.identified_email.is_none());
    }
}
