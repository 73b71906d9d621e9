//! Lead conversation — guided questionnaire that qualifies a lead.
//!
//! The assistant walks the user through a fixed catalog of questions,
//! validating each answer and keeping the exchange on energy-audit topics.
//! Once enough fields are collected and the catalog is exhausted (or the
//! user runs out of turns), the record is handed off to the CRM.

pub mod catalog;
pub mod engine;
pub mod handoff;
pub mod manager;
pub mod policy;
pub mod prompts;
pub mod record;
pub mod routes;
pub mod state;
pub mod topic;

pub use catalog::{StepCatalog, StepCursor, StepDefinition, Validator};
pub use engine::{
    ConversationEngine, HandoffReason, HandoffRequest, OutboundMessage, Role, Turn, TurnOutcome,
};
pub use handoff::{HandoffOutcome, HandoffTrigger};
pub use manager::{HandoffStatus, Reply, SessionId, SessionManager, SessionSnapshot};
pub use policy::QualificationPolicy;
pub use record::{LeadField, LeadRecord};
pub use routes::{ChatRouteState, chat_routes};
pub use state::ConversationState;
pub use topic::TopicFilter;
