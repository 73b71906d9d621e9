//! Lead Intake — conversational lead qualification for energy audits.

pub mod channels;
pub mod config;
pub mod conversation;
pub mod crm;
pub mod error;
pub mod intake;
