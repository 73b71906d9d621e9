//! CRM integration — where qualified leads end up.
//!
//! Supports:
//! - **HubSpot**: contact creation over the CRM v3 REST API
//! - **Dry run**: logs the lead instead of sending it (no API key configured)

pub mod hubspot;

pub use hubspot::{HubSpotClient, HubSpotConfig};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::record::LeadRecord;
use crate::error::{CrmError, Error};

/// Acknowledgement from the CRM for a created lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmReceipt {
    pub contact_id: String,
}

/// A CRM that accepts lead records. Retries and backoff, if any, are the
/// implementation's business; callers see a single pass/fail.
#[async_trait]
pub trait CrmClient: Send + Sync {
    fn name(&self) -> &str;

    async fn submit_lead(&self, record: &LeadRecord) -> Result<CrmReceipt, CrmError>;
}

/// CRM stand-in that only logs.
pub struct DryRunCrm;

#[async_trait]
impl CrmClient for DryRunCrm {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn submit_lead(&self, record: &LeadRecord) -> Result<CrmReceipt, CrmError> {
        let contact_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            contact_id = %contact_id,
            email = record.get(crate::conversation::record::LeadField::Email).unwrap_or(""),
            fields = record.len(),
            "Dry-run CRM accepted lead"
        );
        Ok(CrmReceipt { contact_id })
    }
}

/// Pick the CRM client from the environment: HubSpot when an API key is
/// configured, the dry-run logger otherwise.
pub fn create_client_from_env() -> Result<Arc<dyn CrmClient>, Error> {
    match HubSpotConfig::from_env()? {
        Some(config) => {
            tracing::info!("Using HubSpot CRM ({})", config.base_url);
            Ok(Arc::new(HubSpotClient::new(config)?))
        }
        None => {
            tracing::info!("HUBSPOT_API_KEY not set; leads will only be logged");
            Ok(Arc::new(DryRunCrm))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::record::LeadField;

    #[tokio::test]
    async fn dry_run_accepts_any_record() {
        let crm = DryRunCrm;
        let record = LeadRecord::new().with(LeadField::Email, "jane@firm.com");
        let receipt = crm.submit_lead(&record).await.unwrap();
        assert!(!receipt.contact_id.is_empty());
        assert_eq!(crm.name(), "dry-run");
    }
}
