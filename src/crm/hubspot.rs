//! HubSpot CRM client — creates a contact per qualified lead.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};

use super::{CrmClient, CrmReceipt};
use crate::config::{env_var, parse_secs};
use crate::conversation::record::{LeadField, LeadRecord};
use crate::error::{ConfigError, CrmError};

const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";
const CONTACTS_PATH: &str = "/crm/v3/objects/contacts";

/// Fixed attribution properties stamped on every contact.
const SOURCE: &str = "MVP Bot";
const LEAD_SOURCE: &str = "Chat Bot";
const LIFECYCLE_STAGE: &str = "lead";

/// Contact properties HubSpot needs before a contact is worth creating.
const DEFAULT_REQUIRED: [LeadField; 5] = [
    LeadField::Email,
    LeadField::Firstname,
    LeadField::Lastname,
    LeadField::Phone,
    LeadField::Company,
];

/// HubSpot client configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct HubSpotConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout: Duration,
    /// Fields that must be present before a submission is attempted.
    pub required_fields: Vec<LeadField>,
}

impl HubSpotConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            required_fields: DEFAULT_REQUIRED.to_vec(),
        }
    }

    /// Returns `Ok(None)` if `HUBSPOT_API_KEY` is not set (CRM disabled).
    /// Set-but-invalid values are an error.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(env_var)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = lookup("HUBSPOT_API_KEY") else {
            return Ok(None);
        };

        let mut config = Self::new(api_key.trim());

        if let Some(base_url) = lookup("HUBSPOT_BASE_URL") {
            let base_url = base_url.trim().trim_end_matches('/');
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    key: "HUBSPOT_BASE_URL".into(),
                    message: format!("{base_url:?} is not an http(s) URL"),
                });
            }
            config.base_url = base_url.to_string();
        }

        if let Some(raw) = lookup("HUBSPOT_TIMEOUT_SECS") {
            config.timeout = parse_secs("HUBSPOT_TIMEOUT_SECS", &raw)?;
        }

        Ok(Some(config))
    }
}

/// HubSpot contacts API client.
pub struct HubSpotClient {
    config: HubSpotConfig,
    client: reqwest::Client,
}

impl HubSpotClient {
    pub fn new(config: HubSpotConfig) -> Result<Self, CrmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CrmError::RequestFailed {
                crm: "hubspot".into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn contacts_url(&self) -> String {
        format!("{}{CONTACTS_PATH}", self.config.base_url)
    }

    fn missing_fields(&self, record: &LeadRecord) -> Vec<String> {
        self.config
            .required_fields
            .iter()
            .filter(|&&field| !record.has_value(field))
            .map(|field| field.as_str().to_string())
            .collect()
    }
}

/// HubSpot property name for a lead field. Region is stored as the city.
fn property_name(field: LeadField) -> &'static str {
    match field {
        LeadField::Region => "city",
        other => other.as_str(),
    }
}

/// Build the contact creation body for `record`.
pub(crate) fn contact_payload(record: &LeadRecord, created_at: DateTime<Utc>) -> Value {
    let mut properties: Map<String, Value> = record
        .iter()
        .map(|(field, value)| (property_name(field).to_string(), Value::from(value)))
        .collect();

    properties.insert("source".into(), SOURCE.into());
    properties.insert("lifecyclestage".into(), LIFECYCLE_STAGE.into());
    properties.insert("lead_source".into(), LEAD_SOURCE.into());
    properties.insert("createdate".into(), created_at.to_rfc3339().into());

    json!({ "properties": properties })
}

#[async_trait]
impl CrmClient for HubSpotClient {
    fn name(&self) -> &str {
        "hubspot"
    }

    async fn submit_lead(&self, record: &LeadRecord) -> Result<CrmReceipt, CrmError> {
        let missing = self.missing_fields(record);
        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "Lead is missing required contact fields");
            return Err(CrmError::MissingFields { fields: missing });
        }

        let payload = contact_payload(record, Utc::now());
        tracing::debug!(fields = record.len(), "Creating HubSpot contact");

        let response = self
            .client
            .post(self.contacts_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CrmError::Timeout {
                        crm: "hubspot".into(),
                        timeout: self.config.timeout,
                    }
                } else {
                    CrmError::RequestFailed {
                        crm: "hubspot".into(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            tracing::error!(status = status.as_u16(), %message, "HubSpot rejected contact");
            return Err(CrmError::Rejected {
                crm: "hubspot".into(),
                status: status.as_u16(),
                message,
            });
        }

        let contact_id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CrmError::InvalidResponse {
                crm: "hubspot".into(),
                reason: "response has no contact id".into(),
            })?
            .to_string();

        tracing::info!(contact_id = %contact_id, "HubSpot contact created");
        Ok(CrmReceipt { contact_id })
    }
}
