//! Configuration types.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::conversation::record::LeadField;
use crate::error::ConfigError;

/// Conversation policy configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Conversational turns allowed once the user's email is known.
    pub max_messages_per_email: u32,
    /// Fields that must be filled for a lead to count as qualified.
    pub min_qualification_criteria: Vec<LeadField>,
    /// Keywords that mark a message as on-domain (matched case-insensitively).
    pub topic_keywords: Vec<String>,
    /// Messages shorter than this many characters skip the keyword check.
    pub short_message_chars: usize,
    /// Sessions untouched for this long are discarded.
    pub session_idle_ttl: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_messages_per_email: 20,
            min_qualification_criteria: vec![LeadField::Email, LeadField::Address],
            topic_keywords: [
                "audit énergétique",
                "rénovation énergétique",
                "économies d'énergie",
                "chauffage",
                "isolation",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            short_message_chars: 20,
            session_idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

impl IntakeConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything unset. Set-but-invalid values are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = env_var("LEAD_INTAKE_MAX_MESSAGES") {
            config.max_messages_per_email = parse_number("LEAD_INTAKE_MAX_MESSAGES", &raw)?;
        }

        if let Some(raw) = env_var("LEAD_INTAKE_MIN_CRITERIA") {
            let fields = split_list(&raw)
                .map(|name| name.parse::<LeadField>())
                .collect::<Result<Vec<_>, _>>()?;
            if fields.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "LEAD_INTAKE_MIN_CRITERIA".into(),
                    message: "at least one field is required".into(),
                });
            }
            config.min_qualification_criteria = fields;
        }

        if let Some(raw) = env_var("LEAD_INTAKE_TOPICS") {
            config.topic_keywords = split_list(&raw).map(String::from).collect();
        }

        if let Some(raw) = env_var("LEAD_INTAKE_SHORT_MESSAGE_CHARS") {
            config.short_message_chars = parse_number("LEAD_INTAKE_SHORT_MESSAGE_CHARS", &raw)?;
        }

        if let Some(raw) = env_var("LEAD_INTAKE_SESSION_IDLE_SECS") {
            config.session_idle_ttl = parse_secs("LEAD_INTAKE_SESSION_IDLE_SECS", &raw)?;
        }

        Ok(config)
    }

    /// How often to look for idle sessions: at most once a minute, more
    /// often for short TTLs.
    pub fn idle_sweep_interval(&self) -> Duration {
        self.session_idle_ttl.min(Duration::from_secs(60))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env_var("LEAD_INTAKE_PORT") {
            Some(raw) => parse_number("LEAD_INTAKE_PORT", &raw)?,
            None => Self::default().port,
        };
        Ok(Self { port })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

pub(crate) fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

/// A positive whole number of seconds.
pub(crate) fn parse_secs(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    match parse_number::<u64>(key, raw)? {
        0 => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1 second".into(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}
