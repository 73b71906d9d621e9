//! Topic filter — keeps the conversation on energy-audit subjects.
//!
//! A guardrail, not a classifier: anything short is assumed to be a direct
//! answer, anything longer needs to mention one of the topic keywords.

use crate::config::IntakeConfig;

#[derive(Debug, Clone)]
pub struct TopicFilter {
    /// Lower-cased keywords.
    keywords: Vec<String>,
    short_message_chars: usize,
}

impl TopicFilter {
    pub fn new<I, S>(keywords: I, short_message_chars: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
            short_message_chars,
        }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(&config.topic_keywords, config.short_message_chars)
    }

    pub fn is_on_topic(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
            || lower.chars().count() < self.short_message_chars
    }
}

impl Default for TopicFilter {
    fn default() -> Self {
        Self::from_config(&IntakeConfig::default())
    }
}
