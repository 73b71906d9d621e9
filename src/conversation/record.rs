//! Lead record — the field values collected from the user so far.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The closed set of fields a lead record may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    Email,
    Lastname,
    Firstname,
    Company,
    Phone,
    Region,
    Address,
    BuildingType,
    BuildingSize,
    EnergyBill,
    CurrentHeatingSystem,
    ProjectTimeline,
    RenovationType,
}

impl LeadField {
    /// Every known field, in declaration order.
    pub const ALL: [LeadField; 13] = [
        Self::Email,
        Self::Lastname,
        Self::Firstname,
        Self::Company,
        Self::Phone,
        Self::Region,
        Self::Address,
        Self::BuildingType,
        Self::BuildingSize,
        Self::EnergyBill,
        Self::CurrentHeatingSystem,
        Self::ProjectTimeline,
        Self::RenovationType,
    ];

    /// Wire name of the field (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Lastname => "lastname",
            Self::Firstname => "firstname",
            Self::Company => "company",
            Self::Phone => "phone",
            Self::Region => "region",
            Self::Address => "address",
            Self::BuildingType => "building_type",
            Self::BuildingSize => "building_size",
            Self::EnergyBill => "energy_bill",
            Self::CurrentHeatingSystem => "current_heating_system",
            Self::ProjectTimeline => "project_timeline",
            Self::RenovationType => "renovation_type",
        }
    }
}

impl std::fmt::Display for LeadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == name)
            .ok_or_else(|| ConfigError::UnknownField(name.to_string()))
    }
}

/// Accumulated answers, keyed by field.
///
/// There is no removal operation: a record only grows until the whole
/// conversation state is replaced by a reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadRecord {
    fields: BTreeMap<LeadField, String>,
}

impl LeadRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or overwrite) the value for a field.
    pub fn insert(&mut self, field: LeadField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    /// Builder-style insert, handy for assembling records in one expression.
    pub fn with(mut self, field: LeadField, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: LeadField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Whether the field holds a value that is not blank.
    pub fn has_value(&self, field: LeadField) -> bool {
        self.get(field).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LeadField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_match_serde() {
        for field in LeadField::ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(json, format!("\"{}\"", field.as_str()));
            assert_eq!(field.as_str().parse::<LeadField>().unwrap(), field);
        }
    }

    #[test]
    fn unknown_field_name_is_rejected() {
        let err = "favourite_colour".parse::<LeadField>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField(name) if name == "favourite_colour"));
    }

    #[test]
    fn has_value_ignores_blank_entries() {
        let record = LeadRecord::new()
            .with(LeadField::Email, "jane@firm.com")
            .with(LeadField::Address, "   ");
        assert!(record.has_value(LeadField::Email));
        assert!(!record.has_value(LeadField::Address));
        assert!(!record.has_value(LeadField::Phone));
    }

    #[test]
    fn record_serializes_as_flat_object() {
        let record = LeadRecord::new()
            .with(LeadField::BuildingType, "bureau")
            .with(LeadField::Email, "jane@firm.com");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"email": "jane@firm.com", "building_type": "bureau"})
        );

        let parsed: LeadRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn record_rejects_unknown_keys_on_load() {
        let result: Result<LeadRecord, _> =
            serde_json::from_value(serde_json::json!({"shoe_size": "42"}));
        assert!(result.is_err());
    }
}
