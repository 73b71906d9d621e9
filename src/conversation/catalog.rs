//! Step catalog — the ordered questionnaire driving the conversation.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::record::LeadField;
use crate::error::ConfigError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

static FRENCH_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:\+|00)33|0)\s*[1-9](?:[\s.-]*\d{2}){4}$").expect("phone pattern compiles")
});

/// Answer check attached to a step.
#[derive(Debug, Clone, Copy)]
pub enum Validator {
    /// `local@domain.tld`, no whitespace.
    Email,
    /// French landline/mobile number, national or +33/0033 prefixed.
    FrenchPhone,
    Custom(fn(&str) -> bool),
}

impl Validator {
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            Self::Email => EMAIL_RE.is_match(text),
            Self::FrenchPhone => FRENCH_PHONE_RE.is_match(text),
            Self::Custom(check) => check(text),
        }
    }
}

/// One question/answer unit of the questionnaire.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub id: String,
    pub prompt: String,
    pub target_field: LeadField,
    pub required: bool,
    pub validator: Option<Validator>,
    pub follow_up: Option<String>,
    /// Reject invalid answers up front with `invalid_text`, before any
    /// other check runs.
    pub block_on_invalid: bool,
    pub invalid_text: Option<String>,
    /// The answer identifies the user (rate limiting keys off it) and is
    /// exempt from the topic check.
    pub identifies_user: bool,
}

impl StepDefinition {
    /// A required, unvalidated step.
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, target_field: LeadField) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            target_field,
            required: true,
            validator: None,
            follow_up: None,
            block_on_invalid: false,
            invalid_text: None,
            identifies_user: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn validated_by(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn follow_up(mut self, text: impl Into<String>) -> Self {
        self.follow_up = Some(text.into());
        self
    }

    pub fn blocking(mut self, invalid_text: impl Into<String>) -> Self {
        self.block_on_invalid = true;
        self.invalid_text = Some(invalid_text.into());
        self
    }

    pub fn identifies_user(mut self) -> Self {
        self.identifies_user = true;
        self
    }

    /// Run the validator, treating a missing validator as "accept".
    pub fn accepts(&self, text: &str) -> bool {
        self.validator.is_none_or(|v| v.accepts(text))
    }
}

/// Where a conversation currently stands in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCursor {
    At(String),
    Complete,
}

impl StepCursor {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::At(id) => Some(id),
            Self::Complete => None,
        }
    }
}

impl std::fmt::Display for StepCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::At(id) => write!(f, "{id}"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Immutable, validated sequence of steps.
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
    index: HashMap<String, usize>,
}

impl StepCatalog {
    /// Build a catalog, rejecting empty catalogs, duplicate ids and empty
    /// prompts.
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if step.prompt.trim().is_empty() {
                return Err(ConfigError::EmptyPrompt(step.id.clone()));
            }
            if index.insert(step.id.clone(), pos).is_some() {
                return Err(ConfigError::DuplicateStep(step.id.clone()));
            }
        }

        Ok(Self { steps, index })
    }

    pub fn first(&self) -> &StepDefinition {
        // `new` guarantees at least one step.
        &self.steps[0]
    }

    pub fn by_id(&self, id: &str) -> Option<&StepDefinition> {
        self.index.get(id).map(|&pos| &self.steps[pos])
    }

    /// Cursor following `id`. Past the last step this is `Complete`.
    pub fn next(&self, id: &str) -> Result<StepCursor, ConfigError> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| ConfigError::UnknownStep(id.to_string()))?;
        Ok(match self.steps.get(pos + 1) {
            Some(step) => StepCursor::At(step.id.clone()),
            None => StepCursor::Complete,
        })
    }

    /// Resolve a cursor to its step. `Ok(None)` for the terminal cursor.
    pub fn resolve(&self, cursor: &StepCursor) -> Result<Option<&StepDefinition>, ConfigError> {
        match cursor {
            StepCursor::Complete => Ok(None),
            StepCursor::At(id) => self
                .by_id(id)
                .map(Some)
                .ok_or_else(|| ConfigError::UnknownStep(id.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter()
    }

    /// The energy-audit questionnaire shipped with the widget.
    pub fn default_catalog() -> Self {
        let steps = vec![
            StepDefinition::new(
                "email",
                "Bonjour ! Pour commencer notre échange sur l'audit énergétique, pourriez-vous me communiquer votre adresse email ?",
                LeadField::Email,
            )
            .validated_by(Validator::Email)
            .blocking("L'adresse email semble invalide. Pourriez-vous vérifier et la saisir à nouveau ?")
            .identifies_user()
            .follow_up("Merci pour votre email. Quel est votre nom de famille ?"),
            StepDefinition::new("lastname", "Quel est votre nom de famille ?", LeadField::Lastname)
                .follow_up("Et votre prénom ?"),
            StepDefinition::new("firstname", "Quel est votre prénom ?", LeadField::Firstname)
                .follow_up("Dans quelle entreprise travaillez-vous ?"),
            StepDefinition::new("company", "Quelle est le nom de votre entreprise ?", LeadField::Company)
                .follow_up("Pour pouvoir vous recontacter, quel est votre numéro de téléphone ?"),
            StepDefinition::new("phone", "Quel est votre numéro de téléphone ?", LeadField::Phone)
                .validated_by(Validator::FrenchPhone)
                .follow_up("Pour mieux vous accompagner, dans quelle région êtes-vous situé ?"),
            StepDefinition::new("region", "Dans quelle région se trouve votre bâtiment ?", LeadField::Region)
                .follow_up("Merci. Et quelle est l'adresse du bâtiment à auditer ?"),
            StepDefinition::new("address", "Quelle est l'adresse complète du bâtiment ?", LeadField::Address)
                .follow_up("Merci. Pour mieux comprendre votre projet, quel type de bâtiment souhaitez-vous auditer ?"),
            StepDefinition::new(
                "building_type",
                "Quel est le type de bâtiment concerné ? (ex: bureau, commerce, industrie, etc.)",
                LeadField::BuildingType,
            )
            .follow_up("Quelle est la surface approximative du bâtiment ?"),
            StepDefinition::new(
                "building_size",
                "Quelle est la surface approximative en m² ?",
                LeadField::BuildingSize,
            )
            .follow_up("Quels types de rénovations énergétiques envisagez-vous ?"),
            StepDefinition::new(
                "renovation_type",
                "Quels types de rénovations énergétiques envisagez-vous ?",
                LeadField::RenovationType,
            )
            .optional()
            .follow_up("Pour évaluer le potentiel d'économies, quel est le montant approximatif de vos factures énergétiques annuelles ?"),
            StepDefinition::new(
                "energy_bill",
                "Quel est le montant approximatif de vos factures énergétiques annuelles ?",
                LeadField::EnergyBill,
            )
            .optional()
            .follow_up("Quel système de chauffage utilisez-vous actuellement ?"),
            StepDefinition::new(
                "current_heating_system",
                "Quel système de chauffage utilisez-vous actuellement ?",
                LeadField::CurrentHeatingSystem,
            )
            .optional()
            .follow_up("Dans quel délai souhaitez-vous réaliser cet audit énergétique ?"),
            StepDefinition::new(
                "project_timeline",
                "Dans quel délai envisagez-vous de réaliser cet audit ?",
                LeadField::ProjectTimeline,
            )
            .optional()
            .follow_up("Merci pour toutes ces informations ! Je vais les transmettre à notre équipe d'experts qui vous recontactera très prochainement pour approfondir votre projet."),
        ];

        match Self::new(steps) {
            Ok(catalog) => catalog,
            Err(e) => unreachable!("built-in catalog is valid: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validator() {
        assert!(Validator::Email.accepts("jane@firm.com"));
        assert!(Validator::Email.accepts("j.doe+audit@sub.firm.fr"));
        assert!(!Validator::Email.accepts("not-an-email"));
        assert!(!Validator::Email.accepts("jane@firm"));
        assert!(!Validator::Email.accepts("jane doe@firm.com"));
        assert!(!Validator::Email.accepts("@firm.com"));
    }

    #[test]
    fn french_phone_validator() {
        for ok in [
            "0612345678",
            "06 12 34 56 78",
            "06.12.34.56.78",
            "+33 6 12 34 56 78",
            "0033612345678",
            "01-23-45-67-89",
        ] {
            assert!(Validator::FrenchPhone.accepts(ok), "{ok} should be accepted");
        }
        for bad in ["12345", "0012345678", "06 12 34 56", "+44 20 7946 0958", "téléphone"] {
            assert!(!Validator::FrenchPhone.accepts(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn custom_validator_and_missing_validator() {
        let step = StepDefinition::new("size", "Surface ?", LeadField::BuildingSize)
            .validated_by(Validator::Custom(|s| s.chars().all(|c| c.is_ascii_digit())));
        assert!(step.accepts("250"));
        assert!(!step.accepts("grand"));

        let open = StepDefinition::new("region", "Région ?", LeadField::Region);
        assert!(open.accepts("anything at all"));
    }

    #[test]
    fn default_catalog_shape() {
        let catalog = StepCatalog::default_catalog();
        assert_eq!(catalog.len(), 13);
        assert_eq!(catalog.first().id, "email");
        assert!(catalog.first().block_on_invalid);
        assert!(catalog.first().identifies_user);

        let ids: Vec<&str> = catalog.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.last(), Some(&"project_timeline"));

        // Every step fills the field it is named after, and fields are unique.
        for step in catalog.iter() {
            assert_eq!(step.id, step.target_field.as_str());
        }

        let optional: Vec<&str> = catalog
            .iter()
            .filter(|s| !s.required)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(
            optional,
            ["renovation_type", "energy_bill", "current_heating_system", "project_timeline"]
        );
    }

    #[test]
    fn next_walks_catalog_then_completes() {
        let catalog = StepCatalog::default_catalog();
        let mut cursor = StepCursor::At(catalog.first().id.clone());
        let mut visited = 0;
        while let StepCursor::At(id) = &cursor {
            visited += 1;
            cursor = catalog.next(id).unwrap();
        }
        assert_eq!(visited, catalog.len());
        assert!(cursor.is_terminal());
    }

    #[test]
    fn next_on_unknown_step_is_config_error() {
        let catalog = StepCatalog::default_catalog();
        assert!(matches!(
            catalog.next("shoe_size"),
            Err(ConfigError::UnknownStep(id)) if id == "shoe_size"
        ));
        assert!(catalog.by_id("shoe_size").is_none());
        assert!(catalog.resolve(&StepCursor::At("shoe_size".into())).is_err());
        assert!(catalog.resolve(&StepCursor::Complete).unwrap().is_none());
    }

    #[test]
    fn rejects_invalid_catalogs() {
        assert!(matches!(StepCatalog::new(vec![]), Err(ConfigError::EmptyCatalog)));

        let dup = vec![
            StepDefinition::new("a", "A ?", LeadField::Email),
            StepDefinition::new("a", "B ?", LeadField::Phone),
        ];
        assert!(matches!(StepCatalog::new(dup), Err(ConfigError::DuplicateStep(id)) if id == "a"));

        let blank = vec![StepDefinition::new("a", "  ", LeadField::Email)];
        assert!(matches!(StepCatalog::new(blank), Err(ConfigError::EmptyPrompt(_))));
    }

    #[test]
    fn cursor_serde() {
        let at = serde_json::to_value(StepCursor::At("phone".into())).unwrap();
        assert_eq!(at, serde_json::json!({"at": "phone"}));
        let done = serde_json::to_value(StepCursor::Complete).unwrap();
        assert_eq!(done, serde_json::json!("complete"));
    }
}
