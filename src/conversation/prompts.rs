//! Scripted assistant messages and the per-step brief for phrasing layers.

use super::catalog::StepDefinition;
use super::record::LeadField;

pub const OFF_TOPIC: &str = "Je suis désolé, mais je suis spécialisé dans les audits énergétiques et les questions liées à la rénovation énergétique des bâtiments. Puis-je vous aider sur ces sujets spécifiques ?";

pub const RATE_LIMITED: &str = "Merci pour notre échange ! Pour continuer cette discussion, notre équipe va vous contacter directement.";

pub const HANDOFF_CONFIRMED: &str = "Merci pour ces informations ! Un expert va vous recontacter très prochainement pour approfondir votre projet d'audit énergétique.";

pub const HANDOFF_FAILED: &str = "Une erreur est survenue lors de l'enregistrement de vos informations. Vos réponses sont conservées, vous pouvez réessayer dans un instant.";

pub const ALREADY_COMPLETE: &str = "Notre questionnaire est terminé, merci ! Vous pouvez recommencer une nouvelle conversation à tout moment.";

/// Fallback for blocking steps that don't carry their own message.
pub const INVALID_BLOCKED: &str = "Cette entrée n'est pas valide. Veuillez réessayer.";

/// Name of a field as shown to the user.
pub fn friendly_field_name(field: LeadField) -> &'static str {
    match field {
        LeadField::Email => "adresse email",
        LeadField::Firstname => "prénom",
        LeadField::Lastname => "nom",
        LeadField::Phone => "numéro de téléphone",
        LeadField::Company => "entreprise",
        LeadField::Region => "région",
        LeadField::Address => "adresse",
        other => other.as_str(),
    }
}

/// Re-prompt after a validator rejected an answer.
pub fn verify_field(field: LeadField) -> String {
    format!(
        "La valeur fournie semble invalide. Pourriez-vous vérifier votre {} ?",
        friendly_field_name(field)
    )
}

/// System brief for a text-completion layer that rephrases the scripted
/// question for `step`.
pub fn step_brief(step: &StepDefinition) -> String {
    let mut expectations = vec![format!("- Type : {}", step.target_field)];
    if step.validator.is_some() {
        expectations.push("- Doit respecter le format spécifié".to_string());
    }
    expectations.push(if step.required {
        "- Réponse obligatoire".to_string()
    } else {
        "- Réponse optionnelle".to_string()
    });

    format!(
        "\
Vous êtes un assistant spécialisé en audit énergétique qui collecte des informations importantes.
Étape actuelle : {id}
Question à poser : {question}

Directives :
1. Validez la réponse de l'utilisateur selon les critères de l'étape
2. Si la réponse est valide, passez à la question suivante
3. Si la réponse n'est pas valide, demandez poliment de reformuler
4. Gardez un ton professionnel et courtois

Réponse attendue pour l'étape {id} :
{expectations}",
        id = step.id,
        question = step.prompt,
        expectations = expectations.join("\n"),
    )
}
