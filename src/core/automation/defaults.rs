use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::info;

use super::trigger::{CallOutcome, Trigger};
use crate::core::store::CrmStore;

pub const TEMPLATE_NO_ANSWER: &str = "sms_no_answer";
pub const TEMPLATE_VOICEMAIL: &str = "sms_voicemail";
pub const TEMPLATE_BOOKING_CONFIRMATION: &str = "sms_booking_confirmation";

pub fn default_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            TEMPLATE_NO_ANSWER,
            "Bonjour {{name}}, nous avons essayé de vous joindre au sujet de votre projet immobilier. \
             Vous pouvez nous rappeler à votre convenance. {{sender}}",
        ),
        (
            TEMPLATE_VOICEMAIL,
            "Bonjour {{name}}, nous vous avons laissé un message vocal. \
             N'hésitez pas à nous rappeler. {{sender}}",
        ),
        (
            TEMPLATE_BOOKING_CONFIRMATION,
            "Bonjour {{name}}, votre rendez-vous \"{{appointment_title}}\" est confirmé \
             le {{appointment_time}}. À bientôt, {{sender}}",
        ),
    ]
}

/// `(name, trigger, action)` for the rules installed on a fresh database.
pub fn default_rules() -> Vec<(&'static str, Trigger, Value)> {
    vec![
        (
            "Relance après appel sans réponse",
            Trigger::Call(CallOutcome::NoAnswer),
            json!([
                { "type": "send_sms", "template": TEMPLATE_NO_ANSWER },
                { "type": "schedule_follow_up", "days": 2 }
            ]),
        ),
        (
            "Relance après messagerie",
            Trigger::Call(CallOutcome::Voicemail),
            json!([
                { "type": "send_sms", "template": TEMPLATE_VOICEMAIL },
                { "type": "schedule_follow_up", "days": 1 }
            ]),
        ),
        (
            "Confirmation de rendez-vous",
            Trigger::Booked,
            json!([
                { "type": "send_sms", "template": TEMPLATE_BOOKING_CONFIRMATION },
                { "type": "schedule_reminders", "hoursBefore": [24, 2] }
            ]),
        ),
        (
            "Livraison sans contact",
            Trigger::DeliveryUncontacted,
            json!([
                {
                    "type": "notify_operator",
                    "message": "{{name}} a été livré à {{recipient}} le {{delivery_date}} et n'a pas été contacté depuis 24 h."
                }
            ]),
        ),
        (
            "Lead inactif",
            Trigger::LeadIdle,
            json!([
                {
                    "type": "notify_operator",
                    "message": "{{name}} est en statut New depuis plus de 7 jours."
                }
            ]),
        ),
    ]
}

/// Install missing templates, and the default rules when no rule exists yet.
/// Returns `(rules_added, templates_added)`.
pub async fn seed_defaults(store: &CrmStore, now: DateTime<Utc>) -> Result<(usize, usize)> {
    let mut templates_added = 0;
    for (name, body) in default_templates() {
        if store.insert_template_if_missing(name, body).await? {
            templates_added += 1;
        }
    }

    let mut rules_added = 0;
    if store.count_rules().await? == 0 {
        for (name, trigger, action) in default_rules() {
            store
                .create_rule(name, trigger.as_str(), &action, true, now)
                .await?;
            rules_added += 1;
        }
    }

    if rules_added + templates_added > 0 {
        info!(
            "Seeded {} default rules and {} templates",
            rules_added, templates_added
        );
    }
    Ok((rules_added, templates_added))
}
