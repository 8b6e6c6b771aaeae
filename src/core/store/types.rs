use serde::{Deserialize, Serialize};

use crate::core::clock::{format_ts, normalize_ts, parse_ts};
use crate::core::pipeline::{
    Direction, InteractionKind, LeadStatus, ProspectKind, ProspectStatus, Timeline,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Operator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Operator => "operator",
        }
    }

    pub fn from_role(value: &str) -> Option<Self> {
        match value.trim() {
            "agent" => Some(Role::Agent),
            "operator" => Some(Role::Operator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: String,
}

impl User {
    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    pub expires_at: String,
}

/// Everything about a prospect a user may edit. Score and timestamps are derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProspectFields {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub kind: ProspectKind,
    pub budget: Option<f64>,
    #[serde(rename = "prixEstime")]
    pub estimated_price: Option<f64>,
    #[serde(rename = "tauxHonoraires")]
    pub fee_rate: Option<f64>,
    #[serde(rename = "exclusif")]
    pub exclusive: bool,
    pub timeline: Option<Timeline>,
    pub motivation: Option<String>,
    pub consent: bool,
    #[serde(rename = "statut")]
    pub status: ProspectStatus,
    pub notes: Option<String>,
    pub next_action: Option<String>,
}

impl ProspectFields {
    /// Trim text, drop empty optionals and canonicalise `nextAction`.
    pub fn validate(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        for field in [
            &mut self.phone,
            &mut self.email,
            &mut self.address,
            &mut self.city,
            &mut self.motivation,
            &mut self.notes,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        for (label, value) in [
            ("budget", self.budget),
            ("prixEstime", self.estimated_price),
        ] {
            if let Some(v) = value
                && (!v.is_finite() || v < 0.0)
            {
                return Err(format!("{} must be a non-negative number", label));
            }
        }
        if let Some(rate) = self.fee_rate
            && (!rate.is_finite() || !(0.0..=1.0).contains(&rate))
        {
            return Err("tauxHonoraires must be between 0 and 1".to_string());
        }
        if let Some(raw) = self.next_action.take() {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.next_action = Some(
                    normalize_ts(raw)
                        .ok_or_else(|| "nextAction must be an RFC 3339 timestamp".to_string())?,
                );
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prospect {
    pub id: String,
    pub agent_id: String,
    #[serde(flatten)]
    pub fields: ProspectFields,
    pub score: i64,
    pub expected_value: f64,
    pub created_at: String,
    pub updated_at: String,
    pub last_contact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadFields {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub bad_number: bool,
    pub do_not_contact: bool,
    pub next_action: Option<String>,
}

impl LeadFields {
    pub fn validate(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        for field in [&mut self.phone, &mut self.email, &mut self.source] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        if let Some(raw) = self.next_action.take() {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.next_action = Some(
                    normalize_ts(raw)
                        .ok_or_else(|| "nextAction must be an RFC 3339 timestamp".to_string())?,
                );
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub bad_number: bool,
    pub do_not_contact: bool,
    pub next_action: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    pub lead_id: String,
    pub kind: InteractionKind,
    pub direction: Direction,
    pub outcome: String,
    pub body: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInteraction {
    #[serde(default)]
    pub lead_id: String,
    pub kind: InteractionKind,
    pub direction: Direction,
    pub outcome: String,
    #[serde(default)]
    pub body: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl NewInteraction {
    pub fn validate(mut self) -> Result<Self, String> {
        self.outcome = self.outcome.trim().to_ascii_lowercase();
        if self.outcome.is_empty() {
            return Err("outcome is required".to_string());
        }
        self.body = self
            .body
            .take()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(raw) = self.timestamp.take() {
            self.timestamp = Some(
                normalize_ts(&raw)
                    .ok_or_else(|| "timestamp must be an RFC 3339 timestamp".to_string())?,
            );
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub lead_id: Option<String>,
    pub prospect_id: Option<String>,
    pub title: String,
    pub location: Option<String>,
    pub starts_at: String,
    pub ends_at: String,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub prospect_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: String,
    /// Defaults to one hour after the start.
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewAppointment {
    /// Canonicalise times and fill the default one-hour duration.
    pub fn validate(mut self) -> Result<Self, String> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err("title is required".to_string());
        }
        let starts = parse_ts(&self.starts_at)
            .ok_or_else(|| "startsAt must be an RFC 3339 timestamp".to_string())?;
        let ends = match self.ends_at.as_deref().map(str::trim) {
            None | Some("") => starts + chrono::Duration::hours(1),
            Some(raw) => {
                parse_ts(raw).ok_or_else(|| "endsAt must be an RFC 3339 timestamp".to_string())?
            }
        };
        if ends < starts {
            return Err("endsAt must not be before startsAt".to_string());
        }
        self.starts_at = format_ts(starts);
        self.ends_at = Some(format_ts(ends));
        for field in [
            &mut self.lead_id,
            &mut self.prospect_id,
            &mut self.location,
            &mut self.notes,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: String,
    pub lead_id: String,
    pub recipient: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub delivery_id: Option<String>,
    pub lead_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub reference: Option<String>,
    pub paid_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    #[serde(default)]
    pub delivery_id: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
}

impl NewPayment {
    pub fn validate(mut self) -> Result<Self, String> {
        if self.amount_cents <= 0 {
            return Err("amountCents must be positive".to_string());
        }
        self.currency = self.currency.trim().to_ascii_uppercase();
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err("currency must be a three-letter code".to_string());
        }
        for field in [&mut self.delivery_id, &mut self.lead_id, &mut self.reference] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        if let Some(raw) = self.paid_at.take() {
            self.paid_at = Some(
                normalize_ts(&raw).ok_or_else(|| "paidAt must be an RFC 3339 timestamp".to_string())?,
            );
        }
        Ok(self)
    }
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub trigger: String,
    /// Raw action steps; the runner validates them when it fires.
    pub action: serde_json::Value,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub rule_id: Option<String>,
    pub subject: String,
    pub message: String,
    pub created_at: String,
    pub read_at: Option<String>,
}
