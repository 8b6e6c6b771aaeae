use serde::{Deserialize, Serialize};

/// Stage of a prospect in the agent's sales pipeline, in board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProspectStatus {
    #[default]
    #[serde(rename = "Nouveau")]
    New,
    #[serde(rename = "Contacté")]
    Contacted,
    #[serde(rename = "Qualifié")]
    Qualified,
    #[serde(rename = "RDV fixé")]
    MeetingSet,
    #[serde(rename = "Mandat signé")]
    MandateSigned,
    #[serde(rename = "Gagné")]
    Won,
    #[serde(rename = "Perdu")]
    Lost,
}

impl ProspectStatus {
    pub const ALL: [ProspectStatus; 7] = [
        ProspectStatus::New,
        ProspectStatus::Contacted,
        ProspectStatus::Qualified,
        ProspectStatus::MeetingSet,
        ProspectStatus::MandateSigned,
        ProspectStatus::Won,
        ProspectStatus::Lost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProspectStatus::New => "Nouveau",
            ProspectStatus::Contacted => "Contacté",
            ProspectStatus::Qualified => "Qualifié",
            ProspectStatus::MeetingSet => "RDV fixé",
            ProspectStatus::MandateSigned => "Mandat signé",
            ProspectStatus::Won => "Gagné",
            ProspectStatus::Lost => "Perdu",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value.trim())
    }

    pub fn is_closed(self) -> bool {
        matches!(self, ProspectStatus::Won | ProspectStatus::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProspectKind {
    #[serde(rename = "vendeur")]
    Seller,
    #[default]
    #[serde(rename = "acheteur")]
    Buyer,
}

impl ProspectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProspectKind::Seller => "vendeur",
            ProspectKind::Buyer => "acheteur",
        }
    }

    pub fn from_kind(value: &str) -> Option<Self> {
        match value.trim() {
            "vendeur" => Some(ProspectKind::Seller),
            "acheteur" => Some(ProspectKind::Buyer),
            _ => None,
        }
    }
}

/// How soon the prospect wants to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeline {
    #[serde(rename = "urgent")]
    Urgent,
    #[serde(rename = "3_mois")]
    ThreeMonths,
    #[serde(rename = "6_mois")]
    SixMonths,
    #[serde(rename = "plus_tard")]
    Later,
}

impl Timeline {
    pub fn as_str(self) -> &'static str {
        match self {
            Timeline::Urgent => "urgent",
            Timeline::ThreeMonths => "3_mois",
            Timeline::SixMonths => "6_mois",
            Timeline::Later => "plus_tard",
        }
    }

    pub fn from_timeline(value: &str) -> Option<Self> {
        match value.trim() {
            "urgent" => Some(Timeline::Urgent),
            "3_mois" => Some(Timeline::ThreeMonths),
            "6_mois" => Some(Timeline::SixMonths),
            "plus_tard" => Some(Timeline::Later),
            _ => None,
        }
    }
}

/// Stage of an operator-side lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Booked,
    Closed,
    Lost,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Contacted => "Contacted",
            LeadStatus::Booked => "Booked",
            LeadStatus::Closed => "Closed",
            LeadStatus::Lost => "Lost",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value.trim() {
            "New" => Some(LeadStatus::New),
            "Contacted" => Some(LeadStatus::Contacted),
            "Booked" => Some(LeadStatus::Booked),
            "Closed" => Some(LeadStatus::Closed),
            "Lost" => Some(LeadStatus::Lost),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Call,
    Sms,
    Email,
    Meeting,
    Reminder,
    Whatsapp,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Call => "call",
            InteractionKind::Sms => "sms",
            InteractionKind::Email => "email",
            InteractionKind::Meeting => "meeting",
            InteractionKind::Reminder => "reminder",
            InteractionKind::Whatsapp => "whatsapp",
        }
    }

    pub fn from_kind(value: &str) -> Option<Self> {
        match value.trim() {
            "call" => Some(InteractionKind::Call),
            "sms" => Some(InteractionKind::Sms),
            "email" => Some(InteractionKind::Email),
            "meeting" => Some(InteractionKind::Meeting),
            "reminder" => Some(InteractionKind::Reminder),
            "whatsapp" => Some(InteractionKind::Whatsapp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    pub fn from_direction(value: &str) -> Option<Self> {
        match value.trim() {
            "inbound" => Some(Direction::Inbound),
            "outbound" => Some(Direction::Outbound),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip_through_serde_and_parser() {
        for status in ProspectStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(ProspectStatus::from_status(status.as_str()), Some(status));
        }
        assert_eq!(ProspectStatus::from_status("Signed"), None);
    }

    #[test]
    fn only_won_and_lost_are_closed() {
        let closed: Vec<_> = ProspectStatus::ALL
            .into_iter()
            .filter(|s| s.is_closed())
            .collect();
        assert_eq!(closed, vec![ProspectStatus::Won, ProspectStatus::Lost]);
    }

    #[test]
    fn lead_status_and_kind_parsers_reject_unknown_values() {
        assert_eq!(LeadStatus::from_status("Booked"), Some(LeadStatus::Booked));
        assert_eq!(LeadStatus::from_status("booked"), None);
        assert_eq!(InteractionKind::from_kind("sms"), Some(InteractionKind::Sms));
        assert_eq!(InteractionKind::from_kind("fax"), None);
        assert_eq!(Timeline::from_timeline("3_mois"), Some(Timeline::ThreeMonths));
        assert_eq!(ProspectKind::from_kind("vendeur"), Some(ProspectKind::Seller));
    }
}
