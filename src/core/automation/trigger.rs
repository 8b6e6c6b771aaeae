/// Call outcomes that fire a rule when they are the lead's latest call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    NoAnswer,
    Voicemail,
}

impl CallOutcome {
    /// Tag stored on the `call` interaction.
    pub fn as_str(self) -> &'static str {
        match self {
            CallOutcome::NoAnswer => "no_answer",
            CallOutcome::Voicemail => "voicemail",
        }
    }
}

/// Condition families the runner knows how to query for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The lead's most recent call ended with this outcome.
    Call(CallOutcome),
    /// The lead is `Booked` and has not been sent a confirmation yet.
    Booked,
    /// A delivered lead has had no interaction for a day.
    DeliveryUncontacted,
    /// A `New` lead has been sitting for a week.
    LeadIdle,
}

impl Trigger {
    pub const ALL: [Trigger; 5] = [
        Trigger::Call(CallOutcome::NoAnswer),
        Trigger::Call(CallOutcome::Voicemail),
        Trigger::Booked,
        Trigger::DeliveryUncontacted,
        Trigger::LeadIdle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Call(CallOutcome::NoAnswer) => "outcome:no_answer",
            Trigger::Call(CallOutcome::Voicemail) => "outcome:voicemail",
            Trigger::Booked => "status:booked",
            Trigger::DeliveryUncontacted => "delivery:uncontacted_24h",
            Trigger::LeadIdle => "lead:idle_7d",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag.trim())
    }

    /// Outcome recorded on SMS sent by a rule with this trigger.
    pub fn sms_outcome(self) -> &'static str {
        match self {
            Trigger::Booked => "confirmation_sent",
            _ => "sent",
        }
    }
}
