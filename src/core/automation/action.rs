use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::pipeline::LeadStatus;

/// One step of a rule's action list, stored as `type`-tagged JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionStep {
    SendSms { template: String },
    ScheduleFollowUp { days: i64 },
    ScheduleReminders { hours_before: Vec<i64> },
    SetStatus { status: LeadStatus },
    NotifyOperator { message: String },
}

impl ActionStep {
    pub fn name(&self) -> &'static str {
        match self {
            ActionStep::SendSms { .. } => "send_sms",
            ActionStep::ScheduleFollowUp { .. } => "schedule_follow_up",
            ActionStep::ScheduleReminders { .. } => "schedule_reminders",
            ActionStep::SetStatus { .. } => "set_status",
            ActionStep::NotifyOperator { .. } => "notify_operator",
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            ActionStep::SendSms { template } if template.trim().is_empty() => {
                Err("send_sms needs a template".to_string())
            }
            ActionStep::ScheduleFollowUp { days } if *days < 0 => {
                Err("schedule_follow_up days must not be negative".to_string())
            }
            ActionStep::ScheduleReminders { hours_before }
                if hours_before.is_empty() || hours_before.iter().any(|h| *h <= 0) =>
            {
                Err("schedule_reminders needs positive hoursBefore values".to_string())
            }
            ActionStep::NotifyOperator { message } if message.trim().is_empty() => {
                Err("notify_operator needs a message".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Decode a rule's action JSON: an array of steps, or a single step object.
pub fn parse_steps(action: &Value) -> Result<Vec<ActionStep>, String> {
    let steps: Vec<ActionStep> = match action {
        Value::Array(_) => serde_json::from_value(action.clone()),
        Value::Object(_) => serde_json::from_value(action.clone()).map(|step| vec![step]),
        other => return Err(format!("action must be a JSON array of steps, got {}", other)),
    }
    .map_err(|e| format!("invalid action: {}", e))?;

    if steps.is_empty() {
        return Err("action has no steps".to_string());
    }
    for step in &steps {
        step.check()?;
    }
    Ok(steps)
}
