use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::CrmStore;
use crate::core::clock::format_ts;

/// What an automation rule fired on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    Lead,
    Interaction,
    Delivery,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::Lead => "lead",
            SubjectKind::Interaction => "interaction",
            SubjectKind::Delivery => "delivery",
        }
    }
}

impl CrmStore {
    pub async fn is_handled(
        &self,
        rule_id: &str,
        kind: SubjectKind,
        subject_id: &str,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM automation_handled
             WHERE rule_id = ?1 AND subject_kind = ?2 AND subject_id = ?3",
            params![rule_id, kind.as_str(), subject_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record that `rule_id` acted on the subject. False when it was already recorded.
    pub async fn mark_handled(
        &self,
        rule_id: &str,
        kind: SubjectKind,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "INSERT OR IGNORE INTO automation_handled (rule_id, subject_kind, subject_id, handled_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![rule_id, kind.as_str(), subject_id, format_ts(now)],
        )?;
        Ok(rows > 0)
    }
}
