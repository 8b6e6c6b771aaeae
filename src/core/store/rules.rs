use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

use super::CrmStore;
use super::types::Rule;
use crate::core::clock::format_ts;

const RULE_COLUMNS: &str = "id, name, trigger_tag, action_json, is_active, created_at";

fn rule_from_row(row: &Row) -> rusqlite::Result<Rule> {
    let raw: String = row.get(3)?;
    Ok(Rule {
        id: row.get(0)?,
        name: row.get(1)?,
        trigger: row.get(2)?,
        // Kept as text when unparsable so the runner can report it.
        action: serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl CrmStore {
    pub async fn create_rule(
        &self,
        name: &str,
        trigger: &str,
        action: &Value,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<Rule> {
        let rule = Rule {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            trigger: trigger.trim().to_string(),
            action: action.clone(),
            is_active,
            created_at: format_ts(now),
        };
        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO rules ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                RULE_COLUMNS
            ),
            params![
                rule.id,
                rule.name,
                rule.trigger,
                serde_json::to_string(&rule.action)?,
                rule.is_active,
                rule.created_at
            ],
        )?;
        Ok(rule)
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        let db = self.db.lock().await;
        let rule = db
            .query_row(
                &format!("SELECT {} FROM rules WHERE id = ?1", RULE_COLUMNS),
                params![id],
                rule_from_row,
            )
            .optional()?;
        Ok(rule)
    }

    pub async fn list_rules(&self, active_only: bool) -> Result<Vec<Rule>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM rules WHERE (?1 = 0 OR is_active = 1) ORDER BY created_at ASC, name ASC",
            RULE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![active_only], rule_from_row)?;
        let mut rules = Vec::new();
        for row in rows {
            rules.push(row?);
        }
        Ok(rules)
    }

    pub async fn update_rule(
        &self,
        id: &str,
        name: &str,
        trigger: &str,
        action: &Value,
        is_active: bool,
    ) -> Result<Option<Rule>> {
        {
            let db = self.db.lock().await;
            let rows = db.execute(
                "UPDATE rules SET name = ?2, trigger_tag = ?3, action_json = ?4, is_active = ?5
                 WHERE id = ?1",
                params![
                    id,
                    name.trim(),
                    trigger.trim(),
                    serde_json::to_string(action)?,
                    is_active
                ],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_rule(id).await
    }

    pub async fn set_rule_active(&self, id: &str, is_active: bool) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE rules SET is_active = ?2 WHERE id = ?1",
            params![id, is_active],
        )?;
        Ok(rows > 0)
    }

    /// Also forgets which subjects the rule already handled.
    pub async fn delete_rule(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        db.execute(
            "DELETE FROM automation_handled WHERE rule_id = ?1",
            params![id],
        )?;
        let rows = db.execute("DELETE FROM rules WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub async fn count_rules(&self) -> Result<i64> {
        let db = self.db.lock().await;
        let count = db.query_row("SELECT COUNT(*) FROM rules", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::parse_ts;
    use serde_json::json;

    #[tokio::test]
    async fn rule_crud_and_active_filter() {
        let store = CrmStore::open_in_memory().unwrap();
        let now = parse_ts("2026-03-10T09:00:00Z").unwrap();
        let action = json!([{ "type": "send_sms", "template": "sms_no_answer" }]);

        let rule = store
            .create_rule(" Relance ", "outcome:no_answer", &action, true, now)
            .await
            .unwrap();
        assert_eq!(rule.name, "Relance");
        store
            .create_rule("Idle", "lead:idle_7d", &json!([]), false, now)
            .await
            .unwrap();

        assert_eq!(store.list_rules(false).await.unwrap().len(), 2);
        let active = store.list_rules(true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].action, action);

        assert!(store.set_rule_active(&rule.id, false).await.unwrap());
        assert!(store.list_rules(true).await.unwrap().is_empty());

        let updated = store
            .update_rule(&rule.id, "Relance 2", "outcome:voicemail", &action, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.trigger, "outcome:voicemail");
        assert!(updated.is_active);

        assert!(store.delete_rule(&rule.id).await.unwrap());
        assert!(store.get_rule(&rule.id).await.unwrap().is_none());
        assert_eq!(store.count_rules().await.unwrap(), 1);
    }
}
