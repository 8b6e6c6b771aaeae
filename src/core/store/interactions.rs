use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::CrmStore;
use super::types::{Interaction, NewInteraction};
use crate::core::clock::format_ts;
use crate::core::pipeline::{Direction, InteractionKind};

const INTERACTION_COLUMNS: &str = "id, lead_id, kind, direction, outcome, body, timestamp";

fn interaction_from_row(row: &Row) -> rusqlite::Result<Interaction> {
    let kind: String = row.get(2)?;
    let direction: String = row.get(3)?;
    Ok(Interaction {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        kind: InteractionKind::from_kind(&kind).unwrap_or(InteractionKind::Call),
        direction: Direction::from_direction(&direction).unwrap_or(Direction::Outbound),
        outcome: row.get(4)?,
        body: row.get(5)?,
        timestamp: row.get(6)?,
    })
}

impl CrmStore {
    /// Append to a lead's interaction log. Entries are never edited afterwards.
    pub async fn add_interaction(
        &self,
        entry: NewInteraction,
        now: DateTime<Utc>,
    ) -> Result<Interaction> {
        let interaction = Interaction {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: entry.lead_id,
            kind: entry.kind,
            direction: entry.direction,
            outcome: entry.outcome,
            body: entry.body,
            timestamp: entry.timestamp.unwrap_or_else(|| format_ts(now)),
        };

        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO interactions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                INTERACTION_COLUMNS
            ),
            params![
                interaction.id,
                interaction.lead_id,
                interaction.kind.as_str(),
                interaction.direction.as_str(),
                interaction.outcome,
                interaction.body,
                interaction.timestamp
            ],
        )?;
        Ok(interaction)
    }

    /// A lead's log, oldest first.
    pub async fn list_interactions(&self, lead_id: &str) -> Result<Vec<Interaction>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM interactions WHERE lead_id = ?1 ORDER BY timestamp ASC, rowid ASC",
            INTERACTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![lead_id], interaction_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Calls whose outcome is `outcome`, that are the most recent call of their lead,
    /// and whose timestamp lies in `[not_before, not_after]`.
    pub async fn latest_calls_with_outcome(
        &self,
        outcome: &str,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Vec<Interaction>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT i.id, i.lead_id, i.kind, i.direction, i.outcome, i.body, i.timestamp
             FROM interactions i
             WHERE i.kind = 'call'
               AND i.outcome = ?1
               AND i.timestamp >= ?2
               AND i.timestamp <= ?3
               AND i.id = (
                   SELECT j.id FROM interactions j
                   WHERE j.lead_id = i.lead_id AND j.kind = 'call'
                   ORDER BY j.timestamp DESC, j.id DESC
                   LIMIT 1
               )
             ORDER BY i.timestamp ASC",
        )?;
        let rows = stmt.query_map(
            params![outcome, format_ts(not_before), format_ts(not_after)],
            interaction_from_row,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn has_interaction(
        &self,
        lead_id: &str,
        kind: InteractionKind,
        outcome: &str,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM interactions WHERE lead_id = ?1 AND kind = ?2 AND outcome = ?3",
            params![lead_id, kind.as_str(), outcome],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::parse_ts;
    use crate::core::store::types::LeadFields;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        parse_ts("2026-03-10T09:00:00Z").unwrap()
    }

    fn call(lead_id: &str, outcome: &str, at: DateTime<Utc>) -> NewInteraction {
        NewInteraction {
            lead_id: lead_id.to_string(),
            kind: InteractionKind::Call,
            direction: Direction::Outbound,
            outcome: outcome.to_string(),
            body: None,
            timestamp: Some(format_ts(at)),
        }
    }

    async fn lead(store: &CrmStore, name: &str) -> String {
        store
            .create_lead(
                LeadFields {
                    name: name.to_string(),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn only_the_latest_call_counts() {
        let store = CrmStore::open_in_memory().unwrap();
        let a = lead(&store, "A").await;
        let b = lead(&store, "B").await;

        // A: no_answer, later answered.
        store.add_interaction(call(&a, "no_answer", t0()), t0()).await.unwrap();
        store
            .add_interaction(call(&a, "answered", t0() + Duration::minutes(5)), t0())
            .await
            .unwrap();
        // B: answered then no_answer; an sms afterwards does not hide the call.
        store.add_interaction(call(&b, "answered", t0()), t0()).await.unwrap();
        store
            .add_interaction(call(&b, "no_answer", t0() + Duration::minutes(10)), t0())
            .await
            .unwrap();
        let mut sms = call(&b, "sent", t0() + Duration::minutes(20));
        sms.kind = InteractionKind::Sms;
        store.add_interaction(sms, t0()).await.unwrap();

        let hits = store
            .latest_calls_with_outcome("no_answer", t0() - Duration::days(7), t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lead_id, b);
    }

    #[tokio::test]
    async fn same_timestamp_calls_yield_one_stable_hit() {
        let store = CrmStore::open_in_memory().unwrap();
        let a = lead(&store, "A").await;
        store.add_interaction(call(&a, "no_answer", t0()), t0()).await.unwrap();
        store.add_interaction(call(&a, "no_answer", t0()), t0()).await.unwrap();

        let window = (t0() - Duration::days(7), t0() + Duration::hours(1));
        let first = store
            .latest_calls_with_outcome("no_answer", window.0, window.1)
            .await
            .unwrap();
        let again = store
            .latest_calls_with_outcome("no_answer", window.0, window.1)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, again[0].id);
    }

    #[tokio::test]
    async fn window_bounds_are_respected() {
        let store = CrmStore::open_in_memory().unwrap();
        let a = lead(&store, "A").await;
        store.add_interaction(call(&a, "voicemail", t0()), t0()).await.unwrap();

        let too_recent = store
            .latest_calls_with_outcome("voicemail", t0() - Duration::days(7), t0() - Duration::minutes(15))
            .await
            .unwrap();
        assert!(too_recent.is_empty());

        let too_old = store
            .latest_calls_with_outcome("voicemail", t0() + Duration::minutes(1), t0() + Duration::days(1))
            .await
            .unwrap();
        assert!(too_old.is_empty());
    }

    #[tokio::test]
    async fn existence_check_and_log_order() {
        let store = CrmStore::open_in_memory().unwrap();
        let a = lead(&store, "A").await;
        assert!(
            !store
                .has_interaction(&a, InteractionKind::Sms, "confirmation_sent")
                .await
                .unwrap()
        );
        let mut sms = call(&a, "confirmation_sent", t0());
        sms.kind = InteractionKind::Sms;
        store.add_interaction(sms, t0()).await.unwrap();
        store
            .add_interaction(call(&a, "no_answer", t0() - Duration::hours(1)), t0())
            .await
            .unwrap();

        assert!(
            store
                .has_interaction(&a, InteractionKind::Sms, "confirmation_sent")
                .await
                .unwrap()
        );
        let log = store.list_interactions(&a).await.unwrap();
        assert_eq!(log[0].outcome, "no_answer");
        assert_eq!(log[1].outcome, "confirmation_sent");
    }
}
