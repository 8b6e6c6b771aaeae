use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::CrmStore;
use super::types::Delivery;
use crate::core::clock::format_ts;

fn delivery_from_row(row: &Row) -> rusqlite::Result<Delivery> {
    Ok(Delivery {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        recipient: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl CrmStore {
    pub async fn create_delivery(
        &self,
        lead_id: &str,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<Delivery> {
        let delivery = Delivery {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: lead_id.to_string(),
            recipient: recipient.trim().to_string(),
            created_at: format_ts(now),
        };
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO deliveries (id, lead_id, recipient, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                delivery.id,
                delivery.lead_id,
                delivery.recipient,
                delivery.created_at
            ],
        )?;
        Ok(delivery)
    }

    pub async fn get_delivery(&self, id: &str) -> Result<Option<Delivery>> {
        let db = self.db.lock().await;
        let delivery = db
            .query_row(
                "SELECT id, lead_id, recipient, created_at FROM deliveries WHERE id = ?1",
                params![id],
                delivery_from_row,
            )
            .optional()?;
        Ok(delivery)
    }

    pub async fn list_deliveries(&self) -> Result<Vec<Delivery>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, lead_id, recipient, created_at FROM deliveries ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], delivery_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Also drops the automation markers recorded for the delivery.
    pub async fn delete_delivery(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        db.execute(
            "DELETE FROM automation_handled WHERE subject_kind = 'delivery' AND subject_id = ?1",
            params![id],
        )?;
        let rows = db.execute("DELETE FROM deliveries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Deliveries created before `created_before` whose lead has had no real contact since.
    /// Reminders and interactions dated after `now` have not happened yet and do not count.
    pub async fn uncontacted_deliveries(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Delivery>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT d.id, d.lead_id, d.recipient, d.created_at
             FROM deliveries d
             WHERE d.created_at < ?1
               AND NOT EXISTS (
                   SELECT 1 FROM interactions i
                   WHERE i.lead_id = d.lead_id
                     AND i.timestamp >= d.created_at
                     AND i.timestamp <= ?2
                     AND i.kind <> 'reminder'
               )
             ORDER BY d.created_at ASC",
        )?;
        let rows = stmt.query_map(
            params![format_ts(created_before), format_ts(now)],
            delivery_from_row,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::parse_ts;
    use crate::core::pipeline::{Direction, InteractionKind};
    use crate::core::store::SubjectKind;
    use crate::core::store::types::{LeadFields, NewInteraction};
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        parse_ts("2026-03-10T09:00:00Z").unwrap()
    }

    async fn lead(store: &CrmStore) -> String {
        store
            .create_lead(
                LeadFields {
                    name: "Martin".to_string(),
                    ..Default::default()
                },
                t0(),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn interaction_after_delivery_counts_as_contact() {
        let store = CrmStore::open_in_memory().unwrap();
        let quiet = lead(&store).await;
        let called = lead(&store).await;

        // An interaction from before the delivery does not count.
        store
            .add_interaction(
                NewInteraction {
                    lead_id: quiet.clone(),
                    kind: InteractionKind::Call,
                    direction: Direction::Outbound,
                    outcome: "answered".to_string(),
                    body: None,
                    timestamp: Some("2026-03-09T09:00:00Z".to_string()),
                },
                t0(),
            )
            .await
            .unwrap();

        let d1 = store.create_delivery(&quiet, "Agence Sud", t0()).await.unwrap();
        store.create_delivery(&called, "Agence Nord", t0()).await.unwrap();
        store
            .add_interaction(
                NewInteraction {
                    lead_id: called.clone(),
                    kind: InteractionKind::Email,
                    direction: Direction::Outbound,
                    outcome: "sent".to_string(),
                    body: None,
                    timestamp: None,
                },
                t0() + Duration::hours(3),
            )
            .await
            .unwrap();

        let stale = store
            .uncontacted_deliveries(t0() + Duration::hours(1), t0() + Duration::hours(5))
            .await
            .unwrap();
        assert_eq!(stale.iter().map(|d| &d.id).collect::<Vec<_>>(), vec![&d1.id]);

        assert!(store
            .uncontacted_deliveries(t0(), t0() + Duration::hours(5))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleting_lead_cascades_to_deliveries() {
        let store = CrmStore::open_in_memory().unwrap();
        let id = lead(&store).await;
        let d = store.create_delivery(&id, "Agence", t0()).await.unwrap();
        store.delete_lead(&id).await.unwrap();
        assert!(store.get_delivery(&d.id).await.unwrap().is_none());
        assert!(!store.delete_delivery(&d.id).await.unwrap());
    }

    #[tokio::test]
    async fn scheduled_reminder_is_not_contact() {
        let store = CrmStore::open_in_memory().unwrap();
        let id = lead(&store).await;
        let d = store.create_delivery(&id, "Agence Est", t0()).await.unwrap();
        store
            .add_interaction(
                NewInteraction {
                    lead_id: id.clone(),
                    kind: InteractionKind::Reminder,
                    direction: Direction::Outbound,
                    outcome: "scheduled".to_string(),
                    body: Some("Rappeler le prospect".to_string()),
                    timestamp: Some("2026-03-15T09:00:00Z".to_string()),
                },
                t0(),
            )
            .await
            .unwrap();

        let now = t0() + Duration::hours(30);
        let stale = store
            .uncontacted_deliveries(now - Duration::hours(24), now)
            .await
            .unwrap();
        assert_eq!(stale.iter().map(|d| &d.id).collect::<Vec<_>>(), vec![&d.id]);
    }

    #[tokio::test]
    async fn future_dated_call_is_not_contact_yet() {
        let store = CrmStore::open_in_memory().unwrap();
        let id = lead(&store).await;
        let d = store.create_delivery(&id, "Agence Est", t0()).await.unwrap();
        store
            .add_interaction(
                NewInteraction {
                    lead_id: id.clone(),
                    kind: InteractionKind::Call,
                    direction: Direction::Outbound,
                    outcome: "answered".to_string(),
                    body: None,
                    timestamp: Some("2026-03-20T09:00:00Z".to_string()),
                },
                t0(),
            )
            .await
            .unwrap();

        let now = t0() + Duration::hours(30);
        let stale = store
            .uncontacted_deliveries(now - Duration::hours(24), now)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, d.id);
    }

    #[tokio::test]
    async fn deleting_delivery_drops_its_markers() {
        let store = CrmStore::open_in_memory().unwrap();
        let id = lead(&store).await;
        let d = store.create_delivery(&id, "Agence", t0()).await.unwrap();
        store
            .mark_handled("rule-1", SubjectKind::Delivery, &d.id, t0())
            .await
            .unwrap();
        assert!(store.delete_delivery(&d.id).await.unwrap());
        assert!(!store
            .is_handled("rule-1", SubjectKind::Delivery, &d.id)
            .await
            .unwrap());
    }
}
