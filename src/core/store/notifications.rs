use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::CrmStore;
use super::types::Notification;
use crate::core::clock::format_ts;

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        rule_id: row.get(1)?,
        subject: row.get(2)?,
        message: row.get(3)?,
        created_at: row.get(4)?,
        read_at: row.get(5)?,
    })
}

impl CrmStore {
    pub async fn add_notification(
        &self,
        rule_id: Option<&str>,
        subject: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule_id.map(str::to_string),
            subject: subject.to_string(),
            message: message.to_string(),
            created_at: format_ts(now),
            read_at: None,
        };
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO notifications (id, rule_id, subject, message, created_at, read_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
            params![
                notification.id,
                notification.rule_id,
                notification.subject,
                notification.message,
                notification.created_at
            ],
        )?;
        Ok(notification)
    }

    /// Newest first.
    pub async fn list_notifications(&self, unread_only: bool) -> Result<Vec<Notification>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, rule_id, subject, message, created_at, read_at FROM notifications
             WHERE (?1 = 0 OR read_at IS NULL)
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![unread_only], notification_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Returns false for unknown ids. Re-reading keeps the first read time.
    pub async fn mark_notification_read(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE notifications SET read_at = COALESCE(read_at, ?2) WHERE id = ?1",
            params![id, format_ts(now)],
        )?;
        Ok(rows > 0)
    }

    pub async fn count_unread_notifications(&self) -> Result<i64> {
        let db = self.db.lock().await;
        let count = db.query_row(
            "SELECT COUNT(*) FROM notifications WHERE read_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::parse_ts;
    use chrono::Duration;

    #[tokio::test]
    async fn read_marks_are_sticky() {
        let store = CrmStore::open_in_memory().unwrap();
        let t0 = parse_ts("2026-03-10T09:00:00Z").unwrap();
        let n = store
            .add_notification(Some("rule-1"), "Lead inactif", "Martin attend depuis 7 jours", t0)
            .await
            .unwrap();
        store
            .add_notification(None, "Livraison", "Sans contact", t0 + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(store.count_unread_notifications().await.unwrap(), 2);

        assert!(store.mark_notification_read(&n.id, t0).await.unwrap());
        assert!(
            store
                .mark_notification_read(&n.id, t0 + Duration::hours(1))
                .await
                .unwrap()
        );
        assert!(!store.mark_notification_read("missing", t0).await.unwrap());

        let all = store.list_notifications(false).await.unwrap();
        assert_eq!(all[0].subject, "Livraison");
        assert_eq!(all[1].read_at.as_deref(), Some("2026-03-10T09:00:00Z"));
        assert_eq!(store.list_notifications(true).await.unwrap().len(), 1);
    }
}
