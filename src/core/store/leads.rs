use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::CrmStore;
use super::types::{Lead, LeadFields};
use crate::core::clock::format_ts;
use crate::core::pipeline::LeadStatus;

const LEAD_COLUMNS: &str = "id, name, phone, email, source, status, bad_number, do_not_contact, \
     next_action, created_at, updated_at";

pub(super) fn lead_from_row(row: &Row) -> rusqlite::Result<Lead> {
    let status: String = row.get(5)?;
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        source: row.get(4)?,
        status: LeadStatus::from_status(&status).unwrap_or_default(),
        bad_number: row.get(6)?,
        do_not_contact: row.get(7)?,
        next_action: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl CrmStore {
    pub async fn create_lead(&self, fields: LeadFields, now: DateTime<Utc>) -> Result<Lead> {
        let ts = format_ts(now);
        let lead = Lead {
            id: uuid::Uuid::new_v4().to_string(),
            name: fields.name,
            phone: fields.phone,
            email: fields.email,
            source: fields.source,
            status: fields.status,
            bad_number: fields.bad_number,
            do_not_contact: fields.do_not_contact,
            next_action: fields.next_action,
            created_at: ts.clone(),
            updated_at: ts,
        };

        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO leads ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                LEAD_COLUMNS
            ),
            params![
                lead.id,
                lead.name,
                lead.phone,
                lead.email,
                lead.source,
                lead.status.as_str(),
                lead.bad_number,
                lead.do_not_contact,
                lead.next_action,
                lead.created_at,
                lead.updated_at
            ],
        )?;
        Ok(lead)
    }

    pub async fn get_lead(&self, id: &str) -> Result<Option<Lead>> {
        let db = self.db.lock().await;
        let lead = db
            .query_row(
                &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS),
                params![id],
                lead_from_row,
            )
            .optional()?;
        Ok(lead)
    }

    /// Newest first, optionally restricted to one status.
    pub async fn list_leads(&self, status: Option<LeadStatus>) -> Result<Vec<Lead>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM leads WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, id ASC",
            LEAD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![status.map(|s| s.as_str())], lead_from_row)?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(row?);
        }
        Ok(leads)
    }

    pub async fn update_lead(
        &self,
        id: &str,
        fields: LeadFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Lead>> {
        {
            let db = self.db.lock().await;
            let rows = db.execute(
                "UPDATE leads SET name = ?2, phone = ?3, email = ?4, source = ?5, status = ?6,
                    bad_number = ?7, do_not_contact = ?8, next_action = ?9, updated_at = ?10
                 WHERE id = ?1",
                params![
                    id,
                    fields.name,
                    fields.phone,
                    fields.email,
                    fields.source,
                    fields.status.as_str(),
                    fields.bad_number,
                    fields.do_not_contact,
                    fields.next_action,
                    format_ts(now)
                ],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_lead(id).await
    }

    pub async fn set_lead_status(
        &self,
        id: &str,
        status: LeadStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE leads SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), format_ts(now)],
        )?;
        Ok(rows > 0)
    }

    pub async fn set_lead_next_action(
        &self,
        id: &str,
        next_action: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE leads SET next_action = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, format_ts(next_action), format_ts(now)],
        )?;
        Ok(rows > 0)
    }

    /// Also drops the automation markers of the lead, its calls and its deliveries.
    pub async fn delete_lead(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        db.execute(
            "DELETE FROM automation_handled
             WHERE (subject_kind = 'lead' AND subject_id = ?1)
                OR (subject_kind = 'interaction'
                    AND subject_id IN (SELECT id FROM interactions WHERE lead_id = ?1))
                OR (subject_kind = 'delivery'
                    AND subject_id IN (SELECT id FROM deliveries WHERE lead_id = ?1))",
            params![id],
        )?;
        let rows = db.execute("DELETE FROM leads WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Leads in `status` created strictly before `created_before`, oldest first.
    pub async fn leads_created_before(
        &self,
        status: LeadStatus,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Lead>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM leads WHERE status = ?1 AND created_at < ?2 ORDER BY created_at ASC",
            LEAD_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![status.as_str(), format_ts(created_before)],
            lead_from_row,
        )?;
        let mut leads = Vec::new();
        for row in rows {
            leads.push(row?);
        }
        Ok(leads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::parse_ts;

    fn t0() -> DateTime<Utc> {
        parse_ts("2026-03-10T09:00:00Z").unwrap()
    }

    fn lead(name: &str) -> LeadFields {
        LeadFields {
            name: name.to_string(),
            phone: Some("0612345678".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn crud_roundtrip() {
        let store = CrmStore::open_in_memory().unwrap();
        let created = store.create_lead(lead("Martin"), t0()).await.unwrap();
        assert_eq!(created.status, LeadStatus::New);
        assert_eq!(store.get_lead(&created.id).await.unwrap(), Some(created.clone()));

        let fields = LeadFields {
            do_not_contact: true,
            status: LeadStatus::Contacted,
            ..lead("Martin")
        };
        let updated = store
            .update_lead(&created.id, fields, t0())
            .await
            .unwrap()
            .unwrap();
        assert!(updated.do_not_contact);
        assert_eq!(updated.status, LeadStatus::Contacted);

        assert!(store.delete_lead(&created.id).await.unwrap());
        assert!(store.get_lead(&created.id).await.unwrap().is_none());
        assert!(
            store
                .update_lead(&created.id, lead("x"), t0())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn status_filter_and_age_query() {
        let store = CrmStore::open_in_memory().unwrap();
        let old = store.create_lead(lead("Old"), t0()).await.unwrap();
        let fresh = store
            .create_lead(lead("Fresh"), t0() + chrono::Duration::days(6))
            .await
            .unwrap();
        store
            .set_lead_status(&fresh.id, LeadStatus::Booked, t0())
            .await
            .unwrap();

        let booked = store.list_leads(Some(LeadStatus::Booked)).await.unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(store.list_leads(None).await.unwrap().len(), 2);

        let idle = store
            .leads_created_before(LeadStatus::New, t0() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(idle.iter().map(|l| &l.id).collect::<Vec<_>>(), vec![&old.id]);
    }

    #[tokio::test]
    async fn deleting_lead_drops_markers_of_its_subjects() {
        use crate::core::pipeline::{Direction, InteractionKind};
        use crate::core::store::SubjectKind;
        use crate::core::store::types::NewInteraction;

        let store = CrmStore::open_in_memory().unwrap();
        let gone = store.create_lead(lead("Gone"), t0()).await.unwrap();
        let kept = store.create_lead(lead("Kept"), t0()).await.unwrap();
        let call = store
            .add_interaction(
                NewInteraction {
                    lead_id: gone.id.clone(),
                    kind: InteractionKind::Call,
                    direction: Direction::Outbound,
                    outcome: "no_answer".to_string(),
                    body: None,
                    timestamp: None,
                },
                t0(),
            )
            .await
            .unwrap();
        let delivery = store.create_delivery(&gone.id, "Agence", t0()).await.unwrap();

        for (kind, id) in [
            (SubjectKind::Lead, gone.id.as_str()),
            (SubjectKind::Interaction, call.id.as_str()),
            (SubjectKind::Delivery, delivery.id.as_str()),
            (SubjectKind::Lead, kept.id.as_str()),
        ] {
            store.mark_handled("rule-1", kind, id, t0()).await.unwrap();
        }

        assert!(store.delete_lead(&gone.id).await.unwrap());
        for (kind, id) in [
            (SubjectKind::Lead, gone.id.as_str()),
            (SubjectKind::Interaction, call.id.as_str()),
            (SubjectKind::Delivery, delivery.id.as_str()),
        ] {
            assert!(!store.is_handled("rule-1", kind, id).await.unwrap());
        }
        assert!(
            store
                .is_handled("rule-1", SubjectKind::Lead, &kept.id)
                .await
                .unwrap()
        );
    }
}
