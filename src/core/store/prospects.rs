use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::CrmStore;
use super::types::{Prospect, ProspectFields};
use crate::core::clock::format_ts;
use crate::core::pipeline::{ProspectKind, ProspectStatus, Timeline};
use crate::core::scoring;

const PROSPECT_COLUMNS: &str = "id, agent_id, name, phone, email, address, city, kind, budget, \
     estimated_price, fee_rate, exclusive, timeline, motivation, consent, status, score, notes, \
     next_action, last_contact, created_at, updated_at";

fn prospect_from_row(row: &Row) -> rusqlite::Result<Prospect> {
    let kind: String = row.get(7)?;
    let timeline: Option<String> = row.get(12)?;
    let status: String = row.get(15)?;
    let fields = ProspectFields {
        name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
        city: row.get(6)?,
        kind: ProspectKind::from_kind(&kind).unwrap_or_default(),
        budget: row.get(8)?,
        estimated_price: row.get(9)?,
        fee_rate: row.get(10)?,
        exclusive: row.get(11)?,
        timeline: timeline.as_deref().and_then(Timeline::from_timeline),
        motivation: row.get(13)?,
        consent: row.get(14)?,
        status: ProspectStatus::from_status(&status).unwrap_or_default(),
        notes: row.get(17)?,
        next_action: row.get(18)?,
    };
    let expected_value = scoring::expected_value(&fields);
    Ok(Prospect {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        fields,
        score: row.get(16)?,
        expected_value,
        last_contact: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

impl CrmStore {
    /// Insert a prospect owned by `agent_id`. The score is derived from `fields`.
    pub async fn create_prospect(
        &self,
        agent_id: &str,
        fields: ProspectFields,
        now: DateTime<Utc>,
    ) -> Result<Prospect> {
        let ts = format_ts(now);
        let prospect = Prospect {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            score: scoring::score(&fields),
            expected_value: scoring::expected_value(&fields),
            fields,
            created_at: ts.clone(),
            updated_at: ts,
            last_contact: None,
        };
        let f = &prospect.fields;

        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO prospects ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                PROSPECT_COLUMNS
            ),
            params![
                prospect.id,
                prospect.agent_id,
                f.name,
                f.phone,
                f.email,
                f.address,
                f.city,
                f.kind.as_str(),
                f.budget,
                f.estimated_price,
                f.fee_rate,
                f.exclusive,
                f.timeline.map(|t| t.as_str()),
                f.motivation,
                f.consent,
                f.status.as_str(),
                prospect.score,
                f.notes,
                f.next_action,
                prospect.last_contact,
                prospect.created_at,
                prospect.updated_at
            ],
        )?;
        Ok(prospect)
    }

    pub async fn get_prospect(&self, id: &str) -> Result<Option<Prospect>> {
        let db = self.db.lock().await;
        let prospect = db
            .query_row(
                &format!("SELECT {} FROM prospects WHERE id = ?1", PROSPECT_COLUMNS),
                params![id],
                prospect_from_row,
            )
            .optional()?;
        Ok(prospect)
    }

    /// All prospects, or only `agent_id`'s when given. Highest score first.
    pub async fn list_prospects(&self, agent_id: Option<&str>) -> Result<Vec<Prospect>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM prospects
             WHERE (?1 IS NULL OR agent_id = ?1)
             ORDER BY score DESC, updated_at DESC",
            PROSPECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![agent_id], prospect_from_row)?;
        let mut prospects = Vec::new();
        for row in rows {
            prospects.push(row?);
        }
        Ok(prospects)
    }

    /// Replace the editable fields and re-derive the score.
    pub async fn update_prospect(
        &self,
        id: &str,
        fields: ProspectFields,
        now: DateTime<Utc>,
    ) -> Result<Option<Prospect>> {
        let score = scoring::score(&fields);
        {
            let db = self.db.lock().await;
            let rows = db.execute(
                "UPDATE prospects SET name = ?2, phone = ?3, email = ?4, address = ?5, city = ?6,
                    kind = ?7, budget = ?8, estimated_price = ?9, fee_rate = ?10, exclusive = ?11,
                    timeline = ?12, motivation = ?13, consent = ?14, status = ?15, score = ?16,
                    notes = ?17, next_action = ?18, updated_at = ?19
                 WHERE id = ?1",
                params![
                    id,
                    fields.name,
                    fields.phone,
                    fields.email,
                    fields.address,
                    fields.city,
                    fields.kind.as_str(),
                    fields.budget,
                    fields.estimated_price,
                    fields.fee_rate,
                    fields.exclusive,
                    fields.timeline.map(|t| t.as_str()),
                    fields.motivation,
                    fields.consent,
                    fields.status.as_str(),
                    score,
                    fields.notes,
                    fields.next_action,
                    format_ts(now)
                ],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_prospect(id).await
    }

    /// Move a pipeline card. Counts as a contact and re-derives the score.
    pub async fn set_prospect_status(
        &self,
        id: &str,
        status: ProspectStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Prospect>> {
        let Some(current) = self.get_prospect(id).await? else {
            return Ok(None);
        };
        let fields = ProspectFields {
            status,
            ..current.fields
        };
        let ts = format_ts(now);

        let db = self.db.lock().await;
        db.execute(
            "UPDATE prospects SET status = ?2, score = ?3, last_contact = ?4, updated_at = ?4
             WHERE id = ?1",
            params![id, status.as_str(), scoring::score(&fields), ts],
        )?;
        Ok(Some(Prospect {
            score: scoring::score(&fields),
            expected_value: scoring::expected_value(&fields),
            fields,
            last_contact: Some(ts.clone()),
            updated_at: ts,
            ..current
        }))
    }

    pub async fn delete_prospect(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM prospects WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
