use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::CrmStore;
use super::types::{Appointment, NewAppointment};
use crate::core::clock::format_ts;

const APPOINTMENT_COLUMNS: &str =
    "id, lead_id, prospect_id, title, location, starts_at, ends_at, notes, created_at";

fn appointment_from_row(row: &Row) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        prospect_id: row.get(2)?,
        title: row.get(3)?,
        location: row.get(4)?,
        starts_at: row.get(5)?,
        ends_at: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl CrmStore {
    /// `entry` must already be validated.
    pub async fn create_appointment(
        &self,
        entry: NewAppointment,
        now: DateTime<Utc>,
    ) -> Result<Appointment> {
        let appointment = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: entry.lead_id,
            prospect_id: entry.prospect_id,
            title: entry.title,
            location: entry.location,
            ends_at: entry.ends_at.unwrap_or_else(|| entry.starts_at.clone()),
            starts_at: entry.starts_at,
            notes: entry.notes,
            created_at: format_ts(now),
        };

        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO appointments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                APPOINTMENT_COLUMNS
            ),
            params![
                appointment.id,
                appointment.lead_id,
                appointment.prospect_id,
                appointment.title,
                appointment.location,
                appointment.starts_at,
                appointment.ends_at,
                appointment.notes,
                appointment.created_at
            ],
        )?;
        Ok(appointment)
    }

    pub async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>> {
        let db = self.db.lock().await;
        let appointment = db
            .query_row(
                &format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLUMNS),
                params![id],
                appointment_from_row,
            )
            .optional()?;
        Ok(appointment)
    }

    /// Chronological; `from`/`to` bound `starts_at` when given.
    pub async fn list_appointments(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM appointments
             WHERE (?1 IS NULL OR starts_at >= ?1) AND (?2 IS NULL OR starts_at < ?2)
             ORDER BY starts_at ASC",
            APPOINTMENT_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![from.map(format_ts), to.map(format_ts)],
            appointment_from_row,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The lead's first appointment starting after `after`.
    pub async fn next_appointment_for_lead(
        &self,
        lead_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<Appointment>> {
        let db = self.db.lock().await;
        let appointment = db
            .query_row(
                &format!(
                    "SELECT {} FROM appointments WHERE lead_id = ?1 AND starts_at > ?2
                     ORDER BY starts_at ASC LIMIT 1",
                    APPOINTMENT_COLUMNS
                ),
                params![lead_id, format_ts(after)],
                appointment_from_row,
            )
            .optional()?;
        Ok(appointment)
    }

    pub async fn delete_appointment(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
