use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::CrmStore;
use super::types::{NewPayment, Payment};
use crate::core::clock::format_ts;

const PAYMENT_COLUMNS: &str =
    "id, delivery_id, lead_id, amount_cents, currency, reference, paid_at";

fn payment_from_row(row: &Row) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        delivery_id: row.get(1)?,
        lead_id: row.get(2)?,
        amount_cents: row.get(3)?,
        currency: row.get(4)?,
        reference: row.get(5)?,
        paid_at: row.get(6)?,
    })
}

impl CrmStore {
    pub async fn create_payment(&self, entry: NewPayment, now: DateTime<Utc>) -> Result<Payment> {
        let payment = Payment {
            id: uuid::Uuid::new_v4().to_string(),
            delivery_id: entry.delivery_id,
            lead_id: entry.lead_id,
            amount_cents: entry.amount_cents,
            currency: entry.currency,
            reference: entry.reference,
            paid_at: entry.paid_at.unwrap_or_else(|| format_ts(now)),
        };
        let db = self.db.lock().await;
        db.execute(
            &format!(
                "INSERT INTO payments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                PAYMENT_COLUMNS
            ),
            params![
                payment.id,
                payment.delivery_id,
                payment.lead_id,
                payment.amount_cents,
                payment.currency,
                payment.reference,
                payment.paid_at
            ],
        )?;
        Ok(payment)
    }

    pub async fn get_payment(&self, id: &str) -> Result<Option<Payment>> {
        let db = self.db.lock().await;
        let payment = db
            .query_row(
                &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
                params![id],
                payment_from_row,
            )
            .optional()?;
        Ok(payment)
    }

    pub async fn list_payments(&self) -> Result<Vec<Payment>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM payments ORDER BY paid_at DESC",
            PAYMENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], payment_from_row)?;
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

    #[test]
    fn validate_normalises_currency_and_rejects_bad_amounts() {
        let ok = NewPayment {
            delivery_id: None,
            lead_id: Some(" ".to_string()),
            amount_cents: 150_000,
            currency: "eur".to_string(),
            reference: Some("FAC-2026-001".to_string()),
            paid_at: Some("2026-03-10T10:00:00+01:00".to_string()),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.currency, "EUR");
        assert!(ok.lead_id.is_none());
        assert_eq!(ok.paid_at.as_deref(), Some("2026-03-10T09:00:00Z"));

        let zero = NewPayment {
            amount_cents: 0,
            ..ok.clone()
        };
        assert!(zero.validate().is_err());
        let bad_currency = NewPayment {
            currency: "EURO".to_string(),
            ..ok
        };
        assert!(bad_currency.validate().is_err());
    }

    #[tokio::test]
    async fn payment_defaults_paid_at_to_now() {
        let store = CrmStore::open_in_memory().unwrap();
        let now = parse_ts("2026-03-10T09:00:00Z").unwrap();
        let payment = store
            .create_payment(
                NewPayment {
                    delivery_id: None,
                    lead_id: None,
                    amount_cents: 99_00,
                    currency: "EUR".to_string(),
                    reference: None,
                    paid_at: None,
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(payment.paid_at, "2026-03-10T09:00:00Z");
        assert_eq!(store.list_payments().await.unwrap().len(), 1);
        assert_eq!(
            store.get_payment(&payment.id).await.unwrap().map(|p| p.amount_cents),
            Some(9900)
        );
    }
}
