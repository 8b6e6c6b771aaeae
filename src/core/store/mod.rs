mod appointments;
mod deliveries;
mod handled;
mod interactions;
mod leads;
mod notifications;
mod payments;
mod prospects;
mod rules;
mod templates;
pub mod types;
mod users;

pub use handled::SubjectKind;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::platform::{NativePlatform, Platform};

/// The CRM database. Cloning shares the single connection.
#[derive(Clone)]
pub struct CrmStore {
    db: Arc<Mutex<Connection>>,
}

impl CrmStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await?;
            NativePlatform::restrict_dir_permissions(parent);
        }

        let db = Connection::open(path)?;
        NativePlatform::restrict_file_permissions(path);
        init_schema(&db)?;
        info!("Opened CRM database at {}", path.display());

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        init_schema(&db)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

fn init_schema(db: &Connection) -> Result<()> {
    db.execute_batch("PRAGMA foreign_keys = ON;")?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS prospects (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            address TEXT,
            city TEXT,
            kind TEXT NOT NULL,
            budget REAL,
            estimated_price REAL,
            fee_rate REAL,
            exclusive INTEGER NOT NULL DEFAULT 0,
            timeline TEXT,
            motivation TEXT,
            consent INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            score INTEGER NOT NULL,
            notes TEXT,
            next_action TEXT,
            last_contact TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT,
            email TEXT,
            source TEXT,
            status TEXT NOT NULL,
            bad_number INTEGER NOT NULL DEFAULT 0,
            do_not_contact INTEGER NOT NULL DEFAULT 0,
            next_action TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS interactions (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            direction TEXT NOT NULL,
            outcome TEXT NOT NULL,
            body TEXT,
            timestamp TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS appointments (
            id TEXT PRIMARY KEY,
            lead_id TEXT REFERENCES leads(id) ON DELETE CASCADE,
            prospect_id TEXT REFERENCES prospects(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            location TEXT,
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS deliveries (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            recipient TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            delivery_id TEXT REFERENCES deliveries(id) ON DELETE SET NULL,
            lead_id TEXT REFERENCES leads(id) ON DELETE SET NULL,
            amount_cents INTEGER NOT NULL,
            currency TEXT NOT NULL,
            reference TEXT,
            paid_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS rules (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            trigger_tag TEXT NOT NULL,
            action_json TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS templates (
            name TEXT PRIMARY KEY,
            body TEXT NOT NULL
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            rule_id TEXT,
            subject TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL,
            read_at TEXT
        )",
        [],
    )?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS automation_handled (
            rule_id TEXT NOT NULL,
            subject_kind TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            handled_at TEXT NOT NULL,
            PRIMARY KEY (rule_id, subject_kind, subject_id)
        )",
        [],
    )?;

    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_interactions_lead_ts ON interactions(lead_id, timestamp)",
        [],
    )?;
    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_prospects_agent ON prospects(agent_id)",
        [],
    )?;
    db.execute(
        "CREATE INDEX IF NOT EXISTS idx_appointments_starts ON appointments(starts_at)",
        [],
    )?;

    Ok(())
}

/// Turn an empty-or-missing optional text into a trimmed `Option`.
pub(crate) fn clean_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
