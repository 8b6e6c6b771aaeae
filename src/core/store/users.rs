use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, Row, params};
use sha2::{Digest, Sha256};

use super::CrmStore;
use super::types::{Role, SessionRecord, User};
use crate::core::clock::format_ts;

const HASH_SCHEME: &str = "argon2id";
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_raw_token() -> String {
    let bytes: [u8; 24] = rand::random();
    format!("icrm_{}", hex::encode(bytes))
}

fn argon2() -> Result<argon2::Argon2<'static>> {
    let params = argon2::Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(32),
    )
    .map_err(|e| anyhow!("invalid Argon2id parameters: {e}"))?;
    Ok(argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// `argon2id$<salt hex>$<hash hex>`
fn hash_password(password: &str) -> Result<String> {
    let salt: [u8; 16] = rand::random();
    let mut output = [0u8; 32];
    argon2()?
        .hash_password_into(password.as_bytes(), &salt, &mut output)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(format!(
        "{}${}${}",
        HASH_SCHEME,
        hex::encode(salt),
        hex::encode(output)
    ))
}

fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let mut parts = stored.splitn(3, '$');
    let (Some(HASH_SCHEME), Some(salt_hex), Some(hash_hex)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Ok(false);
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return Ok(false);
    };
    let mut output = vec![0u8; expected.len()];
    argon2()?
        .hash_password_into(password.as_bytes(), &salt, &mut output)
        .map_err(|e| anyhow!("password verification failed: {e}"))?;

    // Compare without short-circuiting on the first differing byte.
    let diff = output
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    Ok(diff == 0)
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        role: Role::from_role(&role).unwrap_or(Role::Agent),
        created_at: row.get(4)?,
    })
}

const USER_COLUMNS: &str = "id, username, display_name, role, created_at";

impl CrmStore {
    /// Returns `None` when the username is already taken.
    pub async fn create_user(
        &self,
        username: &str,
        display_name: &str,
        role: Role,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let username = username.trim();
        if username.is_empty() {
            anyhow::bail!("username is required");
        }
        if password.len() < 8 {
            anyhow::bail!("password must be at least 8 characters");
        }
        let password_hash = hash_password(password)?;
        let display_name = match display_name.trim() {
            "" => username,
            name => name,
        };

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            role,
            created_at: format_ts(now),
        };

        let db = self.db.lock().await;
        let inserted = db.execute(
            "INSERT OR IGNORE INTO users (id, username, display_name, role, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.username,
                user.display_name,
                user.role.as_str(),
                password_hash,
                user.created_at
            ],
        )?;
        Ok((inserted > 0).then_some(user))
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let db = self.db.lock().await;
        let user = db
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {} FROM users ORDER BY username ASC",
            USER_COLUMNS
        ))?;
        let rows = stmt.query_map([], user_from_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Check a username/password pair. Unknown users and wrong passwords both yield `None`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let found = {
            let db = self.db.lock().await;
            db.query_row(
                &format!(
                    "SELECT {}, password_hash FROM users WHERE username = ?1",
                    USER_COLUMNS
                ),
                params![username.trim()],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(5)?)),
            )
            .optional()?
        };

        let Some((user, stored)) = found else {
            return Ok(None);
        };
        if verify_password(password, &stored)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Issue a session. The raw token is returned once and only its hash is kept.
    pub async fn create_session(
        &self,
        user_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(String, SessionRecord)> {
        let raw_token = generate_raw_token();
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: format_ts(now),
            expires_at: format_ts(now + ttl),
        };

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.user_id,
                hash_token(&raw_token),
                record.created_at,
                record.expires_at
            ],
        )?;
        Ok((raw_token, record))
    }

    /// Resolve a bearer token to its user, ignoring expired sessions.
    pub async fn user_for_token(&self, raw_token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let db = self.db.lock().await;
        let user = db
            .query_row(
                "SELECT u.id, u.username, u.display_name, u.role, u.created_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2",
                params![hash_token(raw_token), format_ts(now)],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub async fn delete_session(&self, raw_token: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![hash_token(raw_token)],
        )?;
        Ok(rows > 0)
    }

    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![format_ts(now)],
        )?;
        Ok(rows)
    }
}
