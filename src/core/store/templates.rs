use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use super::CrmStore;
use super::types::Template;

impl CrmStore {
    pub async fn upsert_template(&self, name: &str, body: &str) -> Result<Template> {
        let template = Template {
            name: name.trim().to_string(),
            body: body.to_string(),
        };
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO templates (name, body) VALUES (?1, ?2)",
            params![template.name, template.body],
        )?;
        Ok(template)
    }

    /// Insert only when `name` is free. Returns whether a row was written.
    pub async fn insert_template_if_missing(&self, name: &str, body: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "INSERT OR IGNORE INTO templates (name, body) VALUES (?1, ?2)",
            params![name, body],
        )?;
        Ok(rows > 0)
    }

    pub async fn get_template(&self, name: &str) -> Result<Option<Template>> {
        let db = self.db.lock().await;
        let template = db
            .query_row(
                "SELECT name, body FROM templates WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Template {
                        name: row.get(0)?,
                        body: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(template)
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT name, body FROM templates ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Template {
                name: row.get(0)?,
                body: row.get(1)?,
            })
        })?;
        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?);
        }
        Ok(templates)
    }

    pub async fn delete_template(&self, name: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM templates WHERE name = ?1", params![name])?;
        Ok(rows > 0)
    }
}
