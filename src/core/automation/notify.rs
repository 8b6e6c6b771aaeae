use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::core::store::CrmStore;

/// Where `notify_operator` steps end up.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(
        &self,
        rule_id: &str,
        subject: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;
}

/// Files the notice in the operator's notification panel.
pub struct StoreNotifier {
    store: CrmStore,
}

impl StoreNotifier {
    pub fn new(store: CrmStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OperatorNotifier for StoreNotifier {
    async fn notify(
        &self,
        rule_id: &str,
        subject: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let notification = self
            .store
            .add_notification(Some(rule_id), subject, message, now)
            .await?;
        info!(id = %notification.id, rule = %rule_id, "Operator notified: {}", subject);
        Ok(())
    }
}
