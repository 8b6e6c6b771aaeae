use anyhow::Result;
use console::style;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::Workspace;
use crate::core::automation::defaults::seed_defaults;
use crate::core::automation::notify::StoreNotifier;
use crate::core::automation::sms::{self, SmsSender};
use crate::core::automation::{AutomationEngine, AutomationRunner, AutomationSettings};
use crate::core::clock::{Clock, SystemClock};
use crate::core::lifecycle::LifecycleManager;
use crate::core::terminal::GuideSection;
use crate::interfaces::web::{ApiServer, ApiServerConfig};

/// Wire the automation engine for this workspace.
pub(crate) fn build_engine(
    workspace: &Workspace,
    store: &crate::core::store::CrmStore,
    clock: Arc<dyn Clock>,
) -> Result<AutomationEngine> {
    let sender: Arc<dyn SmsSender> = Arc::from(sms::from_config(&workspace.config.sms)?);
    Ok(AutomationEngine::new(
        store.clone(),
        clock,
        sender,
        Arc::new(StoreNotifier::new(store.clone())),
        AutomationSettings::from_config(&workspace.config),
    ))
}

pub async fn run_serve(
    workspace: &Workspace,
    host: String,
    port: u16,
    log_tx: tokio::sync::broadcast::Sender<String>,
) -> Result<()> {
    let store = workspace.open_store().await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    seed_defaults(&store, clock.now()).await?;
    let engine = build_engine(workspace, &store, clock.clone())?;

    let automation = &workspace.config.automation;
    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(ApiServerConfig {
        store: store.clone(),
        automation: engine.clone(),
        automation_enabled: automation.enabled,
        clock: clock.clone(),
        log_tx,
        session_ttl: chrono::Duration::hours(workspace.config.auth.session_ttl_hours),
        api_host: host.clone(),
        api_port: port,
    }))));
    if automation.enabled {
        lifecycle.attach(Arc::new(Mutex::new(AutomationRunner::new(
            engine,
            std::time::Duration::from_secs(automation.interval_secs),
        ))));
    } else {
        info!("Automation runner disabled in config");
    }

    lifecycle.start().await?;

    GuideSection::new("immocrm")
        .status(
            "API",
            &format!(
                "{}",
                style(format!("http://{}:{}/api", host, port))
                    .underlined()
                    .cyan()
            ),
        )
        .status("Data", &workspace.data_dir.display().to_string())
        .status(
            "Automation",
            &if automation.enabled {
                format!("every {}s", automation.interval_secs)
            } else {
                "disabled".to_string()
            },
        )
        .blank()
        .status("Stop", &format!("{}", style("Ctrl+C").bold().yellow()))
        .print();
    println!();

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    Ok(())
}
