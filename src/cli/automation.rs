use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use super::Workspace;
use super::serve::build_engine;
use crate::core::automation::defaults::seed_defaults;
use crate::core::clock::{Clock, SystemClock};
use crate::core::terminal::{GuideSection, print_success};

/// One cycle against the configured database, then exit.
pub async fn run_once(workspace: &Workspace) -> Result<()> {
    let store = workspace.open_store().await?;
    seed_defaults(&store, Utc::now()).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = build_engine(workspace, &store, clock)?;

    let report = engine.run_cycle().await;
    GuideSection::new("Automation cycle")
        .status("Rules evaluated", &report.rules_evaluated.to_string())
        .status("Matches", &report.matches.to_string())
        .status("Actions executed", &report.actions_executed.to_string())
        .status("Skipped", &report.skipped.to_string())
        .status("Errors", &report.errors.to_string())
        .print();
    print_success(&format!("Cycle finished at {}", report.finished_at));
    Ok(())
}
