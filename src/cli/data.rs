use anyhow::{Context, Result};
use chrono::Utc;

use super::{Workspace, flag_value, positionals};
use crate::core::export::ics::appointment_ics;
use crate::core::export::prospects_csv::{read_prospects, write_prospects};
use crate::core::store::CrmStore;
use crate::core::store::types::User;
use crate::core::terminal::{print_error, print_success};

async fn find_user(store: &CrmStore, username: &str) -> Result<Option<User>> {
    Ok(store
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.username == username))
}

/// Writes to `--out` when given, stdout otherwise.
async fn emit(args: &[String], content: &str, what: &str) -> Result<()> {
    match flag_value(args, 2, "--out") {
        Some(path) => {
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write {}", path))?;
            print_success(&format!("{} written to {}", what, path));
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub async fn run_export(workspace: &Workspace, args: &[String]) -> Result<()> {
    let store = workspace.open_store().await?;
    let agent_id = match flag_value(args, 2, "--agent") {
        Some(username) => match find_user(&store, &username).await? {
            Some(user) => Some(user.id),
            None => {
                print_error(&format!("No user named '{}'.", username));
                return Ok(());
            }
        },
        None => None,
    };

    let prospects = store.list_prospects(agent_id.as_deref()).await?;
    let csv = write_prospects(&prospects)?;
    emit(args, &csv, &format!("{} prospects", prospects.len())).await
}

pub async fn run_import(workspace: &Workspace, args: &[String]) -> Result<()> {
    let Some(path) = positionals(args, 2).into_iter().next() else {
        print_error("Usage: immocrm import <file.csv> --user <username>");
        return Ok(());
    };
    let Some(username) = flag_value(args, 2, "--user") else {
        print_error("Imported prospects need an owner: pass --user <username>.");
        return Ok(());
    };

    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let rows = read_prospects(&data)?;

    let store = workspace.open_store().await?;
    let Some(owner) = find_user(&store, &username).await? else {
        print_error(&format!("No user named '{}'.", username));
        return Ok(());
    };

    let now = Utc::now();
    let count = rows.len();
    for fields in rows {
        store.create_prospect(&owner.id, fields, now).await?;
    }
    print_success(&format!(
        "Imported {} prospects for {}.",
        count, owner.username
    ));
    Ok(())
}

pub async fn run_ics(workspace: &Workspace, args: &[String]) -> Result<()> {
    let Some(id) = positionals(args, 2).into_iter().next() else {
        print_error("Usage: immocrm ics <appointment-id> [--out <file.ics>]");
        return Ok(());
    };
    let store = workspace.open_store().await?;
    let Some(appointment) = store.get_appointment(&id).await? else {
        print_error(&format!("Appointment {} not found.", id));
        return Ok(());
    };
    let ics = appointment_ics(&appointment, Utc::now());
    emit(args, &ics, "Calendar event").await
}
