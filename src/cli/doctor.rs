use anyhow::Result;
use console::style;

use super::Workspace;
use crate::core::config::CONFIG_FILE;
use crate::core::terminal::{print_error, print_info, print_success, print_warn};

/// Check the workspace and report what needs attention.
/// Returns `true` when nothing blocks `immocrm serve`.
pub async fn check_workspace(workspace: &Workspace) -> Result<bool> {
    let mut healthy = true;
    let data_dir = &workspace.data_dir;

    if data_dir.is_dir() {
        print_success(&format!("Data directory: {}", data_dir.display()));
    } else {
        print_error(&format!(
            "Data directory {} does not exist. Run `immocrm init`.",
            data_dir.display()
        ));
        return Ok(false);
    }

    if data_dir.join(CONFIG_FILE).exists() {
        print_success(&format!("{} parsed", CONFIG_FILE));
    } else {
        print_info(&format!("No {}, running on defaults", CONFIG_FILE));
    }

    // Database
    match workspace.open_store().await {
        Ok(store) => {
            print_success(&format!(
                "Database opened: {}",
                workspace.config.database_path(data_dir).display()
            ));
            let users = store.list_users().await?;
            if users.is_empty() {
                print_warn("No users yet. Create one with `immocrm user add`.");
            } else if !users.iter().any(|u| u.is_operator()) {
                print_warn("No operator account: rules and templates cannot be edited.");
            } else {
                print_success(&format!("{} users", users.len()));
            }
            let rules = store.count_rules().await?;
            if rules == 0 {
                print_warn("No automation rules. `immocrm init` seeds the defaults.");
            } else {
                print_success(&format!("{} automation rules", rules));
            }
        }
        Err(e) => {
            print_error(&format!("Database cannot be opened: {:#}", e));
            healthy = false;
        }
    }

    // SMS
    let sms = &workspace.config.sms;
    match &sms.gateway_url {
        None => print_info("No SMS gateway configured: messages are only logged."),
        Some(url) => match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                print_success(&format!("SMS gateway: {}", parsed));
                if sms.gateway_token.is_none() {
                    print_warn("sms.gateway_token is not set.");
                }
            }
            _ => {
                print_error(&format!("sms.gateway_url is not an http(s) URL: {}", url));
                healthy = false;
            }
        },
    }

    // Listening port
    let server = &workspace.config.server;
    let addr = format!("{}:{}", server.host, server.port);
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(_) => print_success(&format!("Port {} is free", addr)),
        Err(e) => print_warn(&format!(
            "Cannot bind {} ({}). Is immocrm already running?",
            addr, e
        )),
    }

    Ok(healthy)
}

pub async fn run_doctor(workspace: &Workspace) -> Result<()> {
    println!("\n  {}\n", style("immocrm doctor").bold().cyan());
    if check_workspace(workspace).await? {
        println!();
        print_success("Everything needed to serve is in place.");
    } else {
        println!();
        print_error("Fix the errors above before running `immocrm serve`.");
    }
    Ok(())
}
