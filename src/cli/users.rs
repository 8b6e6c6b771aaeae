use anyhow::Result;
use chrono::Utc;
use console::style;

use super::{Workspace, flag_value, positionals};
use crate::core::store::types::Role;
use crate::core::terminal::{GuideSection, print_error, print_success};

pub async fn run_user_command(workspace: &Workspace, args: &[String]) -> Result<()> {
    let rest = positionals(args, 2);
    let sub_cmd = rest.first().map(String::as_str).unwrap_or("");

    match sub_cmd {
        "add" | "create" => {
            let Some(username) = rest.get(1) else {
                print_error("Usage: immocrm user add <username> --password <password> [--role agent|operator] [--name <display name>]");
                return Ok(());
            };
            let password = flag_value(args, 2, "--password")
                .or_else(|| std::env::var("IMMOCRM_PASSWORD").ok())
                .unwrap_or_default();
            let role_arg = flag_value(args, 2, "--role").unwrap_or_else(|| "agent".into());
            let Some(role) = Role::from_role(&role_arg) else {
                print_error(&format!(
                    "Unknown role '{}'. Expected agent or operator.",
                    role_arg
                ));
                return Ok(());
            };
            let display_name = flag_value(args, 2, "--name").unwrap_or_default();

            let store = workspace.open_store().await?;
            match store
                .create_user(username, &display_name, role, &password, Utc::now())
                .await?
            {
                Some(user) => print_success(&format!(
                    "User {} created ({}, id {}).",
                    style(&user.username).bold(),
                    user.role.as_str(),
                    user.id
                )),
                None => print_error(&format!("Username '{}' is already taken.", username)),
            }
        }
        "list" | "ls" => {
            let store = workspace.open_store().await?;
            let users = store.list_users().await?;
            if users.is_empty() {
                println!("  No users yet. Create one with `immocrm user add <username>`.");
                return Ok(());
            }
            let mut section = GuideSection::new("Users");
            for user in &users {
                section = section.status(
                    &user.username,
                    &format!("{} ({})", user.display_name, user.role.as_str()),
                );
            }
            section.print();
        }
        _ => {
            print_error("Unknown or missing user command. Expected: add, list");
        }
    }
    Ok(())
}
