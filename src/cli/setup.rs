use anyhow::{Context, Result};
use chrono::Utc;

use super::Workspace;
use crate::core::automation::defaults::seed_defaults;
use crate::core::config::CONFIG_FILE;
use crate::core::terminal::{GuideSection, print_info, print_success};
use crate::platform::{NativePlatform, Platform};

const DEFAULT_CONFIG: &str = r#"log_level = "info"

[server]
host = "127.0.0.1"
port = 17880

[automation]
enabled = true
interval_secs = 300
cooldown_minutes = 15
scan_window_days = 7

[sms]
# gateway_url = "https://sms.example.com/send"
# gateway_token = ""
sender = "Agence"

[auth]
session_ttl_hours = 168
"#;

pub async fn run_init(workspace: &Workspace) -> Result<()> {
    let data_dir = &workspace.data_dir;
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    NativePlatform::restrict_dir_permissions(data_dir);

    let config_path = data_dir.join(CONFIG_FILE);
    if config_path.exists() {
        print_info(&format!("Keeping existing {}", config_path.display()));
    } else {
        tokio::fs::write(&config_path, DEFAULT_CONFIG).await?;
        NativePlatform::restrict_file_permissions(&config_path);
        print_success(&format!("Wrote {}", config_path.display()));
    }

    let store = workspace.open_store().await?;
    let (rules, templates) = seed_defaults(&store, Utc::now()).await?;
    print_success(&format!(
        "Database ready at {} ({} rules and {} templates added)",
        workspace.config.database_path(data_dir).display(),
        rules,
        templates
    ));

    GuideSection::new("Next steps")
        .command(
            "immocrm user add <username> --role operator --password <password>",
            "Create the first operator",
        )
        .command("immocrm serve", "Start the API")
        .print();
    Ok(())
}
