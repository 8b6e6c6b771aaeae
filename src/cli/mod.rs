mod automation;
mod data;
mod doctor;
mod serve;
mod setup;
mod users;

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use crate::core::config::CrmConfig;
use crate::core::store::CrmStore;
use crate::core::terminal::{self, GuideSection, print_error};
use crate::platform::{NativePlatform, Platform};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Core")
        .command("serve", "Start the REST API and the automation runner")
        .command("automation run-once", "Run a single automation cycle and exit")
        .print();

    GuideSection::new("Setup")
        .command("init", "Create the data directory, config and default rules")
        .command("user add <username>", "Create a user (--password, --role, --name)")
        .command("user list", "List users")
        .print();

    GuideSection::new("Data")
        .command("export", "Write prospects as CSV (--out <file>, --agent <username>)")
        .command("import <file>", "Import prospects from CSV (--user <username>)")
        .command("ics <appointment-id>", "Write an appointment as .ics (--out <file>)")
        .print();

    GuideSection::new("Diagnostics")
        .command("doctor", "Check config, database and SMS gateway settings")
        .print();

    println!(
        "\n {} {} <command> [--data-dir <path>] [--host <host>] [--port <port>]\n",
        style("Usage:").bold(),
        style("immocrm").green()
    );
}

/// Value following `name`, if any.
pub(crate) fn flag_value(args: &[String], start: usize, name: &str) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        if args[i] == name {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

/// Positional arguments from `start`, skipping `--flag value` pairs.
pub(crate) fn positionals(args: &[String], start: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = start;
    while i < args.len() {
        if args[i].starts_with("--") {
            i += 2;
        } else {
            out.push(args[i].clone());
            i += 1;
        }
    }
    out
}

pub(crate) fn parse_server_flags(
    args: &[String],
    start: usize,
    mut host: String,
    mut port: u16,
) -> Result<(String, u16)> {
    if let Some(h) = flag_value(args, start, "--host") {
        host = h;
    }
    if let Some(p) = flag_value(args, start, "--port") {
        port = p
            .parse()
            .map_err(|_| anyhow::anyhow!("--port expects a number, got '{}'", p))?;
    }
    Ok((host, port))
}

/// Data directory plus the config loaded from it.
pub(crate) struct Workspace {
    pub data_dir: PathBuf,
    pub config: CrmConfig,
}

impl Workspace {
    async fn load(args: &[String]) -> Result<Self> {
        let data_dir = match flag_value(args, 1, "--data-dir") {
            Some(dir) => PathBuf::from(dir),
            None => NativePlatform::data_dir(),
        };
        let config = CrmConfig::load(&data_dir).await?;
        Ok(Self { data_dir, config })
    }

    pub async fn open_store(&self) -> Result<CrmStore> {
        CrmStore::open(self.config.database_path(&self.data_dir)).await
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(cmd) = args.get(1).map(String::as_str) else {
        print_help();
        return Ok(());
    };
    if matches!(cmd, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let workspace = Workspace::load(&args).await?;
    // Only long-running commands print log lines; the others keep stdout for their output.
    let verbose = matches!(cmd, "serve" | "automation");
    let log_tx = crate::logging::init(&workspace.config.log_level, !verbose);

    match cmd {
        "serve" => {
            let (host, port) = parse_server_flags(
                &args,
                2,
                workspace.config.server.host.clone(),
                workspace.config.server.port,
            )?;
            serve::run_serve(&workspace, host, port, log_tx).await
        }
        "init" => setup::run_init(&workspace).await,
        "automation" => match args.get(2).map(String::as_str) {
            Some("run-once") => automation::run_once(&workspace).await,
            _ => {
                print_error("Unknown or missing automation command. Expected: run-once");
                Ok(())
            }
        },
        "user" | "users" => users::run_user_command(&workspace, &args).await,
        "export" => data::run_export(&workspace, &args).await,
        "import" => data::run_import(&workspace, &args).await,
        "ics" => data::run_ics(&workspace, &args).await,
        "doctor" => doctor::run_doctor(&workspace).await,
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
            Ok(())
        }
    }
}
