use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "immocrm.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub automation: AutomationConfig,

    #[serde(default)]
    pub sms: SmsConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Relative paths resolve against the data directory.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    #[serde(default = "default_scan_window_days")]
    pub scan_window_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    /// When unset, messages are only logged.
    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub gateway_token: Option<String>,
    #[serde(default = "default_sender")]
    pub sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    17880
}
fn default_true() -> bool {
    true
}
fn default_interval_secs() -> u64 {
    300
}
fn default_cooldown_minutes() -> i64 {
    15
}
fn default_scan_window_days() -> i64 {
    7
}
fn default_sender() -> String {
    "Agence".to_string()
}
fn default_session_ttl_hours() -> i64 {
    24 * 7
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            automation: AutomationConfig::default(),
            sms: SmsConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            cooldown_minutes: default_cooldown_minutes(),
            scan_window_days: default_scan_window_days(),
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            gateway_token: None,
            sender: default_sender(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

impl CrmConfig {
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join(CONFIG_FILE);
        if !config_path.exists() {
            info!("No {} found, using defaults.", CONFIG_FILE);
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&config_path).await?;
        let mut config: CrmConfig = toml::from_str(&content)?;
        config.sanitize();

        info!(
            "Loaded config: server={}:{}, automation={} every {}s, sms_gateway={}",
            config.server.host,
            config.server.port,
            config.automation.enabled,
            config.automation.interval_secs,
            config.sms.gateway_url.is_some()
        );
        Ok(config)
    }

    /// Clamp values that would stall or flood the automation loop.
    fn sanitize(&mut self) {
        if self.automation.interval_secs < 10 {
            warn!(
                "automation.interval_secs={} is too small, using 10",
                self.automation.interval_secs
            );
            self.automation.interval_secs = 10;
        }
        if self.automation.cooldown_minutes < 0 {
            self.automation.cooldown_minutes = 0;
        }
        if self.automation.scan_window_days < 1 {
            self.automation.scan_window_days = 1;
        }
        if self.auth.session_ttl_hours < 1 {
            self.auth.session_ttl_hours = 1;
        }
        if let Some(url) = &self.sms.gateway_url
            && url.trim().is_empty()
        {
            self.sms.gateway_url = None;
        }
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        match &self.database.path {
            Some(p) if Path::new(p).is_absolute() => PathBuf::from(p),
            Some(p) => data_dir.join(p),
            None => data_dir.join("immocrm.db"),
        }
    }
}
