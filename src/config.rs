use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_PSP_TIMEOUT_SECS: u64 = 10;
// Test key only; production deployments must override via APP__ENCRYPTION_KEY.
const DEV_DEFAULT_ENCRYPTION_KEY: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// PSP (KakaoPay) connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct PspConfig {
    #[serde(default = "default_psp_base_url")]
    pub base_url: String,

    /// Merchant code issued by the PSP.
    #[serde(default = "default_psp_cid")]
    pub cid: String,

    /// Secret key sent in the Authorization header.
    #[serde(default)]
    pub secret_key: String,

    /// Request timeout. A timeout during approve is the net-cancel trigger,
    /// so this must always be explicit.
    #[serde(default = "default_psp_timeout_secs")]
    pub timeout_secs: u64,
}

impl PspConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PspConfig {
    fn default() -> Self {
        Self {
            base_url: default_psp_base_url(),
            cid: default_psp_cid(),
            secret_key: String::new(),
            timeout_secs: default_psp_timeout_secs(),
        }
    }
}

fn default_psp_base_url() -> String {
    "https://open-api.kakaopay.com".to_string()
}

fn default_psp_cid() -> String {
    // KakaoPay's shared test merchant code.
    "TC0ONETIME".to_string()
}

fn default_psp_timeout_secs() -> u64 {
    DEFAULT_PSP_TIMEOUT_SECS
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Database connection URL (Postgres or SQLite)
    pub database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Hex-encoded 32-byte AES-256-GCM key for ledger field encryption.
    #[serde(default = "default_encryption_key")]
    pub encryption_key: String,

    /// Checkout session TTL in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default)]
    pub psp: PspConfig,
}

impl AppConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Decodes the configured encryption key, enforcing the 32-byte length
    /// AES-256-GCM requires.
    pub fn encryption_key_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        let bytes = hex::decode(self.encryption_key.trim())
            .map_err(|e| ConfigError::Message(format!("encryption_key is not valid hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(ConfigError::Message(format!(
                "encryption_key must decode to 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_encryption_key() -> String {
    DEV_DEFAULT_ENCRYPTION_KEY.to_string()
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

/// Loads configuration from `config/default` plus an environment-specific
/// file, with `APP__`-prefixed environment variables taking precedence
/// (e.g. `APP__PSP__SECRET_KEY`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_default("database_url", "sqlite::memory:")?
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;

    if app_config.is_production() && app_config.encryption_key == DEV_DEFAULT_ENCRYPTION_KEY {
        return Err(ConfigError::Message(
            "refusing to start in production with the default encryption key".to_string(),
        ));
    }

    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("checkout_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
