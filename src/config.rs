use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "APP";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const DEV_DEFAULT_JWT_SECRET: &str = "kedai_development_secret_key_at_least_32_chars";

/// Runtime settings, layered from `config/default.toml`, `config/{RUN_ENV}.toml`
/// and `APP__*` environment variables. Missing keys fall back to [`Default`].
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,

    /// HS256 secret shared with the identity provider
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,

    pub host: String,
    pub port: u16,
    pub environment: String,

    #[validate(custom = "validate_log_level")]
    pub log_level: String,
    pub log_json: bool,
    pub auto_migrate: bool,

    /// Comma-separated origins; required outside development unless `cors_allow_any_origin`
    pub cors_allowed_origins: Option<String>,
    pub cors_allow_any_origin: bool,

    #[validate(range(min = 1))]
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub db_idle_timeout_secs: u64,
    pub db_acquire_timeout_secs: u64,

    /// Directory backing the payment proof bucket
    pub storage_root: String,
    pub storage_public_base_url: String,

    /// Hours a customer has to pay before the sweeper cancels the purchase
    #[validate(range(min = 1, max = 720))]
    pub payment_deadline_hours: i64,
    #[validate(range(min = 1))]
    pub max_proof_size_bytes: usize,

    pub settings_cache_ttl_secs: u64,
    #[validate(range(min = 1))]
    pub settings_fetch_timeout_ms: u64,

    /// 0 disables the overdue payment and idle session sweeper
    pub expiry_sweep_interval_secs: u64,
    /// Carts and unconsumed checkout drafts idle this long are evicted
    #[validate(range(min = 60))]
    pub session_idle_ttl_secs: u64,
    pub max_body_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://kedai.db?mode=rwc".to_string(),
            jwt_secret: String::new(),
            jwt_issuer: None,
            jwt_audience: None,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: 16,
            db_min_connections: 2,
            db_connect_timeout_secs: 30,
            db_idle_timeout_secs: 600,
            db_acquire_timeout_secs: 8,
            storage_root: "./storage".to_string(),
            storage_public_base_url: "http://localhost:8080/files".to_string(),
            payment_deadline_hours: 24,
            max_proof_size_bytes: 5 * 1024 * 1024,
            settings_cache_ttl_secs: 60,
            settings_fetch_timeout_ms: 3_000,
            expiry_sweep_interval_secs: 300,
            session_idle_ttl_secs: 86_400,
            max_body_size: 8 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Defaults plus the three values every deployment must choose.
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            jwt_secret,
            environment,
            host: "127.0.0.1".to_string(),
            ..Self::default()
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEFAULT_ENV)
    }

    /// Configured CORS origins, blanks dropped.
    pub fn cors_origins(&self) -> Vec<&str> {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn settings_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.settings_cache_ttl_secs)
    }

    pub fn settings_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.settings_fetch_timeout_ms)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    /// Cross-field rules the derive cannot express.
    fn check_deployment_rules(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut reject = |field: &'static str, code: &'static str, message: &'static str| {
            let mut err = ValidationError::new(code);
            err.message = Some(message.into());
            errors.add(field, err);
        };

        if !self.should_allow_permissive_cors() && self.cors_origins().is_empty() {
            reject(
                "cors_allowed_origins",
                "cors_origins_missing",
                "Set APP__CORS_ALLOWED_ORIGINS, or APP__CORS_ALLOW_ANY_ORIGIN=true to opt out",
            );
        }
        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            reject(
                "jwt_secret",
                "jwt_secret_dev_default",
                "The development JWT secret is only accepted in development",
            );
        }
        if self.db_min_connections > self.db_max_connections {
            reject(
                "db_min_connections",
                "db_pool_bounds",
                "db_min_connections must not exceed db_max_connections",
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Ok(());
    }
    let mut err = ValidationError::new("log_level");
    err.message = Some(format!("Must be one of: {}", LOG_LEVELS.join(", ")).into());
    Err(err)
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();
    let placeholder = ["changeme", "secret", "your-secret-key"]
        .iter()
        .any(|p| trimmed.eq_ignore_ascii_case(p));
    let single_char = trimmed
        .chars()
        .next()
        .map(|first| trimmed.chars().all(|c| c == first))
        .unwrap_or(false);

    if placeholder || single_char {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be a real random value".into());
        return Err(err);
    }
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(format!("kedai_api={level},tower_http=debug")));

    let builder = fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!(environment = %run_env, "loading configuration");

    if !Path::new(CONFIG_DIR).exists() {
        warn!(dir = CONFIG_DIR, "config directory missing; using defaults and environment only");
    }

    let config = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    // No usable default exists for the signing secret.
    if config.get_string("jwt_secret").is_err() {
        error!("jwt_secret is not configured; set APP__JWT_SECRET");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret (APP__JWT_SECRET)".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;
    app_config
        .validate()
        .and_then(|_| app_config.check_deployment_rules())
        .map_err(|e| {
            error!(errors = ?e, "configuration rejected");
            AppConfigError::Validation(e)
        })?;

    info!(
        environment = %app_config.environment,
        port = app_config.port,
        "configuration loaded"
    );
    Ok(app_config)
}
