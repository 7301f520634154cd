use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;

/// One delivery fee band: the fee applies while `max_km` is not exceeded
/// (inclusive upper bound). Bands are matched in ascending order of
/// `max_km`; distances beyond the last band fall to `beyond_fee`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DeliveryBand {
    pub max_km: f64,
    pub fee: Decimal,
}

/// Delivery pricing policy. The band table and thresholds are business
/// configuration, never compiled in: past revisions of the policy have
/// disagreed with each other, so the deployed values must be deliberate.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct DeliveryConfig {
    /// Store location used as the origin of every distance quote.
    pub store_latitude: f64,
    pub store_longitude: f64,

    /// Ascending distance bands; the smallest band must carry a zero fee
    /// (a local radius always delivers free).
    #[serde(default = "default_bands")]
    pub bands: Vec<DeliveryBand>,

    /// Fee for destinations beyond the last band.
    #[serde(default = "default_beyond_fee")]
    pub beyond_fee: Decimal,

    /// Flat fee applied when the destination has no usable coordinates.
    #[serde(default = "default_flat_fee")]
    pub flat_fallback_fee: Decimal,

    /// Small-cart surcharge: added when the order subtotal is below
    /// `small_cart_threshold`. Distinct from the distance banding.
    #[serde(default = "default_small_cart_threshold")]
    pub small_cart_threshold: Decimal,
    #[serde(default = "default_small_cart_surcharge")]
    pub small_cart_surcharge: Decimal,
}

fn default_bands() -> Vec<DeliveryBand> {
    vec![
        DeliveryBand { max_km: 5.0, fee: Decimal::ZERO },
        DeliveryBand { max_km: 8.0, fee: Decimal::from(40) },
        DeliveryBand { max_km: 12.0, fee: Decimal::from(60) },
    ]
}

fn default_beyond_fee() -> Decimal {
    Decimal::from(100)
}

fn default_flat_fee() -> Decimal {
    Decimal::from(40)
}

fn default_small_cart_threshold() -> Decimal {
    Decimal::from(350)
}

fn default_small_cart_surcharge() -> Decimal {
    Decimal::from(40)
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            store_latitude: 0.0,
            store_longitude: 0.0,
            bands: default_bands(),
            beyond_fee: default_beyond_fee(),
            flat_fallback_fee: default_flat_fee(),
            small_cart_threshold: default_small_cart_threshold(),
            small_cart_surcharge: default_small_cart_surcharge(),
        }
    }
}

impl DeliveryConfig {
    /// Bands must be strictly ascending and the smallest band free.
    pub fn validate_bands(&self) -> Result<(), ConfigError> {
        if self.bands.is_empty() {
            return Err(ConfigError::Message(
                "delivery.bands must not be empty".into(),
            ));
        }
        for pair in self.bands.windows(2) {
            if pair[1].max_km <= pair[0].max_km {
                return Err(ConfigError::Message(format!(
                    "delivery.bands must be ascending: {} km follows {} km",
                    pair[1].max_km, pair[0].max_km
                )));
            }
        }
        if self.bands[0].fee != Decimal::ZERO {
            return Err(ConfigError::Message(
                "the smallest delivery band must have a zero fee".into(),
            ));
        }
        Ok(())
    }
}

/// Application configuration, layered from config files and the
/// `APP__`-prefixed environment.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret for verifying bearer tokens issued by the identity
    /// service (token issuance itself lives elsewhere).
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool sizing
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Capacity of the in-process order event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// External admin system webhook for order events; unset disables
    /// outbound notification entirely.
    #[serde(default)]
    pub order_webhook_url: Option<String>,

    /// Timeout for a single webhook delivery attempt.
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,

    /// Delivery fee policy
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
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

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_webhook_timeout_secs() -> u64 {
    DEFAULT_WEBHOOK_TIMEOUT_SECS
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// Loads configuration from `config/default.toml`, an optional
/// per-environment file, and `APP__*` environment variables (later
/// layers win).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", run_env.clone())?
        .add_source(File::from(Path::new(CONFIG_DIR).join("default")).required(false))
        .add_source(File::from(Path::new(CONFIG_DIR).join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    // Bare DATABASE_URL wins over the layered sources, matching how the
    // service is deployed.
    if let Ok(url) = std::env::var("DATABASE_URL") {
        builder = builder.set_override("database_url", url)?;
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;
    cfg.delivery.validate_bands()?;

    Ok(cfg)
}

/// Initializes the tracing subscriber once for the process.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
