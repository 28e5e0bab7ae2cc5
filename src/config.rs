use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env as std_env;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_ATTEMPT_RETENTION_SECS: u64 = 3600;

/// Pricing configuration: tax and shipping parameters applied by the
/// pricing calculator. Monetary values are in major currency units.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// ISO currency code used for orders and gateway amounts
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    /// Tax rate applied to (subtotal - discount + shipping), e.g. 0.18
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// Subtotal at or above which standard shipping becomes free
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Decimal,

    /// Flat fee for standard shipping (waived above the threshold)
    #[serde(default = "default_standard_shipping_fee")]
    pub standard_shipping_fee: Decimal,

    /// Flat fee for express shipping (never waived)
    #[serde(default = "default_express_shipping_fee")]
    pub express_shipping_fee: Decimal,

    /// Flat fee for same-day shipping (never waived)
    #[serde(default = "default_same_day_shipping_fee")]
    pub same_day_shipping_fee: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            tax_rate: default_tax_rate(),
            free_shipping_threshold: default_free_shipping_threshold(),
            standard_shipping_fee: default_standard_shipping_fee(),
            express_shipping_fee: default_express_shipping_fee(),
            same_day_shipping_fee: default_same_day_shipping_fee(),
        }
    }
}

/// Connection settings for an external collaborator service.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL of the upstream service
    #[validate(url)]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

/// Package dimensions forwarded verbatim to the shipment collaborator.
/// Dimensions are configured, not derived from cart contents.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDefaults {
    #[serde(default = "default_package_length")]
    pub length_cm: Decimal,
    #[serde(default = "default_package_width")]
    pub width_cm: Decimal,
    #[serde(default = "default_package_height")]
    pub height_cm: Decimal,
    #[serde(default = "default_package_weight")]
    pub weight_kg: Decimal,
}

impl Default for PackageDefaults {
    fn default() -> Self {
        Self {
            length_cm: default_package_length(),
            width_cm: default_package_width(),
            height_cm: default_package_height(),
            weight_kg: default_package_weight(),
        }
    }
}

/// Shipment collaborator settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ShipmentConfig {
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub package: PackageDefaults,
}

/// Payment gateway adapter settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Seconds a finished attempt stays retrievable before eviction
    #[serde(default = "default_attempt_retention")]
    pub attempt_retention_secs: u64,

    /// Pricing parameters
    #[serde(default)]
    #[validate]
    pub pricing: PricingConfig,

    /// Order backend collaborator
    #[validate]
    pub order_service: UpstreamConfig,

    /// Payment gateway collaborator
    #[validate]
    pub gateway: GatewayConfig,

    /// Shipment collaborator
    #[validate]
    pub shipment: ShipmentConfig,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_tax_rate() -> Decimal {
    dec!(0.18)
}

fn default_free_shipping_threshold() -> Decimal {
    dec!(500)
}

fn default_standard_shipping_fee() -> Decimal {
    dec!(40)
}

fn default_express_shipping_fee() -> Decimal {
    dec!(100)
}

fn default_same_day_shipping_fee() -> Decimal {
    dec!(200)
}

fn default_client_timeout() -> u64 {
    DEFAULT_CLIENT_TIMEOUT_SECS
}

fn default_attempt_retention() -> u64 {
    DEFAULT_ATTEMPT_RETENTION_SECS
}

fn default_package_length() -> Decimal {
    dec!(10)
}

fn default_package_width() -> Decimal {
    dec!(10)
}

fn default_package_height() -> Decimal {
    dec!(10)
}

fn default_package_weight() -> Decimal {
    dec!(0.5)
}

/// Loads configuration from `config/{default,local}.toml` plus `APP__`
/// prefixed environment variables (e.g. `APP__ORDER_SERVICE__BASE_URL`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = std_env::var("RUN_ENV").unwrap_or_else(|_| "default".to_string());

    let cfg: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(File::with_name(&format!("{}/local", CONFIG_DIR)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("checkout_api={},tower_http=debug", level);
    let filter_directive = std_env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}
