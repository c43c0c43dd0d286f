use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub ratelimit: RateLimitConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared key for the send and retry endpoints; `None` disables auth
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `memory` or `postgres`
    #[serde(default = "default_store_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    /// `memory` or `http`
    #[serde(default = "default_directory_backend")]
    pub backend: String,
    /// Base URL of the user service, for the `http` backend
    #[serde(default = "default_directory_base_url")]
    pub base_url: String,
    #[serde(default = "default_directory_timeout")]
    pub timeout_seconds: u64,
    /// Recipient cache TTL; zero disables caching
    #[serde(default = "default_directory_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// `log` or `http`
    #[serde(default = "default_gateway_backend")]
    pub backend: String,
    #[serde(default = "default_email_endpoint")]
    pub email_endpoint: String,
    #[serde(default = "default_sms_endpoint")]
    pub sms_endpoint: String,
    /// From-address stamped on outgoing email
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Bearer token for the provider, if it wants one
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,
    /// Transport-level tries per delivery call (first try included)
    #[serde(default = "default_transport_tries")]
    pub transport_tries: u32,
    #[serde(default = "default_transport_initial_delay")]
    pub transport_initial_delay_ms: u64,
    #[serde(default = "default_transport_max_delay")]
    pub transport_max_delay_ms: u64,
    #[serde(default = "default_breaker_failures")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_successes")]
    pub breaker_success_threshold: u32,
    #[serde(default = "default_breaker_reset")]
    pub breaker_reset_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Delivery attempts per notification before it is marked FAILED
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound on one directory lookup or gateway call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
    /// Records picked up per retry sweep
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
    /// Seconds between background sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Retries processed concurrently within one sweep
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_ratelimit_enabled")]
    pub enabled: bool,
    /// Sends allowed per caller per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between idle-window cleanup passes
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/gojo_notifications".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_directory_backend() -> String {
    "memory".to_string()
}

fn default_directory_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_directory_timeout() -> u64 {
    5
}

fn default_directory_cache_ttl() -> u64 {
    300
}

fn default_gateway_backend() -> String {
    "log".to_string()
}

fn default_email_endpoint() -> String {
    "http://localhost:8090/email".to_string()
}

fn default_sms_endpoint() -> String {
    "http://localhost:8090/sms".to_string()
}

fn default_sender() -> String {
    "no-reply@gojo-rentals.com".to_string()
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_transport_tries() -> u32 {
    3
}

fn default_transport_initial_delay() -> u64 {
    500
}

fn default_transport_max_delay() -> u64 {
    5_000
}

fn default_breaker_failures() -> u32 {
    5
}

fn default_breaker_successes() -> u32 {
    2
}

fn default_breaker_reset() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_call_timeout() -> u64 {
    10
}

fn default_sweep_batch_size() -> usize {
    10
}

fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

fn default_sweep_concurrency() -> usize {
    4
}

fn default_ratelimit_enabled() -> bool {
    true
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "gojo-notification-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("store.backend", "memory")?
            .set_default("dispatch.max_attempts", 3)?
            .set_default("ratelimit.max_requests", 10)?
            .set_default("ratelimit.window_seconds", 60)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // GOJO__SERVER__PORT, GOJO__GATEWAY__API_KEY, GOJO__DATABASE__URL, etc.
            .add_source(
                Environment::with_prefix("GOJO")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Reject configurations that would misbehave silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.max_attempts == 0 {
            return Err(ConfigError::Message(
                "dispatch.max_attempts must be at least 1".into(),
            ));
        }
        if self.dispatch.sweep_batch_size == 0 {
            return Err(ConfigError::Message(
                "dispatch.sweep_batch_size must be at least 1".into(),
            ));
        }
        if self.ratelimit.enabled && self.ratelimit.window_seconds == 0 {
            return Err(ConfigError::Message(
                "ratelimit.window_seconds must be at least 1".into(),
            ));
        }
        if !matches!(self.store.backend.as_str(), "memory" | "postgres") {
            return Err(ConfigError::Message(format!(
                "unknown store backend {:?}",
                self.store.backend
            )));
        }
        if !matches!(self.directory.backend.as_str(), "memory" | "http") {
            return Err(ConfigError::Message(format!(
                "unknown directory backend {:?}",
                self.directory.backend
            )));
        }
        if !matches!(self.gateway.backend.as_str(), "log" | "http") {
            return Err(ConfigError::Message(format!(
                "unknown gateway backend {:?}",
                self.gateway.backend
            )));
        }
        if self.directory.backend == "http" && self.directory.base_url.is_empty() {
            return Err(ConfigError::Message(
                "directory.base_url is required for the http backend".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            backend: default_directory_backend(),
            base_url: default_directory_base_url(),
            timeout_seconds: default_directory_timeout(),
            cache_ttl_seconds: default_directory_cache_ttl(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: default_gateway_backend(),
            email_endpoint: default_email_endpoint(),
            sms_endpoint: default_sms_endpoint(),
            sender: default_sender(),
            api_key: None,
            timeout_seconds: default_gateway_timeout(),
            transport_tries: default_transport_tries(),
            transport_initial_delay_ms: default_transport_initial_delay(),
            transport_max_delay_ms: default_transport_max_delay(),
            breaker_failure_threshold: default_breaker_failures(),
            breaker_success_threshold: default_breaker_successes(),
            breaker_reset_timeout_ms: default_breaker_reset(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            call_timeout_seconds: default_call_timeout(),
            sweep_batch_size: default_sweep_batch_size(),
            sweep_interval_seconds: default_sweep_interval(),
            sweep_concurrency: default_sweep_concurrency(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_ratelimit_enabled(),
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.store.backend, "memory");
        assert_eq!(settings.dispatch.max_attempts, 3);
        assert_eq!(settings.dispatch.sweep_batch_size, 10);
        assert_eq!(settings.dispatch.sweep_interval_seconds, 300);
        assert_eq!(settings.ratelimit.max_requests, 10);
        assert_eq!(settings.ratelimit.window_seconds, 60);
        assert!(settings.ratelimit.enabled);
        assert!(settings.api.key.is_none());
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut settings = Settings::default();
        settings.dispatch.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut settings = Settings::default();
        settings.store.backend = "sqlite".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_server_addr() {
        let settings = Settings::default();
        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
    }
}
