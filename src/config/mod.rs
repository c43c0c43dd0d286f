mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, DirectoryConfig, DispatchConfig, GatewayConfig, OtelConfig,
    RateLimitConfig, ServerConfig, Settings, StoreConfig,
};
