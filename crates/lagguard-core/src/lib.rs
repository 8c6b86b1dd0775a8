pub mod config;
pub mod duration;

pub use config::{
    Aggregation, ConfigError, LagguardConfig, ServerConfig, SourceConfig, TargetConfig,
    ThrottlerConfig,
};
pub use duration::parse_duration;
