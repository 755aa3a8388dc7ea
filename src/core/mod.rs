//! 核心模块
//!
//! 包含内省层配置。

pub mod config;

pub use config::{
    LogConfig, RegistryConfig, SnapshotConfig, StalePolicy, WiringConfig, WiringConfigBuilder,
};
