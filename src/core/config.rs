//! 内省层配置
//!
//! 定义配置结构和加载逻辑。配置文件支持 YAML 与 JSON 两种格式。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::{CoreError, Result};

/// 失效修订版本的处理策略
///
/// 快照构建期间，已计算出的闭包中的修订版本可能因注册表并发变更而失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// 跳过失效的修订版本，返回部分结果（默认）
    #[default]
    Skip,
    /// 整个请求以 `StaleReference` 失败
    Fail,
}

/// 快照配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// 失效修订版本的处理策略
    #[serde(default)]
    pub stale_policy: StalePolicy,

    /// 请求超时（毫秒），由调用方在传输层强制执行；0 表示不限制
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    30000
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            stale_policy: StalePolicy::Skip,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

/// 注册表来源配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// 注册表描述文件路径（YAML 或 JSON）
    #[serde(default)]
    pub source: Option<PathBuf>,
}

/// 内省层配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WiringConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 快照配置
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 注册表来源配置
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl WiringConfig {
    /// 创建配置构建器
    pub fn builder() -> WiringConfigBuilder {
        WiringConfigBuilder::new()
    }

    /// 从文件加载配置
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("无法读取 {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_str_with_path(&content, &path)?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// 从字符串解析配置，按扩展名选择格式
    fn from_str_with_path(content: &str, path: &std::path::Path) -> Result<Self> {
        let config: WiringConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// 验证配置值
    pub fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(CoreError::InvalidConfigValue {
                key: "logging.level".to_string(),
                reason: format!("未知的日志级别 '{}'", self.logging.level),
            });
        }
        if self.logging.file_output && self.logging.log_dir.is_none() {
            return Err(CoreError::InvalidConfigValue {
                key: "logging.log_dir".to_string(),
                reason: "启用文件输出时必须指定日志目录".to_string(),
            });
        }
        Ok(())
    }

    /// 合并另一个配置（用于覆盖），只覆盖非默认值
    pub fn merge(&mut self, other: WiringConfig) {
        if other.snapshot.stale_policy != StalePolicy::default() {
            self.snapshot.stale_policy = other.snapshot.stale_policy;
        }
        if other.snapshot.request_timeout_ms != default_request_timeout_ms() {
            self.snapshot.request_timeout_ms = other.snapshot.request_timeout_ms;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.registry.source.is_some() {
            self.registry.source = other.registry.source;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct WiringConfigBuilder {
    config: WiringConfig,
}

impl WiringConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置失效处理策略
    pub fn stale_policy(mut self, policy: StalePolicy) -> Self {
        self.config.snapshot.stale_policy = policy;
        self
    }

    /// 设置请求超时（毫秒）
    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.snapshot.request_timeout_ms = timeout_ms;
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 设置注册表描述文件
    pub fn registry_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.registry.source = Some(path.into());
        self
    }

    /// 构建配置
    pub fn build(self) -> WiringConfig {
        self.config
    }
}
