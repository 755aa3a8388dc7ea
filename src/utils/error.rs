//! 连线内省层错误类型定义
//!
//! 本模块定义了内省层中使用的所有错误类型。

use thiserror::Error;

/// 内省层核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 查找错误 ====================

    /// 模块未找到
    #[error("模块未找到: id {0}")]
    ModuleNotFound(u64),

    /// 模块修订版本未找到
    #[error("模块修订版本未找到: handle {0}")]
    RevisionNotFound(u64),

    /// 模块已安装
    #[error("模块已安装: id {0}")]
    ModuleAlreadyInstalled(u64),

    // ==================== 编解码错误 ====================

    /// 未知的类型标签
    #[error("未知的类型标签: '{0}'")]
    UnknownTypeTag(String),

    /// 类型标签语法错误（例如缺少 "of"）
    #[error("类型标签格式错误: '{0}'")]
    MalformedTypeTag(String),

    /// 元素值无法按类型解析
    #[error("无法将 '{value}' 解析为 {tag}: {reason}")]
    InvalidElementValue {
        tag: String,
        value: String,
        reason: String,
    },

    /// 不支持编码的值类型
    #[error("不支持的值类型: {0}")]
    UnsupportedValueType(String),

    // ==================== 连线图错误 ====================

    /// 修订版本在遍历过程中失效
    #[error("修订版本已失效: {0}")]
    StaleReference(String),

    /// 无效的注册表描述
    #[error("无效的注册表描述: {0}")]
    InvalidRegistry(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 版本解析错误
    #[error("版本解析错误: {0}")]
    VersionParse(#[from] semver::Error),

    // ==================== 通用错误 ====================

    /// 请求超时
    #[error("请求超时: {0} ms")]
    Timeout(u64),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 内省层操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误分类
///
/// 调用方据此决定如何向远程管理客户端报告错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 调用方提供的模块或修订版本标识未知
    NotFound,
    /// 解码时遇到未知标签、语法错误或无法解析的元素
    InvalidEncoding,
    /// 编码时遇到不支持的值类型
    UnsupportedValueType,
    /// 修订版本在遍历过程中失效
    StaleReference,
    /// 配置或注册表描述无效
    Configuration,
    /// IO、序列化等其他失败
    Internal,
}

/// 状态码常量
pub mod status_code {
    /// 成功
    pub const OK: u16 = 200;

    /// 请求格式错误
    pub const BAD_REQUEST: u16 = 400;

    /// 未找到
    pub const NOT_FOUND: u16 = 404;

    /// 请求超时
    pub const TIMEOUT: u16 = 408;

    /// 冲突（目标在请求期间发生变化）
    pub const CONFLICT: u16 = 409;

    /// 无法处理的实体
    pub const UNPROCESSABLE: u16 = 422;

    /// 内部错误
    pub const INTERNAL_ERROR: u16 = 500;
}

/// 错误码常量
pub mod error_code {
    // 模块错误 (MODULE-xxx)
    /// 模块不存在
    pub const MODULE_NOT_FOUND: &str = "MODULE-001";
    /// 修订版本不存在
    pub const REVISION_NOT_FOUND: &str = "MODULE-002";
    /// 修订版本已失效
    pub const REVISION_STALE: &str = "MODULE-003";
    /// 注册表描述无效
    pub const REGISTRY_INVALID: &str = "MODULE-004";
    /// 模块已安装
    pub const MODULE_ALREADY_INSTALLED: &str = "MODULE-005";

    // 编解码错误 (CODEC-xxx)
    /// 未知类型标签
    pub const CODEC_UNKNOWN_TAG: &str = "CODEC-001";
    /// 类型标签格式错误
    pub const CODEC_MALFORMED_TAG: &str = "CODEC-002";
    /// 元素值无法解析
    pub const CODEC_INVALID_VALUE: &str = "CODEC-003";
    /// 不支持的值类型
    pub const CODEC_UNSUPPORTED_TYPE: &str = "CODEC-004";

    // 配置错误 (CONFIG-xxx)
    /// 配置加载失败
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    /// 配置值无效
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";

    // 超时错误 (TIMEOUT-xxx)
    /// 请求超时
    pub const TIMEOUT_REQUEST: &str = "TIMEOUT-001";
}

impl CoreError {
    /// 构造元素解析错误
    pub fn invalid_element(
        tag: impl Into<String>,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        CoreError::InvalidElementValue {
            tag: tag.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// 获取错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ModuleNotFound(_) | CoreError::RevisionNotFound(_) => ErrorKind::NotFound,
            CoreError::UnknownTypeTag(_)
            | CoreError::MalformedTypeTag(_)
            | CoreError::InvalidElementValue { .. } => ErrorKind::InvalidEncoding,
            CoreError::UnsupportedValueType(_) => ErrorKind::UnsupportedValueType,
            CoreError::StaleReference(_) => ErrorKind::StaleReference,
            CoreError::InvalidRegistry(_)
            | CoreError::ModuleAlreadyInstalled(_)
            | CoreError::ConfigLoadFailed(_)
            | CoreError::InvalidConfigValue { .. } => ErrorKind::Configuration,
            _ => ErrorKind::Internal,
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::RevisionNotFound(_) => error_code::REVISION_NOT_FOUND,
            CoreError::StaleReference(_) => error_code::REVISION_STALE,
            CoreError::InvalidRegistry(_) => error_code::REGISTRY_INVALID,
            CoreError::ModuleAlreadyInstalled(_) => error_code::MODULE_ALREADY_INSTALLED,
            CoreError::UnknownTypeTag(_) => error_code::CODEC_UNKNOWN_TAG,
            CoreError::MalformedTypeTag(_) => error_code::CODEC_MALFORMED_TAG,
            CoreError::InvalidElementValue { .. } => error_code::CODEC_INVALID_VALUE,
            CoreError::UnsupportedValueType(_) => error_code::CODEC_UNSUPPORTED_TYPE,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            CoreError::Timeout(_) => error_code::TIMEOUT_REQUEST,
            _ => "UNKNOWN",
        }
    }

    /// 获取 HTTP 风格的状态码
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => status_code::NOT_FOUND,
            ErrorKind::InvalidEncoding | ErrorKind::UnsupportedValueType => {
                status_code::BAD_REQUEST
            }
            ErrorKind::StaleReference => status_code::CONFLICT,
            ErrorKind::Configuration => status_code::UNPROCESSABLE,
            ErrorKind::Internal => match self {
                CoreError::Timeout(_) => status_code::TIMEOUT,
                _ => status_code::INTERNAL_ERROR,
            },
        }
    }
}
