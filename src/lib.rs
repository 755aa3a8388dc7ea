//! # Chips Wiring - 模块连线内省层
//!
//! 面向远程管理客户端的模块连线图内省层，提供以下功能：
//!
//! - **类型化值编解码**: 属性值与 `(键, 字符串, 类型标签)` 三元组之间的双向转换
//! - **属性表编解码**: 整个属性字典与三元组表之间的转换
//! - **修订版本身份跟踪**: 请求内稳定的本地修订版本编号
//! - **连线图遍历**: 命名空间过滤下的连线闭包，图中可能有环
//! - **连线快照**: 闭包中每个修订版本一行的可序列化记录
//!
//! ## 快速开始
//!
//! ```rust
//! use std::sync::Arc;
//! use chips_wiring::{RegistryParser, WiringIntrospector};
//!
//! let registry = RegistryParser::parse_string(r#"
//! modules:
//!   - id: 1
//!     name: utils
//!     revisions:
//!       - version: 1.0.0
//!         capabilities:
//!           - namespace: pkg
//!             attributes: { name: utils }
//! "#).unwrap();
//!
//! let introspector = WiringIntrospector::new(Arc::new(registry));
//! let caps = introspector.current_revision_declared_capabilities(1, "pkg").unwrap();
//! assert_eq!(caps[0].attributes.get("name").unwrap().type_tag, "String");
//! ```
//!
//! ## 模块结构
//!
//! - `codec` - 类型化值与属性表编解码
//! - `module` - 修订版本数据模型、注册表与描述文件解析
//! - `wiring` - 身份跟踪、连线图遍历与快照构建
//! - `api` - 内省查询接口
//! - `core` - 配置
//! - `utils` - 错误类型、日志与请求 ID

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod codec;
pub mod core;
pub mod module;
pub mod utils;
pub mod wiring;

// 重导出常用类型，方便使用
pub use api::WiringIntrospector;

pub use codec::{decode, encode, from_table, to_table, EncodedValue, PropertyTable, TypedValue};

pub use module::{
    Capability, ModuleId, ModuleRegistry, NamespaceFilter, RegistryParser, Requirement,
    RevisionHandle, WiringRegistry, ALL_NAMESPACES,
};

pub use wiring::{
    RevisionIdentityTracker, RevisionWiringRecord, WireRecord, WiringGraphWalker,
    WiringSnapshot, WiringSnapshotBuilder,
};

pub use utils::{error_code, generate_request_id, status_code, CoreError, ErrorKind, Result};
pub use utils::logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

pub use core::config::{LogConfig, SnapshotConfig, StalePolicy, WiringConfig};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
