//! 模块注册表模块
//!
//! 包含连线图的数据来源：
//! - 修订版本、能力、需求与连线的数据模型
//! - 只读查询接口 `WiringRegistry` 及其内存实现
//! - 注册表描述文件解析

pub mod metadata;
pub mod parser;
pub mod registry;

// 重导出常用类型
pub use metadata::{
    Capability, ModuleId, ModuleRevision, NamespaceFilter, Requirement, RevisionHandle,
    RevisionState, Wire, Wiring, ALL_NAMESPACES,
};
pub use parser::{RegistryDescription, RegistryParser};
pub use registry::{ModuleRegistry, WiringRegistry};
