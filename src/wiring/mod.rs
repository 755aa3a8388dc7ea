//! 连线内省模块
//!
//! - 修订版本身份跟踪：句柄 -> 请求内本地编号
//! - 连线图遍历：命名空间过滤下的连线闭包
//! - 连线快照：闭包 -> 可序列化的记录

pub mod identity;
pub mod snapshot;
pub mod walker;

pub use identity::{LocalRevisionId, RevisionIdentityTracker};
pub use snapshot::{
    CapabilityRecord, DeclarationRecord, RequirementRecord, RevisionDeclarations,
    RevisionWiringRecord, WireRecord, WiringSnapshot, WiringSnapshotBuilder,
};
pub use walker::WiringGraphWalker;
