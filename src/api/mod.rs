//! API 模块
//!
//! 对远程管理客户端提供的连线内省接口。
//!
//! - `introspector`: 八个查询操作，以及带超时的阻塞执行

pub mod introspector;

pub use introspector::WiringIntrospector;
