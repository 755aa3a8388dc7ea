//! 请求 ID 生成
//!
//! 每个快照请求都带有一个 UUID v4 格式的请求 ID，用于串联同一请求内的日志。

use uuid::Uuid;

/// 生成 UUID v4 格式的请求 ID
///
/// # Example
///
/// ```
/// use chips_wiring::utils::id::{generate_request_id, is_valid_request_id};
///
/// let id = generate_request_id();
/// assert!(is_valid_request_id(&id));
/// ```
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// 验证请求 ID 格式是否有效
///
/// 只接受带连字符的标准 UUID 文本形式
pub fn is_valid_request_id(id: &str) -> bool {
    id.len() == 36 && Uuid::parse_str(id).is_ok()
}
