//! 修订版本身份跟踪
//!
//! 每个请求一个跟踪器：首次遇到的修订版本依次获得 0, 1, 2, ... 的本地编号，
//! 同一请求内同一修订版本始终得到相同编号。编号不跨请求稳定。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::module::metadata::RevisionHandle;

/// 请求内的本地修订版本编号
pub type LocalRevisionId = u32;

#[derive(Debug, Default)]
struct TrackerState {
    /// 按编号排列的句柄
    seen: Vec<RevisionHandle>,
    index: HashMap<RevisionHandle, LocalRevisionId>,
}

/// 修订版本身份跟踪器
#[derive(Debug, Default)]
pub struct RevisionIdentityTracker {
    state: Mutex<TrackerState>,
}

impl RevisionIdentityTracker {
    /// 创建空跟踪器
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        // 状态只追加，中毒后仍然一致
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 获取修订版本的本地编号，首次遇到时分配下一个编号
    ///
    /// ```rust
    /// use chips_wiring::module::metadata::RevisionHandle;
    /// use chips_wiring::wiring::RevisionIdentityTracker;
    ///
    /// let tracker = RevisionIdentityTracker::new();
    /// assert_eq!(tracker.id_for(RevisionHandle::new(40)), 0);
    /// assert_eq!(tracker.id_for(RevisionHandle::new(7)), 1);
    /// assert_eq!(tracker.id_for(RevisionHandle::new(40)), 0);
    /// ```
    pub fn id_for(&self, handle: RevisionHandle) -> LocalRevisionId {
        let mut state = self.state();
        if let Some(id) = state.index.get(&handle) {
            return *id;
        }
        let id = state.seen.len() as LocalRevisionId;
        state.seen.push(handle);
        state.index.insert(handle, id);
        id
    }

    /// 已分配编号的修订版本（不分配新编号）
    pub fn get(&self, handle: RevisionHandle) -> Option<LocalRevisionId> {
        self.state().index.get(&handle).copied()
    }

    /// 编号对应的句柄
    pub fn handle_of(&self, id: LocalRevisionId) -> Option<RevisionHandle> {
        self.state().seen.get(id as usize).copied()
    }

    /// 已分配的编号数
    pub fn len(&self) -> usize {
        self.state().seen.len()
    }

    /// 是否尚未分配任何编号
    pub fn is_empty(&self) -> bool {
        self.state().seen.is_empty()
    }
}
