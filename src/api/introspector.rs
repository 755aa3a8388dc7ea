//! 连线内省接口
//!
//! 远程管理客户端使用的八个查询操作。每个请求：
//! - 生成请求 ID 并进入 `wiring_request` span
//! - 使用全新的 [`RevisionIdentityTracker`]，根修订版本（或模块的最新修订版本）先获得编号 0
//! - 只读访问注册表
//!
//! # 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use chips_wiring::api::WiringIntrospector;
//! use chips_wiring::module::{Capability, ModuleRegistry, Requirement};
//!
//! let registry = ModuleRegistry::new();
//! registry.install_module(1, "utils").unwrap();
//! registry.install_module(2, "app").unwrap();
//! let r = registry.add_revision(1, "1.0.0").unwrap();
//! let s = registry.add_revision(2, "1.0.0").unwrap();
//! let cap = registry.add_capability(r, Capability::new("pkg")).unwrap();
//! let req = registry.add_requirement(s, Requirement::new("pkg")).unwrap();
//! registry.wire(s, req, r, cap).unwrap();
//!
//! let introspector = WiringIntrospector::new(Arc::new(registry));
//! let snapshot = introspector.current_wiring_closure(2, "*").unwrap();
//! assert_eq!(snapshot.len(), 2);
//! assert_eq!(snapshot.get(0).unwrap().module_id, 2);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::core::config::SnapshotConfig;
use crate::module::metadata::{ModuleId, NamespaceFilter};
use crate::module::registry::WiringRegistry;
use crate::utils::id::generate_request_id;
use crate::utils::{CoreError, Result};
use crate::wiring::snapshot::absorb_stale;
use crate::wiring::{
    CapabilityRecord, DeclarationRecord, RequirementRecord, RevisionDeclarations,
    RevisionIdentityTracker, WiringGraphWalker, WiringSnapshot, WiringSnapshotBuilder,
};

/// 连线内省器
pub struct WiringIntrospector<R: WiringRegistry + ?Sized> {
    registry: Arc<R>,
    config: SnapshotConfig,
}

impl<R: WiringRegistry + ?Sized> Clone for WiringIntrospector<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

impl<R: WiringRegistry + ?Sized> std::fmt::Debug for WiringIntrospector<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WiringIntrospector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R: WiringRegistry + ?Sized> WiringIntrospector<R> {
    /// 使用默认配置创建内省器
    pub fn new(registry: Arc<R>) -> Self {
        Self::with_config(registry, SnapshotConfig::default())
    }

    /// 使用指定配置创建内省器
    pub fn with_config(registry: Arc<R>, config: SnapshotConfig) -> Self {
        Self { registry, config }
    }

    /// 底层注册表
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// 快照配置
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    fn builder(&self) -> WiringSnapshotBuilder<'_, R> {
        WiringSnapshotBuilder::new(self.registry.as_ref()).stale_policy(self.config.stale_policy)
    }

    // ========================================================================
    // 声明查询
    // ========================================================================

    /// 模块当前修订版本声明的能力
    ///
    /// # Errors
    ///
    /// - 模块未知：`ModuleNotFound`
    /// - 属性无法编码：`UnsupportedValueType`
    pub fn current_revision_declared_capabilities(
        &self,
        module_id: ModuleId,
        namespace: &str,
    ) -> Result<Vec<CapabilityRecord>> {
        let _span = crate::request_span!(
            generate_request_id(),
            "current_revision_declared_capabilities",
            module_id,
            namespace
        )
        .entered();
        let filter = NamespaceFilter::from_request(namespace);

        let handle = self.registry.current_revision(module_id)?;
        self.registry
            .declared_capabilities(handle, &filter)?
            .iter()
            .map(DeclarationRecord::from_capability)
            .collect()
    }

    /// 模块当前修订版本声明的需求
    pub fn current_revision_declared_requirements(
        &self,
        module_id: ModuleId,
        namespace: &str,
    ) -> Result<Vec<RequirementRecord>> {
        let _span = crate::request_span!(
            generate_request_id(),
            "current_revision_declared_requirements",
            module_id,
            namespace
        )
        .entered();
        let filter = NamespaceFilter::from_request(namespace);

        let handle = self.registry.current_revision(module_id)?;
        self.registry
            .declared_requirements(handle, &filter)?
            .iter()
            .map(DeclarationRecord::from_requirement)
            .collect()
    }

    /// 模块所有修订版本声明的能力，每个修订版本一条记录
    pub fn revisions_declared_capabilities(
        &self,
        module_id: ModuleId,
        namespace: &str,
    ) -> Result<Vec<RevisionDeclarations>> {
        let _span = crate::request_span!(
            generate_request_id(),
            "revisions_declared_capabilities",
            module_id,
            namespace
        )
        .entered();
        let filter = NamespaceFilter::from_request(namespace);
        let tracker = RevisionIdentityTracker::new();

        let mut result = Vec::new();
        for handle in self.registry.module_revisions(module_id)? {
            let declared = self.registry.declared_capabilities(handle, &filter);
            if let Some(capabilities) = absorb_stale(self.config.stale_policy, handle, declared)? {
                result.push(RevisionDeclarations {
                    revision_id: tracker.id_for(handle),
                    declarations: capabilities
                        .iter()
                        .map(DeclarationRecord::from_capability)
                        .collect::<Result<Vec<_>>>()?,
                });
            }
        }
        Ok(result)
    }

    /// 模块所有修订版本声明的需求，每个修订版本一条记录
    pub fn revisions_declared_requirements(
        &self,
        module_id: ModuleId,
        namespace: &str,
    ) -> Result<Vec<RevisionDeclarations>> {
        let _span = crate::request_span!(
            generate_request_id(),
            "revisions_declared_requirements",
            module_id,
            namespace
        )
        .entered();
        let filter = NamespaceFilter::from_request(namespace);
        let tracker = RevisionIdentityTracker::new();

        let mut result = Vec::new();
        for handle in self.registry.module_revisions(module_id)? {
            let declared = self.registry.declared_requirements(handle, &filter);
            if let Some(requirements) = absorb_stale(self.config.stale_policy, handle, declared)? {
                result.push(RevisionDeclarations {
                    revision_id: tracker.id_for(handle),
                    declarations: requirements
                        .iter()
                        .map(DeclarationRecord::from_requirement)
                        .collect::<Result<Vec<_>>>()?,
                });
            }
        }
        Ok(result)
    }

    // ========================================================================
    // 连线查询
    // ========================================================================

    /// 模块当前修订版本的连线，至多一行
    pub fn current_wiring(&self, module_id: ModuleId, namespace: &str) -> Result<WiringSnapshot> {
        let _span =
            crate::request_span!(generate_request_id(), "current_wiring", module_id, namespace)
                .entered();
        let started = Instant::now();
        let filter = NamespaceFilter::from_request(namespace);
        let tracker = RevisionIdentityTracker::new();

        let handle = self.registry.current_revision(module_id)?;
        let snapshot = self.builder().build(&[handle], &filter, &tracker)?;
        self.log_snapshot(&snapshot, 1, started);
        Ok(snapshot)
    }

    /// 模块当前修订版本的连线闭包
    ///
    /// 根修订版本编号为 0；每个可达修订版本恰好一行。
    pub fn current_wiring_closure(
        &self,
        module_id: ModuleId,
        namespace: &str,
    ) -> Result<WiringSnapshot> {
        let _span = crate::request_span!(
            generate_request_id(),
            "current_wiring_closure",
            module_id,
            namespace
        )
        .entered();
        let started = Instant::now();
        let filter = NamespaceFilter::from_request(namespace);
        let tracker = RevisionIdentityTracker::new();

        let root = self.registry.current_revision(module_id)?;
        tracker.id_for(root);

        let walker = WiringGraphWalker::new(self.registry.as_ref());
        let closure = walker.closure(root, &filter)?;
        debug!(root = %root, closure_size = closure.len(), "连线闭包已计算");

        let snapshot = self.builder().build(&closure, &filter, &tracker)?;
        self.log_snapshot(&snapshot, closure.len(), started);
        Ok(snapshot)
    }

    /// 模块所有修订版本的连线，每个修订版本一行
    pub fn revisions_wiring(&self, module_id: ModuleId, namespace: &str) -> Result<WiringSnapshot> {
        let _span =
            crate::request_span!(generate_request_id(), "revisions_wiring", module_id, namespace)
                .entered();
        let started = Instant::now();
        let filter = NamespaceFilter::from_request(namespace);
        let tracker = RevisionIdentityTracker::new();

        let handles = self.registry.module_revisions(module_id)?;
        let snapshot = self.builder().build(&handles, &filter, &tracker)?;
        self.log_snapshot(&snapshot, handles.len(), started);
        Ok(snapshot)
    }

    /// 模块所有修订版本连线闭包的并集
    pub fn revisions_wiring_closure(
        &self,
        module_id: ModuleId,
        namespace: &str,
    ) -> Result<WiringSnapshot> {
        let _span = crate::request_span!(
            generate_request_id(),
            "revisions_wiring_closure",
            module_id,
            namespace
        )
        .entered();
        let started = Instant::now();
        let filter = NamespaceFilter::from_request(namespace);
        let tracker = RevisionIdentityTracker::new();

        let roots = self.registry.module_revisions(module_id)?;

        let walker = WiringGraphWalker::new(self.registry.as_ref());
        let mut closure = IndexSet::new();
        for root in roots {
            let walked = walker.extend_closure(root, &filter, &mut closure);
            if absorb_stale(self.config.stale_policy, root, walked)?.is_some() {
                tracker.id_for(root);
            }
        }

        let snapshot = self.builder().build(&closure, &filter, &tracker)?;
        self.log_snapshot(&snapshot, closure.len(), started);
        Ok(snapshot)
    }

    fn log_snapshot(&self, snapshot: &WiringSnapshot, requested: usize, started: Instant) {
        info!(
            closure_size = requested,
            row_count = snapshot.len(),
            skipped = snapshot.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "连线快照完成"
        );
    }
}

impl<R: WiringRegistry + ?Sized + 'static> WiringIntrospector<R> {
    /// 在阻塞线程池中执行查询，超过 `request_timeout_ms` 时返回 `Timeout`
    ///
    /// 超时为 0 时不限制。超时后后台任务继续运行至结束，其结果被丢弃。
    pub async fn run_with_timeout<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&WiringIntrospector<R>) -> Result<T> + Send + 'static,
    {
        let introspector = self.clone();
        let task = tokio::task::spawn_blocking(move || operation(&introspector));

        let timeout_ms = self.config.request_timeout_ms;
        let joined = if timeout_ms == 0 {
            task.await
        } else {
            tokio::time::timeout(Duration::from_millis(timeout_ms), task)
                .await
                .map_err(|_| CoreError::Timeout(timeout_ms))?
        };
        joined.map_err(|e| CoreError::Internal(format!("内省任务异常退出: {}", e)))?
    }
}
