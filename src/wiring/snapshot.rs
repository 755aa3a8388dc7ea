//! 连线快照
//!
//! 把一组修订版本转换为可序列化的快照：每个修订版本一行，包含其声明与连线，
//! 所有修订版本引用都替换为请求内的本地编号。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{DirectiveTable, PropertyTable};
use crate::core::config::StalePolicy;
use crate::module::metadata::{
    Capability, ModuleId, NamespaceFilter, Requirement, RevisionHandle, RevisionState, Wire,
};
use crate::module::registry::WiringRegistry;
use crate::utils::{CoreError, ErrorKind, Result};
use crate::wiring::identity::{LocalRevisionId, RevisionIdentityTracker};

/// 能力或需求的编码记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationRecord {
    /// 命名空间
    pub namespace: String,
    /// 属性表
    pub attributes: PropertyTable,
    /// 指令表
    pub directives: DirectiveTable,
}

/// 能力记录
pub type CapabilityRecord = DeclarationRecord;

/// 需求记录
pub type RequirementRecord = DeclarationRecord;

impl DeclarationRecord {
    /// 编码能力声明
    pub fn from_capability(capability: &Capability) -> Result<Self> {
        Ok(Self {
            namespace: capability.namespace.clone(),
            attributes: PropertyTable::from_properties(&capability.attributes)?,
            directives: DirectiveTable::from_directives(&capability.directives),
        })
    }

    /// 编码需求声明
    pub fn from_requirement(requirement: &Requirement) -> Result<Self> {
        Ok(Self {
            namespace: requirement.namespace.clone(),
            attributes: PropertyTable::from_properties(&requirement.attributes)?,
            directives: DirectiveTable::from_directives(&requirement.directives),
        })
    }
}

/// 连线记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    /// 被使用的能力
    pub capability: CapabilityRecord,
    /// 被满足的需求
    pub requirement: RequirementRecord,
    /// 提供方本地编号
    pub provider_revision_id: LocalRevisionId,
    /// 需求方本地编号
    pub requirer_revision_id: LocalRevisionId,
}

/// 单个修订版本的连线记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionWiringRecord {
    /// 所属模块
    pub module_id: ModuleId,
    /// 本地编号
    pub revision_id: LocalRevisionId,
    /// 符号名称
    pub symbolic_name: String,
    /// 版本号
    pub version: String,
    /// 快照时的状态
    pub state: RevisionState,
    /// 声明的能力
    pub capabilities: Vec<CapabilityRecord>,
    /// 声明的需求
    pub requirements: Vec<RequirementRecord>,
    /// 作为需求方的连线
    pub required_wires: Vec<WireRecord>,
    /// 作为提供方的连线
    pub provided_wires: Vec<WireRecord>,
}

/// 修订版本声明记录（不含连线）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDeclarations {
    /// 本地编号
    pub revision_id: LocalRevisionId,
    /// 声明
    pub declarations: Vec<DeclarationRecord>,
}

/// 连线快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringSnapshot {
    /// 快照时间
    pub taken_at: DateTime<Utc>,
    /// 请求使用的命名空间过滤
    pub namespace: String,
    /// 因失效被跳过的修订版本数
    pub skipped: usize,
    /// 以本地编号为键的记录
    pub rows: BTreeMap<LocalRevisionId, RevisionWiringRecord>,
}

impl WiringSnapshot {
    /// 记录数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何记录
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 按本地编号查找
    pub fn get(&self, revision_id: LocalRevisionId) -> Option<&RevisionWiringRecord> {
        self.rows.get(&revision_id)
    }

    /// 按编号升序遍历
    pub fn iter(&self) -> impl Iterator<Item = &RevisionWiringRecord> {
        self.rows.values()
    }

    /// 查找指定模块的记录
    pub fn rows_for_module(
        &self,
        module_id: ModuleId,
    ) -> impl Iterator<Item = &RevisionWiringRecord> {
        self.rows.values().filter(move |r| r.module_id == module_id)
    }
}

/// 按策略吸收失效错误：`Skip` 时返回 `None`，`Fail` 时原样返回错误
pub(crate) fn absorb_stale<T>(
    policy: StalePolicy,
    handle: RevisionHandle,
    result: Result<T>,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::StaleReference && policy == StalePolicy::Skip => {
            tracing::warn!(revision = %handle, error = %e, "修订版本已失效，跳过");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// 连线快照构建器
#[derive(Debug)]
pub struct WiringSnapshotBuilder<'a, R: WiringRegistry + ?Sized> {
    registry: &'a R,
    stale_policy: StalePolicy,
}

impl<'a, R: WiringRegistry + ?Sized> WiringSnapshotBuilder<'a, R> {
    /// 创建构建器，默认跳过失效的修订版本
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            stale_policy: StalePolicy::default(),
        }
    }

    /// 设置失效处理策略
    pub fn stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// 为一组修订版本构建快照
    ///
    /// 修订版本按给定顺序处理，因此首个修订版本（通常是根）先于其他修订版本获得编号。
    /// 每个保留下来的修订版本恰好一行，以其本地编号为键。
    ///
    /// # Errors
    ///
    /// - `StalePolicy::Fail` 下遇到失效修订版本：`StaleReference`
    /// - 属性无法编码：`UnsupportedValueType`
    pub fn build<'h>(
        &self,
        revisions: impl IntoIterator<Item = &'h RevisionHandle>,
        filter: &NamespaceFilter,
        tracker: &RevisionIdentityTracker,
    ) -> Result<WiringSnapshot> {
        let mut rows = BTreeMap::new();
        let mut skipped = 0;

        for handle in revisions {
            match self.record(*handle, filter, tracker)? {
                Some(record) => {
                    rows.insert(record.revision_id, record);
                }
                None => skipped += 1,
            }
        }

        Ok(WiringSnapshot {
            taken_at: Utc::now(),
            namespace: filter.to_string(),
            skipped,
            rows,
        })
    }

    /// 构建单个修订版本的记录；按策略跳过时返回 `None`
    pub fn record(
        &self,
        handle: RevisionHandle,
        filter: &NamespaceFilter,
        tracker: &RevisionIdentityTracker,
    ) -> Result<Option<RevisionWiringRecord>> {
        let info = match absorb_stale(self.stale_policy, handle, self.registry.revision(handle))? {
            Some(info) => info,
            None => return Ok(None),
        };
        let wiring = match self.registry.wiring(handle)? {
            Some(wiring) => wiring,
            None => {
                let err = CoreError::StaleReference(format!("修订版本 {} 没有连线集合", handle));
                return absorb_stale(self.stale_policy, handle, Err(err));
            }
        };

        let declared = self.registry.declared_capabilities(handle, filter);
        let capabilities = match absorb_stale(self.stale_policy, handle, declared)? {
            Some(capabilities) => capabilities,
            None => return Ok(None),
        };
        let declared = self.registry.declared_requirements(handle, filter);
        let requirements = match absorb_stale(self.stale_policy, handle, declared)? {
            Some(requirements) => requirements,
            None => return Ok(None),
        };

        // 所有注册表读取成功后才分配编号，跳过的修订版本不占用编号
        let revision_id = tracker.id_for(handle);

        let capabilities = capabilities
            .iter()
            .map(DeclarationRecord::from_capability)
            .collect::<Result<Vec<_>>>()?;
        let requirements = requirements
            .iter()
            .map(DeclarationRecord::from_requirement)
            .collect::<Result<Vec<_>>>()?;

        let mut required_wires = Vec::new();
        for wire in wiring.required_wires(filter) {
            if let Some(record) = self.wire_record(wire, wire.provider, tracker)? {
                required_wires.push(record);
            }
        }
        let mut provided_wires = Vec::new();
        for wire in wiring.provided_wires(filter) {
            if let Some(record) = self.wire_record(wire, wire.requirer, tracker)? {
                provided_wires.push(record);
            }
        }

        Ok(Some(RevisionWiringRecord {
            module_id: info.module_id,
            revision_id,
            symbolic_name: info.symbolic_name,
            version: info.version.to_string(),
            state: info.state,
            capabilities,
            requirements,
            required_wires,
            provided_wires,
        }))
    }

    /// 编码一条连线；另一端没有连线集合时丢弃
    fn wire_record(
        &self,
        wire: &Wire,
        other_end: RevisionHandle,
        tracker: &RevisionIdentityTracker,
    ) -> Result<Option<WireRecord>> {
        if !self.registry.has_wiring(other_end)? {
            tracing::debug!(revision = %other_end, "连线另一端没有连线集合，丢弃");
            return Ok(None);
        }
        Ok(Some(WireRecord {
            capability: DeclarationRecord::from_capability(&wire.capability)?,
            requirement: DeclarationRecord::from_requirement(&wire.requirement)?,
            provider_revision_id: tracker.id_for(wire.provider),
            requirer_revision_id: tracker.id_for(wire.requirer),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::codec::TypedValue;
    use crate::module::metadata::{ModuleRevision, Wiring};
    use crate::module::registry::ModuleRegistry;

    struct Fixture {
        registry: ModuleRegistry,
        r: RevisionHandle,
        s: RevisionHandle,
    }

    /// R 提供 pkg{name=utils, version="1.0"}，S 需要 pkg
    fn fixture() -> Fixture {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "utils").unwrap();
        registry.install_module(2, "app").unwrap();
        let r = registry.add_revision(1, "1.0.0").unwrap();
        let s = registry.add_revision(2, "1.0.0").unwrap();
        let cap = registry
            .add_capability(
                r,
                Capability::new("pkg")
                    .with_attribute("name", "utils")
                    .with_attribute("version", "1.0"),
            )
            .unwrap();
        let req = registry
            .add_requirement(s, Requirement::new("pkg").with_directive("filter", "(name=utils)"))
            .unwrap();
        registry.wire(s, req, r, cap).unwrap();
        Fixture { registry, r, s }
    }

    #[test]
    fn test_record_encodes_declarations_and_wires() {
        let f = fixture();
        let tracker = RevisionIdentityTracker::new();
        let builder = WiringSnapshotBuilder::new(&f.registry);

        let record = builder
            .record(f.s, &NamespaceFilter::All, &tracker)
            .unwrap()
            .unwrap();
        assert_eq!(record.revision_id, 0);
        assert_eq!(record.module_id, 2);
        assert_eq!(record.requirements.len(), 1);
        assert_eq!(record.requirements[0].directives.get("filter"), Some("(name=utils)"));

        let wire = &record.required_wires[0];
        assert_eq!(wire.requirer_revision_id, 0);
        assert_eq!(wire.provider_revision_id, 1);
        assert_eq!(wire.capability.attributes.get("name").unwrap().value, "utils");
        assert_eq!(wire.capability.attributes.get("version").unwrap().type_tag, "String");
        assert_eq!(tracker.handle_of(1), Some(f.r));
    }

    #[test]
    fn test_build_one_row_per_revision() {
        let f = fixture();
        let tracker = RevisionIdentityTracker::new();
        let builder = WiringSnapshotBuilder::new(&f.registry);

        let snapshot = builder
            .build(&[f.r, f.s], &NamespaceFilter::All, &tracker)
            .unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.skipped, 0);
        assert_eq!(snapshot.namespace, "*");
        for (id, row) in &snapshot.rows {
            assert_eq!(*id, row.revision_id);
        }
        assert_eq!(snapshot.rows_for_module(1).count(), 1);
    }

    #[test]
    fn test_removed_revision_skipped_or_failed() {
        let f = fixture();
        f.registry.remove_revision(f.r).unwrap();

        let tracker = RevisionIdentityTracker::new();
        let snapshot = WiringSnapshotBuilder::new(&f.registry)
            .build(&[f.s, f.r], &NamespaceFilter::All, &tracker)
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.skipped, 1);
        // 另一端已移除的连线被丢弃
        assert!(snapshot.get(0).unwrap().required_wires.is_empty());

        let tracker = RevisionIdentityTracker::new();
        let result = WiringSnapshotBuilder::new(&f.registry)
            .stale_policy(StalePolicy::Fail)
            .build(&[f.s, f.r], &NamespaceFilter::All, &tracker);
        assert!(matches!(result, Err(CoreError::StaleReference(_))));
    }

    /// 在 `wiring(target)` 返回后立即移除 `target` 的注册表
    struct RemovingRegistry {
        inner: ModuleRegistry,
        target: RevisionHandle,
        armed: AtomicBool,
    }

    impl WiringRegistry for RemovingRegistry {
        fn current_revision(&self, module_id: ModuleId) -> Result<RevisionHandle> {
            self.inner.current_revision(module_id)
        }

        fn module_revisions(&self, module_id: ModuleId) -> Result<Vec<RevisionHandle>> {
            self.inner.module_revisions(module_id)
        }

        fn revision(&self, handle: RevisionHandle) -> Result<ModuleRevision> {
            self.inner.revision(handle)
        }

        fn declared_capabilities(
            &self,
            handle: RevisionHandle,
            filter: &NamespaceFilter,
        ) -> Result<Vec<Capability>> {
            self.inner.declared_capabilities(handle, filter)
        }

        fn declared_requirements(
            &self,
            handle: RevisionHandle,
            filter: &NamespaceFilter,
        ) -> Result<Vec<Requirement>> {
            self.inner.declared_requirements(handle, filter)
        }

        fn wiring(&self, handle: RevisionHandle) -> Result<Option<Wiring>> {
            let wiring = self.inner.wiring(handle)?;
            if handle == self.target && self.armed.swap(false, Ordering::SeqCst) {
                self.inner.remove_revision(handle)?;
            }
            Ok(wiring)
        }
    }

    fn removing(f: Fixture, target: RevisionHandle) -> (RemovingRegistry, RevisionHandle) {
        let other = if target == f.r { f.s } else { f.r };
        let registry = RemovingRegistry {
            inner: f.registry,
            target,
            armed: AtomicBool::new(true),
        };
        (registry, other)
    }

    #[test]
    fn test_revision_removed_during_build_is_skipped() {
        let f = fixture();
        let target = f.r;
        let (registry, s) = removing(f, target);

        let tracker = RevisionIdentityTracker::new();
        let snapshot = WiringSnapshotBuilder::new(&registry)
            .build(&[target, s], &NamespaceFilter::All, &tracker)
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.skipped, 1);
        // 被跳过的修订版本不占用编号
        assert_eq!(tracker.len(), 1);
        let row = snapshot.get(0).unwrap();
        assert_eq!(row.module_id, 2);
        assert!(row.required_wires.is_empty());
    }

    #[test]
    fn test_revision_removed_during_build_fails_under_fail_policy() {
        let f = fixture();
        let target = f.r;
        let (registry, s) = removing(f, target);

        let tracker = RevisionIdentityTracker::new();
        let result = WiringSnapshotBuilder::new(&registry)
            .stale_policy(StalePolicy::Fail)
            .build(&[target, s], &NamespaceFilter::All, &tracker);

        assert!(matches!(result, Err(CoreError::StaleReference(_))));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_unresolved_revision_treated_as_stale() {
        let f = fixture();
        f.registry.unresolve(f.s).unwrap();

        let tracker = RevisionIdentityTracker::new();
        let builder = WiringSnapshotBuilder::new(&f.registry);
        assert!(builder.record(f.s, &NamespaceFilter::All, &tracker).unwrap().is_none());

        let builder = builder.stale_policy(StalePolicy::Fail);
        assert!(matches!(
            builder.record(f.s, &NamespaceFilter::All, &tracker),
            Err(CoreError::StaleReference(_))
        ));
    }

    #[test]
    fn test_namespace_filter_applies_to_rows() {
        let f = fixture();
        f.registry
            .add_capability(f.r, Capability::new("bundle").with_attribute("n", 1i32))
            .unwrap();

        let tracker = RevisionIdentityTracker::new();
        let builder = WiringSnapshotBuilder::new(&f.registry);
        let record = builder
            .record(f.r, &NamespaceFilter::from_request("bundle"), &tracker)
            .unwrap()
            .unwrap();
        assert_eq!(record.capabilities.len(), 1);
        assert!(record.provided_wires.is_empty());
        assert_eq!(
            record.capabilities[0].attributes.to_properties().unwrap()["n"],
            TypedValue::from(1i32)
        );
    }

    #[test]
    fn test_snapshot_serializes() {
        let f = fixture();
        let tracker = RevisionIdentityTracker::new();
        let snapshot = WiringSnapshotBuilder::new(&f.registry)
            .build(&[f.s, f.r], &NamespaceFilter::All, &tracker)
            .unwrap();

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: WiringSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
