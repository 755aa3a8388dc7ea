//! 模块注册表
//!
//! 内省层通过 [`WiringRegistry`] 读取运行时的连线图。[`ModuleRegistry`] 是其内存实现，
//! 以句柄索引的修订版本表存储模块、修订版本、声明和连线。

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use semver::Version;

use crate::module::metadata::{
    Capability, ModuleId, ModuleRevision, NamespaceFilter, Requirement, RevisionHandle,
    RevisionState, Wire, Wiring,
};
use crate::utils::{CoreError, Result};

/// 连线图只读查询接口
///
/// 所有查询都是 "某一时刻" 的观察结果；两次调用之间注册表可能已变化。
pub trait WiringRegistry: Send + Sync {
    /// 获取模块的当前修订版本
    ///
    /// # Errors
    ///
    /// 模块未安装或已卸载时返回 `ModuleNotFound`
    fn current_revision(&self, module_id: ModuleId) -> Result<RevisionHandle>;

    /// 获取模块的所有修订版本，最新的在前
    fn module_revisions(&self, module_id: ModuleId) -> Result<Vec<RevisionHandle>>;

    /// 获取修订版本信息
    ///
    /// # Errors
    ///
    /// - 句柄从未分配过：`RevisionNotFound`
    /// - 修订版本已被移除：`StaleReference`
    fn revision(&self, handle: RevisionHandle) -> Result<ModuleRevision>;

    /// 获取修订版本声明的能力
    fn declared_capabilities(
        &self,
        handle: RevisionHandle,
        filter: &NamespaceFilter,
    ) -> Result<Vec<Capability>>;

    /// 获取修订版本声明的需求
    fn declared_requirements(
        &self,
        handle: RevisionHandle,
        filter: &NamespaceFilter,
    ) -> Result<Vec<Requirement>>;

    /// 获取修订版本的连线集合；未解析或已移除时返回 `None`
    fn wiring(&self, handle: RevisionHandle) -> Result<Option<Wiring>>;

    /// 修订版本当前是否有连线集合
    fn has_wiring(&self, handle: RevisionHandle) -> Result<bool> {
        Ok(self.wiring(handle)?.is_some())
    }
}

/// 模块条目
#[derive(Debug)]
struct ModuleEntry {
    symbolic_name: String,
    /// 修订版本，按添加顺序（最旧的在前）
    revisions: Vec<RevisionHandle>,
    uninstalled: bool,
}

/// 修订版本槽
#[derive(Debug)]
struct RevisionSlot {
    revision: ModuleRevision,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
    wiring: Option<WiringSlot>,
}

/// 连线集合槽，连线以下标引用 `RegistryState::wires`
#[derive(Debug, Default)]
struct WiringSlot {
    in_use: bool,
    required: Vec<usize>,
    provided: Vec<usize>,
}

#[derive(Debug, Default)]
struct RegistryState {
    modules: BTreeMap<ModuleId, ModuleEntry>,
    /// 句柄即下标；移除的修订版本留下 `None`
    revisions: Vec<Option<RevisionSlot>>,
    wires: Vec<Wire>,
}

impl RegistryState {
    fn slot(&self, handle: RevisionHandle) -> Result<&RevisionSlot> {
        match self.revisions.get(handle.get() as usize) {
            Some(Some(slot)) => Ok(slot),
            Some(None) => Err(CoreError::StaleReference(format!(
                "修订版本 {} 已被移除",
                handle
            ))),
            None => Err(CoreError::RevisionNotFound(handle.get())),
        }
    }

    fn slot_mut(&mut self, handle: RevisionHandle) -> Result<&mut RevisionSlot> {
        match self.revisions.get_mut(handle.get() as usize) {
            Some(Some(slot)) => Ok(slot),
            Some(None) => Err(CoreError::StaleReference(format!(
                "修订版本 {} 已被移除",
                handle
            ))),
            None => Err(CoreError::RevisionNotFound(handle.get())),
        }
    }

    fn module(&self, module_id: ModuleId) -> Result<&ModuleEntry> {
        self.modules
            .get(&module_id)
            .filter(|m| !m.uninstalled)
            .ok_or(CoreError::ModuleNotFound(module_id))
    }

    fn module_mut(&mut self, module_id: ModuleId) -> Result<&mut ModuleEntry> {
        self.modules
            .get_mut(&module_id)
            .filter(|m| !m.uninstalled)
            .ok_or(CoreError::ModuleNotFound(module_id))
    }

    fn make_stale(&mut self, handle: RevisionHandle) {
        if let Some(Some(slot)) = self.revisions.get_mut(handle.get() as usize) {
            slot.revision.state = RevisionState::Stale;
            if let Some(wiring) = slot.wiring.as_mut() {
                wiring.in_use = false;
            }
        }
    }
}

/// 内存模块注册表
///
/// 管理模块、修订版本及其连线，包括：
/// - 模块安装/卸载
/// - 修订版本添加/移除（新修订版本使旧修订版本失效）
/// - 能力与需求声明
/// - 连线建立
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    state: RwLock<RegistryState>,
}

impl ModuleRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|_| CoreError::Internal("注册表锁已中毒".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|_| CoreError::Internal("注册表锁已中毒".to_string()))
    }

    /// 安装模块
    ///
    /// # Arguments
    ///
    /// * `module_id` - 模块标识
    /// * `symbolic_name` - 符号名称，由该模块的所有修订版本共享
    ///
    /// # Errors
    ///
    /// 模块标识已被占用时返回 `ModuleAlreadyInstalled`
    pub fn install_module(&self, module_id: ModuleId, symbolic_name: impl Into<String>) -> Result<()> {
        let mut state = self.write()?;
        if state.modules.contains_key(&module_id) {
            return Err(CoreError::ModuleAlreadyInstalled(module_id));
        }
        let symbolic_name = symbolic_name.into();
        tracing::debug!(module_id, symbolic_name = %symbolic_name, "安装模块");
        state.modules.insert(
            module_id,
            ModuleEntry {
                symbolic_name,
                revisions: Vec::new(),
                uninstalled: false,
            },
        );
        Ok(())
    }

    /// 为模块添加新修订版本
    ///
    /// 新修订版本立即获得一个使用中的空连线集合并成为当前修订版本；
    /// 原当前修订版本变为失效状态，其连线保留但不再使用。
    ///
    /// # Returns
    ///
    /// 新修订版本的句柄
    pub fn add_revision(&self, module_id: ModuleId, version: &str) -> Result<RevisionHandle> {
        let version = Version::parse(version)?;
        let mut state = self.write()?;

        let handle = RevisionHandle::new(state.revisions.len() as u64);
        let module = state.module_mut(module_id)?;
        let previous = module.revisions.last().copied();
        module.revisions.push(handle);
        let symbolic_name = module.symbolic_name.clone();

        if let Some(previous) = previous {
            state.make_stale(previous);
        }

        tracing::debug!(module_id, revision = %handle, version = %version, "添加修订版本");
        state.revisions.push(Some(RevisionSlot {
            revision: ModuleRevision {
                handle,
                module_id,
                symbolic_name,
                version,
                state: RevisionState::Current,
            },
            capabilities: Vec::new(),
            requirements: Vec::new(),
            wiring: Some(WiringSlot {
                in_use: true,
                ..WiringSlot::default()
            }),
        }));
        Ok(handle)
    }

    /// 添加能力声明，返回其在修订版本内的下标
    pub fn add_capability(&self, handle: RevisionHandle, capability: Capability) -> Result<usize> {
        let mut state = self.write()?;
        let slot = state.slot_mut(handle)?;
        slot.capabilities.push(capability);
        Ok(slot.capabilities.len() - 1)
    }

    /// 添加需求声明，返回其在修订版本内的下标
    pub fn add_requirement(&self, handle: RevisionHandle, requirement: Requirement) -> Result<usize> {
        let mut state = self.write()?;
        let slot = state.slot_mut(handle)?;
        slot.requirements.push(requirement);
        Ok(slot.requirements.len() - 1)
    }

    /// 建立连线：`requirer` 的第 `requirement` 个需求由 `provider` 的第 `capability` 个能力满足
    ///
    /// # Errors
    ///
    /// - 任一端修订版本不存在或没有连线集合
    /// - 下标越界或能力与需求的命名空间不一致：`InvalidRegistry`
    pub fn wire(
        &self,
        requirer: RevisionHandle,
        requirement: usize,
        provider: RevisionHandle,
        capability: usize,
    ) -> Result<()> {
        let mut state = self.write()?;

        let requirement = {
            let slot = state.slot(requirer)?;
            if slot.wiring.is_none() {
                return Err(CoreError::StaleReference(format!("修订版本 {} 未解析", requirer)));
            }
            slot.requirements.get(requirement).cloned().ok_or_else(|| {
                CoreError::InvalidRegistry(format!(
                    "修订版本 {} 没有下标为 {} 的需求",
                    requirer, requirement
                ))
            })?
        };
        let capability = {
            let slot = state.slot(provider)?;
            if slot.wiring.is_none() {
                return Err(CoreError::StaleReference(format!("修订版本 {} 未解析", provider)));
            }
            slot.capabilities.get(capability).cloned().ok_or_else(|| {
                CoreError::InvalidRegistry(format!(
                    "修订版本 {} 没有下标为 {} 的能力",
                    provider, capability
                ))
            })?
        };

        if capability.namespace != requirement.namespace {
            return Err(CoreError::InvalidRegistry(format!(
                "命名空间不一致: 能力 '{}'，需求 '{}'",
                capability.namespace, requirement.namespace
            )));
        }

        tracing::debug!(
            requirer = %requirer,
            provider = %provider,
            namespace = %capability.namespace,
            "建立连线"
        );

        let index = state.wires.len();
        state.wires.push(Wire {
            capability,
            requirement,
            provider,
            requirer,
        });
        if let Some(wiring) = state.slot_mut(requirer)?.wiring.as_mut() {
            wiring.required.push(index);
        }
        if let Some(wiring) = state.slot_mut(provider)?.wiring.as_mut() {
            wiring.provided.push(index);
        }
        Ok(())
    }

    /// 将修订版本标记为失效，其连线集合不再使用
    pub fn mark_stale(&self, handle: RevisionHandle) -> Result<()> {
        let mut state = self.write()?;
        state.slot(handle)?;
        state.make_stale(handle);
        Ok(())
    }

    /// 丢弃修订版本的连线集合，使其回到未解析状态
    pub fn unresolve(&self, handle: RevisionHandle) -> Result<()> {
        let mut state = self.write()?;
        let slot = state.slot_mut(handle)?;
        slot.wiring = None;
        slot.revision.state = RevisionState::Unresolved;
        Ok(())
    }

    /// 卸载模块，其所有修订版本变为失效
    pub fn uninstall_module(&self, module_id: ModuleId) -> Result<()> {
        let mut state = self.write()?;
        let revisions = {
            let module = state.module_mut(module_id)?;
            module.uninstalled = true;
            module.revisions.clone()
        };
        for handle in revisions {
            state.make_stale(handle);
        }
        tracing::debug!(module_id, "卸载模块");
        Ok(())
    }

    /// 彻底移除修订版本；之后对该句柄的查询返回 `StaleReference`
    pub fn remove_revision(&self, handle: RevisionHandle) -> Result<()> {
        let mut state = self.write()?;
        let module_id = state.slot(handle)?.revision.module_id;
        if let Some(module) = state.modules.get_mut(&module_id) {
            module.revisions.retain(|h| *h != handle);
        }
        state.revisions[handle.get() as usize] = None;
        tracing::debug!(revision = %handle, "移除修订版本");
        Ok(())
    }

    /// 已安装（未卸载）的模块数量
    pub fn module_count(&self) -> Result<usize> {
        Ok(self.read()?.modules.values().filter(|m| !m.uninstalled).count())
    }

    /// 已安装模块的标识列表
    pub fn module_ids(&self) -> Result<Vec<ModuleId>> {
        Ok(self
            .read()?
            .modules
            .iter()
            .filter(|(_, m)| !m.uninstalled)
            .map(|(id, _)| *id)
            .collect())
    }
}

impl WiringRegistry for ModuleRegistry {
    fn current_revision(&self, module_id: ModuleId) -> Result<RevisionHandle> {
        let state = self.read()?;
        state
            .module(module_id)?
            .revisions
            .last()
            .copied()
            .ok_or(CoreError::ModuleNotFound(module_id))
    }

    fn module_revisions(&self, module_id: ModuleId) -> Result<Vec<RevisionHandle>> {
        let state = self.read()?;
        Ok(state.module(module_id)?.revisions.iter().rev().copied().collect())
    }

    fn revision(&self, handle: RevisionHandle) -> Result<ModuleRevision> {
        Ok(self.read()?.slot(handle)?.revision.clone())
    }

    fn declared_capabilities(
        &self,
        handle: RevisionHandle,
        filter: &NamespaceFilter,
    ) -> Result<Vec<Capability>> {
        let state = self.read()?;
        Ok(state
            .slot(handle)?
            .capabilities
            .iter()
            .filter(|c| filter.matches(&c.namespace))
            .cloned()
            .collect())
    }

    fn declared_requirements(
        &self,
        handle: RevisionHandle,
        filter: &NamespaceFilter,
    ) -> Result<Vec<Requirement>> {
        let state = self.read()?;
        Ok(state
            .slot(handle)?
            .requirements
            .iter()
            .filter(|r| filter.matches(&r.namespace))
            .cloned()
            .collect())
    }

    fn wiring(&self, handle: RevisionHandle) -> Result<Option<Wiring>> {
        let state = self.read()?;
        let slot = match state.revisions.get(handle.get() as usize) {
            Some(Some(slot)) => slot,
            Some(None) => return Ok(None),
            None => return Err(CoreError::RevisionNotFound(handle.get())),
        };
        Ok(slot.wiring.as_ref().map(|w| Wiring {
            revision: handle,
            in_use: w.in_use,
            required: w.required.iter().map(|i| state.wires[*i].clone()).collect(),
            provided: w.provided.iter().map(|i| state.wires[*i].clone()).collect(),
        }))
    }

    fn has_wiring(&self, handle: RevisionHandle) -> Result<bool> {
        let state = self.read()?;
        Ok(matches!(
            state.revisions.get(handle.get() as usize),
            Some(Some(RevisionSlot {
                wiring: Some(_),
                ..
            }))
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_and_requirer() -> (ModuleRegistry, RevisionHandle, RevisionHandle) {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "utils").unwrap();
        registry.install_module(2, "app").unwrap();
        let r = registry.add_revision(1, "1.0.0").unwrap();
        let s = registry.add_revision(2, "2.0.0").unwrap();
        let cap = registry
            .add_capability(r, Capability::new("pkg").with_attribute("name", "utils"))
            .unwrap();
        let req = registry.add_requirement(s, Requirement::new("pkg")).unwrap();
        registry.wire(s, req, r, cap).unwrap();
        (registry, r, s)
    }

    #[test]
    fn test_install_and_current_revision() {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "utils").unwrap();

        assert!(matches!(
            registry.current_revision(1),
            Err(CoreError::ModuleNotFound(1))
        ));

        let handle = registry.add_revision(1, "1.0.0").unwrap();
        assert_eq!(registry.current_revision(1).unwrap(), handle);

        let info = registry.revision(handle).unwrap();
        assert_eq!(info.symbolic_name, "utils");
        assert_eq!(info.version, Version::new(1, 0, 0));
        assert_eq!(info.state, RevisionState::Current);
    }

    #[test]
    fn test_duplicate_install_rejected() {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "utils").unwrap();
        assert!(matches!(
            registry.install_module(1, "other"),
            Err(CoreError::ModuleAlreadyInstalled(1))
        ));
    }

    #[test]
    fn test_unknown_module_and_revision() {
        let registry = ModuleRegistry::new();
        assert!(matches!(
            registry.current_revision(9),
            Err(CoreError::ModuleNotFound(9))
        ));
        assert!(matches!(
            registry.module_revisions(9),
            Err(CoreError::ModuleNotFound(9))
        ));
        assert!(matches!(
            registry.revision(RevisionHandle::new(42)),
            Err(CoreError::RevisionNotFound(42))
        ));
    }

    #[test]
    fn test_new_revision_makes_previous_stale() {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "utils").unwrap();
        let old = registry.add_revision(1, "1.0.0").unwrap();
        let new = registry.add_revision(1, "1.1.0").unwrap();

        assert_eq!(registry.current_revision(1).unwrap(), new);
        assert_eq!(registry.module_revisions(1).unwrap(), vec![new, old]);
        assert_eq!(registry.revision(old).unwrap().state, RevisionState::Stale);

        let wiring = registry.wiring(old).unwrap().unwrap();
        assert!(!wiring.in_use);
    }

    #[test]
    fn test_wire_visible_from_both_ends() {
        let (registry, r, s) = provider_and_requirer();

        let s_wiring = registry.wiring(s).unwrap().unwrap();
        assert_eq!(s_wiring.required.len(), 1);
        assert_eq!(s_wiring.required[0].provider, r);
        assert_eq!(s_wiring.required[0].requirer, s);

        let r_wiring = registry.wiring(r).unwrap().unwrap();
        assert_eq!(r_wiring.provided.len(), 1);
        assert_eq!(r_wiring.provided[0], s_wiring.required[0]);
    }

    #[test]
    fn test_wire_rejects_namespace_mismatch() {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "a").unwrap();
        registry.install_module(2, "b").unwrap();
        let a = registry.add_revision(1, "1.0.0").unwrap();
        let b = registry.add_revision(2, "1.0.0").unwrap();
        let cap = registry.add_capability(a, Capability::new("pkg")).unwrap();
        let req = registry.add_requirement(b, Requirement::new("bundle")).unwrap();

        assert!(matches!(
            registry.wire(b, req, a, cap),
            Err(CoreError::InvalidRegistry(_))
        ));
        assert!(matches!(
            registry.wire(b, 5, a, cap),
            Err(CoreError::InvalidRegistry(_))
        ));
    }

    #[test]
    fn test_declarations_filtered_by_namespace() {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "a").unwrap();
        let a = registry.add_revision(1, "1.0.0").unwrap();
        registry.add_capability(a, Capability::new("pkg")).unwrap();
        registry.add_capability(a, Capability::new("bundle")).unwrap();
        registry.add_requirement(a, Requirement::new("pkg")).unwrap();

        let pkg = NamespaceFilter::from_request("pkg");
        assert_eq!(registry.declared_capabilities(a, &pkg).unwrap().len(), 1);
        assert_eq!(
            registry
                .declared_capabilities(a, &NamespaceFilter::All)
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            registry
                .declared_requirements(a, &NamespaceFilter::from_request("bundle"))
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn test_uninstall_module() {
        let (registry, r, _) = provider_and_requirer();
        registry.uninstall_module(1).unwrap();

        assert!(matches!(
            registry.current_revision(1),
            Err(CoreError::ModuleNotFound(1))
        ));
        assert_eq!(registry.revision(r).unwrap().state, RevisionState::Stale);
        assert_eq!(registry.module_count().unwrap(), 1);
        assert_eq!(registry.module_ids().unwrap(), vec![2]);
    }

    #[test]
    fn test_remove_revision() {
        let (registry, r, s) = provider_and_requirer();
        registry.remove_revision(r).unwrap();

        assert!(matches!(
            registry.revision(r),
            Err(CoreError::StaleReference(_))
        ));
        assert!(registry.wiring(r).unwrap().is_none());
        assert!(!registry.has_wiring(r).unwrap());
        assert!(registry.module_revisions(1).unwrap().is_empty());

        // 对端仍保留指向已移除修订版本的连线
        assert_eq!(registry.wiring(s).unwrap().unwrap().required.len(), 1);
    }

    #[test]
    fn test_unresolve() {
        let (registry, r, _) = provider_and_requirer();
        registry.unresolve(r).unwrap();

        assert!(registry.wiring(r).unwrap().is_none());
        assert_eq!(registry.revision(r).unwrap().state, RevisionState::Unresolved);
    }

    #[test]
    fn test_invalid_version() {
        let registry = ModuleRegistry::new();
        registry.install_module(1, "a").unwrap();
        assert!(matches!(
            registry.add_revision(1, "not-a-version"),
            Err(CoreError::VersionParse(_))
        ));
    }
}
