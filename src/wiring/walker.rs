//! 连线图遍历
//!
//! 从根修订版本出发，沿需求连线（到提供方）和提供连线（到需求方）双向扩展，
//! 求出经过命名空间过滤后可达的全部修订版本。连线图可能有环。

use indexmap::IndexSet;

use crate::module::metadata::{NamespaceFilter, RevisionHandle};
use crate::module::registry::WiringRegistry;
use crate::utils::Result;

/// 连线图遍历器
#[derive(Debug)]
pub struct WiringGraphWalker<'a, R: WiringRegistry + ?Sized> {
    registry: &'a R,
}

impl<'a, R: WiringRegistry + ?Sized> WiringGraphWalker<'a, R> {
    /// 创建遍历器
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    /// 计算根修订版本的连线闭包
    ///
    /// 结果按发现顺序排列，根修订版本总在首位，每个修订版本只出现一次。
    /// - 根修订版本没有连线集合时，闭包只含根本身
    /// - 没有连线集合的邻居不加入闭包，也不继续扩展
    /// - 不再使用的连线集合不贡献任何边
    ///
    /// # Errors
    ///
    /// 根修订版本未知或已被移除时返回相应错误
    pub fn closure(
        &self,
        root: RevisionHandle,
        filter: &NamespaceFilter,
    ) -> Result<IndexSet<RevisionHandle>> {
        let mut visited = IndexSet::new();
        self.extend_closure(root, filter, &mut visited)?;
        Ok(visited)
    }

    /// 把根修订版本的闭包并入 `visited`，已在其中的修订版本不再扩展
    ///
    /// 多个根依次调用即得到闭包并集，保持各根的发现顺序。
    pub fn extend_closure(
        &self,
        root: RevisionHandle,
        filter: &NamespaceFilter,
        visited: &mut IndexSet<RevisionHandle>,
    ) -> Result<()> {
        self.registry.revision(root)?;

        let before = visited.len();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }

            let wiring = match self.registry.wiring(current)? {
                Some(wiring) => wiring,
                None => {
                    tracing::debug!(revision = %current, "修订版本没有连线集合，停止扩展");
                    continue;
                }
            };

            let neighbours = wiring
                .required_wires(filter)
                .map(|w| w.provider)
                .chain(wiring.provided_wires(filter).map(|w| w.requirer));

            // 逆序入栈，使出栈顺序与连线声明顺序一致
            let mut pending = Vec::new();
            for next in neighbours {
                if visited.contains(&next) {
                    continue;
                }
                if !self.registry.has_wiring(next)? {
                    tracing::debug!(revision = %next, "邻居修订版本没有连线集合，跳过");
                    continue;
                }
                pending.push(next);
            }
            stack.extend(pending.into_iter().rev());
        }

        tracing::debug!(
            root = %root,
            namespace = %filter,
            discovered = visited.len() - before,
            "连线闭包计算完成"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::metadata::{Capability, Requirement};
    use crate::module::registry::ModuleRegistry;
    use crate::utils::CoreError;

    /// 在 `registry` 中安装 `count` 个模块，每个一个修订版本
    fn revisions(registry: &ModuleRegistry, count: u64) -> Vec<RevisionHandle> {
        (1..=count)
            .map(|id| {
                registry.install_module(id, format!("m{id}")).unwrap();
                registry.add_revision(id, "1.0.0").unwrap()
            })
            .collect()
    }

    /// `requirer` 通过命名空间 `ns` 连到 `provider`
    fn connect(registry: &ModuleRegistry, requirer: RevisionHandle, provider: RevisionHandle, ns: &str) {
        let cap = registry.add_capability(provider, Capability::new(ns)).unwrap();
        let req = registry.add_requirement(requirer, Requirement::new(ns)).unwrap();
        registry.wire(requirer, req, provider, cap).unwrap();
    }

    #[test]
    fn test_closure_over_cycle() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 4);
        let (a, b, c, d) = (r[0], r[1], r[2], r[3]);
        connect(&registry, a, b, "pkg");
        connect(&registry, b, c, "pkg");
        connect(&registry, c, a, "pkg");

        let walker = WiringGraphWalker::new(&registry);
        let closure = walker.closure(a, &NamespaceFilter::All).unwrap();

        assert_eq!(closure.len(), 3);
        assert_eq!(closure.get_index(0), Some(&a));
        assert!(closure.contains(&b));
        assert!(closure.contains(&c));
        assert!(!closure.contains(&d));
    }

    #[test]
    fn test_closure_follows_both_directions() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 3);
        // r0 需要 r1，r2 需要 r1：从 r0 出发经 r1 的提供连线到达 r2
        connect(&registry, r[0], r[1], "pkg");
        connect(&registry, r[2], r[1], "pkg");

        let walker = WiringGraphWalker::new(&registry);
        let closure = walker.closure(r[0], &NamespaceFilter::All).unwrap();
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn test_closure_respects_namespace() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 3);
        connect(&registry, r[0], r[1], "pkg");
        connect(&registry, r[1], r[2], "bundle");

        let walker = WiringGraphWalker::new(&registry);
        let pkg = walker
            .closure(r[0], &NamespaceFilter::from_request("pkg"))
            .unwrap();
        assert_eq!(pkg.iter().copied().collect::<Vec<_>>(), vec![r[0], r[1]]);

        let all = walker.closure(r[0], &NamespaceFilter::All).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_root_without_wiring() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 2);
        connect(&registry, r[0], r[1], "pkg");
        registry.unresolve(r[0]).unwrap();

        let walker = WiringGraphWalker::new(&registry);
        let closure = walker.closure(r[0], &NamespaceFilter::All).unwrap();
        assert_eq!(closure.len(), 1);
        assert!(closure.contains(&r[0]));
    }

    #[test]
    fn test_neighbour_without_wiring_not_followed() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 3);
        connect(&registry, r[0], r[1], "pkg");
        connect(&registry, r[1], r[2], "pkg");
        registry.remove_revision(r[1]).unwrap();

        let walker = WiringGraphWalker::new(&registry);
        let closure = walker.closure(r[0], &NamespaceFilter::All).unwrap();
        assert_eq!(closure.iter().copied().collect::<Vec<_>>(), vec![r[0]]);
    }

    #[test]
    fn test_stale_wiring_contributes_no_edges() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 3);
        connect(&registry, r[0], r[1], "pkg");
        connect(&registry, r[1], r[2], "pkg");
        registry.mark_stale(r[1]).unwrap();

        let walker = WiringGraphWalker::new(&registry);
        let closure = walker.closure(r[0], &NamespaceFilter::All).unwrap();
        // r1 仍可从 r0 的连线到达，但不再向外扩展
        assert_eq!(closure.iter().copied().collect::<Vec<_>>(), vec![r[0], r[1]]);
    }

    #[test]
    fn test_unknown_root() {
        let registry = ModuleRegistry::new();
        let walker = WiringGraphWalker::new(&registry);
        assert!(matches!(
            walker.closure(RevisionHandle::new(3), &NamespaceFilter::All),
            Err(CoreError::RevisionNotFound(3))
        ));
    }

    #[test]
    fn test_extend_closure_builds_union() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 4);
        connect(&registry, r[0], r[1], "pkg");
        connect(&registry, r[2], r[3], "pkg");

        let walker = WiringGraphWalker::new(&registry);
        let mut union = IndexSet::new();
        for root in [r[0], r[2], r[1]] {
            walker
                .extend_closure(root, &NamespaceFilter::All, &mut union)
                .unwrap();
        }
        assert_eq!(union.len(), 4);
        assert_eq!(union.get_index(0), Some(&r[0]));
        assert_eq!(union.get_index(2), Some(&r[2]));
    }

    #[test]
    fn test_long_chain() {
        let registry = ModuleRegistry::new();
        let r = revisions(&registry, 2000);
        for pair in r.windows(2) {
            connect(&registry, pair[0], pair[1], "pkg");
        }

        let walker = WiringGraphWalker::new(&registry);
        let closure = walker.closure(r[0], &NamespaceFilter::All).unwrap();
        assert_eq!(closure.len(), 2000);
    }
}
