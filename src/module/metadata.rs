//! 模块修订版本与连线的数据模型
//!
//! 定义注册表对外暴露的所有数据结构：修订版本、能力、需求、连线以及命名空间过滤器。

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::codec::{Directives, Properties, TypedValue};

/// 模块标识
pub type ModuleId = u64;

/// "所有命名空间" 哨兵值
pub const ALL_NAMESPACES: &str = "*";

/// 修订版本句柄
///
/// 注册表内部分配的不透明标识，仅在注册表内有意义。
/// 对外报告时须经 `RevisionIdentityTracker` 转换为请求内的本地编号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionHandle(u64);

impl RevisionHandle {
    /// 从原始值构造句柄
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// 获取原始值
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RevisionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// 修订版本状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionState {
    /// 当前修订版本，连线处于使用中
    #[default]
    Current,
    /// 已被新修订版本取代或模块已卸载，连线不再使用
    Stale,
    /// 尚未解析，没有连线
    Unresolved,
}

impl fmt::Display for RevisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionState::Current => write!(f, "current"),
            RevisionState::Stale => write!(f, "stale"),
            RevisionState::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// 命名空间过滤器
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceFilter {
    /// 不过滤
    All,
    /// 只匹配指定命名空间
    Only(String),
}

impl NamespaceFilter {
    /// 从请求参数构造；哨兵值 `"*"` 表示所有命名空间
    ///
    /// ```rust
    /// use chips_wiring::module::metadata::NamespaceFilter;
    ///
    /// assert_eq!(NamespaceFilter::from_request("*"), NamespaceFilter::All);
    /// assert!(NamespaceFilter::from_request("pkg").matches("pkg"));
    /// assert!(!NamespaceFilter::from_request("pkg").matches("bundle"));
    /// ```
    pub fn from_request(namespace: &str) -> Self {
        if namespace == ALL_NAMESPACES {
            NamespaceFilter::All
        } else {
            NamespaceFilter::Only(namespace.to_string())
        }
    }

    /// 命名空间是否被接受
    pub fn matches(&self, namespace: &str) -> bool {
        match self {
            NamespaceFilter::All => true,
            NamespaceFilter::Only(ns) => ns == namespace,
        }
    }

    /// 以请求参数形式返回
    pub fn as_str(&self) -> &str {
        match self {
            NamespaceFilter::All => ALL_NAMESPACES,
            NamespaceFilter::Only(ns) => ns,
        }
    }
}

impl Default for NamespaceFilter {
    fn default() -> Self {
        NamespaceFilter::All
    }
}

impl fmt::Display for NamespaceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! declaration {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            /// 命名空间
            pub namespace: String,
            /// 类型化属性
            pub attributes: Properties,
            /// 字符串指令
            pub directives: Directives,
        }

        impl $name {
            /// 创建指定命名空间的空声明
            pub fn new(namespace: impl Into<String>) -> Self {
                Self {
                    namespace: namespace.into(),
                    attributes: Properties::new(),
                    directives: Directives::new(),
                }
            }

            /// 添加属性
            pub fn with_attribute(
                mut self,
                key: impl Into<String>,
                value: impl Into<TypedValue>,
            ) -> Self {
                self.attributes.insert(key.into(), value.into());
                self
            }

            /// 添加指令
            pub fn with_directive(
                mut self,
                key: impl Into<String>,
                value: impl Into<String>,
            ) -> Self {
                self.directives.insert(key.into(), value.into());
                self
            }
        }
    };
}

declaration!(
    /// 修订版本声明提供的能力
    Capability
);

declaration!(
    /// 修订版本声明的需求
    Requirement
);

/// 修订版本信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRevision {
    /// 句柄
    pub handle: RevisionHandle,
    /// 所属模块
    pub module_id: ModuleId,
    /// 符号名称
    pub symbolic_name: String,
    /// 版本号
    pub version: Version,
    /// 状态
    pub state: RevisionState,
}

/// 一条连线：需求方的某个需求由提供方的某个能力满足
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    /// 被使用的能力
    pub capability: Capability,
    /// 被满足的需求
    pub requirement: Requirement,
    /// 提供方修订版本
    pub provider: RevisionHandle,
    /// 需求方修订版本
    pub requirer: RevisionHandle,
}

impl Wire {
    /// 连线所属命名空间（取能力的命名空间）
    pub fn namespace(&self) -> &str {
        &self.capability.namespace
    }
}

/// 修订版本的解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct Wiring {
    /// 所属修订版本
    pub revision: RevisionHandle,
    /// 是否仍在使用
    pub in_use: bool,
    /// 本修订版本作为需求方的连线
    pub required: Vec<Wire>,
    /// 本修订版本作为提供方的连线
    pub provided: Vec<Wire>,
}

impl Wiring {
    /// 创建使用中的空连线集合
    pub fn new(revision: RevisionHandle) -> Self {
        Self {
            revision,
            in_use: true,
            required: Vec::new(),
            provided: Vec::new(),
        }
    }

    /// 按命名空间过滤的需求连线；不再使用的连线集合不贡献任何连线
    pub fn required_wires<'a>(
        &'a self,
        filter: &'a NamespaceFilter,
    ) -> impl Iterator<Item = &'a Wire> + 'a {
        let in_use = self.in_use;
        self.required
            .iter()
            .filter(move |w| in_use && filter.matches(w.namespace()))
    }

    /// 按命名空间过滤的提供连线；不再使用的连线集合不贡献任何连线
    pub fn provided_wires<'a>(
        &'a self,
        filter: &'a NamespaceFilter,
    ) -> impl Iterator<Item = &'a Wire> + 'a {
        let in_use = self.in_use;
        self.provided
            .iter()
            .filter(move |w| in_use && filter.matches(w.namespace()))
    }
}
