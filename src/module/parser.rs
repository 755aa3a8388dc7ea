//! 注册表描述解析器
//!
//! 从 YAML（或 JSON，作为 YAML 子集）描述文件构建 [`ModuleRegistry`]。
//!
//! ```yaml
//! modules:
//!   - id: 1
//!     name: utils
//!     revisions:
//!       - version: 1.0.0
//!         capabilities:
//!           - namespace: pkg
//!             attributes:
//!               name: utils
//!               sizes: { type: Array of int, value: "1,2,3" }
//!             directives:
//!               uses: core
//! wires:
//!   - requirer: { module: 2, revision: 0, requirement: 0 }
//!     provider: { module: 1, revision: 0, capability: 0 }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::{decode, Properties, TypedValue};
use crate::module::metadata::{Capability, ModuleId, Requirement, RevisionHandle, RevisionState};
use crate::module::registry::ModuleRegistry;
use crate::utils::{CoreError, Result};

/// 注册表描述
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDescription {
    /// 模块列表
    #[serde(default)]
    pub modules: Vec<ModuleDescription>,

    /// 连线列表
    #[serde(default)]
    pub wires: Vec<WireDescription>,
}

/// 模块描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescription {
    /// 模块标识
    pub id: ModuleId,

    /// 符号名称
    pub name: String,

    /// 修订版本，最旧的在前；最后一个为当前修订版本
    #[serde(default)]
    pub revisions: Vec<RevisionDescription>,
}

/// 修订版本描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionDescription {
    /// 版本号（semver）
    pub version: String,

    /// 显式状态；省略时由添加顺序决定
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RevisionState>,

    /// 能力声明
    #[serde(default)]
    pub capabilities: Vec<DeclarationDescription>,

    /// 需求声明
    #[serde(default)]
    pub requirements: Vec<DeclarationDescription>,
}

/// 能力或需求声明
///
/// 属性值为普通 YAML 标量或序列时按值推断类型；
/// 为 `{type, value}` 映射时按类型标签解码。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationDescription {
    /// 命名空间
    pub namespace: String,

    /// 属性
    #[serde(default)]
    pub attributes: IndexMap<String, serde_yaml::Value>,

    /// 指令
    #[serde(default)]
    pub directives: IndexMap<String, String>,
}

/// 连线描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDescription {
    /// 需求方
    pub requirer: RequirerRef,
    /// 提供方
    pub provider: ProviderRef,
}

/// 需求方引用：模块、修订版本下标、需求下标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirerRef {
    /// 模块标识
    pub module: ModuleId,
    /// 修订版本下标
    pub revision: usize,
    /// 需求下标
    pub requirement: usize,
}

/// 提供方引用：模块、修订版本下标、能力下标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRef {
    /// 模块标识
    pub module: ModuleId,
    /// 修订版本下标
    pub revision: usize,
    /// 能力下标
    pub capability: usize,
}

/// 注册表描述解析器
#[derive(Debug, Clone, Default)]
pub struct RegistryParser;

impl RegistryParser {
    /// 创建新的解析器实例
    pub fn new() -> Self {
        Self
    }

    /// 从文件解析并构建注册表
    ///
    /// # Errors
    ///
    /// - 文件不存在或无法读取时返回 IO 错误
    /// - 内容不符合 YAML 格式时返回 YAML 错误
    /// - 结构验证失败时返回 `InvalidRegistry` 错误
    /// - 属性值无法解码时返回相应的编解码错误
    pub async fn parse_file(path: &Path) -> Result<ModuleRegistry> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_string(&content)
    }

    /// 从文件同步解析并构建注册表
    pub fn parse_file_sync(path: &Path) -> Result<ModuleRegistry> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_string(&content)
    }

    /// 从字符串解析并构建注册表
    pub fn parse_string(content: &str) -> Result<ModuleRegistry> {
        let description: RegistryDescription = serde_yaml::from_str(content)?;
        Self::validate(&description)?;
        Self::build(&description)
    }

    /// 验证注册表描述
    ///
    /// 执行以下验证：
    /// - 模块标识唯一、名称非空
    /// - 版本号格式（semver）
    /// - 只有最后一个修订版本可以显式声明为当前状态
    /// - 声明的命名空间非空
    /// - 连线引用的模块、修订版本、声明存在且命名空间一致
    pub fn validate(description: &RegistryDescription) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        // 1. 模块与修订版本
        for module in &description.modules {
            if !seen.insert(module.id) {
                errors.push(format!("模块 ID {} 重复", module.id));
            }
            if module.name.trim().is_empty() {
                errors.push(format!("模块 {} 的名称不能为空", module.id));
            }

            let last = module.revisions.len().saturating_sub(1);
            for (index, revision) in module.revisions.iter().enumerate() {
                if semver::Version::parse(&revision.version).is_err() {
                    errors.push(format!(
                        "模块 {} 第 {} 个修订版本的版本号格式无效: '{}'",
                        module.id,
                        index + 1,
                        revision.version
                    ));
                }
                if revision.state == Some(RevisionState::Current) && index != last {
                    errors.push(format!(
                        "模块 {} 第 {} 个修订版本不是最新的，不能声明为 current",
                        module.id,
                        index + 1
                    ));
                }
                for decl in revision.capabilities.iter().chain(&revision.requirements) {
                    if decl.namespace.trim().is_empty() {
                        errors.push(format!(
                            "模块 {} 第 {} 个修订版本存在空命名空间声明",
                            module.id,
                            index + 1
                        ));
                    }
                }
            }
        }

        // 2. 连线引用
        let modules: HashMap<ModuleId, &ModuleDescription> =
            description.modules.iter().map(|m| (m.id, m)).collect();
        for (index, wire) in description.wires.iter().enumerate() {
            let requirement = modules
                .get(&wire.requirer.module)
                .and_then(|m| m.revisions.get(wire.requirer.revision))
                .and_then(|r| r.requirements.get(wire.requirer.requirement));
            let capability = modules
                .get(&wire.provider.module)
                .and_then(|m| m.revisions.get(wire.provider.revision))
                .and_then(|r| r.capabilities.get(wire.provider.capability));

            match (requirement, capability) {
                (Some(req), Some(cap)) if req.namespace != cap.namespace => {
                    errors.push(format!(
                        "第 {} 条连线命名空间不一致: 需求 '{}'，能力 '{}'",
                        index + 1,
                        req.namespace,
                        cap.namespace
                    ));
                }
                (Some(_), Some(_)) => {}
                (None, _) => errors.push(format!("第 {} 条连线的需求方引用无效", index + 1)),
                (_, None) => errors.push(format!("第 {} 条连线的提供方引用无效", index + 1)),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidRegistry(errors.join("; ")))
        }
    }

    /// 按已验证的描述构建注册表
    pub fn build(description: &RegistryDescription) -> Result<ModuleRegistry> {
        let registry = ModuleRegistry::new();
        let mut handles: HashMap<(ModuleId, usize), RevisionHandle> = HashMap::new();
        let mut explicit_states = Vec::new();

        for module in &description.modules {
            registry.install_module(module.id, module.name.clone())?;
            for (index, revision) in module.revisions.iter().enumerate() {
                let handle = registry.add_revision(module.id, &revision.version)?;
                handles.insert((module.id, index), handle);

                for decl in &revision.capabilities {
                    let mut capability = Capability::new(decl.namespace.clone());
                    capability.attributes = Self::attributes(&decl.attributes)?;
                    capability.directives = decl.directives.clone();
                    registry.add_capability(handle, capability)?;
                }
                for decl in &revision.requirements {
                    let mut requirement = Requirement::new(decl.namespace.clone());
                    requirement.attributes = Self::attributes(&decl.attributes)?;
                    requirement.directives = decl.directives.clone();
                    registry.add_requirement(handle, requirement)?;
                }
                if let Some(state) = revision.state {
                    explicit_states.push((handle, state));
                }
            }
        }

        for wire in &description.wires {
            let requirer = Self::handle(&handles, wire.requirer.module, wire.requirer.revision)?;
            let provider = Self::handle(&handles, wire.provider.module, wire.provider.revision)?;
            registry.wire(
                requirer,
                wire.requirer.requirement,
                provider,
                wire.provider.capability,
            )?;
        }

        // 状态最后应用，使失效修订版本保留其连线
        for (handle, state) in explicit_states {
            match state {
                RevisionState::Current => {}
                RevisionState::Stale => registry.mark_stale(handle)?,
                RevisionState::Unresolved => registry.unresolve(handle)?,
            }
        }

        tracing::info!(
            modules = description.modules.len(),
            wires = description.wires.len(),
            "注册表构建完成"
        );
        Ok(registry)
    }

    fn handle(
        handles: &HashMap<(ModuleId, usize), RevisionHandle>,
        module: ModuleId,
        revision: usize,
    ) -> Result<RevisionHandle> {
        handles.get(&(module, revision)).copied().ok_or_else(|| {
            CoreError::InvalidRegistry(format!("模块 {} 没有第 {} 个修订版本", module, revision))
        })
    }

    fn attributes(raw: &IndexMap<String, serde_yaml::Value>) -> Result<Properties> {
        raw.iter()
            .map(|(key, value)| Ok::<_, CoreError>((key.clone(), Self::attribute_value(value)?)))
            .collect()
    }

    /// 转换单个属性值
    fn attribute_value(value: &serde_yaml::Value) -> Result<TypedValue> {
        if let serde_yaml::Value::Mapping(map) = value {
            if let Some(tag) = map.get("type") {
                let tag = tag.as_str().ok_or_else(|| {
                    CoreError::InvalidRegistry("属性的 type 必须是字符串".to_string())
                })?;
                let text = match map.get("value") {
                    Some(v) => Self::scalar_text(v)?,
                    None => String::new(),
                };
                return decode(&text, tag);
            }
        }
        TypedValue::from_json(&serde_json::to_value(value)?)
    }

    /// 取出显式编码形式中的原始文本；序列按逗号连接
    fn scalar_text(value: &serde_yaml::Value) -> Result<String> {
        use serde_yaml::Value;

        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Sequence(items) => Ok(items
                .iter()
                .map(Self::scalar_text)
                .collect::<Result<Vec<_>>>()?
                .join(",")),
            other => Err(CoreError::UnsupportedValueType(format!(
                "无法作为编码文本: {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ScalarType;
    use crate::module::metadata::NamespaceFilter;
    use crate::module::registry::WiringRegistry;

    const SAMPLE: &str = r#"
modules:
  - id: 1
    name: utils
    revisions:
      - version: 1.0.0
        capabilities:
          - namespace: pkg
            attributes:
              name: utils
              version: "1.0"
              size: 3
              sizes: { type: Array of int, value: "1,2,3" }
              tags: [a, b]
            directives:
              uses: core
  - id: 2
    name: app
    revisions:
      - version: 2.0.0
        requirements:
          - namespace: pkg
            directives:
              filter: "(name=utils)"
wires:
  - requirer: { module: 2, revision: 0, requirement: 0 }
    provider: { module: 1, revision: 0, capability: 0 }
"#;

    #[test]
    fn test_parse_sample() {
        let registry = RegistryParser::parse_string(SAMPLE).unwrap();
        assert_eq!(registry.module_count().unwrap(), 2);

        let r = registry.current_revision(1).unwrap();
        let caps = registry.declared_capabilities(r, &NamespaceFilter::All).unwrap();
        assert_eq!(caps.len(), 1);

        let attrs = &caps[0].attributes;
        assert_eq!(attrs["name"], TypedValue::from("utils"));
        assert_eq!(attrs["version"], TypedValue::from("1.0"));
        assert_eq!(attrs["size"], TypedValue::from(3i64));
        assert_eq!(attrs["sizes"], TypedValue::int_array(vec![1, 2, 3]));
        assert_eq!(attrs["tags"], TypedValue::vector(["a", "b"]));
        assert_eq!(caps[0].directives["uses"], "core");

        let s = registry.current_revision(2).unwrap();
        let wiring = registry.wiring(s).unwrap().unwrap();
        assert_eq!(wiring.required.len(), 1);
        assert_eq!(wiring.required[0].provider, r);
    }

    #[test]
    fn test_explicit_encoding_with_sequence_value() {
        let yaml = r#"
modules:
  - id: 1
    name: a
    revisions:
      - version: 1.0.0
        capabilities:
          - namespace: x
            attributes:
              ratios: { type: Vector of Double, value: [1.5, 2] }
"#;
        let registry = RegistryParser::parse_string(yaml).unwrap();
        let r = registry.current_revision(1).unwrap();
        let caps = registry.declared_capabilities(r, &NamespaceFilter::All).unwrap();
        let tag = caps[0].attributes["ratios"].type_tag().unwrap();
        assert_eq!(tag.to_string(), format!("Vector of {}", ScalarType::Double.tag()));
    }

    #[test]
    fn test_validate_collects_errors() {
        let yaml = r#"
modules:
  - id: 1
    name: ""
    revisions:
      - version: one
  - id: 1
    name: dup
wires:
  - requirer: { module: 9, revision: 0, requirement: 0 }
    provider: { module: 1, revision: 0, capability: 0 }
"#;
        let err = RegistryParser::parse_string(yaml).unwrap_err();
        match err {
            CoreError::InvalidRegistry(msg) => {
                assert!(msg.contains("重复"));
                assert!(msg.contains("名称不能为空"));
                assert!(msg.contains("版本号格式无效"));
                assert!(msg.contains("需求方引用无效"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_namespace_mismatch_rejected() {
        let yaml = r#"
modules:
  - id: 1
    name: a
    revisions:
      - version: 1.0.0
        capabilities: [{ namespace: pkg }]
  - id: 2
    name: b
    revisions:
      - version: 1.0.0
        requirements: [{ namespace: bundle }]
wires:
  - requirer: { module: 2, revision: 0, requirement: 0 }
    provider: { module: 1, revision: 0, capability: 0 }
"#;
        assert!(matches!(
            RegistryParser::parse_string(yaml),
            Err(CoreError::InvalidRegistry(_))
        ));
    }

    #[test]
    fn test_bad_attribute_encoding_propagates() {
        let yaml = r#"
modules:
  - id: 1
    name: a
    revisions:
      - version: 1.0.0
        capabilities:
          - namespace: x
            attributes:
              bad: { type: Array int, value: "1" }
"#;
        assert!(matches!(
            RegistryParser::parse_string(yaml),
            Err(CoreError::MalformedTypeTag(_))
        ));
    }

    #[test]
    fn test_explicit_states() {
        let yaml = r#"
modules:
  - id: 1
    name: a
    revisions:
      - version: 1.0.0
      - version: 1.1.0
        state: unresolved
"#;
        let registry = RegistryParser::parse_string(yaml).unwrap();
        let revisions = registry.module_revisions(1).unwrap();
        assert_eq!(revisions.len(), 2);

        let newest = registry.revision(revisions[0]).unwrap();
        assert_eq!(newest.state, RevisionState::Unresolved);
        assert!(registry.wiring(revisions[0]).unwrap().is_none());

        let oldest = registry.revision(revisions[1]).unwrap();
        assert_eq!(oldest.state, RevisionState::Stale);
    }

    #[test]
    fn test_parse_file_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let registry = RegistryParser::parse_file_sync(&path).unwrap();
        assert_eq!(registry.module_ids().unwrap(), vec![1, 2]);
    }
}
