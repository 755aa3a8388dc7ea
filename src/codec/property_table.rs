//! 属性表编解码
//!
//! 把完整的属性字典转换为以键索引的三元组表，供远程管理客户端传输。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::typed_value::{decode, encode, EncodedValue, TypedValue};
use crate::utils::Result;

/// 属性字典：保持声明顺序
pub type Properties = IndexMap<String, TypedValue>;

/// 指令字典：保持声明顺序
pub type Directives = IndexMap<String, String>;

/// 属性表：每个键一行 `(key, value, type)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyTable {
    rows: Vec<EncodedValue>,
}

impl PropertyTable {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一行
    pub fn push(&mut self, row: EncodedValue) {
        self.rows.push(row);
    }

    /// 按键查找；存在重复键时返回最后一行
    pub fn get(&self, key: &str) -> Option<&EncodedValue> {
        self.rows.iter().rev().find(|r| r.key == key)
    }

    /// 行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空表
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 遍历所有行
    pub fn iter(&self) -> impl Iterator<Item = &EncodedValue> {
        self.rows.iter()
    }

    /// 编码整个属性字典，每个键一行
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let rows = properties
            .iter()
            .map(|(key, value)| encode(key, value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rows })
    }

    /// 解码为新的属性字典，重复键以最后一行为准
    pub fn to_properties(&self) -> Result<Properties> {
        let mut properties = Properties::with_capacity(self.rows.len());
        for row in &self.rows {
            properties.insert(row.key.clone(), decode(&row.value, &row.type_tag)?);
        }
        Ok(properties)
    }
}

impl FromIterator<EncodedValue> for PropertyTable {
    fn from_iter<I: IntoIterator<Item = EncodedValue>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// 指令表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveEntry {
    /// 指令名
    pub key: String,
    /// 指令值
    pub value: String,
}

/// 指令表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectiveTable {
    rows: Vec<DirectiveEntry>,
}

impl DirectiveTable {
    /// 从指令字典构建
    pub fn from_directives(directives: &Directives) -> Self {
        Self {
            rows: directives
                .iter()
                .map(|(key, value)| DirectiveEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// 转回指令字典
    pub fn to_directives(&self) -> Directives {
        self.rows
            .iter()
            .map(|r| (r.key.clone(), r.value.clone()))
            .collect()
    }

    /// 按键查找
    pub fn get(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .rev()
            .find(|r| r.key == key)
            .map(|r| r.value.as_str())
    }

    /// 行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空表
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 编码属性字典
pub fn to_table(properties: &Properties) -> Result<PropertyTable> {
    PropertyTable::from_properties(properties)
}

/// 解码属性表
pub fn from_table(table: &PropertyTable) -> Result<Properties> {
    table.to_properties()
}
