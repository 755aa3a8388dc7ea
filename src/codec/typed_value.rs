//! 类型化值编解码器
//!
//! 将任意类型化的属性值编码为 `(键, 字符串值, 类型标签)` 三元组，并可严格逆向解码。
//!
//! 类型标签语法：
//!
//! ```text
//! type  := scalarTag | "Array of " scalarOrPrimitiveTag | "Vector of " scalarTag
//! value := literal | literal ("," literal)*
//! ```
//!
//! 数组和向量的元素以 `,` 连接，不做任何转义：包含 `,` 的字符串元素无法无损往返，
//! 含单个空字符串的数组与空数组编码结果相同。这是线格式的既有约束，调用方可能依赖
//! 其精确形式，因此保持不变。
//!
//! # 示例
//!
//! ```rust
//! use chips_wiring::codec::{decode, encode, TypedValue};
//!
//! let sizes = TypedValue::int_array(vec![1, 2, 3]);
//! let encoded = encode("sizes", &sizes).unwrap();
//! assert_eq!(encoded.value, "1,2,3");
//! assert_eq!(encoded.type_tag, "Array of int");
//!
//! assert_eq!(decode("1,2,3", "Array of int").unwrap(), sizes);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::{CoreError, Result};

/// 数组类型标签前缀
pub const ARRAY_KEYWORD: &str = "Array";

/// 向量类型标签前缀
pub const VECTOR_KEYWORD: &str = "Vector";

/// 元素分隔符
pub const ELEMENT_SEPARATOR: char = ',';

static BIG_DECIMAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("Invalid decimal regex")
});

static BIG_INTEGER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("Invalid integer regex"));

// ============================================================================
// 标量类型
// ============================================================================

/// 标量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// 字符串
    String,
    /// 32 位整数
    Integer,
    /// 64 位整数
    Long,
    /// 16 位整数
    Short,
    /// 8 位整数
    Byte,
    /// 单精度浮点数
    Float,
    /// 双精度浮点数
    Double,
    /// 布尔值
    Boolean,
    /// 单个字符
    Character,
    /// 任意精度十进制数
    BigDecimal,
    /// 任意精度整数
    BigInteger,
}

impl ScalarType {
    /// 全部标量类型
    pub const ALL: [ScalarType; 11] = [
        ScalarType::String,
        ScalarType::Integer,
        ScalarType::Long,
        ScalarType::Short,
        ScalarType::Byte,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::Boolean,
        ScalarType::Character,
        ScalarType::BigDecimal,
        ScalarType::BigInteger,
    ];

    /// 规范类型标签
    pub fn tag(self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Integer => "Integer",
            ScalarType::Long => "Long",
            ScalarType::Short => "Short",
            ScalarType::Byte => "Byte",
            ScalarType::Float => "Float",
            ScalarType::Double => "Double",
            ScalarType::Boolean => "Boolean",
            ScalarType::Character => "Character",
            ScalarType::BigDecimal => "BigDecimal",
            ScalarType::BigInteger => "BigInteger",
        }
    }

    /// 原始类型标签，仅用于数组元素；字符串和任意精度类型没有原始形式
    pub fn primitive_tag(self) -> Option<&'static str> {
        match self {
            ScalarType::Integer => Some("int"),
            ScalarType::Long => Some("long"),
            ScalarType::Short => Some("short"),
            ScalarType::Byte => Some("byte"),
            ScalarType::Float => Some("float"),
            ScalarType::Double => Some("double"),
            ScalarType::Boolean => Some("boolean"),
            ScalarType::Character => Some("char"),
            ScalarType::String | ScalarType::BigDecimal | ScalarType::BigInteger => None,
        }
    }

    /// 按规范标签查找
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// 按原始类型标签查找
    pub fn from_primitive_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.primitive_tag() == Some(tag))
    }

    /// 将单个字面量解析为该类型的标量
    pub fn parse(self, literal: &str) -> Result<Scalar> {
        self.parse_as(literal, self.tag())
    }

    fn parse_as(self, literal: &str, tag: &str) -> Result<Scalar> {
        let invalid = |reason: &dyn fmt::Display| CoreError::invalid_element(tag, literal, reason);

        let scalar = match self {
            ScalarType::String => Scalar::String(literal.to_string()),
            ScalarType::Integer => Scalar::Integer(literal.parse().map_err(|e| invalid(&e))?),
            ScalarType::Long => Scalar::Long(literal.parse().map_err(|e| invalid(&e))?),
            ScalarType::Short => Scalar::Short(literal.parse().map_err(|e| invalid(&e))?),
            ScalarType::Byte => Scalar::Byte(literal.parse().map_err(|e| invalid(&e))?),
            ScalarType::Float => Scalar::Float(literal.parse().map_err(|e| invalid(&e))?),
            ScalarType::Double => Scalar::Double(literal.parse().map_err(|e| invalid(&e))?),
            ScalarType::Boolean => match literal.to_ascii_lowercase().as_str() {
                "true" => Scalar::Boolean(true),
                "false" => Scalar::Boolean(false),
                _ => return Err(invalid(&"期望 true 或 false")),
            },
            ScalarType::Character => {
                let mut chars = literal.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Scalar::Character(c),
                    _ => return Err(invalid(&"期望恰好一个字符")),
                }
            }
            ScalarType::BigDecimal if BIG_DECIMAL_REGEX.is_match(literal) => {
                Scalar::BigDecimal(BigDecimal(literal.to_string()))
            }
            ScalarType::BigInteger if BIG_INTEGER_REGEX.is_match(literal) => {
                Scalar::BigInteger(BigInteger(literal.to_string()))
            }
            ScalarType::BigDecimal => return Err(invalid(&"不是合法的十进制数")),
            ScalarType::BigInteger => return Err(invalid(&"不是合法的整数")),
        };
        Ok(scalar)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// 任意精度字面量
// ============================================================================

/// 任意精度十进制数
///
/// 以经过校验的规范字面量保存，编码时原样输出，保证精确往返。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigDecimal(String);

impl BigDecimal {
    /// 字面量文本
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BigDecimal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if BIG_DECIMAL_REGEX.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::invalid_element("BigDecimal", s, "不是合法的十进制数"))
        }
    }
}

impl fmt::Display for BigDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 任意精度整数
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInteger(String);

impl BigInteger {
    /// 字面量文本
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BigInteger {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if BIG_INTEGER_REGEX.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CoreError::invalid_element("BigInteger", s, "不是合法的整数"))
        }
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// 标量值
// ============================================================================

/// 标量值
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// 字符串
    String(String),
    /// 32 位整数
    Integer(i32),
    /// 64 位整数
    Long(i64),
    /// 16 位整数
    Short(i16),
    /// 8 位整数
    Byte(i8),
    /// 单精度浮点数
    Float(f32),
    /// 双精度浮点数
    Double(f64),
    /// 布尔值
    Boolean(bool),
    /// 单个字符
    Character(char),
    /// 任意精度十进制数
    BigDecimal(BigDecimal),
    /// 任意精度整数
    BigInteger(BigInteger),
}

impl Scalar {
    /// 值的运行时类型
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::String(_) => ScalarType::String,
            Scalar::Integer(_) => ScalarType::Integer,
            Scalar::Long(_) => ScalarType::Long,
            Scalar::Short(_) => ScalarType::Short,
            Scalar::Byte(_) => ScalarType::Byte,
            Scalar::Float(_) => ScalarType::Float,
            Scalar::Double(_) => ScalarType::Double,
            Scalar::Boolean(_) => ScalarType::Boolean,
            Scalar::Character(_) => ScalarType::Character,
            Scalar::BigDecimal(_) => ScalarType::BigDecimal,
            Scalar::BigInteger(_) => ScalarType::BigInteger,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(v) => f.write_str(v),
            Scalar::Integer(v) => write!(f, "{}", v),
            Scalar::Long(v) => write!(f, "{}", v),
            Scalar::Short(v) => write!(f, "{}", v),
            Scalar::Byte(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Double(v) => write!(f, "{}", v),
            Scalar::Boolean(v) => write!(f, "{}", v),
            Scalar::Character(v) => write!(f, "{}", v),
            Scalar::BigDecimal(v) => write!(f, "{}", v),
            Scalar::BigInteger(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(v: $ty) -> Self {
                    Scalar::$variant(v.into())
                }
            }

            impl From<$ty> for TypedValue {
                fn from(v: $ty) -> Self {
                    TypedValue::Scalar(Scalar::$variant(v.into()))
                }
            }
        )*
    };
}

impl_scalar_from! {
    String => String,
    &str => String,
    i32 => Integer,
    i64 => Long,
    i16 => Short,
    i8 => Byte,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    char => Character,
    BigDecimal => BigDecimal,
    BigInteger => BigInteger,
}

// ============================================================================
// 类型化值
// ============================================================================

/// 数组元素类型：装箱标量或原始类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementType {
    scalar: ScalarType,
    primitive: bool,
}

impl ElementType {
    /// 装箱元素类型，例如 `Array of Integer`
    pub fn boxed(scalar: ScalarType) -> Self {
        Self { scalar, primitive: false }
    }

    /// 原始元素类型，例如 `Array of int`
    ///
    /// 没有原始形式的类型（String、BigDecimal、BigInteger）返回 `UnsupportedValueType`
    pub fn primitive(scalar: ScalarType) -> Result<Self> {
        if scalar.primitive_tag().is_none() {
            return Err(CoreError::UnsupportedValueType(format!(
                "{} 没有原始类型形式",
                scalar
            )));
        }
        Ok(Self { scalar, primitive: true })
    }

    /// 元素的标量类型
    pub fn scalar(self) -> ScalarType {
        self.scalar
    }

    /// 是否为原始类型
    pub fn is_primitive(self) -> bool {
        self.primitive
    }

    /// 元素类型标签
    pub fn tag(self) -> &'static str {
        if self.primitive {
            self.scalar.primitive_tag().unwrap_or(self.scalar.tag())
        } else {
            self.scalar.tag()
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        ScalarType::from_primitive_tag(tag)
            .map(|scalar| Self { scalar, primitive: true })
            .or_else(|| ScalarType::from_tag(tag).map(Self::boxed))
    }
}

/// 定长同类型数组
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    element: ElementType,
    items: Vec<Scalar>,
}

impl ArrayValue {
    /// 创建数组，所有元素必须与元素类型一致
    pub fn new(element: ElementType, items: Vec<Scalar>) -> Result<Self> {
        if let Some(bad) = items.iter().find(|i| i.scalar_type() != element.scalar()) {
            return Err(CoreError::UnsupportedValueType(format!(
                "Array of {} 中混入了 {} 元素",
                element.tag(),
                bad.scalar_type()
            )));
        }
        Ok(Self { element, items })
    }

    /// 元素类型
    pub fn element(&self) -> ElementType {
        self.element
    }

    /// 数组元素
    pub fn items(&self) -> &[Scalar] {
        &self.items
    }
}

/// 类型化值：标量、定长数组或有序多值序列（向量）
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// 单个标量
    Scalar(Scalar),
    /// 元素类型固定的数组
    Array(ArrayValue),
    /// 向量，元素类型由首个元素推断
    Vector(Vec<Scalar>),
}

macro_rules! primitive_array_ctor {
    ($($name:ident: $ty:ty => $scalar:ident),* $(,)?) => {
        $(
            #[doc = concat!("构造原始类型数组 `Array of ", stringify!($ty), "`")]
            pub fn $name(items: Vec<$ty>) -> Self {
                TypedValue::Array(ArrayValue {
                    element: ElementType { scalar: ScalarType::$scalar, primitive: true },
                    items: items.into_iter().map(Scalar::from).collect(),
                })
            }
        )*
    };
}

impl TypedValue {
    primitive_array_ctor! {
        int_array: i32 => Integer,
        long_array: i64 => Long,
        short_array: i16 => Short,
        byte_array: i8 => Byte,
        float_array: f32 => Float,
        double_array: f64 => Double,
        boolean_array: bool => Boolean,
        char_array: char => Character,
    }

    /// 构造字符串数组 `Array of String`
    pub fn string_array<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        TypedValue::Array(ArrayValue {
            element: ElementType::boxed(ScalarType::String),
            items: items.into_iter().map(|s| Scalar::String(s.into())).collect(),
        })
    }

    /// 构造任意元素类型的数组
    pub fn array(element: ElementType, items: Vec<Scalar>) -> Result<Self> {
        ArrayValue::new(element, items).map(TypedValue::Array)
    }

    /// 构造向量
    pub fn vector<T: Into<Scalar>>(items: impl IntoIterator<Item = T>) -> Self {
        TypedValue::Vector(items.into_iter().map(Into::into).collect())
    }

    /// 从 JSON 值转换
    ///
    /// 字符串、布尔、整数（超出 i64 的转为 BigInteger）和浮点数映射为标量，
    /// 标量数组映射为向量。`null`、对象和嵌套数组返回 `UnsupportedValueType`。
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(scalar_from_json)
                .collect::<Result<Vec<_>>>()
                .map(TypedValue::Vector),
            other => scalar_from_json(other).map(TypedValue::Scalar),
        }
    }

    /// 编码用的类型标签
    pub fn type_tag(&self) -> Result<TypeTag> {
        match self {
            TypedValue::Scalar(s) => Ok(TypeTag::Scalar(s.scalar_type())),
            TypedValue::Array(a) => Ok(TypeTag::Array(a.element)),
            TypedValue::Vector(items) => {
                let element = items
                    .first()
                    .map(Scalar::scalar_type)
                    .unwrap_or(ScalarType::String);
                if let Some(bad) = items.iter().find(|i| i.scalar_type() != element) {
                    return Err(CoreError::UnsupportedValueType(format!(
                        "Vector of {} 中混入了 {} 元素",
                        element,
                        bad.scalar_type()
                    )));
                }
                Ok(TypeTag::Vector(element))
            }
        }
    }
}

fn scalar_from_json(value: &serde_json::Value) -> Result<Scalar> {
    use serde_json::Value;

    match value {
        Value::String(s) => Ok(Scalar::String(s.clone())),
        Value::Bool(b) => Ok(Scalar::Boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Long(i))
            } else if n.is_u64() {
                Ok(Scalar::BigInteger(BigInteger(n.to_string())))
            } else {
                n.as_f64().map(Scalar::Double).ok_or_else(|| {
                    CoreError::UnsupportedValueType(format!("无法表示的数字 {}", n))
                })
            }
        }
        Value::Null => Err(CoreError::UnsupportedValueType("null".to_string())),
        Value::Array(_) => Err(CoreError::UnsupportedValueType("嵌套数组".to_string())),
        Value::Object(_) => Err(CoreError::UnsupportedValueType("对象".to_string())),
    }
}

// ============================================================================
// 类型标签
// ============================================================================

/// 解析后的类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// 标量标签，如 `Long`
    Scalar(ScalarType),
    /// `Array of <tag>`
    Array(ElementType),
    /// `Vector of <Tag>`
    Vector(ScalarType),
}

impl FromStr for TypeTag {
    type Err = CoreError;

    fn from_str(tag: &str) -> Result<Self> {
        let malformed = || CoreError::MalformedTypeTag(tag.to_string());

        for keyword in [ARRAY_KEYWORD, VECTOR_KEYWORD] {
            let rest = match tag.strip_prefix(keyword) {
                Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
                _ => continue,
            };
            // 只接受 "<keyword> of <tag>" 的精确形式
            let element = rest
                .strip_prefix(" of ")
                .filter(|e| !e.is_empty() && !e.contains(char::is_whitespace))
                .ok_or_else(malformed)?;

            return if keyword == ARRAY_KEYWORD {
                ElementType::from_tag(element)
                    .map(TypeTag::Array)
                    .ok_or_else(|| CoreError::UnknownTypeTag(element.to_string()))
            } else if ScalarType::from_primitive_tag(element).is_some() {
                // 向量只能承载装箱类型
                Err(malformed())
            } else {
                ScalarType::from_tag(element)
                    .map(TypeTag::Vector)
                    .ok_or_else(|| CoreError::UnknownTypeTag(element.to_string()))
            };
        }

        if tag.is_empty() || tag.trim() != tag {
            return Err(malformed());
        }
        match tag.split_once(' ') {
            Some((first, _)) => Err(CoreError::UnknownTypeTag(first.to_string())),
            None => ScalarType::from_tag(tag)
                .map(TypeTag::Scalar)
                .ok_or_else(|| CoreError::UnknownTypeTag(tag.to_string())),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Scalar(s) => f.write_str(s.tag()),
            TypeTag::Array(e) => write!(f, "{} of {}", ARRAY_KEYWORD, e.tag()),
            TypeTag::Vector(s) => write!(f, "{} of {}", VECTOR_KEYWORD, s.tag()),
        }
    }
}

// ============================================================================
// 编解码
// ============================================================================

/// 编码后的属性三元组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedValue {
    /// 属性键
    pub key: String,
    /// 字符串形式的值
    pub value: String,
    /// 类型标签
    #[serde(rename = "type")]
    pub type_tag: String,
}

/// 编码单个属性值
///
/// # Errors
///
/// 值包含不一致的元素类型时返回 `UnsupportedValueType`
pub fn encode(key: &str, value: &TypedValue) -> Result<EncodedValue> {
    let type_tag = value.type_tag()?;
    let literal = match value {
        TypedValue::Scalar(s) => s.to_string(),
        TypedValue::Array(a) => join_literals(&a.items),
        TypedValue::Vector(items) => join_literals(items),
    };

    Ok(EncodedValue {
        key: key.to_string(),
        value: literal,
        type_tag: type_tag.to_string(),
    })
}

fn join_literals(items: &[Scalar]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&ELEMENT_SEPARATOR.to_string())
}

/// 解码字符串值
///
/// # Errors
///
/// - `UnknownTypeTag` - 标签中出现未知的类型名
/// - `MalformedTypeTag` - 数组/向量语法错误（例如缺少 "of"）
/// - `InvalidElementValue` - 某个元素无法按声明类型解析
pub fn decode(value: &str, type_tag: &str) -> Result<TypedValue> {
    match type_tag.parse::<TypeTag>()? {
        TypeTag::Scalar(scalar) => scalar.parse(value).map(TypedValue::Scalar),
        TypeTag::Array(element) => {
            let items = split_literals(value, element.scalar(), element.tag())?;
            Ok(TypedValue::Array(ArrayValue { element, items }))
        }
        TypeTag::Vector(scalar) => {
            split_literals(value, scalar, scalar.tag()).map(TypedValue::Vector)
        }
    }
}

fn split_literals(value: &str, scalar: ScalarType, tag: &str) -> Result<Vec<Scalar>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(ELEMENT_SEPARATOR)
        .map(|literal| scalar.parse_as(literal, tag))
        .collect()
}
