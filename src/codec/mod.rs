//! 编解码模块
//!
//! - 类型化值编解码器：单个值 <-> `(键, 字符串, 类型标签)`
//! - 属性表编解码：属性字典 <-> 三元组表

pub mod property_table;
pub mod typed_value;

pub use property_table::{
    from_table, to_table, DirectiveEntry, DirectiveTable, Directives, Properties, PropertyTable,
};
pub use typed_value::{
    decode, encode, ArrayValue, BigDecimal, BigInteger, ElementType, EncodedValue, Scalar,
    ScalarType, TypeTag, TypedValue,
};
