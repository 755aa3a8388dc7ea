//! 类型化值编解码集成测试

use chips_wiring::codec::{
    decode, encode, from_table, to_table, BigDecimal, Properties, Scalar, ScalarType, TypeTag,
    TypedValue,
};
use chips_wiring::{CoreError, ErrorKind};

/// 整数数组编码为逗号分隔文本并带原始类型标签
#[test]
fn test_encode_int_array() {
    let encoded = encode("sizes", &TypedValue::int_array(vec![1, 2, 3])).unwrap();
    assert_eq!(encoded.key, "sizes");
    assert_eq!(encoded.value, "1,2,3");
    assert_eq!(encoded.type_tag, "Array of int");

    let decoded = decode(&encoded.value, &encoded.type_tag).unwrap();
    assert_eq!(decoded, TypedValue::int_array(vec![1, 2, 3]));
}

/// 装箱数组与原始数组使用不同标签
#[test]
fn test_boxed_and_primitive_arrays_differ() {
    let primitive = decode("1,2", "Array of int").unwrap();
    let boxed = decode("1,2", "Array of Integer").unwrap();
    assert_ne!(primitive, boxed);
    assert_eq!(encode("k", &boxed).unwrap().type_tag, "Array of Integer");
}

/// 标量标签覆盖所有支持的类型
#[test]
fn test_scalar_tags() {
    let cases = [
        ("abc", "String"),
        ("-7", "Integer"),
        ("9000000000", "Long"),
        ("12", "Short"),
        ("-3", "Byte"),
        ("1.5", "Float"),
        ("2.25", "Double"),
        ("TRUE", "Boolean"),
        ("x", "Character"),
        ("3.14159265358979323846", "BigDecimal"),
        ("123456789012345678901234567890", "BigInteger"),
    ];
    for (literal, tag) in cases {
        let value = decode(literal, tag).unwrap();
        assert_eq!(encode("k", &value).unwrap().type_tag, tag);
    }
}

/// 解码失败按原因区分
#[test]
fn test_decode_failures() {
    assert!(matches!(decode("1", "Quaternion"), Err(CoreError::UnknownTypeTag(_))));
    assert!(matches!(decode("1", "Array int"), Err(CoreError::MalformedTypeTag(_))));
    assert!(matches!(
        decode("1,x", "Array of int"),
        Err(CoreError::InvalidElementValue { .. })
    ));
    assert!(matches!(decode("ab", "Character"), Err(CoreError::InvalidElementValue { .. })));
    assert!(matches!(decode("300", "Byte"), Err(CoreError::InvalidElementValue { .. })));

    for err in [
        decode("1", "Quaternion").unwrap_err(),
        decode("1", "Vector int").unwrap_err(),
        decode("z", "Long").unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::InvalidEncoding);
    }
}

/// 空字符串解码为空集合
#[test]
fn test_empty_collections() {
    match decode("", "Vector of Long").unwrap() {
        TypedValue::Vector(items) => assert!(items.is_empty()),
        other => panic!("unexpected value: {other:?}"),
    }
    match decode("", "Array of double").unwrap() {
        TypedValue::Array(array) => assert!(array.items().is_empty()),
        other => panic!("unexpected value: {other:?}"),
    }
}

/// 向量元素类型取自元素
#[test]
fn test_vector_tag_from_elements() {
    let value = TypedValue::vector([1i64, 2, 3]);
    let encoded = encode("v", &value).unwrap();
    assert_eq!(encoded.type_tag, "Vector of Long");
    assert_eq!(encoded.value, "1,2,3");
}

/// 逗号转义缺口：含逗号的字符串元素往返后拆分
#[test]
fn test_comma_in_element_splits() {
    let value = TypedValue::string_array(["a,b", "c"]);
    let encoded = encode("k", &value).unwrap();
    assert_eq!(encoded.value, "a,b,c");

    match decode(&encoded.value, &encoded.type_tag).unwrap() {
        TypedValue::Array(array) => assert_eq!(array.items().len(), 3),
        other => panic!("unexpected value: {other:?}"),
    }
}

/// 高精度数值保持原始文本
#[test]
fn test_big_decimal_keeps_text() {
    let value = decode("0.10000000000000000000001", "BigDecimal").unwrap();
    assert_eq!(
        value,
        TypedValue::Scalar(Scalar::BigDecimal(
            "0.10000000000000000000001".parse::<BigDecimal>().unwrap()
        ))
    );
}

/// 类型标签解析
#[test]
fn test_type_tag_parsing() {
    assert_eq!(
        "Vector of Double".parse::<TypeTag>().unwrap(),
        TypeTag::Vector(ScalarType::Double)
    );
    assert!(matches!("Array".parse::<TypeTag>(), Err(CoreError::MalformedTypeTag(_))));
    assert!(matches!("int".parse::<TypeTag>(), Err(CoreError::UnknownTypeTag(_))));
}

/// 属性表：每个键一行，解码得到相同字典
#[test]
fn test_property_table() {
    let mut props = Properties::new();
    props.insert("name".into(), TypedValue::from("utils"));
    props.insert("version".into(), TypedValue::from("1.0"));
    props.insert("ranks".into(), TypedValue::long_array(vec![3, 1]));

    let table = to_table(&props).unwrap();
    assert_eq!(table.len(), props.len());
    for (key, _) in &props {
        assert!(table.get(key).is_some());
    }
    assert_eq!(from_table(&table).unwrap(), props);
}
