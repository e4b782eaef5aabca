//! Integration tests: schema-driven decoding end to end, fatal vs collected errors, decode
//! options, validate-only, encoding, and sharing one codec across threads.

use serde_json::json;
use std::sync::Arc;
use wirerule::{
    CompileError, Codec, Cursor, DecodeError, DecodeOptions, EncodeError, ErrorKind, FieldDef, Measure, RecordType,
    SchemaError, Shape, ValidationErrors, Value,
};

fn decode(codec: &Codec, shape: &Shape, rule: &str, json: &str) -> (Value, Result<(), DecodeError>) {
    let validator = codec.compile(shape, rule).expect("compile");
    let mut dest = Value::zero(shape);
    let out = codec.decode(&mut dest, shape, &mut Cursor::new(json), &validator);
    (dest, out)
}

fn invalid(out: Result<(), DecodeError>) -> ValidationErrors {
    match out {
        Err(DecodeError::Invalid(errs)) => errs,
        other => panic!("expected validation errors, got {:?}", other),
    }
}

fn item() -> Shape {
    RecordType::new("Item")
        .field(FieldDef::new("name", Shape::String).rule("@string[1,5]"))
        .field(FieldDef::new("tags", Shape::list(Shape::String)))
        .into_shape()
}

// ==================== End to end ====================

#[test]
fn decode_valid_record() {
    let codec = Codec::new();
    let value = codec
        .decode_str(r#"{"name":"ab","tags":["x"]}"#, &item(), "")
        .expect("decode");
    assert_eq!(
        value,
        Value::Record(vec![Value::from("ab"), Value::List(vec![Value::from("x")])])
    );
}

#[test]
fn decode_reports_length_error_and_keeps_going() {
    let codec = Codec::new();
    let (value, out) = decode(&codec, &item(), "", r#"{"name":"abcdef"}"#);
    let errs = invalid(out);
    assert_eq!(errs.len(), 1);
    let e = errs.at("/name").expect("error at /name");
    match &e.kind {
        ErrorKind::OutOfRange { measure, actual, .. } => {
            assert_eq!(*measure, Measure::Length);
            assert_eq!(actual, "6");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(e.code(), "out_of_range");
    // Failed values leave the destination untouched; absent optional lists stay empty.
    assert_eq!(value, Value::Record(vec![Value::from(""), Value::List(Vec::new())]));
}

#[test]
fn decode_error_display_names_the_path() {
    let codec = Codec::new();
    let err = codec.decode_str(r#"{"name":"abcdef"}"#, &item(), "").unwrap_err();
    assert!(!err.is_fatal());
    let text = err.to_string();
    assert!(text.contains("/name"), "{}", text);
}

// ==================== Required, optional, default ====================

#[test]
fn null_against_required_scalar_is_missing_required() {
    let codec = Codec::new();
    for (shape, rule) in [
        (Shape::Bool, "@bool"),
        (Shape::i64(), "@int"),
        (Shape::u64(), "@uint[1,]"),
        (Shape::f64(), "@float"),
        (Shape::String, "@string[1,]"),
    ] {
        let (value, out) = decode(&codec, &shape, rule, "null");
        let errs = invalid(out);
        assert_eq!(errs.len(), 1, "{}", rule);
        assert_eq!(errs.as_slice()[0].kind, ErrorKind::MissingRequired);
        assert!(errs.as_slice()[0].pointer.is_root());
        assert_eq!(value, Value::zero(&shape));
    }
}

#[test]
fn root_error_display() {
    let codec = Codec::new();
    let (_, out) = decode(&codec, &Shape::i64(), "@int", "null");
    let errs = invalid(out);
    assert_eq!(errs.as_slice()[0].to_string(), "(root): value is required");
}

#[test]
fn null_against_optional_yields_zero() {
    let codec = Codec::new();
    let (value, out) = decode(&codec, &Shape::i64(), "@int?", "null");
    out.expect("optional");
    assert_eq!(value, Value::Int(0));

    let shape = Shape::pointer(Shape::String);
    let (value, out) = decode(&codec, &shape, "@string?", "null");
    out.expect("optional pointer");
    assert_eq!(value, Value::Null);
}

#[test]
fn default_equals_decoding_the_literal() {
    let codec = Codec::new();
    let (defaulted, out) = decode(&codec, &Shape::i64(), "@int?='42'", "null");
    out.expect("default");
    let (direct, out) = decode(&codec, &Shape::i64(), "@int", "42");
    out.expect("direct");
    assert_eq!(defaulted, direct);

    let (defaulted, out) = decode(&codec, &Shape::String, "@string?='hi there'", "null");
    out.expect("string default");
    assert_eq!(defaulted, Value::from("hi there"));

    let (defaulted, out) = decode(&codec, &Shape::list(Shape::i64()), "@slice?='[1,2]'", "null");
    out.expect("list default");
    assert_eq!(defaulted, Value::List(vec![Value::Int(1), Value::Int(2)]));
}

#[test]
fn default_is_validated_when_compiled() {
    let codec = Codec::new();
    for rule in ["@int[0,10]?='42'", "@int?='abc'"] {
        assert!(matches!(codec.compile(&Shape::i64(), rule), Err(CompileError::InvalidRule { .. })), "{}", rule);
        match codec.decode_str("null", &Shape::i64(), rule) {
            Err(DecodeError::Compile {
                source: CompileError::InvalidRule { .. },
                ..
            }) => {}
            other => panic!("{}: unexpected {:?}", rule, other),
        }
    }

    let shape = RecordType::new("Server")
        .field(FieldDef::new("port", Shape::Uint { bits: 16 }).rule("@uint?='http'"))
        .into_shape();
    let err = codec.decode_str("{}", &shape, "").unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, DecodeError::Compile { .. }));
}

#[test]
fn absent_member_with_default() {
    let shape = RecordType::new("Server")
        .field(FieldDef::new("host", Shape::String).rule("@hostname"))
        .field(FieldDef::new("port", Shape::Uint { bits: 16 }).rule("@uint?='8080'"))
        .into_shape();
    let codec = Codec::new();
    let value = codec.decode_str(r#"{"host":"example.com"}"#, &shape, "").expect("decode");
    assert_eq!(value, Value::Record(vec![Value::from("example.com"), Value::Uint(8080)]));
}

#[test]
fn field_hints_shape_the_inferred_rule() {
    let shape = RecordType::new("Profile")
        .field(FieldDef::new("email", Shape::String).format("email"))
        .field(FieldDef::new("nick", Shape::String).omit_empty())
        .field(FieldDef::new("level", Shape::String).default_value("info"))
        .into_shape();
    let codec = Codec::new();
    let (value, out) = decode(&codec, &shape, "", r#"{"email":"nope"}"#);
    let errs = invalid(out);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.at("/email").expect("email").code(), "invalid_format");
    assert_eq!(value.as_record().expect("record")[2], Value::from("info"));

    let (_, out) = decode(&codec, &shape, "", "{}");
    let errs = invalid(out);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.at("/email").expect("email").kind, ErrorKind::MissingRequired);
}

#[test]
fn required_record_reports_its_fields() {
    let inner = RecordType::new("Inner").field(FieldDef::new("x", Shape::i64()));
    let shape = RecordType::new("Outer")
        .field(FieldDef::new("inner", Shape::record(inner)))
        .into_shape();
    let codec = Codec::new();
    for input in ["{}", r#"{"inner":null}"#] {
        let (_, out) = decode(&codec, &shape, "", input);
        let errs = invalid(out);
        assert_eq!(errs.len(), 1, "{}", input);
        assert_eq!(errs.at("/inner/x").expect("inner x").kind, ErrorKind::MissingRequired);
    }
}

#[test]
fn optional_pointer_record_stays_null() {
    let inner = RecordType::new("Inner").field(FieldDef::new("x", Shape::i64()));
    let shape = RecordType::new("Outer")
        .field(FieldDef::new("inner", Shape::pointer(Shape::record(inner))))
        .into_shape();
    let codec = Codec::new();
    let value = codec.decode_str("{}", &shape, "").expect("decode");
    assert_eq!(value, Value::Record(vec![Value::Null]));
    let value = codec.decode_str(r#"{"inner":{"x":3}}"#, &shape, "").expect("decode");
    assert_eq!(value, Value::Record(vec![Value::Record(vec![Value::Int(3)])]));
}

// ==================== Ranges and containers ====================

#[test]
fn range_inclusivity_through_decode() {
    let codec = Codec::new();
    for (rule, input, ok) in [
        ("@int[1,10]", "1", true),
        ("@int[1,10]", "10", true),
        ("@int[1,10]", "0", false),
        ("@int[1,10]", "11", false),
        ("@int(1,10)", "1", false),
        ("@int(1,10)", "10", false),
        ("@int(1,10)", "5", true),
    ] {
        let (_, out) = decode(&codec, &Shape::i64(), rule, input);
        assert_eq!(out.is_ok(), ok, "{} with {}", rule, input);
    }
}

#[test]
fn element_and_count_errors_are_independent() {
    let codec = Codec::new();
    let shape = Shape::list(Shape::i64());
    let (value, out) = decode(&codec, &shape, "@slice<@int[1,]>[2,]", "[0, 5]");
    let errs = invalid(out);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.at("/0").expect("element error").code(), "out_of_range");
    assert_eq!(value, Value::List(vec![Value::Int(0), Value::Int(5)]));

    let (_, out) = decode(&codec, &shape, "@slice<@int[1,]>[2,]", "[0]");
    let errs = invalid(out);
    assert_eq!(errs.len(), 2);
    assert!(errs.at("/0").is_some());
    match &errs.at("").expect("count error").kind {
        ErrorKind::OutOfRange { measure, actual, .. } => {
            assert_eq!(*measure, Measure::Count);
            assert_eq!(actual, "1");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn nested_list_of_records_path() {
    let point = RecordType::new("Point").field(FieldDef::new("x", Shape::i64()).rule("@int[0,]"));
    let shape = RecordType::new("Path")
        .field(FieldDef::new("items", Shape::list(Shape::record(point))))
        .into_shape();
    let codec = Codec::new();
    let (_, out) = decode(&codec, &shape, "", r#"{"items":[{"x":1},{"x":-1}]}"#);
    let errs = invalid(out);
    assert_eq!(errs.len(), 1);
    assert!(errs.at("/items/1/x").is_some());

    let (_, out) = decode(&codec, &shape, "", r#"{"items":[{"x":-1}]}"#);
    assert!(invalid(out).at("/items/0/x").is_some());
}

#[test]
fn map_entries_are_validated_by_key() {
    let shape = RecordType::new("Scores")
        .field(FieldDef::new("m", Shape::map(Shape::String, Shape::i64())).rule("@map<@string,@int[0,]>[1,]"))
        .into_shape();
    let codec = Codec::new();
    let (_, out) = decode(&codec, &shape, "", r#"{"m":{"ok":1,"a/b":-1,"c d":-2}}"#);
    let errs = invalid(out);
    assert_eq!(errs.len(), 2);
    assert!(errs.at("/m/a~1b").is_some());
    let spaced = errs.iter().find(|e| e.pointer.to_uri_fragment() == "#/m/c%20d");
    assert!(spaced.is_some());

    let (_, out) = decode(&codec, &shape, "", r#"{"m":{}}"#);
    assert_eq!(invalid(out).at("/m").expect("count").code(), "out_of_range");
}

#[test]
fn numeric_map_keys_collide_by_value() {
    let codec = Codec::new();
    let shape = Shape::map(Shape::i64(), Shape::i64());
    let (value, out) = decode(&codec, &shape, "", r#"{"1":1,"01":2}"#);
    assert_eq!(invalid(out).at("/01").expect("dup").kind, ErrorKind::DuplicateKey { key: "01".into() });
    assert_eq!(value, Value::Map(vec![(Value::Int(1), Value::Int(1))]));

    let lenient = Codec::with_options(DecodeOptions {
        allow_duplicate_keys: true,
        ..DecodeOptions::default()
    });
    let value = lenient.decode_str(r#"{"1":1,"01":2}"#, &shape, "").expect("decode");
    assert_eq!(value, Value::Map(vec![(Value::Int(1), Value::Int(2))]));

    let floats = Shape::map(Shape::f64(), Shape::i64());
    let value = lenient.decode_str(r#"{"1.5":1,"1.50":2,"2":3}"#, &floats, "").expect("decode");
    assert_eq!(
        value,
        Value::Map(vec![(Value::Float(1.5), Value::Int(2)), (Value::Float(2.0), Value::Int(3))])
    );
}

#[test]
fn map_with_numeric_keys() {
    let codec = Codec::new();
    let shape = Shape::map(Shape::i64(), Shape::String);
    let (value, out) = decode(&codec, &shape, "", r#"{"1":"a","x":"b"}"#);
    let errs = invalid(out);
    assert_eq!(errs.at("/x").expect("bad key").code(), "invalid_type");
    assert_eq!(value, Value::Map(vec![(Value::Int(1), Value::from("a"))]));
}

// ==================== Catch-all and unknown members ====================

#[test]
fn unknown_members_land_in_catch_all() {
    let shape = RecordType::new("Event")
        .field(FieldDef::new("kind", Shape::String))
        .field(FieldDef::new("extra", Shape::map(Shape::String, Shape::Any)).unknown())
        .into_shape();
    let codec = Codec::new();
    let value = codec
        .decode_str(r#"{"kind":"click","x":1,"meta":{"d":[1,2]}}"#, &shape, "")
        .expect("decode");
    let extra = &value.as_record().expect("record")[1];
    assert_eq!(extra.get_key("x"), Some(&Value::Any(json!(1))));
    assert_eq!(extra.get_key("meta"), Some(&Value::Any(json!({"d": [1, 2]}))));
    assert_eq!(extra.as_map().expect("map").len(), 2);
}

#[test]
fn open_value_catch_all_keeps_members_verbatim() {
    let shape = RecordType::new("Event")
        .field(FieldDef::new("kind", Shape::String))
        .field(FieldDef::new("rest", Shape::Any).unknown())
        .into_shape();
    let codec = Codec::with_options(DecodeOptions {
        reject_unknown_fields: true,
        ..DecodeOptions::default()
    });
    let value = codec
        .decode_str(r#"{"a":[true,null],"kind":"k","b":"s"}"#, &shape, "")
        .expect("decode");
    assert_eq!(value.as_record().expect("record")[1], Value::Any(json!({"a": [true, null], "b": "s"})));
}

#[test]
fn unknown_members_are_skipped_by_default() {
    let codec = Codec::new();
    let value = codec
        .decode_str(r#"{"name":"ab","other":{"deep":[1,2,3]}}"#, &item(), "")
        .expect("decode");
    assert_eq!(value.as_record().expect("record")[0], Value::from("ab"));
}

#[test]
fn unknown_members_rejected_on_request() {
    let codec = Codec::with_options(DecodeOptions {
        reject_unknown_fields: true,
        ..DecodeOptions::default()
    });
    let (_, out) = decode(&codec, &item(), "", r#"{"name":"ab","other":1}"#);
    let errs = invalid(out);
    assert_eq!(
        errs.at("/other").expect("unknown").kind,
        ErrorKind::UnknownField { name: "other".into() }
    );
}

// ==================== Duplicate keys and casing ====================

#[test]
fn duplicate_member_is_reported() {
    let codec = Codec::new();
    let (value, out) = decode(&codec, &item(), "", r#"{"name":"ab","name":"cd"}"#);
    let errs = invalid(out);
    assert_eq!(errs.at("/name").expect("dup").kind, ErrorKind::DuplicateKey { key: "name".into() });
    assert_eq!(value.as_record().expect("record")[0], Value::from("ab"));
}

#[test]
fn duplicates_allowed_keep_last() {
    let codec = Codec::with_options(DecodeOptions {
        allow_duplicate_keys: true,
        ..DecodeOptions::default()
    });
    let value = codec.decode_str(r#"{"name":"ab","name":"cd"}"#, &item(), "").expect("decode");
    assert_eq!(value.as_record().expect("record")[0], Value::from("cd"));

    let shape = Shape::map(Shape::String, Shape::i64());
    let value = codec.decode_str(r#"{"k":1,"k":2}"#, &shape, "").expect("decode");
    assert_eq!(value, Value::Map(vec![(Value::from("k"), Value::Int(2))]));
}

#[test]
fn duplicate_map_key_is_reported() {
    let codec = Codec::new();
    let shape = Shape::map(Shape::String, Shape::i64());
    let (value, out) = decode(&codec, &shape, "", r#"{"k":1,"k":2}"#);
    assert_eq!(invalid(out).at("/k").expect("dup").code(), "duplicate_key");
    assert_eq!(value, Value::Map(vec![(Value::from("k"), Value::Int(1))]));
}

#[test]
fn case_insensitive_matching() {
    let shape = RecordType::new("User")
        .field(FieldDef::new("UserName", Shape::String))
        .into_shape();
    let (_, out) = decode(&Codec::new(), &shape, "", r#"{"username":"ada"}"#);
    assert_eq!(invalid(out).at("/UserName").expect("missing").kind, ErrorKind::MissingRequired);

    let codec = Codec::with_options(DecodeOptions {
        case_insensitive: true,
        ..DecodeOptions::default()
    });
    let value = codec.decode_str(r#"{"username":"ada"}"#, &shape, "").expect("decode");
    assert_eq!(value, Value::Record(vec![Value::from("ada")]));
}

// ==================== Inlining ====================

#[test]
fn inline_fields_decode_into_nested_slots() {
    let base = RecordType::new("Base")
        .field(FieldDef::new("created", Shape::i64()))
        .field(FieldDef::new("updated", Shape::i64()));
    let shape = RecordType::new("Doc")
        .field(FieldDef::new("id", Shape::i64()))
        .field(FieldDef::new("base", Shape::record(base)).inline())
        .into_shape();
    let codec = Codec::new();
    let (value, out) = decode(&codec, &shape, "", r#"{"id":1,"created":2}"#);
    let errs = invalid(out);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.at("/updated").expect("updated").kind, ErrorKind::MissingRequired);
    assert_eq!(
        value,
        Value::Record(vec![Value::Int(1), Value::Record(vec![Value::Int(2), Value::Int(0)])])
    );
}

#[test]
fn embedded_pointer_allocated_on_demand() {
    let meta = RecordType::new("Meta").field(FieldDef::new("tag", Shape::pointer(Shape::String)));
    let shape = RecordType::new("Doc")
        .field(FieldDef::new("id", Shape::i64()))
        .field(FieldDef::new("meta", Shape::pointer(Shape::record(meta))).inline())
        .into_shape();
    let codec = Codec::new();
    let value = codec.decode_str(r#"{"id":1}"#, &shape, "").expect("decode");
    assert_eq!(value, Value::Record(vec![Value::Int(1), Value::Null]));
    let value = codec.decode_str(r#"{"id":1,"tag":"x"}"#, &shape, "").expect("decode");
    assert_eq!(
        value,
        Value::Record(vec![Value::Int(1), Value::Record(vec![Value::from("x")])])
    );
}

// ==================== Scalar encodings ====================

#[test]
fn stringified_numbers_and_bools() {
    let shape = RecordType::new("Q")
        .field(FieldDef::new("n", Shape::i64()).rule("@int[1,]").stringified())
        .field(FieldDef::new("flag", Shape::Bool).stringified())
        .into_shape();
    let codec = Codec::new();
    let value = codec.decode_str(r#"{"n":"42","flag":"true"}"#, &shape, "").expect("decode");
    assert_eq!(value, Value::Record(vec![Value::Int(42), Value::Bool(true)]));

    let (_, out) = decode(&codec, &shape, "", r#"{"n":"0","flag":"maybe"}"#);
    let errs = invalid(out);
    assert_eq!(errs.at("/n").expect("n").code(), "out_of_range");
    assert_eq!(errs.at("/flag").expect("flag").code(), "invalid_type");
}

#[test]
fn quoted_number_without_flag_is_invalid_type() {
    let codec = Codec::new();
    let (_, out) = decode(&codec, &Shape::i64(), "@int", r#""42""#);
    assert_eq!(
        invalid(out).as_slice()[0].kind,
        ErrorKind::invalid_type("int64", "string")
    );
}

#[test]
fn bytes_travel_as_base64() {
    let shape = RecordType::new("Blob").field(FieldDef::new("data", Shape::Bytes)).into_shape();
    let codec = Codec::new();
    let value = codec.decode_str(r#"{"data":"aGVsbG8="}"#, &shape, "").expect("decode");
    assert_eq!(value.as_record().expect("record")[0].as_bytes(), Some(&b"hello"[..]));

    let (_, out) = decode(&codec, &shape, "", r#"{"data":"%%%"}"#);
    assert_eq!(invalid(out).at("/data").expect("data").code(), "invalid_type");
}

#[test]
fn single_precision_floats_round_through_f32() {
    let codec = Codec::new();
    let shape = Shape::Float { bits: 32 };
    let value = codec.decode_str("0.1", &shape, "").expect("decode");
    assert_eq!(value, Value::Float(0.1f32 as f64));
}

#[test]
fn single_precision_values_validate_and_encode_at_their_precision() {
    let codec = Codec::new();
    let shape = Shape::Float { bits: 32 };
    for rule in ["", "@float<3,1>"] {
        let value = codec.decode_str("0.1", &shape, rule).expect("decode");
        let validator = codec.compile(&shape, rule).expect("compile");
        codec.validate_only(&value, &shape, &validator).expect("validate");
        let text = codec.encode(&value, &shape).expect("encode");
        assert_eq!(text, "0.1");
        assert_eq!(codec.decode_str(&text, &shape, rule).expect("decode again"), value);
    }

    let record = RecordType::new("Reading")
        .field(FieldDef::new("temp", Shape::Float { bits: 32 }).rule("@float<4,2>"))
        .into_shape();
    let value = codec.decode_str(r#"{"temp":21.37}"#, &record, "").expect("decode");
    assert_eq!(codec.encode(&value, &record).expect("encode"), r#"{"temp":21.37}"#);
}

#[test]
fn huge_exponent_on_zero_is_zero() {
    let codec = Codec::new();
    let value = codec.decode_str("0e9223372036854775807", &Shape::f64(), "").expect("decode");
    assert_eq!(value, Value::Float(0.0));
    let err = codec.decode_str("1e-9223372036854775808", &Shape::f64(), "").unwrap_err();
    assert_eq!(err.validation_errors().expect("invalid").as_slice()[0].code(), "precision_exceeded");
}

#[test]
fn single_element_array_unwraps_to_scalar() {
    let codec = Codec::new();
    assert_eq!(codec.decode_str("[5]", &Shape::i64(), "@int").expect("decode"), Value::Int(5));
    let err = codec.decode_str("[1,2]", &Shape::i64(), "@int").unwrap_err();
    assert!(matches!(
        err,
        DecodeError::UnexpectedToken {
            expected: "single-element array",
            ..
        }
    ));
}

#[test]
fn open_values_are_kept_as_json() {
    let shape = RecordType::new("Doc").field(FieldDef::new("meta", Shape::Any)).into_shape();
    let codec = Codec::new();
    let value = codec.decode_str(r#"{"meta":{"a":[1,true]}}"#, &shape, "").expect("decode");
    assert_eq!(value.as_record().expect("record")[0].as_any(), Some(&json!({"a": [1, true]})));
    let value = codec.decode_str("{}", &shape, "").expect("decode");
    assert_eq!(value.as_record().expect("record")[0], Value::Any(serde_json::Value::Null));
}

// ==================== Fatal errors ====================

#[test]
fn malformed_json_is_fatal() {
    let codec = Codec::new();
    let err = codec.decode_str(r#"{"name":"#, &item(), "").unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, DecodeError::Syntax { .. }));
    assert!(err.validation_errors().is_none());
}

#[test]
fn fatal_errors_name_the_value_being_decoded() {
    let codec = Codec::new();
    let err = codec.decode_str(r#"{"name":"ab","tags":["x", tru]}"#, &item(), "").unwrap_err();
    assert!(matches!(err, DecodeError::Syntax { .. }));
    assert_eq!(err.pointer().expect("pointer").to_string(), "/tags/1");
    assert!(err.to_string().contains("/tags/1"), "{}", err);

    let items = Shape::list(item());
    let err = codec.decode_str(r#"[{"name":"a"},{"name": nul}]"#, &items, "").unwrap_err();
    assert_eq!(err.pointer().expect("pointer").to_string(), "/1/name");

    let err = codec.decode_str(r#"{"other": [1,}"#, &item(), "").unwrap_err();
    assert_eq!(err.pointer().expect("pointer").to_string(), "/other");

    let err = codec.decode_str("tru", &item(), "").unwrap_err();
    assert!(err.pointer().expect("pointer").is_root());

    let bad = RecordType::new("Bad")
        .field(FieldDef::new("a", Shape::String).rule("@nope"))
        .into_shape();
    let err = codec.decode_str(r#"{"inner":[{}]}"#, &wrapper(bad), "").unwrap_err();
    assert!(matches!(err, DecodeError::Compile { .. }));
    assert_eq!(err.pointer().expect("pointer").to_string(), "/inner/0");
}

fn wrapper(inner: Shape) -> Shape {
    RecordType::new("Wrapper")
        .field(FieldDef::new("inner", Shape::list(inner)))
        .into_shape()
}

#[test]
fn container_where_scalar_expected_is_fatal() {
    let codec = Codec::new();
    let err = codec.decode_str(r#"{"name":{}}"#, &item(), "").unwrap_err();
    match err {
        DecodeError::UnexpectedToken { pointer, expected, found } => {
            assert_eq!(pointer.to_string(), "/name");
            assert_eq!(expected, "string");
            assert_eq!(found, "object");
        }
        other => panic!("unexpected {:?}", other),
    }

    let err = codec.decode_str("[]", &item(), "").unwrap_err();
    assert!(matches!(err, DecodeError::UnexpectedToken { expected: "object", .. }));
}

#[test]
fn fatal_error_discards_collected_errors() {
    let codec = Codec::new();
    let err = codec.decode_str(r#"{"name":"abcdef","tags":{}}"#, &item(), "").unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn trailing_data_is_fatal() {
    let codec = Codec::new();
    let err = codec.decode_str(r#""a" 1"#, &Shape::String, "").unwrap_err();
    assert!(matches!(err, DecodeError::TrailingData { offset: 4 }));
}

#[test]
fn invalid_utf8_is_fatal() {
    let codec = Codec::new();
    let err = codec.decode_slice(&[b'"', 0xff, b'"'], &Shape::String, "").unwrap_err();
    assert!(matches!(err, DecodeError::Syntax { offset: 1, .. }));
}

#[test]
fn nesting_limit() {
    let codec = Codec::with_options(DecodeOptions {
        max_depth: 2,
        ..DecodeOptions::default()
    });
    let shape = Shape::list(Shape::list(Shape::list(Shape::i64())));
    assert!(codec.decode_str("[[]]", &shape, "").is_ok());
    match codec.decode_str("[[[1]]]", &shape, "").unwrap_err() {
        DecodeError::DepthExceeded { pointer, limit } => {
            assert_eq!(pointer.to_string(), "/0/0");
            assert_eq!(limit, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn compile_and_schema_errors_surface_from_decode() {
    let codec = Codec::new();
    let shape = RecordType::new("Bad")
        .field(FieldDef::new("a", Shape::String).rule("@nope"))
        .into_shape();
    assert!(matches!(
        codec.decode_str("{}", &shape, ""),
        Err(DecodeError::Compile {
            source: CompileError::UnknownRule(_),
            ..
        })
    ));

    let shape = RecordType::new("Ambiguous")
        .field(FieldDef::new("x", Shape::Any).unknown())
        .field(FieldDef::new("y", Shape::Any).unknown())
        .into_shape();
    assert!(matches!(
        codec.decode_str("{}", &shape, ""),
        Err(DecodeError::Compile {
            source: CompileError::Schema(SchemaError::AmbiguousCatchAll { .. }),
            ..
        })
    ));
}

#[test]
fn integer_shape_of_zero_width_fails_to_compile() {
    let codec = Codec::new();
    match codec.decode_str("1", &Shape::Int { bits: 0 }, "") {
        Err(DecodeError::Compile {
            source: CompileError::ShapeMismatch { .. },
            ..
        }) => {}
        other => panic!("unexpected {:?}", other),
    }
}

// ==================== Partial results ====================

#[test]
fn decode_partial_keeps_what_decoded() {
    let codec = Codec::new();
    let (value, out) = codec.decode_partial(br#"{"name":"abcdef"}"#, &item(), "");
    let errs = invalid(out);
    assert_eq!(errs.len(), 1);
    assert!(errs.at("/name").is_some());
    assert_eq!(value.as_record().expect("record")[1], Value::List(Vec::new()));

    let (value, out) = codec.decode_partial(br#"{"name":"ab","tags":["x","y""#, &item(), "");
    assert!(out.expect_err("truncated").is_fatal());
    assert_eq!(value.as_record().expect("record")[0], Value::from("ab"));

    let (value, out) = codec.decode_partial(br#"{"name":"ab","tags":["x"]}"#, &item(), "");
    out.expect("valid");
    assert_eq!(value, codec.decode_slice(br#"{"name":"ab","tags":["x"]}"#, &item(), "").expect("decode"));

    let (value, out) = codec.decode_partial(b"1", &Shape::i64(), "@nope");
    assert!(matches!(out, Err(DecodeError::Compile { .. })));
    assert_eq!(value, Value::Int(0));
}

// ==================== Validate-only ====================

#[test]
fn validate_only_uses_the_same_rules() {
    let codec = Codec::new();
    let shape = item();
    let validator = codec.compile(&shape, "").expect("compile");
    let good = Value::Record(vec![Value::from("ab"), Value::List(vec![Value::from("x")])]);
    codec.validate_only(&good, &shape, &validator).expect("valid");

    let bad = Value::Record(vec![Value::from("abcdef"), Value::List(Vec::new())]);
    let errs = invalid(codec.validate_only(&bad, &shape, &validator));
    assert_eq!(errs.at("/name").expect("name").code(), "out_of_range");

    let missing = Value::Record(vec![Value::Null, Value::List(Vec::new())]);
    let errs = invalid(codec.validate_only(&missing, &shape, &validator));
    assert_eq!(errs.at("/name").expect("name").kind, ErrorKind::MissingRequired);
}

#[test]
fn validate_only_walks_nested_lists() {
    let point = RecordType::new("Point").field(FieldDef::new("x", Shape::i64()).rule("@int[0,]"));
    let shape = RecordType::new("Path")
        .field(FieldDef::new("items", Shape::list(Shape::record(point))).rule("@slice[,1]"))
        .into_shape();
    let codec = Codec::new();
    let validator = codec.compile(&shape, "").expect("compile");
    let value = Value::Record(vec![Value::List(vec![
        Value::Record(vec![Value::Int(1)]),
        Value::Record(vec![Value::Int(-1)]),
    ])]);
    let errs = invalid(codec.validate_only(&value, &shape, &validator));
    assert_eq!(errs.len(), 2);
    assert!(errs.at("/items/1/x").is_some());
    assert!(errs.at("/items").is_some());
}

// ==================== Encoding ====================

#[test]
fn encode_record() {
    let codec = Codec::new();
    let value = Value::Record(vec![Value::from("ab"), Value::List(vec![Value::from("x")])]);
    assert_eq!(codec.encode(&value, &item()).expect("encode"), r#"{"name":"ab","tags":["x"]}"#);
}

#[test]
fn encode_honors_wire_bindings() {
    let shape = RecordType::new("Wire")
        .field(FieldDef::new("count", Shape::i64()).name("n").stringified())
        .field(FieldDef::new("tags", Shape::list(Shape::String)).omit_empty())
        .field(FieldDef::new("flag", Shape::Bool).omit_zero())
        .field(FieldDef::new("data", Shape::Bytes))
        .field(FieldDef::new("rest", Shape::map(Shape::String, Shape::Any)).unknown())
        .into_shape();
    let value = Value::Record(vec![
        Value::Int(42),
        Value::List(Vec::new()),
        Value::Bool(false),
        Value::Bytes(b"hello".to_vec()),
        Value::Map(vec![
            (Value::from("x"), Value::Any(json!([1]))),
            (Value::from("n"), Value::Any(json!("shadowed"))),
        ]),
    ]);
    let codec = Codec::new();
    assert_eq!(
        codec.encode(&value, &shape).expect("encode"),
        r#"{"n":"42","data":"aGVsbG8=","x":[1]}"#
    );
}

#[test]
fn encode_then_decode_round_trips() {
    let point = RecordType::new("Point")
        .field(FieldDef::new("x", Shape::i64()))
        .field(FieldDef::new("label", Shape::pointer(Shape::String)));
    let shape = RecordType::new("Shape")
        .field(FieldDef::new("points", Shape::list(Shape::record(point))))
        .field(FieldDef::new("weights", Shape::map(Shape::String, Shape::f64())))
        .into_shape();
    let value = Value::Record(vec![
        Value::List(vec![
            Value::Record(vec![Value::Int(-3), Value::from("a")]),
            Value::Record(vec![Value::Int(7), Value::Null]),
        ]),
        Value::Map(vec![(Value::from("w"), Value::Float(0.5))]),
    ]);
    let codec = Codec::new();
    let text = codec.encode(&value, &shape).expect("encode");
    assert_eq!(codec.decode_str(&text, &shape, "").expect("decode"), value);
}

#[test]
fn encode_errors() {
    let codec = Codec::new();
    let shape = RecordType::new("F").field(FieldDef::new("f", Shape::f64())).into_shape();
    match codec.encode(&Value::Record(vec![Value::Float(f64::NAN)]), &shape) {
        Err(EncodeError::NonFinite { pointer }) => assert_eq!(pointer.to_string(), "/f"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        codec.encode(&Value::Int(1), &Shape::String),
        Err(EncodeError::Mismatch { .. })
    ));
}

// ==================== Concurrency ====================

#[test]
fn one_codec_many_threads() {
    let codec = Arc::new(Codec::new());
    let shape = item();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let codec = codec.clone();
            let shape = shape.clone();
            std::thread::spawn(move || {
                let json = format!(r#"{{"name":"{}","tags":[]}}"#, "a".repeat(i));
                (i, codec.decode_str(&json, &shape, ""))
            })
        })
        .collect();
    for h in handles {
        let (i, out) = h.join().expect("join");
        let in_range = (1..=5).contains(&i);
        match out {
            Ok(value) => {
                assert!(in_range, "length {} should fail", i);
                assert_eq!(value.as_record().expect("record")[0].as_str().map(str::len), Some(i));
            }
            Err(err) => {
                assert!(!in_range, "length {} should pass", i);
                assert_eq!(err.validation_errors().expect("invalid").len(), 1);
            }
        }
    }
    // Root record rule plus one validator per field.
    assert_eq!(codec.compiler().cached(), 3);
}
