//! End-to-end FRID round-trip checks: dump then load should reproduce the
//! original value for every representable shape, across every output mode
//! that can represent it.

use frid::codec::load_from_json_str;
use frid::{dump_to_string, load_from_str, OutputMode, Value};

fn sample_value() -> Value {
    Value::Mapping(frid::value::mapping_from([
        ("id", Value::Int(42)),
        ("name", Value::text("hello world")),
        ("active", Value::Bool(true)),
        ("score", Value::Real(3.5)),
        ("tags", Value::Array(vec![Value::text("a"), Value::text("b")])),
        ("nothing", Value::Null),
    ]))
}

#[test]
fn round_trips_through_frid_mode() {
    let value = sample_value();
    let text = dump_to_string(&value, OutputMode::Frid).unwrap();
    let parsed = load_from_str(&text).unwrap();
    assert_eq!(parsed, value);
}

#[test]
fn round_trips_through_json5_mode() {
    // JSON5 output uses JSON's `true`/`false`/`null` literals, which the
    // FRID-mode loader (`load_from_str`) does not recognize as sentinels —
    // reload with the JSON-mode loader instead, matching the dumper mode.
    let value = sample_value();
    let text = dump_to_string(&value, OutputMode::Json5).unwrap();
    let parsed = load_from_json_str(&text).unwrap();
    assert_eq!(parsed, value);
}

#[test]
fn strict_json_mode_rejects_nan_but_round_trips_plain_numbers() {
    let value = Value::Array(vec![Value::Int(1), Value::Real(2.5), Value::Bool(false)]);
    let text = dump_to_string(&value, OutputMode::Json).unwrap();
    let parsed = load_from_json_str(&text).unwrap();
    assert_eq!(parsed, value);

    let nan_value = Value::Real(f64::NAN);
    assert!(dump_to_string(&nan_value, OutputMode::Json).is_err());
}

#[test]
fn blob_round_trips_through_frid_mode() {
    let value = Value::Blob(vec![0, 1, 2, 253, 254, 255]);
    let text = dump_to_string(&value, OutputMode::Frid).unwrap();
    let parsed = load_from_str(&text).unwrap();
    assert_eq!(parsed, value);
}

#[test]
fn nested_array_and_map_round_trip() {
    let value = Value::Array(vec![
        Value::Mapping(frid::value::mapping_from([("x", Value::Int(1))])),
        Value::Mapping(frid::value::mapping_from([("y", Value::Int(2))])),
    ]);
    let text = dump_to_string(&value, OutputMode::Frid).unwrap();
    assert_eq!(load_from_str(&text).unwrap(), value);
}
