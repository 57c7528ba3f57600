//! Payload formatting and field extraction tests

use iobeam_embedded::http::formatted_len;
use iobeam_embedded::json::{self, ImportPayload, JsonStr, RegisterPayload};
use iobeam_embedded::time::parse_server_time;
use iobeam_embedded::{Timeval, Value};

#[test]
fn test_import_payload_round_trip() {
    let cases = [
        ("abc123def456", 42u32, "temperature", Timeval::new(1_450_000_000, 5), Value::Float(21.5)),
        ("0123456789abcdefghij", 1, "x", Timeval::new(0, 999), Value::Int(-3)),
        ("d", u32::MAX, "with \"quotes\"", Timeval::new(9, 0), Value::Float(-0.25)),
    ];

    for (device_id, project_id, key, time, value) in cases {
        let payload = ImportPayload {
            device_id,
            project_id,
            key,
            time,
            value,
        };
        let text = payload.to_string();
        assert_eq!(formatted_len(format_args!("{}", payload)), text.len());

        let body = text.as_bytes();
        assert_eq!(json::str_field(body, "device_id"), Some(device_id.as_bytes()));
        assert_eq!(json::uint_field::<u32>(body, "project_id"), Some(project_id));
        assert_eq!(json::uint_field::<u64>(body, "time"), Some(time.as_millis()));

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["sources"][0]["name"], key);
        assert_eq!(parsed["sources"].as_array().unwrap().len(), 1);
    }
}

#[test]
fn test_register_payload_is_json() {
    let text = RegisterPayload { project_id: 7 }.to_string();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, serde_json::json!({ "project_id": 7 }));
}

#[test]
fn test_escaped_strings_parse_back() {
    for raw in ["plain", "tab\there", "nl\n", "quote\"", "back\\slash", "bell\u{7}", "ünïcode"] {
        let text = JsonStr(raw).to_string();
        let parsed: String = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, raw);
    }
}

#[test]
fn test_server_time_from_serde_output() {
    let body = serde_json::json!({ "sec": 1_450_000_000u64, "usec": 999_999 }).to_string();
    assert_eq!(
        parse_server_time(body.as_bytes()).unwrap(),
        Timeval::new(1_450_000_000, 999)
    );
}
