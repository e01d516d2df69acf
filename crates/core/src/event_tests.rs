// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn fixed_now() -> String {
    "2026-07-28T00:00:00Z".to_string()
}

#[test]
fn non_json_line_is_silently_ignored() {
    assert!(EventEnvelope::parse_line("not json at all", fixed_now).is_none());
}

#[test]
fn json_without_type_is_silently_ignored() {
    assert!(EventEnvelope::parse_line(r#"{"foo": "bar"}"#, fixed_now).is_none());
}

#[test]
fn json_array_is_silently_ignored() {
    assert!(EventEnvelope::parse_line(r#"[1,2,3]"#, fixed_now).is_none());
}

#[test]
fn message_start_parses() {
    let env = EventEnvelope::parse_line(r#"{"type":"message_start"}"#, fixed_now).unwrap();
    assert!(matches!(env.event, Event::MessageStart));
}

#[test]
fn message_stop_parses() {
    let env = EventEnvelope::parse_line(r#"{"type":"message_stop"}"#, fixed_now).unwrap();
    assert!(matches!(env.event, Event::MessageStop));
}

#[test]
fn tool_use_carries_name() {
    let env =
        EventEnvelope::parse_line(r#"{"type":"tool_use","name":"read"}"#, fixed_now).unwrap();
    match env.event {
        Event::ToolUse(payload) => assert_eq!(payload.name, "read"),
        other => panic!("expected ToolUse, got {other:?}"),
    }
}

#[test]
fn error_carries_message() {
    let line = r#"{"type":"error","error":{"message":"boom"}}"#;
    let env = EventEnvelope::parse_line(line, fixed_now).unwrap();
    match env.event {
        Event::Error(payload) => assert_eq!(payload.message, "boom"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[test]
fn message_delta_accumulates_usage() {
    let line = r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":20}}}"#;
    let env = EventEnvelope::parse_line(line, fixed_now).unwrap();
    match env.event {
        Event::MessageDelta(payload) => {
            assert_eq!(payload.stop_reason, Some(StopReason::EndTurn));
            let usage = payload.usage.unwrap();
            assert_eq!(usage.input_tokens, 10);
            assert_eq!(usage.output_tokens, 20);
        }
        other => panic!("expected MessageDelta, got {other:?}"),
    }
}

#[test]
fn message_delta_without_usage_defaults_to_zero() {
    let env = EventEnvelope::parse_line(r#"{"type":"message_delta","delta":{}}"#, fixed_now).unwrap();
    match env.event {
        Event::MessageDelta(payload) => assert!(payload.usage.is_none()),
        other => panic!("expected MessageDelta, got {other:?}"),
    }
}

#[test]
fn unknown_type_is_logged_verbatim_not_rejected() {
    let env = EventEnvelope::parse_line(r#"{"type":"custom_thing","x":1}"#, fixed_now).unwrap();
    assert_eq!(env.event.type_name(), "custom_thing");
    assert!(matches!(env.event, Event::Unknown(_)));
}

#[test]
fn timestamp_is_injected_when_absent() {
    let env = EventEnvelope::parse_line(r#"{"type":"message_start"}"#, fixed_now).unwrap();
    assert_eq!(env.raw["timestamp"], "2026-07-28T00:00:00Z");
}

#[test]
fn existing_timestamp_is_preserved_verbatim() {
    let line = r#"{"type":"message_start","timestamp":"2020-01-01T00:00:00Z"}"#;
    let env = EventEnvelope::parse_line(line, fixed_now).unwrap();
    assert_eq!(env.raw["timestamp"], "2020-01-01T00:00:00Z");
}

#[test]
fn raw_preserves_all_fields_for_round_trip() {
    let line = r#"{"type":"weird","a":1,"b":[1,2,3],"timestamp":"t"}"#;
    let env = EventEnvelope::parse_line(line, fixed_now).unwrap();
    assert_eq!(env.raw["a"], 1);
    assert_eq!(env.raw["b"][1], 2);
}
