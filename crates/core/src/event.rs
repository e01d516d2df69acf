// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The child agent's stdout event stream (§6.1 of the child contract).
//!
//! Parsing is deliberately two-layered: [`EventEnvelope::parse_line`]
//! keeps the original [`serde_json::Value`] around so an unknown `type`
//! can be appended to `events.jsonl` byte-for-byte (round-trip law R3),
//! while [`Event`] gives the Stream Monitor a typed view for dispatch.
//! A line that isn't a JSON object with a `type` field is not an event
//! at all — the Monitor silently drops it, per §4.3.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stop reason carried by a `message_delta` event, when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// Token usage accumulated from `message_delta.delta.usage`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageDelta {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDeltaPayload {
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub usage: Option<UsageDelta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolUsePayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// The recognized event types of the child contract, plus a catch-all
/// for anything else. `Unknown` carries the original `type` string so
/// it can still be logged verbatim.
#[derive(Debug, Clone)]
pub enum Event {
    MessageStart,
    MessageDelta(MessageDeltaPayload),
    MessageStop,
    ToolUse(ToolUsePayload),
    Error(ErrorPayload),
    Unknown(String),
}

impl Event {
    pub fn type_name(&self) -> &str {
        match self {
            Self::MessageStart => "message_start",
            Self::MessageDelta(_) => "message_delta",
            Self::MessageStop => "message_stop",
            Self::ToolUse(_) => "tool_use",
            Self::Error(_) => "error",
            Self::Unknown(t) => t,
        }
    }
}

/// One line of the child's stdout stream, parsed.
///
/// `raw` is the exact JSON object as received (with `timestamp` injected
/// if it was absent), appended verbatim to `events.jsonl`. `event` is
/// the typed projection used to decide side effects.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event: Event,
    pub raw: Value,
}

impl EventEnvelope {
    /// Parse one stdout line. Returns `None` for anything that is not a
    /// JSON object with a string `type` field — per §4.3 this is
    /// silently ignored and never advances a counter.
    ///
    /// `now_iso` stamps `timestamp` onto the raw object when absent, per
    /// the Event data model's "implicit timestamp, added if absent".
    pub fn parse_line(line: &str, now_iso: impl FnOnce() -> String) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        let mut obj = value.as_object().cloned()?;
        let type_name = obj.get("type")?.as_str()?.to_owned();

        if !obj.contains_key("timestamp") {
            obj.insert("timestamp".to_string(), Value::String(now_iso()));
        }
        let raw = Value::Object(obj);

        let event = match type_name.as_str() {
            "message_start" => Event::MessageStart,
            "message_delta" => {
                let payload = raw
                    .get("delta")
                    .and_then(|d| serde_json::from_value(d.clone()).ok())
                    .unwrap_or_default();
                Event::MessageDelta(payload)
            }
            "message_stop" => Event::MessageStop,
            "tool_use" => match serde_json::from_value::<ToolUsePayload>(raw.clone()) {
                Ok(payload) => Event::ToolUse(payload),
                Err(_) => Event::Unknown(type_name),
            },
            "error" => match raw.get("error").and_then(|e| serde_json::from_value(e.clone()).ok()) {
                Some(payload) => Event::Error(payload),
                None => Event::Unknown(type_name),
            },
            other => Event::Unknown(other.to_string()),
        };

        Some(Self { event, raw })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
