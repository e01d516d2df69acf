// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metrics extraction (§4.7): a post-session pass over the transcript
//! and event log, best-effort throughout — a missing file degrades the
//! corresponding count to zero rather than erroring, matching §4.7's
//! "missing transcript/log counts default to zero." Counting logic
//! reuses the same transcript-scan idiom as the Stream Monitor's
//! heartbeat recount (`harness-monitor`'s `count_transcript`).

use harness_core::{ApiUsage, Event, EventEnvelope, MetricsRecord, Session, SessionMetrics, ToolUsage};
use harness_store::StateLayout;
use std::path::Path;

/// Derive a [`MetricsRecord`] for a session that has just left the
/// Coordinator's monitor loop. `collected_at_epoch_ms` is the clock
/// reading at extraction time, used for both `duration_seconds` and the
/// `collected_at` timestamp.
pub fn extract(session: &Session, layout: &StateLayout, collected_at_epoch_ms: u64) -> MetricsRecord {
    let turns = count_turns(Path::new(&session.log_paths.transcript));
    let (tool_usage, api_usage) = scan_events(&layout.events_log_path(&session.session_id));
    let duration_seconds = (collected_at_epoch_ms / 1000).saturating_sub(session.start_epoch);

    MetricsRecord {
        session_id: session.session_id.as_str().to_string(),
        api_usage,
        tool_usage,
        session_metrics: SessionMetrics { duration_seconds, turns },
        collected_at: harness_core::time_fmt::iso_from_epoch_ms(collected_at_epoch_ms),
    }
}

/// Count of `"type":"assistant"`-equivalent turns, i.e. `message_stop`
/// records in the child's own transcript file.
fn count_turns(path: &Path) -> u64 {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return 0;
    };
    contents
        .lines()
        .filter(|line| matches!(EventEnvelope::parse_line(line, stub_now).map(|e| e.event), Some(Event::MessageStop)))
        .count() as u64
}

/// Tool-call breakdown and the latest (hence highest, since the child
/// reports cumulative counters) token usage seen in the harness's own
/// event log.
fn scan_events(path: &Path) -> (ToolUsage, ApiUsage) {
    let mut tool_usage = ToolUsage::default();
    let mut api_usage = ApiUsage::default();
    let Ok(contents) = std::fs::read_to_string(path) else {
        return (tool_usage, api_usage);
    };
    for line in contents.lines() {
        let Some(envelope) = EventEnvelope::parse_line(line, stub_now) else {
            continue;
        };
        match envelope.event {
            Event::ToolUse(payload) => tool_usage.record_call(&payload.name),
            Event::MessageDelta(payload) => {
                if let Some(usage) = payload.usage {
                    api_usage.input_tokens = usage.input_tokens;
                    api_usage.output_tokens = usage.output_tokens;
                }
            }
            _ => {}
        }
    }
    (tool_usage, api_usage)
}

/// Lines read back from disk already carry a `timestamp` field (the
/// Monitor stamped it on first write), so this is never actually called.
fn stub_now() -> String {
    harness_core::time_fmt::iso_from_epoch_ms(0)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
