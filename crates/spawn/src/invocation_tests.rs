// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use harness_core::SessionId;

fn args(spec: &InvocationSpec) -> Vec<String> {
    spec.command().as_std().get_args().map(|a| a.to_string_lossy().into_owned()).collect()
}

fn sample_spec() -> InvocationSpec {
    InvocationSpec {
        binary: PathBuf::from("claude"),
        cwd: PathBuf::from("/tmp"),
        bootstrap_path: PathBuf::from("/tmp/ses_x.bootstrap.md"),
        initial_prompt: "consult your session context".into(),
        session_id: SessionId::new("ses_x"),
        tool_allowlist: vec!["fs".into(), "shell".into()],
        max_turns: Some(40),
        budget_cents: Some(500),
    }
}

#[test]
fn carries_programmatic_and_session_flags() {
    let spec = sample_spec();
    let args = args(&spec);

    assert!(args.windows(2).any(|w| w == ["--output-format", "stream-json"]));
    assert!(args.windows(2).any(|w| w == ["--session-id", "ses_x"]));
    assert!(args.windows(2).any(|w| w == ["-p", "consult your session context"]));
    assert!(args.windows(2).any(|w| w == ["--append-system-prompt-file", "/tmp/ses_x.bootstrap.md"]));
}

#[test]
fn carries_tool_allowlist_and_caps() {
    let spec = sample_spec();
    let args = args(&spec);

    assert!(args.windows(2).any(|w| w == ["--allowed-tools", "fs,shell"]));
    assert!(args.windows(2).any(|w| w == ["--max-turns", "40"]));
    assert!(args.windows(2).any(|w| w == ["--max-budget-cents", "500"]));
}

#[test]
fn omits_optional_flags_when_absent() {
    let mut spec = sample_spec();
    spec.tool_allowlist.clear();
    spec.max_turns = None;
    spec.budget_cents = None;
    let args = args(&spec);

    assert!(!args.iter().any(|a| a == "--allowed-tools"));
    assert!(!args.iter().any(|a| a == "--max-turns"));
    assert!(!args.iter().any(|a| a == "--max-budget-cents"));
}

#[test]
fn bootstrap_temp_path_is_keyed_by_session() {
    let path = bootstrap_temp_path(Path::new("/var/state"), &SessionId::new("ses_y"));
    assert_eq!(path, PathBuf::from("/var/state/ses_y.bootstrap.md"));
}
