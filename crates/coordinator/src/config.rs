// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup configuration (§2.1, §6.3). Layered env-over-file-over-default,
//! generalized from the teacher's `daemon/src/env.rs` centralized,
//! per-variable env access: each field still has its own lookup function
//! with a typed default, but a YAML file read once at startup supplies
//! the middle layer, and the individual `OJH_*`/bare env vars win last.

use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BOOTSTRAP_TEMPLATE: &str = concat!(
    "You are agent {{SESSION_ID}}, iteration {{ITERATION}}, on rig {{RIG}}.\n",
    "Work item:\n{{WORK_ITEM}}\n",
);

const DEFAULT_INITIAL_PROMPT: &str =
    "Begin working the assigned item. Report completion via a clean exit.";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// The subset of [`Config`] a YAML file may override. Every field is
/// optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct FileOverrides {
    max_iterations: Option<u64>,
    iteration_delay_secs: Option<u64>,
    interrupt_check_interval_secs: Option<u64>,
    session_timeout_secs: Option<u64>,
    stall_threshold_secs: Option<u64>,
    max_consecutive_failures: Option<u32>,
    kill_grace_period_secs: Option<u64>,
    parallel_agents: Option<u32>,
    parallel_stagger_secs: Option<u64>,
    pool_maintenance_interval_secs: Option<u64>,
    claim_timeout_secs: Option<u64>,
    state_dir: Option<PathBuf>,
    repo_root: Option<PathBuf>,
    workers_root: Option<PathBuf>,
    agent_binary: Option<PathBuf>,
    bootstrap_template_path: Option<PathBuf>,
    initial_prompt: Option<String>,
    tool_allowlist: Option<Vec<String>>,
    max_turns: Option<u32>,
    budget_cents: Option<u64>,
    rig: Option<String>,
}

/// Resolved startup configuration for one Coordinator run.
#[derive(Debug, Clone)]
pub struct Config {
    pub max_iterations: u64,
    pub iteration_delay: Duration,
    pub interrupt_check_interval: Duration,
    pub session_timeout: Duration,
    pub stall_threshold: Duration,
    pub max_consecutive_failures: u32,
    pub kill_grace_period: Duration,
    pub parallel_agents: u32,
    /// Delay between successive slot starts in the parallel variant,
    /// to avoid a thundering herd on the queue and git subsystems.
    pub parallel_stagger: Duration,
    /// Cadence at which the parallel pool checks slot health and
    /// respawns dead or missing ones.
    pub pool_maintenance_interval: Duration,
    /// How long a work-queue claim may outlive its owning agent's last
    /// heartbeat before pool maintenance considers it abandoned and
    /// releases it back to the queue.
    pub claim_timeout: Duration,
    /// Workspace root beneath which `state/` and `docs/` live (§6.4),
    /// not the `state/` directory itself.
    pub state_dir: PathBuf,
    pub repo_root: PathBuf,
    pub workers_root: Option<PathBuf>,
    pub agent_binary: PathBuf,
    pub bootstrap_template: String,
    pub initial_prompt: String,
    pub tool_allowlist: Vec<String>,
    pub max_turns: Option<u32>,
    pub budget_cents: Option<u64>,
    pub rig: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            iteration_delay: Duration::from_secs(5),
            interrupt_check_interval: Duration::from_secs(30),
            session_timeout: Duration::from_secs(3600),
            stall_threshold: Duration::from_secs(300),
            max_consecutive_failures: 5,
            kill_grace_period: Duration::from_secs(30),
            parallel_agents: 0,
            parallel_stagger: Duration::from_secs(5),
            pool_maintenance_interval: Duration::from_secs(60),
            claim_timeout: Duration::from_secs(600),
            state_dir: PathBuf::from("."),
            repo_root: PathBuf::from("."),
            workers_root: None,
            agent_binary: PathBuf::from("claude"),
            bootstrap_template: DEFAULT_BOOTSTRAP_TEMPLATE.to_string(),
            initial_prompt: DEFAULT_INITIAL_PROMPT.to_string(),
            tool_allowlist: Vec::new(),
            max_turns: None,
            budget_cents: None,
            rig: "default".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, apply an optional YAML file, then apply env
    /// var overrides (highest priority, per §2.1). `explicit_path`
    /// is `--config`; absent that, `$OJH_STATE_DIR/harness.yaml` (or
    /// `./harness.yaml` before `OJH_STATE_DIR` is known) is tried and
    /// silently skipped if missing.
    pub fn load(explicit_path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        let candidate = explicit_path.map(PathBuf::from).unwrap_or_else(|| {
            std::env::var("OJH_STATE_DIR")
                .map(|dir| PathBuf::from(dir).join("harness.yaml"))
                .unwrap_or_else(|_| PathBuf::from("harness.yaml"))
        });
        if let Some(overrides) = read_overrides(&candidate, explicit_path.is_some())? {
            apply_overrides(&mut config, overrides);
        }

        apply_env(&mut config);
        Ok(config)
    }
}

/// Reads and parses the override file. A missing file is fine unless
/// the caller named it explicitly via `--config`, in which case a
/// missing file is a startup error.
fn read_overrides(path: &Path, required: bool) -> Result<Option<FileOverrides>, ConfigError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => return Ok(None),
        Err(e) => return Err(ConfigError::Io { path: path.display().to_string(), source: e }),
    };
    let overrides = serde_yaml::from_slice(&bytes)
        .map_err(|e| ConfigError::Yaml { path: path.display().to_string(), source: e })?;
    Ok(Some(overrides))
}

fn apply_overrides(config: &mut Config, o: FileOverrides) {
    if let Some(v) = o.max_iterations {
        config.max_iterations = v;
    }
    if let Some(v) = o.iteration_delay_secs {
        config.iteration_delay = Duration::from_secs(v);
    }
    if let Some(v) = o.interrupt_check_interval_secs {
        config.interrupt_check_interval = Duration::from_secs(v);
    }
    if let Some(v) = o.session_timeout_secs {
        config.session_timeout = Duration::from_secs(v);
    }
    if let Some(v) = o.stall_threshold_secs {
        config.stall_threshold = Duration::from_secs(v);
    }
    if let Some(v) = o.max_consecutive_failures {
        config.max_consecutive_failures = v;
    }
    if let Some(v) = o.kill_grace_period_secs {
        config.kill_grace_period = Duration::from_secs(v);
    }
    if let Some(v) = o.parallel_agents {
        config.parallel_agents = v;
    }
    if let Some(v) = o.parallel_stagger_secs {
        config.parallel_stagger = Duration::from_secs(v);
    }
    if let Some(v) = o.pool_maintenance_interval_secs {
        config.pool_maintenance_interval = Duration::from_secs(v);
    }
    if let Some(v) = o.claim_timeout_secs {
        config.claim_timeout = Duration::from_secs(v);
    }
    if let Some(v) = o.state_dir {
        config.state_dir = v;
    }
    if let Some(v) = o.repo_root {
        config.repo_root = v;
    }
    if o.workers_root.is_some() {
        config.workers_root = o.workers_root;
    }
    if let Some(v) = o.agent_binary {
        config.agent_binary = v;
    }
    if let Some(path) = o.bootstrap_template_path {
        if let Ok(text) = std::fs::read_to_string(&path) {
            config.bootstrap_template = text;
        } else {
            tracing::warn!(path = %path.display(), "bootstrap template file unreadable, keeping prior value");
        }
    }
    if let Some(v) = o.initial_prompt {
        config.initial_prompt = v;
    }
    if let Some(v) = o.tool_allowlist {
        config.tool_allowlist = v;
    }
    if o.max_turns.is_some() {
        config.max_turns = o.max_turns;
    }
    if o.budget_cents.is_some() {
        config.budget_cents = o.budget_cents;
    }
    if let Some(v) = o.rig {
        config.rig = v;
    }
}

fn apply_env(config: &mut Config) {
    config.max_iterations = env_u64("MAX_ITERATIONS", config.max_iterations);
    config.iteration_delay = env_secs("ITERATION_DELAY", config.iteration_delay);
    config.interrupt_check_interval = env_secs("INTERRUPT_CHECK_INTERVAL", config.interrupt_check_interval);
    config.session_timeout = env_secs("SESSION_TIMEOUT", config.session_timeout);
    config.stall_threshold = env_secs("STALL_THRESHOLD", config.stall_threshold);
    config.max_consecutive_failures = env_u32("MAX_CONSECUTIVE_FAILURES", config.max_consecutive_failures);
    config.kill_grace_period = env_secs("OJH_KILL_GRACE_PERIOD", config.kill_grace_period);
    config.parallel_agents = env_u32("PARALLEL_AGENTS", config.parallel_agents);
    config.parallel_stagger = env_secs("OJH_PARALLEL_STAGGER", config.parallel_stagger);
    config.pool_maintenance_interval = env_secs("OJH_POOL_MAINTENANCE_INTERVAL", config.pool_maintenance_interval);
    config.claim_timeout = env_secs("CLAIM_TIMEOUT", config.claim_timeout);
    config.state_dir = env_path("OJH_STATE_DIR", config.state_dir.clone());
    config.repo_root = env_path("OJH_REPO_ROOT", config.repo_root.clone());
    if let Ok(dir) = std::env::var("OJH_WORKERS_ROOT") {
        config.workers_root = Some(PathBuf::from(dir));
    }
    config.agent_binary = env_path("OJH_AGENT_BINARY", config.agent_binary.clone());
    config.initial_prompt = env_string("OJH_INITIAL_PROMPT", config.initial_prompt.clone());
    if let Ok(list) = std::env::var("OJH_TOOL_ALLOWLIST") {
        config.tool_allowlist = list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
    }
    if let Ok(v) = std::env::var("OJH_MAX_TURNS") {
        if let Ok(v) = v.parse() {
            config.max_turns = Some(v);
        }
    }
    if let Ok(v) = std::env::var("OJH_BUDGET_CENTS") {
        if let Ok(v) = v.parse() {
            config.budget_cents = Some(v);
        }
    }
    config.rig = env_string("OJH_RIG", config.rig.clone());
}

fn env_u64(name: &str, current: u64) -> u64 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(current)
}

fn env_u32(name: &str, current: u32) -> u32 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(current)
}

fn env_secs(name: &str, current: Duration) -> Duration {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).map(Duration::from_secs).unwrap_or(current)
}

fn env_path(name: &str, current: PathBuf) -> PathBuf {
    std::env::var(name).ok().map(PathBuf::from).unwrap_or(current)
}

fn env_string(name: &str, current: String) -> String {
    std::env::var(name).unwrap_or(current)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
