// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Store(#[from] harness_store::StoreError),

    #[error(transparent)]
    Queue(#[from] harness_queue::QueueError),

    #[error(transparent)]
    Spawn(#[from] harness_spawn::SpawnError),

    #[error(transparent)]
    Monitor(#[from] harness_monitor::MonitorError),

    #[error(transparent)]
    Health(#[from] harness_health::HealthError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("startup check failed: {0}")]
    Startup(String),
}
