// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-store: the Durable State Store (C1).
//!
//! Owns every path under `state/` and `docs/sessions/` except `queue/`
//! and `claims/`, which belong to `harness-queue`. Every write here goes
//! through [`atomic::write_atomic`] so a reader never observes a
//! partially written record.

pub mod atomic;
pub mod crash;
pub mod error;
pub mod files;
pub mod interrupt;
pub mod layout;
pub mod logs;
pub mod metrics_store;
pub mod sessions;
pub mod slots;

pub use crash::CrashPreserver;
pub use error::StoreError;
pub use files::{pid_is_alive, AgentFiles};
pub use interrupt::{FailureCounter, InterruptGate};
pub use layout::StateLayout;
pub use logs::SessionLog;
pub use metrics_store::MetricsStore;
pub use sessions::SessionStore;
pub use slots::SlotRegistry;
