// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the domain/application/
//! infrastructure layers and provides everything common to the five
//! processes that make up the HCC extraction pipeline (three stage
//! workers, the gateway, the watcher):
//!
//! - **Entry point** — CLI parsing per §6.1 (`--mode`, directories, broker
//!   credentials from environment).
//! - **Configuration** — the layered defaults → file → environment model
//!   required by §7.2, validated eagerly at startup.
//! - **Logging** — a `tracing` subscriber installed once per process,
//!   plain text for local runs or JSON for production (§7.1).
//! - **Signal handling** — graceful shutdown on SIGTERM/SIGINT (§5).
//! - **Exit codes** — mapping a process result to the process's exit
//!   status (0 clean, non-zero unrecoverable startup failure, per §6.1).
//!
//! ## Key Design Principles
//!
//! 1. **Separation from the enterprise layers.** Bootstrap can depend on
//!    domain and application types to build a runnable binary; domain and
//!    application code never depend back on bootstrap.
//! 2. **One shape, five binaries.** Every stage binary, the gateway, and
//!    the watcher share the same startup shape: parse CLI, load config,
//!    install logging, wire collaborators, run until a shutdown signal.
//!    This crate is what makes that shape reusable instead of copy-pasted.
//! 3. **Fail fast.** A missing required configuration value is a startup
//!    failure, never a lazily discovered runtime error (§7.2).

pub mod cli;
pub mod config;
pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use cli::{Mode, StageCli};
pub use config::AppConfig;
pub use exit_code::{map_error_to_exit_code, result_to_exit_code, ExitCode};
