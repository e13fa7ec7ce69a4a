// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Process Exit Codes
//!
//! §6.1: each binary exits `0` on clean shutdown and non-zero on an
//! unrecoverable startup failure. This module is the single place that
//! maps a `BootstrapError` (the only error class a `main` can encounter
//! before the application is even running — everything after that is
//! handled per-document, never by crashing the process) to a process exit
//! code.

use std::process::ExitCode as StdExitCode;

/// Failures that can occur during process bootstrap, before any document
/// has been handled. Distinct from `hcc_domain::HccError`, which models
/// failures *within* the running pipeline and never terminates the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to connect to a required collaborator: {0}")]
    Connection(String),
    #[error("logging initialization failed: {0}")]
    Logging(String),
}

/// Standard Unix-style exit codes this crate uses. Only a handful of
/// `sysexits.h` codes are meaningful here since the processes have no
/// interactive usage errors beyond CLI parsing (which `clap` already exits
/// on directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    /// EX_CONFIG: configuration error.
    Config = 78,
    /// EX_UNAVAILABLE: a required service was unreachable at startup.
    Unavailable = 69,
    /// EX_SOFTWARE: an internal error not covered by the above.
    Software = 70,
}

impl From<ExitCode> for StdExitCode {
    fn from(code: ExitCode) -> Self {
        StdExitCode::from(code as u8)
    }
}

pub fn map_error_to_exit_code(err: &BootstrapError) -> ExitCode {
    match err {
        BootstrapError::Configuration(_) => ExitCode::Config,
        BootstrapError::Connection(_) => ExitCode::Unavailable,
        BootstrapError::Logging(_) => ExitCode::Software,
    }
}

/// Converts a process-level result into a `std::process::ExitCode`,
/// logging the error (if any) before returning. Every binary's `main`
/// ends by calling this.
pub fn result_to_exit_code(result: Result<(), BootstrapError>) -> StdExitCode {
    match result {
        Ok(()) => ExitCode::Ok.into(),
        Err(err) => {
            tracing::error!(error = %err, "fatal startup error");
            map_error_to_exit_code(&err).into()
        }
    }
}
