// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stage Worker CLI
//!
//! The three stage binaries (extractor, analyzer, validator) share one CLI
//! shape, per §6.1: `--mode={batch,consumer,both}`, an optional config
//! file, and a verbosity flag. Directories and broker credentials are read
//! from the environment by [`crate::config::AppConfig`], not from flags —
//! the spec is explicit that these are environment-sourced so the same
//! image runs unmodified across environments (§7.2).

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// How a stage binary acquires work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Drain any documents already sitting in this stage's input status
    /// (e.g. `Pending` for the extractor) once, then exit. Useful for
    /// backfills and for exercising the pipeline without a running broker.
    Batch,
    /// The steady-state mode: block on the message bus and handle
    /// deliveries as they arrive, one at a time (QoS prefetch 1), until a
    /// shutdown signal.
    Consumer,
    /// Run a batch pass first, then fall into consumer mode.
    Both,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Consumer
    }
}

/// CLI arguments common to every stage worker binary.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct StageCli {
    /// How this worker acquires work.
    #[arg(long, value_enum, default_value_t = Mode::Consumer)]
    pub mode: Mode,

    /// Optional layered config file (TOML or YAML). Environment variables
    /// always override values loaded from this file, per §7.2.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit verbose (debug-level) logs in addition to the configured
    /// level.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl StageCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_consumer_mode() {
        let cli = StageCli::parse_from(["extractor"]);
        assert_eq!(cli.mode, Mode::Consumer);
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_batch_mode_and_config_path() {
        let cli = StageCli::parse_from(["analyzer", "--mode", "batch", "--config", "/etc/hcc/analyzer.toml", "-v"]);
        assert_eq!(cli.mode, Mode::Batch);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/hcc/analyzer.toml")));
        assert!(cli.verbose);
    }
}
