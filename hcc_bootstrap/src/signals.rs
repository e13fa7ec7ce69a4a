// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Wires OS shutdown signals into a [`ShutdownCoordinator`](crate::shutdown::ShutdownCoordinator),
//! per §5: "the worker loop responds to process-level shutdown signals by
//! stopping new deliveries, letting the current in-flight handler finish or
//! time out, closing the broker connection cleanly."

use crate::shutdown::ShutdownCoordinator;

/// Spawns a task that waits for SIGTERM or SIGINT (Ctrl-C) and initiates
/// shutdown on the given coordinator when either arrives. Every stage
/// binary, the gateway, and the watcher call this once at startup and then
/// select on `coordinator.token().cancelled()` in their main loop.
pub fn install(coordinator: ShutdownCoordinator) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        coordinator.initiate_shutdown();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received Ctrl-C");
}
