//! # HCC Reference Port
//!
//! A read-access handle onto the current [`HccLookup`] snapshot (§4.5).
//! Loading the CSV, the one-hour TTL, and swapping snapshots atomically on
//! reload are infrastructure concerns — this port only exposes "give me
//! the current snapshot," which is all the Analyzer and Validator need.
//! Per the redesign note on the singleton global HCC manager: every worker
//! holds an explicit `Arc<dyn HccReferenceProvider>` from its constructor
//! instead of reaching for a process-wide global.

use std::sync::Arc;

use crate::services::HccLookup;

pub trait HccReferenceProvider: Send + Sync {
    /// The most recently loaded snapshot. Implementations swap this
    /// pointer atomically on reload; readers always see an internally
    /// consistent snapshot, never a partially-updated one.
    fn current(&self) -> Arc<HccLookup>;
}
