//! Shared health/readiness state for the ops surface (§1 "Ops surface").
//! Updated by the scheduler and its dependent tasks as they connect to and
//! lose contact with each collaborator; read by the `/healthz` and
//! `/readyz` handlers.

use std::sync::atomic::{AtomicBool, Ordering};

/// Liveness/readiness flags for the process's external collaborators.
/// `/healthz` reports current reachability; `/readyz` additionally
/// requires that the startup sequence (§4.8) has completed once.
#[derive(Default)]
pub struct HealthState {
    db_reachable: AtomicBool,
    event_log_connected: AtomicBool,
    search_index_reachable: AtomicBool,
    startup_complete: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_db_reachable(&self, v: bool) {
        self.db_reachable.store(v, Ordering::Relaxed);
    }

    pub fn set_event_log_connected(&self, v: bool) {
        self.event_log_connected.store(v, Ordering::Relaxed);
    }

    pub fn set_search_index_reachable(&self, v: bool) {
        self.search_index_reachable.store(v, Ordering::Relaxed);
    }

    pub fn set_startup_complete(&self, v: bool) {
        self.startup_complete.store(v, Ordering::Relaxed);
    }

    pub fn db_reachable(&self) -> bool {
        self.db_reachable.load(Ordering::Relaxed)
    }

    pub fn event_log_connected(&self) -> bool {
        self.event_log_connected.load(Ordering::Relaxed)
    }

    pub fn search_index_reachable(&self) -> bool {
        self.search_index_reachable.load(Ordering::Relaxed)
    }

    pub fn startup_complete(&self) -> bool {
        self.startup_complete.load(Ordering::Relaxed)
    }

    /// Liveness: the DB pool, producer, and search client are each
    /// reachable right now.
    pub fn is_live(&self) -> bool {
        self.db_reachable() && self.event_log_connected() && self.search_index_reachable()
    }

    /// Readiness: liveness plus the one-time startup sequence (§4.8) has
    /// run to completion.
    pub fn is_ready(&self) -> bool {
        self.is_live() && self.startup_complete()
    }
}
