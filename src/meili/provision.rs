//! Provisioning policy for the index and embedder.

use crate::config::ProvisionMode;
use std::sync::atomic::{AtomicBool, Ordering};

/// Decides whether a request must re-run index and embedder provisioning.
///
/// In [`ProvisionMode::Always`] every call provisions. In [`ProvisionMode::Once`] a flag set
/// after the first success skips later runs until [`Provisioner::invalidate`] clears it.
/// Concurrent first calls can both provision; the underlying steps are idempotent.
#[derive(Debug)]
pub struct Provisioner {
    mode: ProvisionMode,
    ready: AtomicBool,
}

impl Provisioner {
    /// Create a provisioner with nothing provisioned yet.
    pub fn new(mode: ProvisionMode) -> Self {
        Self {
            mode,
            ready: AtomicBool::new(false),
        }
    }

    /// Whether the next call must provision.
    pub fn needs_provisioning(&self) -> bool {
        match self.mode {
            ProvisionMode::Always => true,
            ProvisionMode::Once => !self.ready.load(Ordering::Acquire),
        }
    }

    /// Record a successful provisioning run.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Force the next call to provision again.
    pub fn invalidate(&self) {
        if self.ready.swap(false, Ordering::AcqRel) {
            tracing::debug!("Provisioning cache invalidated");
        }
    }
}
