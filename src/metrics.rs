use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Metrics {
    rounds_created: Arc<AtomicU64>,
    rounds_succeeded: Arc<AtomicU64>,
    rounds_aborted: Arc<AtomicU64>,
    inputs_registered: Arc<AtomicU64>,
    outputs_registered: Arc<AtomicU64>,
    registrations_rejected: Arc<AtomicU64>,
    inputs_banned: Arc<AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_rounds_created(&self) {
        self.rounds_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rounds_succeeded(&self) {
        self.rounds_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rounds_aborted(&self) {
        self.rounds_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_inputs_registered(&self) {
        self.inputs_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_outputs_registered(&self) {
        self.outputs_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_registrations_rejected(&self) {
        self.registrations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_inputs_banned(&self, n: u64) {
        self.inputs_banned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn report(&self) {
        tracing::info!(
            "Metrics: rounds_created={} succeeded={} aborted={} inputs={} outputs={} rejected={} banned={}",
            self.rounds_created.load(Ordering::Relaxed),
            self.rounds_succeeded.load(Ordering::Relaxed),
            self.rounds_aborted.load(Ordering::Relaxed),
            self.inputs_registered.load(Ordering::Relaxed),
            self.outputs_registered.load(Ordering::Relaxed),
            self.registrations_rejected.load(Ordering::Relaxed),
            self.inputs_banned.load(Ordering::Relaxed),
        );
    }
}
