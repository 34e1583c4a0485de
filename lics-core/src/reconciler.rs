//! Server maintenance loop: evict dead leases, pull quota, push usage.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::event_queue::{EventQueue, LoopEvent};
use crate::infrastructure::QuotaSource;
use crate::service::LicenseService;
use crate::types::{Token, now_ms};

/// What one reconciliation cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub evicted: Vec<Token>,
    /// `None` when the pull failed and totals were left untouched
    pub pools_updated: Option<usize>,
    pub pushed: bool,
}

pub struct Reconciler {
    service: Arc<LicenseService>,
    quota: Box<dyn QuotaSource>,
    interval: Duration,
    events: Arc<EventQueue<LoopEvent>>,
}

impl Reconciler {
    pub fn new(
        service: Arc<LicenseService>,
        quota: Box<dyn QuotaSource>,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            quota,
            interval,
            events: Arc::new(EventQueue::new()),
        }
    }

    /// One full cycle at time `now`. The ledger lock is released around both
    /// quota calls.
    pub fn run_cycle(&mut self, now: u64) -> CycleReport {
        let evicted = self.service.with_ledger(|ledger| ledger.sweep(now));

        let pools_updated = match self.quota.fetch_total_quota() {
            Ok(totals) => Some(self.service.with_ledger(|ledger| ledger.merge_quota(&totals))),
            Err(e) => {
                warn!(error = %e, "Quota pull failed; keeping current totals");
                None
            }
        };

        let used = self.service.with_ledger(|ledger| ledger.used_quota());
        let pushed = match self.quota.push_used_quota(&used) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Usage push failed");
                false
            }
        };

        debug!(
            evicted = evicted.len(),
            pools_updated = ?pools_updated,
            pushed,
            "Reconciliation cycle complete"
        );
        CycleReport {
            evicted,
            pools_updated,
            pushed,
        }
    }

    /// Starts the loop on its own thread. The first cycle runs immediately so
    /// pools get their totals at startup.
    pub fn spawn(mut self) -> std::io::Result<ReconcilerHandle> {
        let events = Arc::clone(&self.events);
        let thread = std::thread::Builder::new()
            .name("lics-reconciler".to_string())
            .spawn(move || {
                info!(interval_secs = self.interval.as_secs(), "Reconciler started");
                let mut next_cycle = Instant::now();
                loop {
                    if Instant::now() >= next_cycle {
                        self.run_cycle(now_ms());
                        next_cycle = Instant::now() + self.interval;
                    }
                    if let Some(LoopEvent::Exit) = self.events.dequeue() {
                        break;
                    }
                }
                info!("Reconciler stopped");
            })?;

        Ok(ReconcilerHandle {
            events,
            thread: Some(thread),
        })
    }
}

/// Owner's side of a running reconciler
pub struct ReconcilerHandle {
    events: Arc<EventQueue<LoopEvent>>,
    thread: Option<JoinHandle<()>>,
}

impl ReconcilerHandle {
    /// Signals the loop and waits for it; returns within one queue wait
    /// unless a cycle is in flight.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.events.enqueue(LoopEvent::Exit);
            if thread.join().is_err() {
                warn!("Reconciler thread panicked");
            }
        }
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
