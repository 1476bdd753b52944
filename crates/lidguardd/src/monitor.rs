//! Lid suspend monitor.
//!
//! Polls the lid source, debounces closed readings, and forces a suspend
//! once the lid is confirmed closed. This is the only caller of the
//! suspend trigger.
//!
//! # Timing
//!
//! | After | Wait |
//! |---|---|
//! | Open / pending reading | poll interval (0.5s) |
//! | Unknown reading | unknown backoff (5s) |
//! | successful suspend | settle (10s) |
//! | failed suspend | failure settle (5s) |
//! | faulted tick | fault backoff (5s) |
//!
//! # Cancellation
//!
//! The loop stops only when its `CancellationToken` fires, and only between
//! ticks. An in-flight suspend call is never interrupted.
//!
//! # Panic-Free Guarantees
//!
//! Lid reads run on the blocking pool and the suspend call runs as its own
//! task. A panic in either surfaces as a `JoinError`, is logged as a tick
//! fault, and the loop carries on after the fault backoff.

use std::sync::Arc;
use std::time::Duration;

use lidguard_core::{DebounceDecision, Debouncer, DomainError, LidState, MonitorState};
use lidguard_sys::{LidSource, SuspendError, Suspender};
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::MonitorConfig;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// No lid source path exists at startup
    #[error("no lid state source available")]
    SourceUnavailable,

    /// A tick failed unexpectedly (e.g. the blocking read panicked)
    #[error("monitor tick faulted: {0}")]
    TickFault(String),

    /// Invalid debounce setup
    #[error(transparent)]
    Domain(#[from] DomainError),
}

// ============================================================================
// Tick Report
// ============================================================================

/// What one tick saw and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub reading: LidState,
    pub decision: DebounceDecision,
    /// Present only when a suspend was attempted
    pub suspend: Option<Result<(), SuspendError>>,
    /// How long to wait before the next tick
    pub next_delay: Duration,
}

/// Counters kept across the monitor's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub ticks: u64,
    pub faults: u64,
    pub suspend_attempts: u64,
    pub suspend_failures: u64,
}

// ============================================================================
// Monitor
// ============================================================================

/// Debounced lid-close suspend enforcer.
pub struct LidMonitor {
    source: Arc<dyn LidSource>,
    suspender: Arc<dyn Suspender>,
    debouncer: Debouncer,
    config: MonitorConfig,
    stats: MonitorStats,
}

impl LidMonitor {
    /// Creates a monitor.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Domain` if the close threshold is zero.
    pub fn new(
        source: Arc<dyn LidSource>,
        suspender: Arc<dyn Suspender>,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        let debouncer = Debouncer::new(config.close_threshold)?;
        Ok(Self {
            source,
            suspender,
            debouncer,
            config,
            stats: MonitorStats::default(),
        })
    }

    /// Fails if no lid source exists at all.
    ///
    /// A source that disappears later only yields Unknown readings, but
    /// one that is missing at startup means the monitor can never work.
    pub fn preflight(&self) -> Result<(), MonitorError> {
        if self.source.is_available() {
            Ok(())
        } else {
            Err(MonitorError::SourceUnavailable)
        }
    }

    pub fn state(&self) -> MonitorState {
        self.debouncer.state()
    }

    pub fn counter(&self) -> u32 {
        self.debouncer.counter()
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Samples the lid once and acts on it.
    pub async fn tick(&mut self) -> Result<TickReport, MonitorError> {
        self.stats.ticks += 1;

        let source = Arc::clone(&self.source);
        let reading = tokio::task::spawn_blocking(move || source.read())
            .await
            .map_err(|e| MonitorError::TickFault(e.to_string()))?;

        let decision = self.debouncer.observe(reading);
        let mut suspend = None;

        let next_delay = match decision {
            DebounceDecision::Reset => {
                trace!("Lid open");
                self.config.poll_interval()
            }
            DebounceDecision::Pending(n) => {
                debug!(count = n, threshold = self.debouncer.threshold(), "Lid closed, confirming");
                self.config.poll_interval()
            }
            DebounceDecision::Hold => {
                debug!(
                    count = self.debouncer.counter(),
                    backoff_ms = self.config.unknown_backoff_ms,
                    "Lid state unknown, holding"
                );
                self.config.unknown_backoff()
            }
            DebounceDecision::Trigger => {
                info!(count = self.debouncer.counter(), "Lid confirmed closed, forcing suspend");
                self.stats.suspend_attempts += 1;
                let suspender = Arc::clone(&self.suspender);
                let joined = tokio::spawn(async move { suspender.suspend().await }).await;
                // Lid is assumed open on the next observation either way
                self.debouncer.reset();
                let result =
                    joined.map_err(|e| MonitorError::TickFault(format!("suspend task: {e}")))?;
                let delay = match &result {
                    Ok(()) => {
                        info!("Suspend returned, settling");
                        self.config.settle_after_suspend()
                    }
                    Err(e) => {
                        self.stats.suspend_failures += 1;
                        warn!(error = %e, "Suspend failed, will retry on next close");
                        self.config.settle_after_failure()
                    }
                };
                suspend = Some(result);
                delay
            }
        };

        Ok(TickReport {
            reading,
            decision,
            suspend,
            next_delay,
        })
    }

    /// Runs until `cancel_token` fires. Never exits on a tick error.
    pub async fn run(mut self, cancel_token: CancellationToken) -> MonitorStats {
        info!(
            threshold = self.debouncer.threshold(),
            poll_ms = self.config.poll_interval_ms,
            "Lid monitor started"
        );

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            let delay = match self.tick().await {
                Ok(report) => report.next_delay,
                Err(e) => {
                    // A failed read carries no information; like Unknown it
                    // leaves the debounce count alone. A faulted suspend has
                    // already reset it.
                    self.stats.faults += 1;
                    error!(error = %e, "Monitor tick failed, backing off");
                    self.config.fault_backoff()
                }
            };

            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        info!(
            ticks = self.stats.ticks,
            suspends = self.stats.suspend_attempts,
            failures = self.stats.suspend_failures,
            "Lid monitor shutting down"
        );
        self.stats
    }
}

/// Spawns the monitor loop on the runtime.
pub fn spawn_monitor_task(
    monitor: LidMonitor,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<MonitorStats> {
    tokio::spawn(monitor.run(cancel_token))
}
