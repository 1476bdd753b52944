//! Monitor loop tests.
//!
//! These drive `LidMonitor::run` end to end with a scripted lid source:
//! - Debounced suspend on a confirmed close
//! - Unknown readings hold the count
//! - Failed suspends are retried on the next confirmed close
//! - A panicking lid read or suspend call does not stop the loop
//! - Cancellation
//!
//! The clock is paused, so settle and backoff waits complete instantly.
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lidguard_core::LidState;
use lidguard_sys::{LidSource, SuspendError, Suspender};
use lidguardd::config::MonitorConfig;
use lidguardd::monitor::{spawn_monitor_task, LidMonitor, MonitorStats};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Clone, Copy)]
enum Step {
    Read(LidState),
    Panic,
}

/// Replays a fixed sequence, then cancels the monitor.
struct ScriptedLid {
    steps: Mutex<VecDeque<Step>>,
    done: CancellationToken,
}

impl ScriptedLid {
    fn new(steps: Vec<Step>, done: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            done,
        })
    }
}

impl LidSource for ScriptedLid {
    fn read(&self) -> LidState {
        let next = self.steps.lock().unwrap().pop_front();
        match next {
            Some(Step::Read(state)) => state,
            Some(Step::Panic) => panic!("lid read blew up"),
            None => {
                self.done.cancel();
                LidState::Open
            }
        }
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Counts suspend calls; fails the ones listed in `fail_on` and panics on
/// the ones in `panic_on` (1-based).
#[derive(Default)]
struct RecordingSuspend {
    calls: AtomicUsize,
    fail_on: Vec<usize>,
    panic_on: Vec<usize>,
}

#[async_trait]
impl Suspender for RecordingSuspend {
    async fn suspend(&self) -> Result<(), SuspendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on.contains(&n) {
            panic!("suspend call {n} blew up");
        }
        if self.fail_on.contains(&n) {
            Err(SuspendError::NonZeroExit {
                code: Some(1),
                stderr: "Failed to suspend system: Access denied".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn reads(states: &[LidState]) -> Vec<Step> {
    states.iter().copied().map(Step::Read).collect()
}

async fn run_script(steps: Vec<Step>, suspender: Arc<RecordingSuspend>) -> MonitorStats {
    let token = CancellationToken::new();
    let source = ScriptedLid::new(steps, token.clone());
    let monitor = LidMonitor::new(source, suspender, MonitorConfig::default()).unwrap();
    monitor.run(token).await
}

// ============================================================================
// Debounce Through the Loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_open_closed_closed_suspends_once() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend::default());
    let stats = run_script(reads(&[Open, Closed, Closed]), suspender.clone()).await;

    assert_eq!(suspender.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stats.suspend_attempts, 1);
    assert_eq!(stats.suspend_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_single_closed_reading_does_not_suspend() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend::default());
    run_script(reads(&[Closed, Open, Closed, Open]), suspender.clone()).await;
    assert_eq!(suspender.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_between_closed_readings_still_suspends() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend::default());
    run_script(reads(&[Closed, Unknown, Closed]), suspender.clone()).await;
    assert_eq!(suspender.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_count_resets_after_suspend() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend::default());
    // Third reading triggers; the fourth alone must not
    run_script(reads(&[Closed, Closed, Closed]), suspender.clone()).await;
    assert_eq!(suspender.calls.load(Ordering::SeqCst), 1);

    let suspender = Arc::new(RecordingSuspend::default());
    run_script(reads(&[Closed, Closed, Closed, Closed]), suspender.clone()).await;
    assert_eq!(suspender.calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_suspend_retries_on_next_close() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend {
        fail_on: vec![1],
        ..Default::default()
    });
    let stats = run_script(reads(&[Closed, Closed, Open, Closed, Closed]), suspender.clone()).await;

    assert_eq!(suspender.calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.suspend_attempts, 2);
    assert_eq!(stats.suspend_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_after_failed_suspend_resets_count() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend {
        fail_on: vec![1],
        ..Default::default()
    });
    // After the failed attempt, Closed/Open/Closed never reaches the threshold
    let stats = run_script(
        reads(&[Closed, Closed, Closed, Open, Closed]),
        suspender.clone(),
    )
    .await;

    assert_eq!(suspender.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stats.suspend_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_suspend_is_a_fault_not_a_crash() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend {
        panic_on: vec![1],
        ..Default::default()
    });
    let token = CancellationToken::new();
    let source = ScriptedLid::new(reads(&[Closed, Closed, Closed, Closed]), token.clone());
    let monitor = LidMonitor::new(source, suspender.clone(), MonitorConfig::default()).unwrap();

    let stats = tokio::time::timeout(
        Duration::from_secs(120),
        spawn_monitor_task(monitor, token),
    )
    .await
    .expect("monitor did not finish its script")
    .expect("monitor task died");

    assert_eq!(stats.faults, 1);
    assert_eq!(stats.suspend_attempts, 2);
    // The panicked attempt reset the count; the next two closes suspend again
    assert_eq!(suspender.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_read_is_a_fault_not_a_crash() {
    use LidState::*;
    let suspender = Arc::new(RecordingSuspend::default());
    let steps = vec![Step::Read(Closed), Step::Panic, Step::Read(Closed)];
    let stats = run_script(steps, suspender.clone()).await;

    assert_eq!(stats.faults, 1);
    // The fault carried no reading, so the pending count survived it
    assert_eq!(suspender.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let source = ScriptedLid::new(Vec::new(), CancellationToken::new());
    let monitor = LidMonitor::new(
        source,
        Arc::new(RecordingSuspend::default()),
        MonitorConfig::default(),
    )
    .unwrap();

    let stats = monitor.run(token).await;
    assert_eq!(stats.ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_task_stops_on_cancel() {
    let token = CancellationToken::new();
    // Never cancels on its own
    let source = ScriptedLid::new(Vec::new(), CancellationToken::new());
    let monitor = LidMonitor::new(
        source,
        Arc::new(RecordingSuspend::default()),
        MonitorConfig::default(),
    )
    .unwrap();

    let handle = spawn_monitor_task(monitor, token.clone());
    tokio::time::sleep(Duration::from_secs(3)).await;
    token.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("monitor did not stop")
        .expect("monitor task panicked");
    assert!(stats.ticks >= 1);
    assert_eq!(stats.suspend_attempts, 0);
}
