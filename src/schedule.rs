//! Continuous monitoring loop: repeated scan cycles on a fixed interval,
//! with cooperative cancellation between iterations.

use crate::monitor::Monitor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Observable loop state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStatus {
    Idle,
    Running,
    /// The loop stopped itself after a scan iteration errored.
    Failed(String),
}

struct Inner {
    running: AtomicBool,
    cancel: AtomicBool,
    last_error: Mutex<Option<String>>,
}

/// Handle that owns the background scan loop. At most one loop runs per
/// handle; a second `start` while one is active is rejected.
pub struct ContinuousMonitor {
    inner: Arc<Inner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ContinuousMonitor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                running: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                last_error: Mutex::new(None),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the scan loop. Returns false when a loop is already active.
    ///
    /// Each iteration runs one full cycle, then sleeps for `interval`.
    /// Cancellation is only honored between iterations; an in-flight scan
    /// always completes. A failed iteration stops the loop and records
    /// the error in the status.
    pub fn start(&self, monitor: Arc<Monitor>, interval: Duration, threshold: f64) -> bool {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.cancel.store(false, Ordering::SeqCst);
        if let Ok(mut last_error) = self.inner.last_error.lock() {
            *last_error = None;
        }

        log::info!(
            "continuous monitoring of {} every {}s",
            monitor.root().display(),
            interval.as_secs()
        );

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            loop {
                if inner.cancel.load(Ordering::SeqCst) {
                    break;
                }

                match monitor.scan_and_alert(threshold).await {
                    Ok(outcome) => {
                        if outcome.alert {
                            log::warn!("{}", outcome.message);
                        } else {
                            log::info!("{}", outcome.message);
                        }
                    }
                    Err(err) => {
                        log::error!("scan iteration failed, stopping monitor: {err}");
                        if let Ok(mut last_error) = inner.last_error.lock() {
                            *last_error = Some(err.to_string());
                        }
                        break;
                    }
                }

                if inner.cancel.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
            inner.running.store(false, Ordering::SeqCst);
        });

        if let Ok(mut handle) = self.handle.lock() {
            *handle = Some(task);
        }
        true
    }

    /// Request cancellation. The loop exits before its next iteration.
    pub fn stop(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> MonitorStatus {
        if self.is_running() {
            return MonitorStatus::Running;
        }
        let last_error = self
            .inner
            .last_error
            .lock()
            .ok()
            .and_then(|guard| guard.clone());
        match last_error {
            Some(message) => MonitorStatus::Failed(message),
            None => MonitorStatus::Idle,
        }
    }

    /// Wait for the loop task to finish after a `stop`.
    pub async fn join(&self) {
        let task = self.handle.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            if let Err(err) = task.await {
                log::error!("monitor task panicked: {err}");
            }
        }
    }
}

impl Default for ContinuousMonitor {
    fn default() -> Self {
        Self::new()
    }
}
