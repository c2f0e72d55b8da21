//! Progress reporting and cancellation shared by long running phases.
//!
//! Status notifications are fire-and-forget. A multiplex with no sinks is
//! valid and changes nothing about the work being reported on.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Fragmenting,
    Shrinking,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildStatus {
    pub phase: BuildPhase,
    pub done: usize,
    pub total: usize,
}

impl BuildStatus {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            100.0 * self.done as f64 / self.total as f64
        }
    }
}

impl Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}: {}/{} ({:.1}%)",
            self.phase,
            self.done,
            self.total,
            self.percent()
        )
    }
}

pub trait StatusSink: Send + Sync {
    fn publish(&self, status: &BuildStatus);
}

/// Fans a notification out to every registered sink.
#[derive(Clone, Default)]
pub struct StatusMultiplex {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl StatusMultiplex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn StatusSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl StatusSink for StatusMultiplex {
    fn publish(&self, status: &BuildStatus) {
        for sink in self.sinks.iter() {
            sink.publish(status);
        }
    }
}

impl std::fmt::Debug for StatusMultiplex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StatusMultiplex({} sinks)", self.sinks.len())
    }
}

/// Logs every whole percent step through `tracing`.
#[derive(Debug, Default)]
pub struct TracingStatus {
    last_percent: std::sync::atomic::AtomicU64,
}

impl StatusSink for TracingStatus {
    fn publish(&self, status: &BuildStatus) {
        let pct = status.percent().floor() as u64;
        let previous = self.last_percent.swap(pct, Ordering::Relaxed);
        if pct != previous || status.phase != BuildPhase::Fragmenting {
            info!("{}", status);
        }
    }
}

/// Cooperative cancellation handle.
///
/// Clones share the same flag. Workers poll it between units of work and
/// finish the unit they are on before stopping.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
