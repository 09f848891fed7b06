//! Memory-pressure monitoring and reclamation hooks.

use std::sync::{Arc, Mutex, PoisonError};

/// Reports current memory use of the host process.
pub trait MemoryProbe: Send + Sync {
    /// Bytes in use, or `None` when the host offers no introspection.
    fn used_bytes(&self) -> Option<u64>;
}

/// Reads resident set size from `/proc/self/status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn used_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

/// A probe for hosts with no memory introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl MemoryProbe for NoProbe {
    fn used_bytes(&self) -> Option<u64> {
        None
    }
}

/// `VmRSS:    1234 kB` -> bytes.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// The best probe for the current platform.
pub fn default_probe() -> Arc<dyn MemoryProbe> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcStatusProbe)
    } else {
        Arc::new(NoProbe)
    }
}

type ReclaimFn = Box<dyn Fn() + Send + Sync>;

/// Compares memory use against a threshold and runs registered reclaim
/// callbacks on demand.
pub struct MemoryMonitor {
    threshold_bytes: u64,
    probe: Arc<dyn MemoryProbe>,
    callbacks: Mutex<Vec<ReclaimFn>>,
}

impl std::fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("threshold_bytes", &self.threshold_bytes)
            .finish_non_exhaustive()
    }
}

impl MemoryMonitor {
    pub fn new(threshold_bytes: u64) -> Self {
        Self::with_probe(threshold_bytes, default_probe())
    }

    pub fn with_probe(threshold_bytes: u64, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            threshold_bytes,
            probe,
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    pub fn used_bytes(&self) -> Option<u64> {
        self.probe.used_bytes()
    }

    /// Register a callback run by [`reclaim`](Self::reclaim), e.g. clearing
    /// a page cache.
    pub fn on_reclaim(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    /// True when usage is known and at or above the threshold. Always false
    /// without introspection.
    pub fn should_reclaim(&self) -> bool {
        self.used_bytes().is_some_and(|used| used >= self.threshold_bytes)
    }

    /// Run every registered callback. Returns how many ran.
    pub fn reclaim(&self) -> usize {
        let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback();
        }
        callbacks.len()
    }

    /// Reclaim only under pressure. Returns whether reclamation ran.
    pub fn check(&self) -> bool {
        if !self.should_reclaim() {
            return false;
        }
        tracing::warn!(
            used = self.used_bytes(),
            threshold = self.threshold_bytes,
            "Memory threshold exceeded, reclaiming"
        );
        self.reclaim();
        true
    }
}
