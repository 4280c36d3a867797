//! Cooperative cancellation, trimmed to what a single-worker loop needs: one
//! atomic flag, no broadcast channel and no drain protocol, since the
//! controller has exactly one subscriber (itself) and no worker pool to wait
//! on. Lives in this crate (rather than the gardener or runner crate that
//! consume it) so the Runner Adapter can race a subprocess wait against it
//! without a dependency cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_signal_is_not_shutting_down() {
        assert!(!ShutdownSignal::new().is_shutting_down());
    }

    #[test]
    fn trigger_is_visible_through_clone() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        signal.trigger();
        assert!(clone.is_shutting_down());
    }
}
