//! Process health state shared between the server lifecycle and `/healthz`.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Shared health state.
///
/// Two writers total across the process lifetime, both on lifecycle
/// boundaries: `mark_ready` after the listener binds, `mark_draining` when
/// the shutdown signal arrives. Everything else only reads. A single scalar
/// per field keeps reads and writes atomic without a lock.
#[derive(Debug, Default)]
pub struct HealthState {
    /// Unix timestamp in nanoseconds of the ready transition; zero = not ready.
    ready_at_nanos: AtomicI64,
    /// Set once the shutdown signal has been received.
    draining: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the ready transition. Driven by the server lifecycle only.
    pub fn mark_ready(&self) {
        self.ready_at_nanos
            .store(unix_nanos_now(), Ordering::SeqCst);
    }

    /// Record the draining transition. Driven by the server lifecycle only.
    pub fn mark_draining(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    /// Uptime since the ready transition.
    ///
    /// `None` while not ready or once draining has begun; the health endpoint
    /// maps that to 503.
    pub fn uptime(&self) -> Option<Duration> {
        if self.draining.load(Ordering::SeqCst) {
            return None;
        }
        match self.ready_at_nanos.load(Ordering::SeqCst) {
            0 => None,
            ready_at => {
                let elapsed = unix_nanos_now().saturating_sub(ready_at).max(0);
                Some(Duration::from_nanos(elapsed as u64))
            }
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

fn unix_nanos_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_initially() {
        let health = HealthState::new();
        assert!(health.uptime().is_none());
        assert!(!health.is_draining());
    }

    #[test]
    fn test_uptime_after_ready() {
        let health = HealthState::new();
        health.mark_ready();
        let uptime = health.uptime().expect("ready");
        assert!(uptime < Duration::from_secs(1));
    }

    #[test]
    fn test_draining_hides_uptime() {
        let health = HealthState::new();
        health.mark_ready();
        health.mark_draining();
        assert!(health.uptime().is_none());
        assert!(health.is_draining());
    }
}
