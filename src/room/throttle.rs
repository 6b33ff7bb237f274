use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fixed-window per-event-type throttle guarding the coordinator entry
/// points. The first call after the window expires is admitted and
/// resets the window start; calls inside the window are dropped with
/// no reply to the caller. Process-local only: one last-accepted
/// timestamp per guarded event kind.
#[derive(Debug, Default)]
pub struct Throttle {
    windows: HashMap<&'static str, Duration>,
    last_accepted: Mutex<HashMap<&'static str, Instant>>,
}

impl Throttle {
    /// `windows` maps event kind to its minimum inter-call interval.
    /// A zero window (or an absent entry) leaves that kind unguarded.
    pub fn new(windows: HashMap<&'static str, Duration>) -> Self {
        Self {
            windows,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Admits or drops one call of the given kind.
    pub fn allow(&self, event: &'static str) -> bool {
        let window = match self.windows.get(event) {
            Some(w) if !w.is_zero() => *w,
            _ => return true,
        };

        let now = Instant::now();
        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match last.get(event) {
            Some(accepted_at) if now.duration_since(*accepted_at) < window => {
                tracing::debug!(event = event, "Call dropped by throttle");
                false
            }
            _ => {
                last.insert(event, now);
                true
            }
        }
    }
}
