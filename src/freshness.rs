use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Decides when the banner must be rebuilt.
///
/// Observing staleness claims the window: the check and the timestamp update
/// happen under one lock, so sequential callers see exactly one `true` per
/// window.
pub struct FreshnessGate {
    window: TimeDelta,
    last_checked_at: Mutex<Option<DateTime<Utc>>>,
}

impl FreshnessGate {
    pub fn new(window: TimeDelta) -> Self {
        Self {
            window,
            last_checked_at: Mutex::new(None),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        let mut last = self.last_checked_at.lock();
        let expires = (*last).map(|checked| checked.checked_add_signed(self.window));
        match expires {
            // an expiry past the representable range never arrives
            Some(None) => false,
            Some(Some(expires)) if now < expires => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        *self.last_checked_at.lock()
    }
}
