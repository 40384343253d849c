//! The account-wide request ceiling.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::{
    sync::{Mutex as AsyncMutex, Notify},
    time::{sleep_until, Instant},
};
use tracing::debug;

/// Length of one global limit window.
const WINDOW: Duration = Duration::from_secs(1);

/// A counter for the global rate limit (50 requests per second by default).
///
/// The window starts counting at the first request after the previous one
/// elapsed. On top of the local count, a global 429 from Discord blocks every
/// non-exempt request until its `retry_after` has passed.
#[derive(Debug)]
pub struct GlobalLimiter {
    gate: AsyncMutex<()>,
    state: Mutex<GlobalState>,
    changed: Notify,
}

#[derive(Debug)]
struct GlobalState {
    /// Requests per window, `0` turns local counting off.
    limit: u32,
    remaining: u32,
    window_ends: Option<Instant>,
    blocked_until: Option<Instant>,
}

impl GlobalState {
    fn try_reserve(&mut self, now: Instant) -> Result<(), Instant> {
        if let Some(until) = self.blocked_until {
            if now < until {
                return Err(until);
            }
            self.blocked_until = None;
        }

        if self.limit == 0 {
            return Ok(());
        }

        match self.window_ends {
            Some(ends) if now < ends => {}
            _ => {
                self.remaining = self.limit;
                self.window_ends = Some(now + WINDOW);
            }
        }

        match (self.remaining, self.window_ends) {
            (0, Some(ends)) => Err(ends),
            _ => {
                self.remaining = self.remaining.saturating_sub(1);
                Ok(())
            }
        }
    }
}

impl GlobalLimiter {
    /// A limiter allowing `limit` requests per second.
    pub fn new(limit: u32) -> GlobalLimiter {
        GlobalLimiter {
            gate: AsyncMutex::new(()),
            state: Mutex::new(GlobalState {
                limit,
                remaining: limit,
                window_ends: None,
                blocked_until: None,
            }),
            changed: Notify::new(),
        }
    }

    /// Wait until a request may be sent under the global limit.
    pub(crate) async fn acquire(&self) {
        let _gate = self.gate.lock().await;

        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let reserve = self.state.lock().try_reserve(Instant::now());
            match reserve {
                Ok(()) => return,
                Err(until) => {
                    debug!(
                        wait_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "global rate limit reached, waiting"
                    );

                    tokio::select! {
                        _ = sleep_until(until) => {}
                        _ = &mut changed => {}
                    }
                }
            }
        }
    }

    /// Block every non-exempt request for `retry_after` after a global 429.
    pub(crate) fn block_for(&self, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        {
            let mut state = self.state.lock();
            state.blocked_until = Some(state.blocked_until.map_or(until, |prev| prev.max(until)));
        }
        self.changed.notify_waiters();
    }

    /// Until when a global 429 keeps requests back, if it still does.
    pub fn blocked_until(&self) -> Option<Instant> {
        let now = Instant::now();
        self.state.lock().blocked_until.filter(|until| *until > now)
    }
}
