//! A single per-route rate limit bucket.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{
    sync::{Mutex as AsyncMutex, Notify, OwnedMutexGuard},
    time::{sleep_until, Instant},
};
use tracing::debug;

use super::{BucketKey, RateLimitHeaders};

/// Where a bucket is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketPhase {
    /// No response has been observed for the current window yet.
    Fresh,
    /// `remaining` and `reset_at` are known from the server.
    Tracking,
    /// The budget is spent until `reset_at`.
    Exhausted,
    /// Responses on this route carry no rate limit information.
    Untracked,
}

/// Point-in-time view of a bucket, for inspection and diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketSnapshot {
    /// Current lifecycle phase.
    pub phase: BucketPhase,
    /// Requests allowed per window, once known.
    pub limit: Option<u32>,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the current window ends.
    pub reset_at: Option<Instant>,
    /// Discord's own identifier for the bucket.
    pub hash: Option<String>,
}

#[derive(Debug)]
struct BucketState {
    phase: BucketPhase,
    limit: Option<u32>,
    remaining: u32,
    reset_at: Option<Instant>,
    hash: Option<String>,
}

enum Reserve {
    Proceed { probe: bool },
    WaitUntil(Instant),
}

impl BucketState {
    fn new() -> BucketState {
        BucketState {
            phase: BucketPhase::Fresh,
            limit: None,
            remaining: 0,
            reset_at: None,
            hash: None,
        }
    }

    fn try_reserve(&mut self, now: Instant) -> Reserve {
        match self.phase {
            BucketPhase::Fresh => Reserve::Proceed { probe: true },
            BucketPhase::Untracked => Reserve::Proceed { probe: false },
            BucketPhase::Tracking | BucketPhase::Exhausted => {
                let window_over = match self.reset_at {
                    Some(reset_at) => now >= reset_at,
                    None => self.remaining == 0,
                };

                if window_over {
                    // the first response of the new window reseeds the bucket
                    self.phase = BucketPhase::Fresh;
                    self.reset_at = None;
                    return Reserve::Proceed { probe: true };
                }

                match (self.remaining, self.reset_at) {
                    (0, Some(reset_at)) => {
                        self.phase = BucketPhase::Exhausted;
                        Reserve::WaitUntil(reset_at)
                    }
                    _ => {
                        self.remaining -= 1;
                        if self.remaining == 0 {
                            self.phase = BucketPhase::Exhausted;
                        }
                        Reserve::Proceed { probe: false }
                    }
                }
            }
        }
    }

    fn record(&mut self, headers: &RateLimitHeaders, now: Instant) {
        if let Some(hash) = headers.bucket.as_ref() {
            self.hash = Some(hash.clone());
        }

        if !headers.is_tracked() {
            if self.phase == BucketPhase::Fresh {
                self.phase = BucketPhase::Untracked;
            }
            return;
        }

        let live = matches!(self.phase, BucketPhase::Tracking | BucketPhase::Exhausted)
            && self.reset_at.map_or(false, |reset_at| now < reset_at);

        self.limit = headers.limit.or(self.limit);
        let reported = headers
            .remaining
            .unwrap_or_else(|| self.limit.unwrap_or(1).saturating_sub(1));

        if live {
            // responses can arrive out of order, within a window the budget only shrinks
            self.remaining = self.remaining.min(reported);
        } else {
            self.remaining = reported;
        }

        if let Some(reset_at) = headers.reset_at(now) {
            self.reset_at = Some(reset_at);
        }

        self.phase = if self.remaining == 0 {
            BucketPhase::Exhausted
        } else {
            BucketPhase::Tracking
        };
    }

    fn record_exhausted(&mut self, retry_after: Duration, now: Instant) {
        self.remaining = 0;
        self.reset_at = Some(now + retry_after);
        self.phase = BucketPhase::Exhausted;
    }

    fn snapshot(&self, now: Instant) -> BucketSnapshot {
        let phase = match self.phase {
            BucketPhase::Exhausted if self.reset_at.map_or(true, |at| now >= at) => {
                BucketPhase::Tracking
            }
            phase => phase,
        };

        BucketSnapshot {
            phase,
            limit: self.limit,
            remaining: self.remaining,
            reset_at: self.reset_at,
            hash: self.hash.clone(),
        }
    }
}

/// Budget tracking for one [`BucketKey`].
///
/// Requests take a [`BucketPermit`] with [`RateLimitBucket::acquire`], which
/// suspends while the bucket is exhausted. Waiters queue on an async gate, so
/// they are let through in the order they arrived.
pub struct RateLimitBucket {
    key: BucketKey,
    gate: Arc<AsyncMutex<()>>,
    state: Mutex<BucketState>,
    changed: Notify,
}

impl RateLimitBucket {
    pub(crate) fn new(key: BucketKey) -> RateLimitBucket {
        RateLimitBucket {
            key,
            gate: Arc::new(AsyncMutex::new(())),
            state: Mutex::new(BucketState::new()),
            changed: Notify::new(),
        }
    }

    /// The key this bucket tracks.
    pub fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Wait for a slot in the bucket.
    ///
    /// A permit taken on a fresh bucket is a probe: it keeps the gate closed
    /// until its response is recorded, so the first response seeds the budget
    /// before anyone else is let through.
    pub(crate) async fn acquire(self: &Arc<Self>) -> BucketPermit {
        let gate = Arc::clone(&self.gate).lock_owned().await;

        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let reserve = self.state.lock().try_reserve(Instant::now());
            match reserve {
                Reserve::Proceed { probe } => {
                    return BucketPermit {
                        bucket: Arc::clone(self),
                        probe: probe.then_some(gate),
                    }
                }
                Reserve::WaitUntil(reset_at) => {
                    debug!(
                        bucket = %self.key,
                        wait_ms = reset_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "bucket exhausted, waiting for reset"
                    );

                    tokio::select! {
                        _ = sleep_until(reset_at) => {}
                        _ = &mut changed => {}
                    }
                }
            }
        }
    }

    /// Adopt the server's view of the bucket from a response.
    pub(crate) fn record(&self, headers: &RateLimitHeaders) {
        self.state.lock().record(headers, Instant::now());
        self.changed.notify_waiters();
    }

    /// Close the bucket for `retry_after` after a 429 on this route.
    pub(crate) fn record_exhausted(&self, retry_after: Duration) {
        self.state.lock().record_exhausted(retry_after, Instant::now());
        self.changed.notify_waiters();
    }

    /// Current state of the bucket.
    pub fn snapshot(&self) -> BucketSnapshot {
        self.state.lock().snapshot(Instant::now())
    }
}

impl fmt::Debug for RateLimitBucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RateLimitBucket")
            .field("key", &self.key)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// A reserved slot in a [`RateLimitBucket`].
///
/// Dropping a probe permit without recording a response reopens the bucket
/// for the next probe.
pub(crate) struct BucketPermit {
    bucket: Arc<RateLimitBucket>,
    probe: Option<OwnedMutexGuard<()>>,
}

impl BucketPermit {
    pub(crate) fn bucket(&self) -> &Arc<RateLimitBucket> {
        &self.bucket
    }

    #[cfg(test)]
    fn is_probe(&self) -> bool {
        self.probe.is_some()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::*;

    fn bucket() -> Arc<RateLimitBucket> {
        Arc::new(RateLimitBucket::new(
            BucketKey::resolve(&Method::POST, "channels/1/messages").unwrap(),
        ))
    }

    fn headers(limit: u32, remaining: u32, reset_after: Duration) -> RateLimitHeaders {
        RateLimitHeaders {
            limit: Some(limit),
            remaining: Some(remaining),
            reset_after: Some(reset_after),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_bucket_lets_one_probe_through() {
        let bucket = bucket();
        let probe = bucket.acquire().await;
        assert!(probe.is_probe());

        let waiter = {
            let bucket = Arc::clone(&bucket);
            tokio::spawn(async move { bucket.acquire().await.is_probe() })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        bucket.record(&headers(5, 4, Duration::from_secs(1)));
        drop(probe);

        assert!(!waiter.await.unwrap());
        assert_eq!(bucket.snapshot().remaining, 3);
        assert_eq!(bucket.snapshot().phase, BucketPhase::Tracking);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_bucket_waits_for_reset() {
        let bucket = bucket();
        drop(bucket.acquire().await);
        bucket.record(&headers(2, 0, Duration::from_secs(2)));
        assert_eq!(bucket.snapshot().phase, BucketPhase::Exhausted);

        let start = Instant::now();
        let permit = bucket.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(2));
        // a new window is probed again
        assert!(permit.is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn local_accounting_exhausts_before_the_server_does() {
        let bucket = bucket();
        drop(bucket.acquire().await);
        bucket.record(&headers(3, 2, Duration::from_secs(1)));

        let start = Instant::now();
        drop(bucket.acquire().await);
        drop(bucket.acquire().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(bucket.snapshot().phase, BucketPhase::Exhausted);

        drop(bucket.acquire().await);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_responses_never_raise_remaining() {
        let bucket = bucket();
        drop(bucket.acquire().await);
        bucket.record(&headers(5, 1, Duration::from_secs(5)));
        bucket.record(&headers(5, 3, Duration::from_secs(5)));

        assert_eq!(bucket.snapshot().remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_overrides_header_estimate() {
        let bucket = bucket();
        drop(bucket.acquire().await);
        bucket.record(&headers(5, 4, Duration::from_secs(5)));
        bucket.record_exhausted(Duration::from_millis(500));

        let start = Instant::now();
        drop(bucket.acquire().await);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500));
        assert!(waited < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn untracked_routes_pass_through() {
        let bucket = bucket();
        drop(bucket.acquire().await);
        bucket.record(&RateLimitHeaders::default());

        assert_eq!(bucket.snapshot().phase, BucketPhase::Untracked);
        assert!(!bucket.acquire().await.is_probe());
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_released_in_arrival_order() {
        let bucket = bucket();
        drop(bucket.acquire().await);
        bucket.record(&headers(1, 0, Duration::from_secs(1)));

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = Vec::new();
        for n in 0..3 {
            let bucket = Arc::clone(&bucket);
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                let _permit = bucket.acquire().await;
                order.lock().push(n);
                bucket.record(&headers(1, 0, Duration::from_secs(1)));
            }));
            tokio::task::yield_now().await;
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_probe_reopens_the_bucket() {
        let bucket = bucket();
        drop(bucket.acquire().await);

        let next = tokio::time::timeout(Duration::from_millis(10), bucket.acquire()).await;
        assert!(next.unwrap().is_probe());
    }
}
