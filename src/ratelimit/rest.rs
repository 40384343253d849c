//! Tracking for rate-limits on discord REST clients.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{
    BucketKey, BucketPermit, BucketSnapshot, GlobalLimiter, RateLimitBucket, RateLimitHeaders,
    RateLimitedBody,
};

/// Which limits a request is subject to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitScope {
    /// The route's bucket and the global limit.
    All,
    /// Only the route's bucket (webhook token requests).
    RouteOnly,
    /// Neither (interaction callbacks).
    Exempt,
}

/// Tracking for rate-limits on discord REST clients.
///
/// Holds one [`RateLimitBucket`] per [`BucketKey`], created on first use and
/// kept for the lifetime of the client, plus the [`GlobalLimiter`]. Each
/// bucket is locked on its own, so requests on unrelated routes never wait on
/// each other.
///
/// Once a response names Discord's bucket hash (`X-RateLimit-Bucket`), routes
/// reporting the same hash with the same major parameters are folded onto one
/// bucket and spend a single budget.
#[derive(Debug)]
pub struct RateLimits {
    global: GlobalLimiter,
    routes: DashMap<BucketKey, Arc<RateLimitBucket>>,
    /// `"{hash} {major parameters}"` to the bucket first seen with it.
    shared: DashMap<String, Arc<RateLimitBucket>>,
}

impl RateLimits {
    /// Rate limit tracking with a global ceiling of `global_limit` requests per second.
    pub fn new(global_limit: u32) -> RateLimits {
        RateLimits {
            global: GlobalLimiter::new(global_limit),
            routes: DashMap::new(),
            shared: DashMap::new(),
        }
    }

    /// Wait until a request on `key` may be sent, consuming one slot of each
    /// limit in `scope`. The global limit is consulted first.
    pub(crate) async fn acquire(&self, key: &BucketKey, scope: LimitScope) -> Ticket<'_> {
        if scope == LimitScope::All {
            self.global.acquire().await;
        }

        let permit = match scope {
            LimitScope::Exempt => None,
            LimitScope::All | LimitScope::RouteOnly => Some(self.bucket_for(key).acquire().await),
        };

        Ticket {
            limits: self,
            scope,
            permit,
        }
    }

    fn bucket_for(&self, key: &BucketKey) -> Arc<RateLimitBucket> {
        if let Some(bucket) = self.routes.get(key) {
            return Arc::clone(bucket.value());
        }

        Arc::clone(
            self.routes
                .entry(key.clone())
                .or_insert_with(|| Arc::new(RateLimitBucket::new(key.clone())))
                .value(),
        )
    }

    /// Fold the route of `bucket` onto whichever bucket first reported the
    /// same hash for the same major parameters.
    fn share(&self, bucket: &Arc<RateLimitBucket>, headers: &RateLimitHeaders) {
        let hash = match headers.bucket.as_deref() {
            Some(hash) => hash,
            None => return,
        };

        let shared_key = format!("{hash} {}", bucket.key().major_parameters());
        let canonical = Arc::clone(
            self.shared
                .entry(shared_key)
                .or_insert_with(|| Arc::clone(bucket))
                .value(),
        );

        if !Arc::ptr_eq(&canonical, bucket) {
            debug!(bucket = %bucket.key(), shared_with = %canonical.key(), hash, "routes share a bucket");
            canonical.record(headers);
            self.routes.insert(bucket.key().clone(), canonical);
        }
    }

    /// The current state of the bucket behind `key`, if it was ever used.
    pub fn bucket(&self, key: &BucketKey) -> Option<BucketSnapshot> {
        self.routes.get(key).map(|bucket| bucket.snapshot())
    }

    /// How many buckets have been created so far.
    pub fn bucket_count(&self) -> usize {
        self.routes.len()
    }

    /// The global limiter shared by every non-exempt request.
    pub fn global(&self) -> &GlobalLimiter {
        &self.global
    }
}

impl Default for RateLimits {
    /// Discord's default of 50 requests per second.
    fn default() -> Self {
        RateLimits::new(50)
    }
}

/// Slots held by a request between acquiring its limits and seeing its response.
pub(crate) struct Ticket<'a> {
    limits: &'a RateLimits,
    scope: LimitScope,
    permit: Option<BucketPermit>,
}

impl Ticket<'_> {
    /// Update the limiters from a response, then release the slots.
    pub(crate) fn record(self, headers: &RateLimitHeaders) {
        if let Some(permit) = self.permit.as_ref() {
            permit.bucket().record(headers);
            debug!(
                bucket = %permit.bucket().key(),
                remaining = ?headers.remaining,
                reset_after_ms = ?headers.reset_after.map(|d| d.as_millis() as u64),
                "bucket updated"
            );
            self.limits.share(permit.bucket(), headers);
        }
    }

    /// Update the limiters from a 429 response, then release the slots.
    ///
    /// Returns how long the request should wait before it is retried.
    pub(crate) fn record_rate_limited(
        self,
        headers: &RateLimitHeaders,
        body: Option<&RateLimitedBody>,
    ) -> (Duration, bool) {
        let retry_after = body
            .and_then(RateLimitedBody::retry_after)
            .or(headers.retry_after)
            .or(headers.reset_after)
            .unwrap_or(Duration::from_secs(1));
        let global = body.map_or(false, |body| body.global)
            || headers.global
            || headers.scope.as_deref() == Some("global");

        if global {
            if self.scope == LimitScope::All {
                warn!(retry_after_ms = retry_after.as_millis() as u64, "hit the global rate limit");
                self.limits.global.block_for(retry_after);
            }
            if let Some(permit) = self.permit.as_ref() {
                if headers.is_tracked() {
                    permit.bucket().record(headers);
                    self.limits.share(permit.bucket(), headers);
                }
            }
        } else if let Some(permit) = self.permit.as_ref() {
            warn!(
                bucket = %permit.bucket().key(),
                scope = headers.scope.as_deref().unwrap_or("user"),
                retry_after_ms = retry_after.as_millis() as u64,
                "hit a route rate limit"
            );
            permit.bucket().record_exhausted(retry_after);
            self.limits.share(permit.bucket(), headers);
        }

        (retry_after, global)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use tokio::time::Instant;

    use super::*;
    use crate::ratelimit::BucketPhase;

    fn key(route: &str) -> BucketKey {
        BucketKey::resolve(&Method::GET, route).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn buckets_are_created_lazily_and_kept() {
        let limits = RateLimits::default();
        assert_eq!(limits.bucket_count(), 0);
        assert!(limits.bucket(&key("guilds/1")).is_none());

        limits.acquire(&key("guilds/1"), LimitScope::All).await.record(&RateLimitHeaders::default());
        limits.acquire(&key("guilds/1"), LimitScope::All).await.record(&RateLimitHeaders::default());
        limits.acquire(&key("guilds/2"), LimitScope::All).await.record(&RateLimitHeaders::default());

        assert_eq!(limits.bucket_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exempt_requests_create_no_bucket() {
        let limits = RateLimits::new(1);
        let start = Instant::now();

        for _ in 0..5 {
            limits.acquire(&key("interactions/1/:interaction_token/callback"), LimitScope::Exempt)
                .await
                .record(&RateLimitHeaders::default());
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limits.bucket_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn route_only_requests_skip_the_global_limit() {
        let limits = RateLimits::new(1);
        limits.global().block_for(Duration::from_secs(10));
        let start = Instant::now();

        limits
            .acquire(&key("webhooks/1/:webhook_token"), LimitScope::RouteOnly)
            .await
            .record(&RateLimitHeaders::default());

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn route_429_exhausts_only_its_bucket() {
        let limits = RateLimits::default();
        let ticket = limits.acquire(&key("guilds/1"), LimitScope::All).await;
        let body = RateLimitedBody {
            message: String::new(),
            retry_after: 2.0,
            global: false,
        };

        let (retry_after, global) = ticket.record_rate_limited(&RateLimitHeaders::default(), Some(&body));

        assert_eq!(retry_after, Duration::from_secs(2));
        assert!(!global);
        assert_eq!(limits.bucket(&key("guilds/1")).unwrap().phase, BucketPhase::Exhausted);
        assert!(limits.global().blocked_until().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_retry_after_falls_back() {
        let limits = RateLimits::default();
        let ticket = limits.acquire(&key("guilds/1"), LimitScope::All).await;
        let body = RateLimitedBody {
            message: String::new(),
            retry_after: 1e20,
            global: false,
        };

        let (retry_after, _) = ticket.record_rate_limited(&RateLimitHeaders::default(), Some(&body));

        assert_eq!(retry_after, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn routes_with_the_same_hash_share_a_budget() {
        let limits = RateLimits::default();
        let pins = key("channels/1/pins");
        let messages = key("channels/1/messages/:message_id");
        let headers = |remaining| RateLimitHeaders {
            limit: Some(2),
            remaining: Some(remaining),
            reset_after: Some(Duration::from_secs(1)),
            bucket: Some("h4sh".to_owned()),
            ..Default::default()
        };

        limits.acquire(&pins, LimitScope::All).await.record(&headers(1));
        limits.acquire(&messages, LimitScope::All).await.record(&headers(0));

        assert_eq!(limits.bucket(&pins).unwrap().phase, BucketPhase::Exhausted);
        assert_eq!(limits.bucket(&messages), limits.bucket(&pins));

        let start = Instant::now();
        limits.acquire(&pins, LimitScope::All).await.record(&headers(1));
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn same_hash_on_other_major_parameters_stays_apart() {
        let limits = RateLimits::default();
        let headers = RateLimitHeaders {
            limit: Some(1),
            remaining: Some(0),
            reset_after: Some(Duration::from_secs(5)),
            bucket: Some("h4sh".to_owned()),
            ..Default::default()
        };

        limits.acquire(&key("channels/1/pins"), LimitScope::All).await.record(&headers);

        let start = Instant::now();
        limits.acquire(&key("channels/2/pins"), LimitScope::All).await.record(&headers);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn global_429_blocks_the_global_limiter() {
        let limits = RateLimits::default();
        let ticket = limits.acquire(&key("guilds/1"), LimitScope::All).await;
        let headers = RateLimitHeaders {
            global: true,
            retry_after: Some(Duration::from_secs(3)),
            ..Default::default()
        };

        let (retry_after, global) = ticket.record_rate_limited(&headers, None);

        assert_eq!(retry_after, Duration::from_secs(3));
        assert!(global);
        assert!(limits.global().blocked_until().is_some());
        assert_ne!(limits.bucket(&key("guilds/1")).unwrap().phase, BucketPhase::Exhausted);

        let start = Instant::now();
        limits.acquire(&key("guilds/2"), LimitScope::All).await.record(&RateLimitHeaders::default());
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
