use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::StatusCode;

/// Counts of the HTTP attempts made by a client.
///
/// Every attempt is counted, so a request retried twice adds three to `total`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestMetrics {
    /// Attempts made.
    pub total: u64,
    /// 2xx responses.
    pub successful: u64,
    /// 429 responses.
    pub rate_limited: u64,
    /// 400 responses.
    pub bad_request: u64,
    /// 403 responses.
    pub forbidden: u64,
    /// 404 responses.
    pub not_found: u64,
    /// Other 4xx responses.
    pub other_client_errors: u64,
    /// 5xx responses.
    pub server_errors: u64,
    /// Attempts that never got a response.
    pub transport_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    successful: AtomicU64,
    rate_limited: AtomicU64,
    bad_request: AtomicU64,
    forbidden: AtomicU64,
    not_found: AtomicU64,
    other_client_errors: AtomicU64,
    server_errors: AtomicU64,
    transport_failures: AtomicU64,
}

impl Counters {
    fn record(&self, status: Option<StatusCode>) {
        self.total.fetch_add(1, Ordering::Relaxed);

        let counter = match status {
            None => &self.transport_failures,
            Some(status) if status.is_success() => &self.successful,
            Some(StatusCode::TOO_MANY_REQUESTS) => &self.rate_limited,
            Some(StatusCode::BAD_REQUEST) => &self.bad_request,
            Some(StatusCode::FORBIDDEN) => &self.forbidden,
            Some(StatusCode::NOT_FOUND) => &self.not_found,
            Some(status) if status.is_server_error() => &self.server_errors,
            Some(_) => &self.other_client_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn read(&self, reset: bool) -> RequestMetrics {
        let read = |counter: &AtomicU64| {
            if reset {
                counter.swap(0, Ordering::Relaxed)
            } else {
                counter.load(Ordering::Relaxed)
            }
        };

        RequestMetrics {
            total: read(&self.total),
            successful: read(&self.successful),
            rate_limited: read(&self.rate_limited),
            bad_request: read(&self.bad_request),
            forbidden: read(&self.forbidden),
            not_found: read(&self.not_found),
            other_client_errors: read(&self.other_client_errors),
            server_errors: read(&self.server_errors),
            transport_failures: read(&self.transport_failures),
        }
    }
}

/// Lifetime counters, plus a second set that is reset on every
/// `since_last_call` read.
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    lifetime: Counters,
    interval: Counters,
}

impl MetricsCollector {
    /// Count an attempt, `None` for one that never got a response.
    pub(crate) fn record(&self, status: Option<StatusCode>) {
        self.lifetime.record(status);
        self.interval.record(status);
    }

    pub(crate) fn snapshot(&self, since_last_call: bool) -> RequestMetrics {
        if since_last_call {
            self.interval.read(true)
        } else {
            self.lifetime.read(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_class() {
        let metrics = MetricsCollector::default();
        for status in [200, 204, 400, 403, 404, 409, 429, 500, 503] {
            metrics.record(Some(StatusCode::from_u16(status).unwrap()));
        }
        metrics.record(None);

        let snapshot = metrics.snapshot(false);
        assert_eq!(
            snapshot,
            RequestMetrics {
                total: 10,
                successful: 2,
                rate_limited: 1,
                bad_request: 1,
                forbidden: 1,
                not_found: 1,
                other_client_errors: 1,
                server_errors: 2,
                transport_failures: 1,
            }
        );
    }

    #[test]
    fn since_last_call_resets_only_the_interval() {
        let metrics = MetricsCollector::default();
        metrics.record(Some(StatusCode::OK));

        assert_eq!(metrics.snapshot(true).total, 1);
        assert_eq!(metrics.snapshot(true).total, 0);

        metrics.record(Some(StatusCode::OK));
        assert_eq!(metrics.snapshot(true).total, 1);
        assert_eq!(metrics.snapshot(false).total, 2);
    }
}
