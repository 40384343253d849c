//! Parsing of the rate limit information Discord attaches to responses.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::warn;

/// Longest wait a response may ask for. Anything above is treated as garbage.
const MAX_WAIT: Duration = Duration::from_secs(60 * 60 * 24);

/// Rate limit information of a single response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RateLimitHeaders {
    /// `X-RateLimit-Limit`
    pub limit: Option<u32>,
    /// `X-RateLimit-Remaining`
    pub remaining: Option<u32>,
    /// `X-RateLimit-Reset-After`, falling back to `X-RateLimit-Reset`
    /// converted to a duration from the moment of parsing.
    pub reset_after: Option<Duration>,
    /// `X-RateLimit-Bucket`, Discord's own bucket hash.
    pub bucket: Option<String>,
    /// `X-RateLimit-Global`
    pub global: bool,
    /// `X-RateLimit-Scope`: `user`, `global` or `shared`.
    pub scope: Option<String>,
    /// `Retry-After`, whole seconds.
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    /// Read the rate limit headers out of a response.
    ///
    /// Malformed values are logged and treated as absent; they never fail the request.
    pub fn from_headers(headers: &HeaderMap) -> RateLimitHeaders {
        let reset_after = parse::<f64>(headers, "x-ratelimit-reset-after")
            .and_then(seconds)
            .or_else(|| {
                parse::<f64>(headers, "x-ratelimit-reset").and_then(|reset| {
                    let now = Utc::now().timestamp_millis() as f64 / 1000.0;
                    seconds((reset - now).max(0.0))
                })
            });

        RateLimitHeaders {
            limit: parse(headers, "x-ratelimit-limit"),
            remaining: parse(headers, "x-ratelimit-remaining"),
            reset_after,
            bucket: header_str(headers, "x-ratelimit-bucket").map(str::to_owned),
            global: header_str(headers, "x-ratelimit-global")
                .map_or(false, |value| value.eq_ignore_ascii_case("true")),
            scope: header_str(headers, "x-ratelimit-scope").map(str::to_owned),
            retry_after: parse::<f64>(headers, "retry-after").and_then(seconds),
        }
    }

    /// Whether the response carried any bucket information at all.
    pub fn is_tracked(&self) -> bool {
        self.remaining.is_some() || self.limit.is_some() || self.reset_after.is_some()
    }

    /// The absolute deadline at which the bucket resets, measured from `now`.
    pub fn reset_at(&self, now: Instant) -> Option<Instant> {
        self.reset_after.map(|after| now + after)
    }
}

/// The JSON body Discord sends along with a 429.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RateLimitedBody {
    /// Human readable explanation.
    #[serde(default)]
    pub message: String,
    /// Seconds to wait before retrying.
    pub retry_after: f64,
    /// Whether the global limit was hit, rather than the route's.
    #[serde(default)]
    pub global: bool,
}

impl RateLimitedBody {
    /// Parse a 429 body, if it has the expected shape.
    pub fn parse(body: &[u8]) -> Option<RateLimitedBody> {
        serde_json::from_slice(body).ok()
    }

    /// `retry_after` as a duration, unless it is negative or absurdly long.
    pub fn retry_after(&self) -> Option<Duration> {
        seconds(self.retry_after)
    }
}

fn seconds(value: f64) -> Option<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if duration <= MAX_WAIT => Some(duration),
        _ => {
            warn!(value, "rate limit duration out of range");
            None
        }
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(header = name, "non-string rate limit header");
            None
        }
    }
}

fn parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    let value = header_str(headers, name)?;
    match value.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(header = name, value, "unparseable rate limit header");
            None
        }
    }
}
