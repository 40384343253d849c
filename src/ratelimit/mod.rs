//! Rate limit governance for the REST client.
//!
//! Every request is mapped to a [`BucketKey`], passes the [`GlobalLimiter`]
//! (unless exempt) and then its [`RateLimitBucket`] before it may be sent.
//! Responses feed their [`RateLimitHeaders`] back into both.

mod bucket;
mod global;
mod headers;
mod rest;
mod route;

pub use bucket::{BucketPhase, BucketSnapshot, RateLimitBucket};
pub use global::GlobalLimiter;
pub use headers::{RateLimitHeaders, RateLimitedBody};
pub use rest::{LimitScope, RateLimits};
pub use route::{BucketKey, RouteError};

pub(crate) use bucket::BucketPermit;
pub(crate) use rest::Ticket;
