//! Discord Rest API methods provided through a simple interface.
//!
//! Every call goes through [`Discord::execute`], which waits for the rate
//! limits the request is subject to, sends it, feeds the response back into
//! the limiters and retries where that makes sense. Entities found in
//! responses are merged into the client's [`EntityCache`].
//!
//! The functionality of the [`Discord`] client is split over many
//! extension traits for the purposes of not importing dozens of methods
//! all at once.

mod config;
pub use config::*;

mod guild;
pub use guild::*;

mod interaction;
pub use interaction::*;

mod login;
pub use login::*;

mod message;
pub use message::*;

mod metrics;
pub use metrics::RequestMetrics;

mod request;
pub use request::*;

mod response;
pub use response::*;

mod retry;
pub use retry::*;

mod user;
pub use user::*;

mod webhook;
pub use webhook::*;

use std::future::Future;

use futures::future::{AbortRegistration, Abortable};
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, instrument, trace, warn};

use crate::{
    cache::EntityCache,
    error::{Error, Result},
    ratelimit::{BucketKey, RateLimitHeaders, RateLimitedBody, RateLimits},
};

use self::metrics::MetricsCollector;

/// Client for the Discord REST API.
///
/// # API families
///
/// As mentioned in the module level documentation,
/// the functionality of the [`Discord`] client is split over many
/// extension traits as to not import dozens of methods all at once,
/// instead importing only the necessary ones.
///
/// Here is a brief guide to those extension traits:
///
/// - [`LoginExt`] creates the client.
/// - [`UserExt`] fetches users.
/// - [`GuildExt`] manages guilds, their members, roles and bans.
/// - [`MessageExt`] reads, sends and deletes messages.
/// - [`WebhookExt`] executes webhooks.
/// - [`InteractionExt`] answers interactions.
///
/// # Multiple Clients
///
/// Using multiple [`Discord`] clients is not advisable,
/// as each one of them will be tracking individual detached rate-limiting counters
/// and caches.
///
/// As all operations require only immutable access (`&self`) to the client,
/// it is advisable to hold the client behind an [`Arc`] and share it between tasks.
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug)]
pub struct Discord {
    /// Configured `reqwest` client for making request.
    client: reqwest::Client,
    /// The used token for making authorized requests.
    token: String,
    /// Where routes are appended to.
    api_base: String,
    /// Keeping track of rate limits for this client.
    rate_limits: RateLimits,
    /// Entities seen in responses.
    cache: EntityCache,
    retry: RetryPolicy,
    metrics: MetricsCollector,
}

impl Discord {
    /// Entities seen in responses so far.
    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Rate limit state of this client.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Counts of the attempts made, over the client's lifetime or since the
    /// previous call with `since_last_call` set.
    pub fn request_metrics(&self, since_last_call: bool) -> RequestMetrics {
        self.metrics.snapshot(since_last_call)
    }

    /// Send a request while having rate limits, retries, and authorization taken care of.
    ///
    /// Suspends while a rate limit the request is subject to is exhausted.
    /// Rate limited responses are retried once the limit resets, server errors
    /// and network failures according to the client's [`RetryPolicy`]. Client
    /// errors are returned right away as [`Error::Status`].
    ///
    /// Dropping the returned future cancels the request at whatever point it
    /// is waiting; see also [`with_cancellation`].
    #[instrument(
        name = "rest",
        level = "debug",
        skip_all,
        fields(method = %request.method, route = %request.route)
    )]
    pub async fn execute(&self, request: RestRequest) -> Result<RestResponse> {
        let key = BucketKey::resolve(&request.method, &request.route)?;

        match request.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.dispatch(&key, &request))
                .await
                .map_err(|_| {
                    debug!(timeout_ms = timeout.as_millis() as u64, "request timed out");
                    Error::TimedOut
                })?,
            None => self.dispatch(&key, &request).await,
        }
    }

    async fn dispatch(&self, key: &BucketKey, request: &RestRequest) -> Result<RestResponse> {
        let mut attempts = 0;
        let mut transient_failures = 0;

        loop {
            let ticket = self.rate_limits.acquire(key, request.scope).await;
            let builder = request.build(&self.client, &self.api_base, &self.token)?;

            attempts += 1;
            trace!(bucket = %key, attempt = attempts, "sending request");

            let response = match send(builder).await {
                Ok(response) => response,
                Err(source) => {
                    drop(ticket);
                    self.metrics.record(None);

                    match self.retry.decide(&Outcome::NetworkFailure, transient_failures) {
                        RetryDecision::Retry(delay) => {
                            warn!(
                                error = %source,
                                attempt = attempts,
                                delay_ms = delay.as_millis() as u64,
                                "request failed, retrying"
                            );
                            transient_failures += 1;
                            sleep(delay).await;
                            continue;
                        }
                        _ => {
                            return Err(Error::Transport {
                                route: request.route.clone(),
                                attempts,
                                source,
                            })
                        }
                    }
                }
            };

            self.metrics.record(Some(response.status()));

            let headers = RateLimitHeaders::from_headers(response.headers());
            let rate_limit = if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let body = RateLimitedBody::parse(response.body());
                Some(ticket.record_rate_limited(&headers, body.as_ref()))
            } else {
                ticket.record(&headers);
                None
            };

            let outcome = response.outcome(rate_limit);
            match self.retry.decide(&outcome, transient_failures) {
                RetryDecision::Done => return Ok(response),
                RetryDecision::Retry(delay) => {
                    if outcome == Outcome::ServerError {
                        warn!(
                            status = %response.status(),
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "server error, retrying"
                        );
                        transient_failures += 1;
                    }
                    sleep(delay).await;
                }
                RetryDecision::Fail => {
                    return Err(match outcome {
                        Outcome::ServerError => Error::ServerError {
                            status: response.status(),
                            route: request.route.clone(),
                            attempts,
                        },
                        _ => Error::from_response(&request.route, &response),
                    })
                }
            }
        }
    }
}

/// Send one attempt and read the response in full.
async fn send(builder: reqwest::RequestBuilder) -> std::result::Result<RestResponse, reqwest::Error> {
    let response = builder.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    Ok(RestResponse::new(status, headers, body.to_vec()))
}

/// Run `future` until it completes or the matching [`AbortHandle`] is
/// triggered, in which case it is dropped where it was waiting and
/// [`Error::Cancelled`] is returned.
///
/// ```ignore
/// let (handle, registration) = AbortHandle::new_pair();
/// let member = with_cancellation(discord.get_member(guild, user), registration);
/// ```
///
/// [`AbortHandle`]: futures::future::AbortHandle
pub async fn with_cancellation<F, T>(future: F, registration: AbortRegistration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match Abortable::new(future, registration).await {
        Ok(result) => result,
        Err(_aborted) => Err(Error::Cancelled),
    }
}
