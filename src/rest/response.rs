use std::time::Duration;

use reqwest::{header::HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::Result;

/// A response read in full from the REST API.
#[derive(Clone, Debug)]
pub struct RestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RestResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> RestResponse {
        RestResponse {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Classify the response for the retry policy.
    pub(crate) fn outcome(&self, rate_limit: Option<(Duration, bool)>) -> Outcome {
        match (self.status, rate_limit) {
            (StatusCode::TOO_MANY_REQUESTS, Some((retry_after, global))) => Outcome::RateLimited {
                retry_after,
                global,
            },
            (status, _) if status.is_success() => Outcome::Success,
            (status, _) if status.is_server_error() => Outcome::ServerError,
            _ => Outcome::ClientError,
        }
    }
}

/// Classification of a single attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx
    Success,
    /// 4xx other than 429, the request itself is wrong.
    ClientError,
    /// 429, to be retried once the limit resets.
    RateLimited {
        /// How long to wait.
        retry_after: Duration,
        /// Whether the global limit was hit.
        global: bool,
    },
    /// 5xx
    ServerError,
    /// The request never got a response.
    NetworkFailure,
}
