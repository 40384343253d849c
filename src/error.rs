use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::{ratelimit::RouteError, rest::RestResponse};

/// Discord API `Result` alias type.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Discord API error type.
///
/// Rate limits never show up here: they are waited out inside the client.
/// What reaches the caller is either a request Discord refused ([`Error::Status`]),
/// a service that stayed unavailable after retrying ([`Error::ServerError`],
/// [`Error::Transport`]), or a mistake in how the request was built.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A non-success, non-retryable response from the REST API (4xx other than 429).
    #[error("{route} failed with {status}: {}", describe_body(.body))]
    Status {
        /// HTTP status returned by Discord.
        status: StatusCode,
        /// Route template of the failed request.
        route: String,
        /// Decoded JSON error body, if Discord sent one.
        body: Option<Value>,
    },
    /// Discord kept answering with a server error until retries ran out.
    #[error("{route} failed with {status} after {attempts} attempts")]
    ServerError {
        /// Last HTTP status returned by Discord.
        status: StatusCode,
        /// Route template of the failed request.
        route: String,
        /// How many attempts were made.
        attempts: u32,
    },
    /// The connection failed until retries ran out.
    #[error("{route} could not be sent after {attempts} attempts: {source}")]
    Transport {
        /// Route template of the failed request.
        route: String,
        /// How many attempts were made.
        attempts: u32,
        /// Last underlying `reqwest` error.
        #[source]
        source: reqwest::Error,
    },
    /// A route template that does not follow the placeholder convention.
    #[error(transparent)]
    Route(#[from] RouteError),
    /// An argument outside of the range Discord accepts.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
    /// The caller supplied timeout elapsed.
    #[error("request timed out")]
    TimedOut,
    /// A `reqwest` crate error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// A `serde_json` crate error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A Discord protocol error, with a description
    #[error("{0}")]
    Protocol(&'static str),
}

impl Error {
    /// Build a [`Error::Status`] from a refused response.
    pub(crate) fn from_response(route: &str, response: &RestResponse) -> Error {
        Error::Status {
            status: response.status(),
            route: route.to_owned(),
            body: serde_json::from_slice(response.body()).ok(),
        }
    }

    /// The HTTP status Discord answered with, if this error came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match *self {
            Error::Status { status, .. } | Error::ServerError { status, .. } => Some(status),
            _ => None,
        }
    }

    /// The Discord JSON error code (e.g. `10013` for "Unknown User"), if present.
    pub fn code(&self) -> Option<u64> {
        match self {
            Error::Status {
                body: Some(body), ..
            } => body.get("code").and_then(Value::as_u64),
            _ => None,
        }
    }

    /// Whether the service was unavailable, as opposed to the request being wrong.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ServerError { .. } | Error::Transport { .. } | Error::TimedOut
        )
    }

    /// Whether Discord refused the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Status { .. })
    }

    /// Whether the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Whether the bot lacks permission for the request.
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }
}

fn describe_body(body: &Option<Value>) -> String {
    match body {
        Some(body) => match body.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => body.to_string(),
        },
        None => "no body".to_owned(),
    }
}

/// Extension trait for checking responses that are expected to be empty.
pub(crate) trait StatusChecks {
    /// Validate a request that is expected to return 204 No Content and print
    /// debug information if it does not.
    fn insure_no_content(self) -> Result<()>;
}

impl StatusChecks for RestResponse {
    fn insure_no_content(self) -> Result<()> {
        if self.status() != StatusCode::NO_CONTENT {
            debug!("Expected 204 No Content, got {}", self.status());

            for (header_name, header_value) in self.headers().iter() {
                debug!("Header: {}: {:?}", header_name, header_value);
            }

            debug!("Content: {:?}", String::from_utf8_lossy(self.body()));
        }
        Ok(())
    }
}
