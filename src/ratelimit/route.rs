//! Mapping of requests onto rate limit buckets.
//!
//! Discord scopes rate limits by HTTP method and route, taking the so-called
//! *major parameters* into account: `/channels/10/messages/11` and
//! `/channels/10/messages/12` count against the same budget, while
//! `/channels/4/messages/7` and `/channels/5/messages/7` do not.
//!
//! Requests therefore carry a route template in which major parameters are
//! substituted and every other parameter is left as a `:placeholder`:
//!
//! ```text
//! channels/381880193251409931/messages/:message_id
//! guilds/81384788765712384/members/:user_id
//! webhooks/223704706495545344/:webhook_token
//! ```

use std::fmt;

use reqwest::Method;
use thiserror::Error as ThisError;

/// Path segments whose following segment is a major parameter.
const MAJOR_PARAMETERS: &[&str] = &["channels", "guilds", "webhooks", "interactions"];

/// Identifier of a rate limit bucket.
///
/// Two requests with equal keys contend for the same budget.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct BucketKey(String);

impl BucketKey {
    /// Resolve the bucket a request on `route` with `method` is limited by.
    ///
    /// A template that breaks the placeholder convention is a bug in the
    /// endpoint that built it, and is reported as a [`RouteError`].
    pub fn resolve(method: &Method, route: &str) -> Result<BucketKey, RouteError> {
        if route.contains('?') {
            return Err(RouteError::new(route, "query strings belong in the url"));
        }

        let trimmed = route.trim_matches('/');
        if trimmed.is_empty() {
            return Err(RouteError::new(route, "empty route template"));
        }

        let mut previous: Option<&str> = None;
        for segment in trimmed.split('/') {
            let after_major = previous.map_or(false, |p| MAJOR_PARAMETERS.contains(&p));

            if segment.is_empty() {
                return Err(RouteError::new(route, "empty path segment"));
            } else if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase() || b == b'_') {
                    return Err(RouteError::new(route, "malformed placeholder"));
                }
                if after_major {
                    return Err(RouteError::new(
                        route,
                        "major parameters must be substituted, not left as placeholders",
                    ));
                }
            } else if segment.bytes().all(|b| b.is_ascii_digit()) && !after_major {
                return Err(RouteError::new(
                    route,
                    "minor parameters must be left as placeholders",
                ));
            }

            previous = Some(segment);
        }

        Ok(BucketKey(format!("{} {}", method.as_str(), trimmed)))
    }

    /// The substituted major parameters, e.g. `channels/10` for
    /// `GET channels/10/messages/:message_id`. Empty when there are none.
    pub fn major_parameters(&self) -> String {
        let template = self.0.split_once(' ').map_or("", |(_, template)| template);
        let mut majors = Vec::new();
        let mut segments = template.split('/');
        while let Some(segment) = segments.next() {
            if MAJOR_PARAMETERS.contains(&segment) {
                if let Some(value) = segments.next() {
                    majors.push(format!("{segment}/{value}"));
                }
            }
        }
        majors.join("/")
    }

    /// The key as a string, `"{METHOD} {template}"`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A route template that does not follow the placeholder convention.
#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
#[error("invalid route template `{route}`: {reason}")]
pub struct RouteError {
    /// The offending template.
    pub route: String,
    /// What is wrong with it.
    pub reason: &'static str,
}

impl RouteError {
    fn new(route: &str, reason: &'static str) -> RouteError {
        RouteError {
            route: route.to_owned(),
            reason,
        }
    }
}
