use std::time::Duration;

use super::RetryPolicy;

/// Where the Discord API is mounted on the web.
pub const API_BASE: &str = "https://discord.com/api/v10";

/// User agent to use when logging into a bot account.
pub const BOT_USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/spiceswag/discord-tokio, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Settings of a [`Discord`](super::Discord) client.
///
/// ```ignore
/// let config = RestConfig::default()
///     .with_timeout(Duration::from_secs(10))
///     .with_retry_policy(RetryPolicy::none());
/// let discord = Discord::from_bot_token_with_config(token, config)?;
/// ```
#[derive(Clone, Debug)]
pub struct RestConfig {
    /// Base URL every route is appended to.
    pub api_base: String,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Timeout of a single HTTP attempt. An attempt that times out counts as
    /// a network failure and is retried.
    pub attempt_timeout: Duration,
    /// Requests per second allowed by the global limit, `0` to disable it.
    pub global_limit: u32,
    /// Retry behaviour on server errors and network failures.
    pub retry: RetryPolicy,
}

impl Default for RestConfig {
    fn default() -> Self {
        RestConfig {
            api_base: API_BASE.to_owned(),
            user_agent: BOT_USER_AGENT.to_owned(),
            attempt_timeout: Duration::from_secs(30),
            global_limit: 50,
            retry: RetryPolicy::default(),
        }
    }
}

impl RestConfig {
    /// Send requests somewhere other than Discord, e.g. a proxy.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Set the `User-Agent`.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the timeout of a single HTTP attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the global requests per second.
    pub fn with_global_limit(mut self, limit: u32) -> Self {
        self.global_limit = limit;
        self
    }

    /// Set the retry behaviour.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_loses_trailing_slash() {
        let config = RestConfig::default().with_api_base("http://127.0.0.1:8080/api/");
        assert_eq!(config.api_base, "http://127.0.0.1:8080/api");
        assert_eq!(RestConfig::default().global_limit, 50);
    }
}
