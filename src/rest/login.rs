use reqwest::header::HeaderValue;

use crate::{
    cache::EntityCache,
    error::{Error, Result},
    ratelimit::RateLimits,
};

use super::{metrics::MetricsCollector, Discord, RestConfig};

/// Login methods for creating a [`Discord`] API client.
pub trait LoginExt: Sized {
    /// Log in as a bot account using the given bot authentication token.
    /// The token will automatically be prefixed with `Bot `.
    fn from_bot_token(token: &str) -> Result<Self> {
        Self::from_bot_token_with_config(token, RestConfig::default())
    }

    /// Log in as a bot account, with settings other than the defaults.
    fn from_bot_token_with_config(token: &str, config: RestConfig) -> Result<Self>;
}

impl LoginExt for Discord {
    fn from_bot_token_with_config(token: &str, config: RestConfig) -> Result<Discord> {
        let token = format!("Bot {}", token.trim());
        if HeaderValue::from_str(&token).is_err() {
            return Err(Error::InvalidArgument("token is not a valid header value"));
        }

        let client = reqwest::Client::builder()
            .https_only(config.api_base.starts_with("https://"))
            .user_agent(config.user_agent.as_str())
            .timeout(config.attempt_timeout)
            .build()?;

        Ok(Discord {
            client,
            token,
            api_base: config.api_base,
            rate_limits: RateLimits::new(config.global_limit),
            cache: EntityCache::new(),
            retry: config.retry,
            metrics: MetricsCollector::default(),
        })
    }
}
