//! Client library for the [Discord](https://discord.com) REST API.
//!
//! Log in with [`LoginExt::from_bot_token`] and call the typed endpoints of
//! the extension traits ([`UserExt`], [`GuildExt`], [`MessageExt`],
//! [`WebhookExt`], [`InteractionExt`]) on the resulting [`Discord`] client.
//!
//! Every call is rate limited the way Discord expects: requests are mapped to
//! per-route buckets (see [`ratelimit::BucketKey`]) and an account-wide
//! global limit, and suspend while a limit they are subject to is exhausted
//! instead of provoking a 429. Rate limited responses, server errors and
//! network failures are retried; see [`RetryPolicy`].
//!
//! Users, guilds, members and roles found in responses are merged into the
//! client's [`EntityCache`], which hands out shared handles that stay up to
//! date as later responses come in.
//!
//! ```ignore
//! use discord_rest::{Discord, GuildExt, LoginExt};
//!
//! let discord = Discord::from_bot_token(&token)?;
//! let member = discord.get_member(guild, user).await?;
//! assert!(Arc::ptr_eq(&member, &discord.cache().member(guild, user).unwrap()));
//! ```

#![warn(missing_docs)]

macro_rules! cdn_concat {
    ($e:expr) => {
        // Out of everything, only the CDN still uses the old domain.
        concat!("https://cdn.discordapp.com", $e)
    };
}

mod cache;
mod error;
pub mod ratelimit;
mod serial;

mod rest;
pub use rest::*;

/// Struct and enum definitions of values in the Discord model.
pub mod model {
    mod frozen;
    pub use frozen::*;

    mod live;
    pub use live::*;
}

pub use cache::{Cached, EntityCache};
pub use error::{Error, Result};
