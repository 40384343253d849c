use std::future::Future;

use crate::{
    cache::Cached,
    error::Result,
    model::{CurrentUser, User, UserId},
};

use super::{Discord, RestRequest};

/// Discord REST API methods for looking up users.
pub trait UserExt {
    /// Get information about a user.
    /// https://discord.com/developers/docs/resources/user#get-user
    fn get_user(&self, user: UserId) -> impl Future<Output = Result<Cached<User>>> + Send;

    /// Get the logged-in user's profile.
    fn get_current_user(&self) -> impl Future<Output = Result<CurrentUser>> + Send;
}

impl UserExt for Discord {
    async fn get_user(&self, user: UserId) -> Result<Cached<User>> {
        let user: User = self
            .execute(RestRequest::get("users/:user_id", format!("users/{user}")))
            .await?
            .json()?;

        Ok(self.cache.upsert_user(&user))
    }

    async fn get_current_user(&self) -> Result<CurrentUser> {
        let current: CurrentUser = self
            .execute(RestRequest::get("users/@me", "users/@me"))
            .await?
            .json()?;

        self.cache.upsert_user(&current.user);
        Ok(current)
    }
}
