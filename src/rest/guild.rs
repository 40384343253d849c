use std::future::Future;

use reqwest::{Method, StatusCode};
use serde_json::json;

use crate::{
    cache::Cached,
    error::{Error, Result, StatusChecks},
    model::{Guild, GuildId, Member, Role, RoleId, UserId},
};

use super::{Discord, RestRequest};

/// Longest history `ban_member` may delete, seven days.
const MAX_BAN_DELETE_SECONDS: u32 = 604_800;

/// Discord REST API methods for managing guilds, their members and roles.
pub trait GuildExt {
    /// Create a new guild with the given name.
    ///
    /// Only bots in fewer than 10 guilds may use this endpoint.
    fn create_guild(&self, name: &str) -> impl Future<Output = Result<Cached<Guild>>> + Send;

    /// Get information about a guild, with approximate member counts if
    /// `with_counts` is set.
    fn get_guild(
        &self,
        guild: GuildId,
        with_counts: bool,
    ) -> impl Future<Output = Result<Cached<Guild>>> + Send;

    /// Retrieve a member object for a guild member.
    fn get_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> impl Future<Output = Result<Cached<Member>>> + Send;

    /// Retrieve a page of the guild's members, ordered by user ID.
    ///
    /// `limit` must be between 1 and 1000.
    fn list_members(
        &self,
        guild: GuildId,
        limit: u16,
        after: Option<UserId>,
    ) -> impl Future<Output = Result<Vec<Cached<Member>>>> + Send;

    /// Add a user to the guild, given an OAuth2 `access_token` with the
    /// `guilds.join` scope.
    ///
    /// Returns `None` if the user already was a member.
    fn add_member(
        &self,
        guild: GuildId,
        user: UserId,
        access_token: &str,
        nick: Option<&str>,
        roles: &[RoleId],
    ) -> impl Future<Output = Result<Option<Cached<Member>>>> + Send;

    /// Kick a member from the guild.
    fn remove_member(
        &self,
        guild: GuildId,
        user: UserId,
        reason: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Retrieve the list of roles for a guild.
    fn get_roles(&self, guild: GuildId) -> impl Future<Output = Result<Vec<Cached<Role>>>> + Send;

    /// Create a new role on a guild.
    fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        color: Option<u32>,
        reason: Option<&str>,
    ) -> impl Future<Output = Result<Cached<Role>>> + Send;

    /// Ban a user from the guild, removing their messages of the last
    /// `delete_message_seconds` (at most seven days).
    fn ban_member(
        &self,
        guild: GuildId,
        user: UserId,
        delete_message_seconds: u32,
        reason: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl Discord {
    fn cache_member(&self, guild: GuildId, member: &Member) -> Result<Cached<Member>> {
        self.cache
            .upsert_member(guild, member)
            .ok_or(Error::Protocol("guild member payload without a user"))
    }
}

impl GuildExt for Discord {
    async fn create_guild(&self, name: &str) -> Result<Cached<Guild>> {
        let map = json! {{ "name": name }};

        let guild: Guild = self
            .execute(RestRequest::new(Method::POST, "guilds", "guilds").json(map))
            .await?
            .json()?;

        Ok(self.cache.upsert_guild(&guild))
    }

    async fn get_guild(&self, guild: GuildId, with_counts: bool) -> Result<Cached<Guild>> {
        let route = format!("guilds/{guild}");
        let guild: Guild = self
            .execute(RestRequest::get(route.clone(), route).query("with_counts", with_counts))
            .await?
            .json()?;

        Ok(self.cache.upsert_guild(&guild))
    }

    async fn get_member(&self, guild: GuildId, user: UserId) -> Result<Cached<Member>> {
        let member: Member = self
            .execute(RestRequest::get(
                format!("guilds/{guild}/members/:user_id"),
                format!("guilds/{guild}/members/{user}"),
            ))
            .await?
            .json()?;

        self.cache_member(guild, &member)
    }

    async fn list_members(
        &self,
        guild: GuildId,
        limit: u16,
        after: Option<UserId>,
    ) -> Result<Vec<Cached<Member>>> {
        if !(1..=1000).contains(&limit) {
            return Err(Error::InvalidArgument("member limit must be between 1 and 1000"));
        }

        let route = format!("guilds/{guild}/members");
        let mut request = RestRequest::get(route.clone(), route).query("limit", limit);
        if let Some(after) = after {
            request = request.query("after", after);
        }

        let members: Vec<Member> = self.execute(request).await?.json()?;

        members
            .iter()
            .map(|member| self.cache_member(guild, member))
            .collect()
    }

    async fn add_member(
        &self,
        guild: GuildId,
        user: UserId,
        access_token: &str,
        nick: Option<&str>,
        roles: &[RoleId],
    ) -> Result<Option<Cached<Member>>> {
        let mut map = json! {{ "access_token": access_token }};
        if let Some(nick) = nick {
            map["nick"] = json!(nick);
        }
        if !roles.is_empty() {
            map["roles"] = json!(roles);
        }

        let response = self
            .execute(
                RestRequest::new(
                    Method::PUT,
                    format!("guilds/{guild}/members/:user_id"),
                    format!("guilds/{guild}/members/{user}"),
                )
                .json(map),
            )
            .await?;

        // already a member
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let member: Member = response.json()?;
        self.cache_member(guild, &member).map(Some)
    }

    async fn remove_member(&self, guild: GuildId, user: UserId, reason: Option<&str>) -> Result<()> {
        let request = RestRequest::new(
            Method::DELETE,
            format!("guilds/{guild}/members/:user_id"),
            format!("guilds/{guild}/members/{user}"),
        )
        .maybe_reason(reason)?;

        self.execute(request).await?.insure_no_content()
    }

    async fn get_roles(&self, guild: GuildId) -> Result<Vec<Cached<Role>>> {
        let route = format!("guilds/{guild}/roles");
        let roles: Vec<Role> = self
            .execute(RestRequest::get(route.clone(), route))
            .await?
            .json()?;

        Ok(roles
            .iter()
            .map(|role| self.cache.upsert_guild_role(guild, role))
            .collect())
    }

    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        color: Option<u32>,
        reason: Option<&str>,
    ) -> Result<Cached<Role>> {
        let mut map = json! {{ "name": name }};
        if let Some(color) = color {
            map["color"] = json!(color);
        }

        let route = format!("guilds/{guild}/roles");
        let request = RestRequest::new(Method::POST, route.clone(), route)
            .json(map)
            .maybe_reason(reason)?;

        let role: Role = self.execute(request).await?.json()?;
        Ok(self.cache.upsert_guild_role(guild, &role))
    }

    async fn ban_member(
        &self,
        guild: GuildId,
        user: UserId,
        delete_message_seconds: u32,
        reason: Option<&str>,
    ) -> Result<()> {
        if delete_message_seconds > MAX_BAN_DELETE_SECONDS {
            return Err(Error::InvalidArgument(
                "ban can delete at most seven days of messages",
            ));
        }

        let request = RestRequest::new(
            Method::PUT,
            format!("guilds/{guild}/bans/:user_id"),
            format!("guilds/{guild}/bans/{user}"),
        )
        .json(json! {{ "delete_message_seconds": delete_message_seconds }})
        .maybe_reason(reason)?;

        self.execute(request).await?.insure_no_content()
    }
}
