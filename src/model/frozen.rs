//! Data models for resources returned from the Discord REST API.
//!
//! The name `frozen` comes from the fact that data modeled
//! in this module rarely changes, like user profiles, server settings and
//! roles. Resources that change with every interaction, such as members and
//! messages, are defined in the sister module `live`.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// IDs

/// Milliseconds between the Unix epoch and the first second of 2015.
const DISCORD_EPOCH: u64 = 1_420_070_400_000;

macro_rules! snowflake {
    ($(#[$attr:meta] $name:ident;)*) => {
        $(
            #[$attr]
            ///
            /// Identifiers can be debug-printed using the `{:?}` specifier, or their
            /// raw number value printed using the `{}` specifier.
            #[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, Ord, PartialOrd)]
            #[derive(Serialize, Deserialize)]
            pub struct $name(
                #[serde(
                    deserialize_with = "crate::serial::deserialize_id",
                    serialize_with = "crate::serial::serialize_id"
                )]
                pub u64,
            );

            impl $name {
                /// Get the creation date of the object referred to by this ID.
                ///
                /// Discord generates identifiers using a scheme based on [Twitter Snowflake]
                /// (https://github.com/twitter/snowflake/tree/b3f6a3c6ca8e1b6847baa6ff42bf72201e2c2231#snowflake).
                pub fn creation_date(&self) -> DateTime<Utc> {
                    let millis = DISCORD_EPOCH + (self.0 >> 22);
                    Utc.timestamp_millis_opt(millis as i64)
                        .single()
                        .unwrap_or_default()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<u64> for $name {
                fn from(id: u64) -> Self {
                    $name(id)
                }
            }
        )*
    }
}

snowflake! {
    /// Bots are identified sometimes by their application ID
    ApplicationId;
    /// An identifier for a User
    UserId;
    /// An identifier for a Guild
    GuildId;
    /// An identifier for a Channel
    ChannelId;
    /// An identifier for a Message
    MessageId;
    /// An identifier for a Role
    RoleId;
    /// An identifier for a Webhook
    WebhookId;
    /// An identifier for an Interaction
    InteractionId;
}

// Users

/// Public user information.
///
/// Users in Discord are generally considered the base entity.
/// Users can spawn across the entire platform, be members of guilds,
/// participate in text and voice chat, and much more.
///
/// https://discord.com/developers/docs/resources/user#user-object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// The user's ID
    pub id: UserId,

    /// The user's username, not unique across the platform.
    #[serde(rename = "username")]
    pub name: String,
    /// The user's display name, if set.
    #[serde(default)]
    pub global_name: Option<String>,
    /// The user's Discord-tag, `0` for users on the new username system.
    #[serde(
        default,
        deserialize_with = "crate::serial::deserialize_discrim",
        serialize_with = "crate::serial::serialize_discrim"
    )]
    pub discriminator: u16,

    /// The user's avatar hash
    #[serde(default)]
    pub avatar: Option<String>,
    /// The user's banner hash, only sent when fetching the user directly.
    #[serde(default)]
    pub banner: Option<String>,

    /// Whether the user belongs to an OAuth2 application
    #[serde(default)]
    pub bot: bool,
    /// Whether the user is an official Discord system user
    #[serde(default)]
    pub system: bool,
}

impl User {
    /// Overwrite this user with a fresher copy of the same account.
    ///
    /// Fields that partial payloads leave out are only replaced when present.
    pub fn update_from(&mut self, fresh: &User) {
        self.name.clone_from(&fresh.name);
        self.discriminator = fresh.discriminator;
        self.avatar.clone_from(&fresh.avatar);
        self.bot = fresh.bot;
        self.system = fresh.system;
        update_field_opt(&mut self.global_name, &fresh.global_name);
        update_field_opt(&mut self.banner, &fresh.banner);
    }

    /// Returns the formatted URL of the user's icon.
    ///
    /// Returns None if the user does not have an avatar.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|avatar_hash| format!(cdn_concat!("/avatars/{}/{}.png"), self.id, avatar_hash))
    }

    /// The name shown in clients: the display name if set, the username otherwise.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.name)
    }
}

/// Information about the logged-in user
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct CurrentUser {
    /// The public part of the profile.
    #[serde(flatten)]
    pub user: User,
    /// Whether two factor authentication is enabled.
    #[serde(default)]
    pub mfa_enabled: bool,
    /// Whether the email on this account has been verified.
    #[serde(default)]
    pub verified: bool,
    /// The chosen language option.
    #[serde(default)]
    pub locale: Option<String>,
}

// Random **NECESSARY** utilities

fn update_field_opt<T: Clone>(item: &mut Option<T>, patch: &Option<T>) {
    if let Some(value) = patch.clone() {
        *item = Some(value);
    }
}

// Guilds

/// A guild (server) as returned by the REST API.
///
/// https://discord.com/developers/docs/resources/guild#guild-object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guild {
    /// The ID of the guild.
    pub id: GuildId,
    /// The name of the guild (2-100 characters).
    pub name: String,
    /// The icon hash of the guild.
    #[serde(default)]
    pub icon: Option<String>,
    /// The owner of the guild
    #[serde(default)]
    pub owner_id: Option<UserId>,
    /// The description of a guild
    #[serde(default)]
    pub description: Option<String>,
    /// Required multi factor authentication level.
    #[serde(default)]
    pub mfa_level: u8,
    /// User verification level to be able to use the guild
    #[serde(default)]
    pub verification_level: u8,
    /// The preferred locale of a Community guild.
    #[serde(default)]
    pub preferred_locale: Option<String>,
    /// Approximate number of members, present when fetched `with_counts`.
    #[serde(default)]
    pub approximate_member_count: Option<u64>,

    /// The roles of the guild. In cached guilds these mirror
    /// [`crate::EntityCache::role`].
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Guild {
    /// Overwrite this guild with a fresher copy.
    pub fn update_from(&mut self, fresh: &Guild) {
        self.name.clone_from(&fresh.name);
        self.icon.clone_from(&fresh.icon);
        self.description.clone_from(&fresh.description);
        self.mfa_level = fresh.mfa_level;
        self.verification_level = fresh.verification_level;
        update_field_opt(&mut self.owner_id, &fresh.owner_id);
        update_field_opt(&mut self.preferred_locale, &fresh.preferred_locale);
        update_field_opt(
            &mut self.approximate_member_count,
            &fresh.approximate_member_count,
        );
        if !fresh.roles.is_empty() {
            self.roles.clone_from(&fresh.roles);
        }
    }

    /// Returns the formatted URL of the guild's icon.
    ///
    /// Returns `None` if the guild does not have an icon.
    pub fn icon_url(&self) -> Option<String> {
        self.icon
            .as_ref()
            .map(|icon| format!(cdn_concat!("/icons/{}/{}.png"), self.id, icon))
    }
}

impl GuildId {
    /// Get the `RoleId` for the `@everyone` role of this guild.
    #[inline(always)]
    pub fn everyone(&self) -> RoleId {
        RoleId(self.0)
    }
}

/// Roles represent a set of permissions attached to a group of users.
///
/// The `@everyone` role has the same ID as the guild it belongs to.
///
/// https://discord.com/developers/docs/topics/permissions#role-object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// The ID of the role.
    pub id: RoleId,
    /// The name of the role.
    pub name: String,
    /// Color in `0xRRGGBB` form
    #[serde(default)]
    pub color: u64,
    /// If this role is pinned in the user listing
    #[serde(default)]
    pub hoist: bool,
    /// If this role belongs to a bot user and is managed by their application.
    #[serde(default)]
    pub managed: bool,
    /// Position of this role.
    #[serde(default)]
    pub position: i64,
    /// Whether this role can be mentioned.
    #[serde(default)]
    pub mentionable: bool,
    /// The permission bit set, as the decimal string Discord sends.
    #[serde(default)]
    pub permissions: String,
}

impl Role {
    /// Overwrite this role with a fresher copy.
    pub fn update_from(&mut self, fresh: &Role) {
        self.clone_from(fresh);
    }

    /// The permission bit set as a number.
    pub fn permission_bits(&self) -> Option<u64> {
        self.permissions.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snowflakes_round_trip_as_strings() {
        let id: UserId = serde_json::from_value(json!("80351110224678912")).unwrap();
        assert_eq!(id, UserId(80351110224678912));
        assert_eq!(serde_json::to_value(id).unwrap(), json!("80351110224678912"));

        let id: UserId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id.0, 42);
    }

    #[test]
    fn creation_date() {
        let id = UserId(175928847299117063);
        assert_eq!(id.creation_date().timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn partial_user_keeps_known_fields() {
        let mut user: User = serde_json::from_value(json!({
            "id": "1", "username": "nelly", "discriminator": "0",
            "global_name": "Nelly", "banner": "b4nn3r"
        }))
        .unwrap();
        let partial: User = serde_json::from_value(json!({
            "id": "1", "username": "nelly2", "discriminator": "0", "avatar": "a"
        }))
        .unwrap();

        user.update_from(&partial);

        assert_eq!(user.name, "nelly2");
        assert_eq!(user.avatar.as_deref(), Some("a"));
        assert_eq!(user.global_name.as_deref(), Some("Nelly"));
        assert_eq!(user.banner.as_deref(), Some("b4nn3r"));
        assert_eq!(user.display_name(), "Nelly");
    }

    #[test]
    fn everyone_role_shares_the_guild_id() {
        assert_eq!(GuildId(81384788765712384).everyone(), RoleId(81384788765712384));
    }
}
