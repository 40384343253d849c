//! Data models for `live` resources, i.e. those that change with almost
//! every interaction, such as guild members and messages.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{ChannelId, GuildId, MessageId, RoleId, User, UserId, WebhookId};

// Member

/// Information about a member of a guild
///
/// https://discord.com/developers/docs/resources/guild#guild-member-object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    /// The user this member structure concerns.
    ///
    /// In cached members this mirrors [`crate::EntityCache::user`], and
    /// changes whenever the user is updated.
    #[serde(default)]
    pub user: Option<User>,

    /// The guild this member belongs to, filled in by the client.
    #[serde(default)]
    pub guild_id: Option<GuildId>,

    /// The user's guild nickname.
    #[serde(default)]
    pub nick: Option<String>,
    /// The user's guild specific avatar.
    #[serde(default)]
    pub avatar: Option<String>,

    /// The roles granted to the user
    #[serde(default)]
    pub roles: Vec<RoleId>,

    /// When the user joined this guild.
    #[serde(default)]
    pub joined_at: Option<DateTime<FixedOffset>>,

    /// If the user is muted in voice channels
    #[serde(default)]
    pub mute: bool,
    /// If the user is deafened in voice channels
    #[serde(default)]
    pub deaf: bool,

    /// Guild member flags
    #[serde(default)]
    pub flags: u64,

    /// When the user started boosting this guild.
    #[serde(default, rename = "premium_since")]
    pub boosting_since: Option<DateTime<FixedOffset>>,

    /// When the member's timeout will expire.
    #[serde(default)]
    pub communication_disabled_until: Option<DateTime<FixedOffset>>,
}

impl Member {
    /// The ID of the user behind this member, if the payload carried it.
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|user| user.id)
    }

    /// Get this member's nickname if present or their username otherwise.
    pub fn display_name(&self) -> Option<&str> {
        if let Some(name) = self.nick.as_ref() {
            Some(name)
        } else {
            self.user.as_ref().map(User::display_name)
        }
    }

    /// Overwrite this member with a fresher copy.
    pub fn update_from(&mut self, fresh: &Member) {
        if let (Some(user), Some(fresh_user)) = (self.user.as_mut(), fresh.user.as_ref()) {
            user.update_from(fresh_user);
        } else if self.user.is_none() {
            self.user.clone_from(&fresh.user);
        }
        if fresh.guild_id.is_some() {
            self.guild_id = fresh.guild_id;
        }
        self.nick.clone_from(&fresh.nick);
        self.avatar.clone_from(&fresh.avatar);
        self.roles.clone_from(&fresh.roles);
        if fresh.joined_at.is_some() {
            self.joined_at = fresh.joined_at;
        }
        self.mute = fresh.mute;
        self.deaf = fresh.deaf;
        self.flags = fresh.flags;
        self.boosting_since = fresh.boosting_since;
        self.communication_disabled_until = fresh.communication_disabled_until;
    }
}

// Messages

/// Message transmitted over a text channel
///
/// https://discord.com/developers/docs/resources/channel#message-object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The ID of the message.
    pub id: MessageId,
    /// The ID of the channel the message was sent in.
    pub channel_id: ChannelId,
    /// The ID of the guild the message was sent in, if known.
    #[serde(default)]
    pub guild_id: Option<GuildId>,

    /// The content of the message
    #[serde(default)]
    pub content: String,
    /// Any attached files.
    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// The user that created the message.
    ///
    /// For webhook messages this is a stand-in built from the webhook's
    /// name and avatar, not a real account.
    pub author: User,
    /// The member behind the author, present on some guild messages.
    #[serde(default)]
    pub member: Option<Member>,
    /// If the message was generated by a webhook, this is the webhook's ID.
    #[serde(default)]
    pub webhook_id: Option<WebhookId>,

    /// When the message was sent.
    pub timestamp: DateTime<FixedOffset>,
    /// The last time the message was edited, if it was ever.
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<FixedOffset>>,

    /// Whether the message should be read out loud on clients focused on the channel.
    #[serde(default)]
    pub tts: bool,
    /// A shorthand property for if the message mentions every user on the guild/channel.
    #[serde(default)]
    pub mention_everyone: bool,
    /// A shorthand property for the users this message mentions.
    #[serde(default)]
    pub mentions: Vec<User>,
    /// A shorthand property for the whole roles this message mentions.
    #[serde(default)]
    pub mention_roles: Vec<RoleId>,

    /// Whether this message is pinned for all to see.
    #[serde(default)]
    pub pinned: bool,

    /// The type of the message, `0` for regular messages and `19` for replies.
    #[serde(rename = "type", default)]
    pub kind: u8,

    /// The message this one replies to.
    #[serde(default)]
    pub referenced_message: Option<Box<Message>>,

    /// Odd message properties.
    #[serde(default)]
    pub flags: u64,

    // carry on if nonce is absent or for some reason not a string
    #[serde(deserialize_with = "crate::serial::ignore_errors")]
    #[serde(default)]
    pub nonce: Option<String>,
}

impl Message {
    /// Whether the author is a webhook rather than a user account.
    pub fn is_webhook(&self) -> bool {
        self.webhook_id.is_some()
    }
}

/// File upload attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Short numeric ID for this attachment.
    pub id: String,
    /// The attachment's filename.
    pub filename: String,
    /// The attachment's media type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// The URL at which the attachment can be retrieved.
    pub url: String,
    /// The attachment's proxied URL.
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// The attachment's size in bytes.
    pub size: u64,
}
