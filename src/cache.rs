//! In-memory cache of the entities the REST API hands back.
//!
//! Every entity-shaped response is merged into the cache right after it is
//! decoded, so readers observe the freshest copy any call has seen. Entries
//! are shared [`Cached`] handles: an update rewrites the existing entry in
//! place, and a handle obtained earlier sees it without fetching again.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;
use tracing::trace;

use crate::model::{Guild, GuildId, Member, Message, Role, RoleId, User, UserId};

/// A shared handle to a cached entity.
pub type Cached<T> = Arc<RwLock<T>>;

/// Entities seen in REST responses, keyed by their IDs.
///
/// Each map locks per shard, so concurrent updates to unrelated entities
/// do not contend. Entries are kept for the lifetime of the cache.
///
/// Entities embedded in others, a member's [`Member::user`] and a guild's
/// [`Guild::roles`], mirror the entry cached under their own ID and are
/// rewritten whenever that entry is.
#[derive(Debug, Default)]
pub struct EntityCache {
    users: DashMap<UserId, Cached<User>>,
    guilds: DashMap<GuildId, Cached<Guild>>,
    members: DashMap<(GuildId, UserId), Cached<Member>>,
    roles: DashMap<RoleId, Cached<Role>>,
    /// Guilds each user is a cached member of.
    memberships: DashMap<UserId, Vec<GuildId>>,
    /// The guild each role belongs to.
    role_guilds: DashMap<RoleId, GuildId>,
}

fn upsert<K, T, F>(map: &DashMap<K, Cached<T>>, key: K, fresh: &T, update: F) -> Cached<T>
where
    K: Eq + std::hash::Hash,
    T: Clone,
    F: FnOnce(&mut T, &T),
{
    match map.entry(key) {
        Entry::Occupied(entry) => {
            update(&mut *entry.get().write(), fresh);
            Arc::clone(entry.get())
        }
        Entry::Vacant(entry) => {
            Arc::clone(entry.insert(Arc::new(RwLock::new(fresh.clone()))).value())
        }
    }
}

impl EntityCache {
    /// An empty cache.
    pub fn new() -> EntityCache {
        EntityCache::default()
    }

    /// Merge a user into the cache.
    pub fn upsert_user(&self, user: &User) -> Cached<User> {
        trace!(user = %user.id, "caching user");
        let cached = upsert(&self.users, user.id, user, User::update_from);

        if let Some(guilds) = self.memberships.get(&user.id) {
            let current = cached.read().clone();
            for guild in guilds.iter() {
                if let Some(member) = self.members.get(&(*guild, user.id)) {
                    member.write().user = Some(current.clone());
                }
            }
        }

        cached
    }

    /// Merge a guild, and each role it lists, into the cache.
    pub fn upsert_guild(&self, guild: &Guild) -> Cached<Guild> {
        trace!(guild = %guild.id, "caching guild");
        for role in &guild.roles {
            self.upsert_guild_role(guild.id, role);
        }
        upsert(&self.guilds, guild.id, guild, Guild::update_from)
    }

    /// Merge a guild member, and the user behind it, into the cache.
    ///
    /// Returns `None` when the payload does not say which user it is about.
    pub fn upsert_member(&self, guild: GuildId, member: &Member) -> Option<Cached<Member>> {
        let id = member.user_id()?;
        let user = member.user.as_ref().map(|user| self.upsert_user(user))?;
        let current = user.read().clone();

        trace!(%guild, user = %id, "caching member");
        let cached = upsert(&self.members, (guild, id), member, Member::update_from);
        {
            let mut entry = cached.write();
            entry.guild_id = Some(guild);
            entry.user = Some(current);
        }

        let mut guilds = self.memberships.entry(id).or_default();
        if !guilds.contains(&guild) {
            guilds.push(guild);
        }

        Some(cached)
    }

    /// Merge a role into the cache.
    ///
    /// If the role is known to belong to a cached guild, the guild's copy is
    /// rewritten too.
    pub fn upsert_role(&self, role: &Role) -> Cached<Role> {
        let cached = upsert(&self.roles, role.id, role, Role::update_from);

        let guild = self
            .role_guilds
            .get(&role.id)
            .and_then(|guild| self.guild(*guild));
        if let Some(guild) = guild {
            let current = cached.read().clone();
            let mut guild = guild.write();
            match guild.roles.iter_mut().find(|role| role.id == current.id) {
                Some(copy) => *copy = current,
                None => guild.roles.push(current),
            }
        }

        cached
    }

    /// Merge a role of `guild` into the cache, listing it on the cached guild.
    pub fn upsert_guild_role(&self, guild: GuildId, role: &Role) -> Cached<Role> {
        self.role_guilds.insert(role.id, guild);
        self.upsert_role(role)
    }

    /// Merge the users a message carries into the cache.
    ///
    /// Authors of webhook messages are not real accounts and are left out.
    pub fn rehydrate_message(&self, message: &Message) {
        if !message.is_webhook() {
            self.upsert_user(&message.author);

            if let (Some(guild), Some(member)) = (message.guild_id, message.member.as_ref()) {
                // message members come without their user
                let mut member = member.clone();
                member.user.get_or_insert_with(|| message.author.clone());
                self.upsert_member(guild, &member);
            }
        }

        for user in &message.mentions {
            self.upsert_user(user);
        }

        if let Some(referenced) = message.referenced_message.as_deref() {
            self.rehydrate_message(referenced);
        }
    }

    /// A cached user.
    pub fn user(&self, id: UserId) -> Option<Cached<User>> {
        self.users.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// A cached guild.
    pub fn guild(&self, id: GuildId) -> Option<Cached<Guild>> {
        self.guilds.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// A cached member of a guild.
    pub fn member(&self, guild: GuildId, user: UserId) -> Option<Cached<Member>> {
        self.members
            .get(&(guild, user))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// A cached role.
    pub fn role(&self, id: RoleId) -> Option<Cached<Role>> {
        self.roles.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of cached users.
    pub fn len_users(&self) -> usize {
        self.users.len()
    }

    /// Number of cached guilds.
    pub fn len_guilds(&self) -> usize {
        self.guilds.len()
    }

    /// Number of cached guild members.
    pub fn len_members(&self) -> usize {
        self.members.len()
    }

    /// Number of cached roles.
    pub fn len_roles(&self) -> usize {
        self.roles.len()
    }
}
