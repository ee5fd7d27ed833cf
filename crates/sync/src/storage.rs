//! External collaborator interfaces (spec §1, §6): the storage layer this
//! crate consumes. Encryption/signing and transport are out of scope
//! entirely (sealed/delivered by the host); storage is in scope only as a
//! trait the host implements — this crate ships no concrete database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::{Member, Message};
use crate::ids::{ChannelId, MessageId, SpaceId};

/// A deletion record (spec §3, invariant 6 and §6 — "Persisted state
/// layout"). The host persists these; the core only tracks them
/// in-process between host reloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tombstone {
    pub message_id: MessageId,
    pub space_id: SpaceId,
    pub channel_id: ChannelId,
    pub deleted_at: u64,
}

/// Direction for a paged message fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageDirection {
    Forward,
    Backward,
}

/// A page of messages returned by [`SyncStorage::get_messages_page`].
#[derive(Clone, Debug, Default)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
}

/// Storage operations the sync core depends on (spec §6).
///
/// All operations that touch storage surface their error unchanged to the
/// caller (spec §7 — no internal retries).
#[async_trait]
pub trait SyncStorage: Send + Sync + 'static {
    /// Bulk fetch used by the payload cache on first load, bounded by
    /// `limit` (spec §4.C).
    async fn get_messages(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        limit: usize,
        cursor: Option<&str>,
    ) -> eyre::Result<Vec<Message>>;

    /// Cursor-paged fetch for hosts that want finer control than the bulk
    /// load the payload cache uses (spec §6 — `getMessages`).
    async fn get_messages_page(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        limit: usize,
        cursor: Option<&str>,
        direction: PageDirection,
    ) -> eyre::Result<MessagePage>;

    async fn get_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> eyre::Result<Option<Message>>;

    async fn save_message(&self, message: Message) -> eyre::Result<()>;

    async fn delete_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> eyre::Result<()>;

    async fn get_space_members(&self, space_id: &SpaceId) -> eyre::Result<Vec<Member>>;

    async fn save_space_member(&self, space_id: &SpaceId, member: Member) -> eyre::Result<()>;

    /// Open question resolved (spec §9): no deletion primitive exists in
    /// the distilled storage interface, but `memberDelta.removedAddresses`
    /// needs one to apply against. Hosts that never remove members may
    /// implement this as a no-op.
    async fn remove_space_member(
        &self,
        space_id: &SpaceId,
        address: &crate::ids::Address,
    ) -> eyre::Result<()>;
}

/// Append-only per-process tombstone log (spec §9).
///
/// The host is responsible for persistence across restarts; this log is
/// the in-memory shape the core reads/writes between reloads.
#[derive(Default)]
pub struct TombstoneLog {
    entries: Mutex<Vec<Tombstone>>,
}

impl TombstoneLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tombstone: Tombstone) {
        self.entries.lock().expect("tombstone log poisoned").push(tombstone);
    }

    /// Readers receive a copy (spec §5 — shared-resource policy).
    pub fn list(&self, space_id: &SpaceId, channel_id: &ChannelId) -> Vec<Tombstone> {
        self.entries
            .lock()
            .expect("tombstone log poisoned")
            .iter()
            .filter(|t| &t.space_id == space_id && &t.channel_id == channel_id)
            .cloned()
            .collect()
    }

    /// Whole-list filter against `deletedAt`, reaping entries older than
    /// `now - horizon_ms` (spec §3, invariant 6; default horizon 30 days,
    /// see [`crate::config::SyncConfig::tombstone_max_age_ms`]).
    pub fn cleanup(&self, now_ms: u64, horizon_ms: u64) -> usize {
        let mut entries = self.entries.lock().expect("tombstone log poisoned");
        let before = entries.len();
        let cutoff = now_ms.saturating_sub(horizon_ms);
        entries.retain(|t| t.deleted_at >= cutoff);
        before - entries.len()
    }
}

/// A simple in-memory [`SyncStorage`] used by tests and examples.
#[derive(Default)]
pub struct InMemoryStorage {
    messages: Mutex<HashMap<(SpaceId, ChannelId, MessageId), Message>>,
    members: Mutex<HashMap<SpaceId, HashMap<crate::ids::Address, Member>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStorage for InMemoryStorage {
    async fn get_messages(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        limit: usize,
        _cursor: Option<&str>,
    ) -> eyre::Result<Vec<Message>> {
        let mut out: Vec<Message> = self
            .messages
            .lock()
            .expect("poisoned")
            .values()
            .filter(|m| &m.space_id == space_id && &m.channel_id == channel_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.created_date);
        out.truncate(limit);
        Ok(out)
    }

    async fn get_messages_page(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        limit: usize,
        _cursor: Option<&str>,
        _direction: PageDirection,
    ) -> eyre::Result<MessagePage> {
        let messages = self.get_messages(space_id, channel_id, limit, None).await?;
        Ok(MessagePage {
            messages,
            next_cursor: None,
            prev_cursor: None,
        })
    }

    async fn get_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> eyre::Result<Option<Message>> {
        Ok(self
            .messages
            .lock()
            .expect("poisoned")
            .get(&(space_id.clone(), channel_id.clone(), message_id.clone()))
            .cloned())
    }

    async fn save_message(&self, message: Message) -> eyre::Result<()> {
        let key = (message.space_id.clone(), message.channel_id.clone(), message.message_id.clone());
        self.messages.lock().expect("poisoned").insert(key, message);
        Ok(())
    }

    async fn delete_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> eyre::Result<()> {
        self.messages
            .lock()
            .expect("poisoned")
            .remove(&(space_id.clone(), channel_id.clone(), message_id.clone()));
        Ok(())
    }

    async fn get_space_members(&self, space_id: &SpaceId) -> eyre::Result<Vec<Member>> {
        Ok(self
            .members
            .lock()
            .expect("poisoned")
            .get(space_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_space_member(&self, space_id: &SpaceId, member: Member) -> eyre::Result<()> {
        self.members
            .lock()
            .expect("poisoned")
            .entry(space_id.clone())
            .or_default()
            .insert(member.address.clone(), member);
        Ok(())
    }

    async fn remove_space_member(
        &self,
        space_id: &SpaceId,
        address: &crate::ids::Address,
    ) -> eyre::Result<()> {
        if let Some(members) = self.members.lock().expect("poisoned").get_mut(space_id) {
            members.remove(address);
        }
        Ok(())
    }
}
