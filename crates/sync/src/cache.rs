//! Payload Cache (component C).
//!
//! The per-`(space, channel)` in-memory snapshot with O(1) incremental
//! updates to counts, boundary timestamps, and a commutative manifest
//! hash (spec §4.C).
//!
//! ## Invariants (spec §3)
//!
//! 1. `digest_map.keys() == message_map.keys()` and
//!    `member_digest_map.keys() == member_map.keys()`.
//! 2. `manifest_hash_bytes == XOR over m in message_map of H(m.messageId)`.
//! 3. `oldest/newest_timestamp` are the min/max of
//!    `message_map[*].created_date`, or both 0 when empty.
//! 4. `summary().manifest_hash == hex(manifest_hash_bytes)`.
//! 5. A session for a space exists iff its expiry is in the future —
//!    enforced by [`crate::session`], not this module.
//! 6. Tombstones are handled by [`crate::storage`], not this module.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::digest::{self, Manifest, MemberDigest, MessageDigest, Summary};
use crate::error::SyncError;
use crate::hash;
use crate::ids::{Address, ChannelId, ChannelKey, InboxAddress, MessageId, SpaceId};
use crate::storage::SyncStorage;

/// Tagged union of the message content variants this crate canonicalises
/// for hashing (spec §4.A). The final variant represents a content kind
/// the local build doesn't recognise — hashing it fails with
/// [`SyncError::UnsupportedContent`], but it still round-trips through
/// storage and sync untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MessageContent {
    Post {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_id: Option<MessageId>,
    },
    Embed {
        #[serde(skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        video_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_id: Option<MessageId>,
    },
    Sticker {
        sticker_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_id: Option<MessageId>,
    },
    EditMessage {
        orig_id: MessageId,
        edited_text: String,
        edited_at: u64,
    },
    RemoveMessage {
        remove_id: MessageId,
    },
    Join,
    Leave,
    Kick,
    Event {
        text: String,
    },
    UpdateProfile {
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_icon: Option<String>,
    },
    Mute {
        target: String,
        action: String,
        mute_id: String,
    },
    Pin {
        target_message_id: MessageId,
        action: String,
    },
    Reaction {
        message_id: MessageId,
        reaction: String,
    },
    RemoveReaction {
        message_id: MessageId,
        reaction: String,
    },
    DeleteConversation,
    /// Catch-all for content kinds this build doesn't know how to
    /// canonicalise. `kind` carries the wire tag for diagnostics.
    #[serde(other)]
    Unsupported {
        #[serde(default)]
        kind: String,
    },
}

/// A single emoji reaction on a message. `count` is derived, never stored,
/// so it can never drift from `member_ids.len()` (spec §3).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji_id: String,
    pub member_ids: Vec<Address>,
}

impl Reaction {
    pub fn count(&self) -> usize {
        self.member_ids.len()
    }
}

/// A message owned by storage; the cache only ever holds copies (spec §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    pub space_id: SpaceId,
    pub channel_id: ChannelId,
    pub sender_id: Address,
    pub created_date: u64,
    pub modified_date: u64,
    pub content: MessageContent,
    pub reactions: Vec<Reaction>,
    pub mentions: Vec<Address>,
    pub nonce: Vec<u8>,
    pub digest_algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_hash: Option<String>,
}

/// A channel member (spec §4.B implies this shape via `MemberDigest`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_address: Option<InboxAddress>,
    pub display_name: String,
    pub profile_image: String,
}

/// The in-memory snapshot for one `(space, channel)`.
#[derive(Debug, Default, Clone)]
pub struct Cache {
    message_map: HashMap<MessageId, Message>,
    member_map: HashMap<Address, Member>,
    digest_map: HashMap<MessageId, MessageDigest>,
    member_digest_map: HashMap<Address, MemberDigest>,
    oldest_timestamp: u64,
    newest_timestamp: u64,
    manifest_hash_bytes: [u8; 32],
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(n+m): builds a cache from a bulk message/member load.
    pub fn build(messages: Vec<Message>, members: Vec<Member>) -> Result<Self, SyncError> {
        let mut cache = Self::new();
        for m in messages {
            cache.upsert_message(m)?;
        }
        for m in members {
            cache.upsert_member(m);
        }
        Ok(cache)
    }

    pub fn message_count(&self) -> usize {
        self.message_map.len()
    }

    pub fn member_count(&self) -> usize {
        self.member_map.len()
    }

    pub fn oldest_timestamp(&self) -> u64 {
        self.oldest_timestamp
    }

    pub fn newest_timestamp(&self) -> u64 {
        self.newest_timestamp
    }

    pub fn has_any_content(&self) -> bool {
        !self.message_map.is_empty() || !self.member_map.is_empty()
    }

    pub fn get_message(&self, id: &MessageId) -> Option<&Message> {
        self.message_map.get(id)
    }

    pub fn get_member(&self, address: &Address) -> Option<&Member> {
        self.member_map.get(address)
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.message_map.values()
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.member_map.values()
    }

    pub fn message_ids(&self) -> impl Iterator<Item = &MessageId> {
        self.message_map.keys()
    }

    /// O(1): insert or replace a message. XORs `H(messageId)` into the
    /// accumulator only the first time an ID is seen (spec §4.C).
    pub fn upsert_message(&mut self, m: Message) -> Result<(), SyncError> {
        let digest = digest::build_message_digest(&m)?;

        if !self.message_map.contains_key(&m.message_id) {
            xor_in_place(&mut self.manifest_hash_bytes, &hash::id_hash_bytes(&m.message_id));
        }

        let created = m.created_date;
        self.message_map.insert(m.message_id.clone(), m);
        self.digest_map.insert(digest.message_id.clone(), digest);

        if self.message_map.len() == 1 {
            self.oldest_timestamp = created;
            self.newest_timestamp = created;
        } else {
            self.oldest_timestamp = self.oldest_timestamp.min(created);
            self.newest_timestamp = self.newest_timestamp.max(created);
        }

        Ok(())
    }

    /// O(1) removal in the common case; O(n) only when the removed
    /// message sat on a boundary timestamp (spec §4.C).
    pub fn remove_message(&mut self, message_id: &MessageId) {
        let Some(removed) = self.message_map.remove(message_id) else {
            return;
        };
        self.digest_map.remove(message_id);

        // XOR is self-inverse: XORing the same term back out removes it.
        xor_in_place(&mut self.manifest_hash_bytes, &hash::id_hash_bytes(message_id));

        if self.message_map.is_empty() {
            self.oldest_timestamp = 0;
            self.newest_timestamp = 0;
            return;
        }

        let on_boundary =
            removed.created_date == self.oldest_timestamp || removed.created_date == self.newest_timestamp;
        if on_boundary {
            self.recompute_boundaries();
        }
    }

    fn recompute_boundaries(&mut self) {
        let mut oldest = u64::MAX;
        let mut newest = 0u64;
        for m in self.message_map.values() {
            oldest = oldest.min(m.created_date);
            newest = newest.max(m.created_date);
        }
        self.oldest_timestamp = if self.message_map.is_empty() { 0 } else { oldest };
        self.newest_timestamp = newest;
    }

    /// O(1): insert or replace a member.
    pub fn upsert_member(&mut self, m: Member) {
        let digest = digest::build_member_digest(&m);
        self.member_map.insert(m.address.clone(), m);
        self.member_digest_map.insert(digest.address.clone(), digest);
    }

    pub fn remove_member(&mut self, address: &Address) {
        self.member_map.remove(address);
        self.member_digest_map.remove(address);
    }

    /// O(1).
    pub fn summary(&self) -> Summary {
        Summary {
            message_count: self.message_map.len(),
            member_count: self.member_map.len(),
            oldest_message_timestamp: self.oldest_timestamp,
            newest_message_timestamp: self.newest_timestamp,
            manifest_hash: hex::encode(self.manifest_hash_bytes),
        }
    }

    /// O(n log n): sorts digests by `createdDate` and collects reaction
    /// digests from the message map.
    pub fn manifest(&self, space_id: SpaceId, channel_id: ChannelId) -> Manifest {
        let mut digests: Vec<MessageDigest> = self.digest_map.values().cloned().collect();
        digests.sort_by_key(|d| d.created_date);

        let mut reaction_digests = Vec::new();
        for m in self.message_map.values() {
            reaction_digests.extend(digest::build_reaction_digests(&m.message_id, &m.reactions));
        }
        // Keep reaction digest order aligned with the message order for
        // determinism in tests and wire snapshots.
        reaction_digests.sort_by(|a, b| (a.message_id.as_str(), a.emoji_id.as_str()).cmp(&(b.message_id.as_str(), b.emoji_id.as_str())));

        Manifest {
            space_id,
            channel_id,
            message_count: self.message_map.len(),
            oldest_timestamp: self.oldest_timestamp,
            newest_timestamp: self.newest_timestamp,
            digests,
            reaction_digests,
        }
    }

    /// O(m).
    pub fn member_digests(&self) -> Vec<MemberDigest> {
        self.member_digest_map.values().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn manifest_hash_bytes(&self) -> [u8; 32] {
        self.manifest_hash_bytes
    }
}

fn xor_in_place(acc: &mut [u8; 32], term: &[u8; 32]) {
    for (a, b) in acc.iter_mut().zip(term.iter()) {
        *a ^= b;
    }
}

/// Manages the per-`(space, channel)` caches, lazily loading from storage
/// on first access and guarding each entry with its own lock so
/// concurrent sessions on different channels never contend (spec §5).
pub struct PayloadCache<S> {
    storage: Arc<S>,
    max_messages: usize,
    entries: Mutex<HashMap<ChannelKey, Arc<Mutex<Cache>>>>,
}

impl<S: SyncStorage> PayloadCache<S> {
    pub fn new(storage: Arc<S>, max_messages: usize) -> Self {
        Self {
            storage,
            max_messages,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cache entry for `(space, channel)`, loading it from
    /// storage (bounded by `max_messages`) on first access.
    pub async fn get(&self, space_id: &SpaceId, channel_id: &ChannelId) -> Result<Arc<Mutex<Cache>>, SyncError> {
        let key = ChannelKey::new(space_id.clone(), channel_id.clone());

        if let Some(entry) = self.entries.lock().await.get(&key) {
            return Ok(Arc::clone(entry));
        }

        let messages = self
            .storage
            .get_messages(space_id, channel_id, self.max_messages, None)
            .await
            .map_err(SyncError::StorageFailure)?;
        let members = self
            .storage
            .get_space_members(space_id)
            .await
            .map_err(SyncError::StorageFailure)?;

        let cache = Arc::new(Mutex::new(Cache::build(messages, members)?));

        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key).or_insert_with(|| Arc::clone(&cache));
        Ok(Arc::clone(entry))
    }

    /// Drops the cache for one channel, or every channel in `space_id` if
    /// `channel_id` is `None`.
    pub async fn invalidate(&self, space_id: &SpaceId, channel_id: Option<&ChannelId>) {
        let mut entries = self.entries.lock().await;
        match channel_id {
            Some(channel_id) => {
                let key = ChannelKey::new(space_id.clone(), channel_id.clone());
                entries.remove(&key);
            }
            None => entries.retain(|k, _| &k.space_id != space_id),
        }
    }
}
