//! Digest Builders (component B) and the wire-level `Manifest`/`Summary`
//! shapes they feed (spec §3, §4.B).

use serde::{Deserialize, Serialize};

use crate::cache::{Member, Message};
use crate::error::SyncError;
use crate::hash::{self, content_hash};
use crate::ids::{Address, MessageId};

/// Compact hashed summary of a message's identity and mutable content
/// (spec §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDigest {
    pub message_id: MessageId,
    pub created_date: u64,
    pub content_hash: String,
    /// Present iff it differs from `createdDate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<u64>,
}

/// Compact hashed summary of a single reaction on a message (spec §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionDigest {
    pub message_id: MessageId,
    pub emoji_id: String,
    pub count: usize,
    pub members_hash: String,
}

/// Compact hashed summary of a channel member's identity and profile
/// (spec §3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDigest {
    pub address: Address,
    pub inbox_address: String,
    pub display_name_hash: String,
    pub icon_hash: String,
}

/// Ordered snapshot of a channel's contents exchanged during sync
/// (spec §3 — `Manifest`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub space_id: crate::ids::SpaceId,
    pub channel_id: crate::ids::ChannelId,
    pub message_count: usize,
    pub oldest_timestamp: u64,
    pub newest_timestamp: u64,
    /// Ordered by `createdDate` ascending.
    pub digests: Vec<MessageDigest>,
    pub reaction_digests: Vec<ReactionDigest>,
}

/// Cheap, wire-sized stand-in for a full manifest, used to decide whether
/// a full manifest exchange is worthwhile (spec §3 — `Summary`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub message_count: usize,
    pub member_count: usize,
    pub oldest_message_timestamp: u64,
    pub newest_message_timestamp: u64,
    /// Hex-encoded 32-byte commutative XOR accumulator.
    pub manifest_hash: String,
}

/// Builds a [`MessageDigest`] for `m`, setting `modified_date` only when it
/// differs from `created_date` (spec §4.B).
pub fn build_message_digest(m: &Message) -> Result<MessageDigest, SyncError> {
    Ok(MessageDigest {
        message_id: m.message_id.clone(),
        created_date: m.created_date,
        content_hash: content_hash(m)?,
        modified_date: (m.modified_date != m.created_date).then_some(m.modified_date),
    })
}

/// Builds one [`ReactionDigest`] per reaction on `message_id`; empty input
/// yields an empty list (spec §4.B).
pub fn build_reaction_digests(message_id: &MessageId, reactions: &[crate::cache::Reaction]) -> Vec<ReactionDigest> {
    reactions
        .iter()
        .map(|r| ReactionDigest {
            message_id: message_id.clone(),
            emoji_id: r.emoji_id.clone(),
            count: r.member_ids.len(),
            members_hash: hash::members_hash(&r.member_ids),
        })
        .collect()
}

/// Builds a [`MemberDigest`], filling a missing `inbox_address` with the
/// empty string (spec §4.B).
pub fn build_member_digest(m: &Member) -> MemberDigest {
    MemberDigest {
        address: m.address.clone(),
        inbox_address: m.inbox_address.as_ref().map_or_else(String::new, |a| a.0.clone()),
        display_name_hash: hash::display_name_hash(&m.display_name),
        icon_hash: hash::icon_hash(&m.profile_image),
    }
}

/// Ordered manifest hash over a list of digests, sorted by `createdDate`.
///
/// Used only when building a [`Summary`] directly from a message list
/// during initial construction — distinct from the payload cache's
/// commutative XOR accumulator (spec §4.C design rationale).
pub fn compute_manifest_hash(digests: &[MessageDigest]) -> [u8; 32] {
    let mut acc = [0u8; 32];
    for d in digests {
        let term = hash::id_hash_bytes(&d.message_id);
        for (a, b) in acc.iter_mut().zip(term.iter()) {
            *a ^= b;
        }
    }
    acc
}
