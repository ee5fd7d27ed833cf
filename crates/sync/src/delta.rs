//! Delta Builder & Chunker (component E, spec §4.E).
//!
//! Materialises full records from the cached maps using the diff's ID
//! sets, chunks them under a byte budget, and assigns finality so exactly
//! one payload in a `buildSyncDelta` sequence ends the sequence.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, Member, Message, Reaction};
use crate::diff::{MemberDiff, MessageDiff, PeerDiff};
use crate::ids::{Address, MessageId, PeerId};

/// New/updated/deleted messages for one delta payload (spec §3, §4.E).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageDelta {
    pub new_messages: Vec<Message>,
    pub updated_messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted_message_ids: Vec<MessageId>,
}

impl MessageDelta {
    pub fn is_empty(&self) -> bool {
        self.new_messages.is_empty() && self.updated_messages.is_empty() && self.deleted_message_ids.is_empty()
    }
}

/// Reaction state for a single message, carried by the `reactionDelta`
/// payload field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageReactions {
    pub message_id: MessageId,
    pub reactions: Vec<Reaction>,
}

/// Member additions/updates/removals (spec §3, §9 — open question on
/// `removedAddresses` resolved by adding the field here, populated from
/// [`MemberDiff::extra_addresses`]).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemberDelta {
    pub upserted_members: Vec<Member>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_addresses: Vec<Address>,
}

impl MemberDelta {
    pub fn is_empty(&self) -> bool {
        self.upserted_members.is_empty() && self.removed_addresses.is_empty()
    }
}

/// A single peer-map entry. Key material is opaque to the core (spec §9).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerMapEntry {
    pub peer_id: PeerId,
    pub key_material: Vec<u8>,
}

/// Peer-map additions (spec §3 — `peerMapDelta`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PeerMapDelta {
    pub entries: Vec<PeerMapEntry>,
}

impl PeerMapDelta {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One `sync-delta` control payload (spec §6).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncDeltaPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_delta: Option<MessageDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_delta: Option<Vec<MessageReactions>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_delta: Option<MemberDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_map_delta: Option<PeerMapDelta>,
    #[serde(default)]
    pub is_final: bool,
}

/// Materialises the new/updated messages named by `diff` from `cache`,
/// filtering `deletedMessageIds` to `(spaceId, channelId)` via `tombstones`
/// (spec §4.E).
pub fn build_message_delta(cache: &Cache, diff: &MessageDiff, tombstones: &[MessageId]) -> MessageDelta {
    let new_messages = diff
        .missing_ids
        .iter()
        .filter_map(|id| cache.get_message(id).cloned())
        .collect();
    let updated_messages = diff
        .outdated_ids
        .iter()
        .filter_map(|id| cache.get_message(id).cloned())
        .collect();

    MessageDelta {
        new_messages,
        updated_messages,
        deleted_message_ids: tombstones.to_vec(),
    }
}

/// Builds the reaction delta for every message our extra/outdated IDs
/// reference plus any message whose reactions changed — in practice, the
/// reactions attached to every message carried in this delta (spec §4.E).
pub fn build_reaction_delta(cache: &Cache, diff: &MessageDiff) -> Vec<MessageReactions> {
    diff.missing_ids
        .union(&diff.outdated_ids)
        .filter_map(|id| {
            cache.get_message(id).and_then(|m| {
                (!m.reactions.is_empty()).then(|| MessageReactions {
                    message_id: id.clone(),
                    reactions: m.reactions.clone(),
                })
            })
        })
        .collect()
}

/// Builds the member delta: upserts for missing/outdated addresses,
/// removals for addresses we have that they don't (spec §4.E, §9).
pub fn build_member_delta(cache: &Cache, diff: &MemberDiff) -> MemberDelta {
    let upserted_members = diff
        .missing_addresses
        .union(&diff.outdated_addresses)
        .filter_map(|addr| cache.get_member(addr).cloned())
        .collect();

    MemberDelta {
        upserted_members,
        removed_addresses: diff.extra_addresses.iter().cloned().collect(),
    }
}

/// Builds the peer-map delta from a peer diff and the set of entries we
/// hold (spec §4.E).
pub fn build_peer_map_delta(our_entries: &[PeerMapEntry], diff: &PeerDiff) -> PeerMapDelta {
    PeerMapDelta {
        entries: our_entries
            .iter()
            .filter(|e| diff.missing_peer_ids.contains(&e.peer_id))
            .cloned()
            .collect(),
    }
}

/// Estimated serialized size of a message, used by the chunker. Real
/// transports serialize to JSON (spec §6); approximating via
/// `serde_json` keeps the chunker's notion of "size" aligned with what's
/// actually sent over the wire.
fn serialized_size(message: &Message) -> usize {
    serde_json::to_vec(message).map(|v| v.len()).unwrap_or(usize::MAX)
}

/// Greedily fills chunks by serialized byte size, preserving input order.
/// A single message whose serialized size exceeds `max_chunk_size` gets
/// its own chunk rather than being split (spec §4.E, §9 — open question).
pub fn chunk_messages(messages: Vec<Message>, max_chunk_size: usize) -> Vec<Vec<Message>> {
    let mut chunks = Vec::new();
    let mut current: Vec<Message> = Vec::new();
    let mut current_size = 0usize;

    for message in messages {
        let size = serialized_size(&message);

        if !current.is_empty() && current_size.saturating_add(size) > max_chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
        }

        current_size = current_size.saturating_add(size);
        current.push(message);

        if current_size > max_chunk_size && current.len() == 1 {
            // Oversized single message: own chunk, flush immediately.
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Assembles the full `sync-delta` payload sequence per the ordering
/// rules in spec §4.E:
///
/// 1. `all = newMessages ++ updatedMessages`, chunked; each chunk's
///    `messageDelta` contains only that chunk's subset of `extraIds`
///    (new) / `outdatedIds` (updated).
/// 2. `deletedMessageIds` attach only to the last message chunk.
/// 3. `reactionDelta` (non-empty) attaches only to the last message chunk.
/// 4. After message chunks: emit a trailing payload with
///    `memberDelta`/`peerMapDelta` if either is non-empty, or if there
///    were no message chunks at all; `isFinal = true`.
/// 5. If no trailing payload is emitted but message chunks exist, the
///    last message chunk gets `isFinal = true`.
/// 6. If nothing would otherwise exist, emit a single `{isFinal: true}`.
/// 7. Exactly one payload has `isFinal = true`, and it's the last one.
#[allow(clippy::too_many_arguments)]
pub fn build_sync_deltas(
    cache: &Cache,
    message_diff: &MessageDiff,
    member_diff: &MemberDiff,
    tombstones: Vec<MessageId>,
    reaction_delta: Vec<MessageReactions>,
    member_delta: MemberDelta,
    peer_map_delta: PeerMapDelta,
    max_chunk_size: usize,
) -> Vec<SyncDeltaPayload> {
    let mut all_messages: Vec<Message> = message_diff
        .missing_ids
        .iter()
        .chain(message_diff.outdated_ids.iter())
        .filter_map(|id| cache.get_message(id).cloned())
        .collect();
    all_messages.sort_by_key(|m| m.created_date);

    let chunks = chunk_messages(all_messages, max_chunk_size);

    let mut payloads = Vec::new();
    let last_chunk_index = chunks.len().checked_sub(1);

    for (i, chunk) in chunks.into_iter().enumerate() {
        let new_messages: Vec<Message> = chunk
            .iter()
            .filter(|m| message_diff.missing_ids.contains(&m.message_id))
            .cloned()
            .collect();
        // missing_ids/outdated_ids are disjoint by construction (diff::compute_message_diff
        // assigns each ID to exactly one set), so this partition never double-counts.
        let updated_messages: Vec<Message> = chunk
            .into_iter()
            .filter(|m| message_diff.outdated_ids.contains(&m.message_id))
            .collect();

        let is_last_message_chunk = Some(i) == last_chunk_index;

        payloads.push(SyncDeltaPayload {
            message_delta: Some(MessageDelta {
                new_messages,
                updated_messages,
                deleted_message_ids: if is_last_message_chunk { tombstones.clone() } else { vec![] },
            }),
            reaction_delta: if is_last_message_chunk && !reaction_delta.is_empty() {
                Some(reaction_delta.clone())
            } else {
                None
            },
            member_delta: None,
            peer_map_delta: None,
            is_final: false,
        });
    }

    let needs_trailing = !member_delta.is_empty() || !peer_map_delta.is_empty() || payloads.is_empty();

    if needs_trailing {
        payloads.push(SyncDeltaPayload {
            message_delta: None,
            reaction_delta: None,
            member_delta: (!member_delta.is_empty()).then_some(member_delta),
            peer_map_delta: (!peer_map_delta.is_empty()).then_some(peer_map_delta),
            is_final: true,
        });
    } else if let Some(last) = payloads.last_mut() {
        last.is_final = true;
    }

    if payloads.is_empty() {
        payloads.push(SyncDeltaPayload {
            is_final: true,
            ..Default::default()
        });
    }

    payloads
}
