//! Protocol Orchestrator (component G, spec §4.G, §6).
//!
//! Wires the payload cache, diff engine, delta builder, and session
//! manager into the five-step control flow: `sync-request` ->
//! `sync-info` -> `sync-initiate` -> `sync-manifest` -> `sync-delta`.
//!
//! ## Direction of the delta exchange
//!
//! `sync-initiate` and `sync-manifest` each carry the sender's own full
//! manifest, so after that pair both sides hold both manifests locally.
//! From there, each side independently computes what the *other* side is
//! missing by calling [`crate::diff::compute_message_diff`] with the
//! arguments swapped — `compute_message_diff(remote_manifest,
//! our_manifest)` yields exactly the IDs *we* should push, looked up in
//! *our* cache — and sends its own `sync-delta`. This makes the exchange
//! bidirectional without a sixth control message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{Cache, PayloadCache};
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::delta::{
    self, MemberDelta, MessageDelta, MessageReactions, PeerMapDelta, PeerMapEntry, SyncDeltaPayload,
};
use crate::digest::{Manifest, MemberDigest, Summary};
use crate::diff::{self, MemberDiff, MessageDiff, PeerDiff};
use crate::error::{Result, SyncError};
use crate::events::{SyncEvent, SyncStatus};
use crate::ids::{ChannelId, InboxAddress, PeerId, SpaceId};
use crate::session::{Candidate, SessionManager};
use crate::storage::{SyncStorage, Tombstone, TombstoneLog};

/// One side's full state for the manifest-exchange pair (spec §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestBundle {
    pub manifest: Manifest,
    pub member_digests: Vec<MemberDigest>,
    pub peer_ids: Vec<PeerId>,
}

/// A control-plane payload on the sync wire (spec §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SyncPayload {
    SyncRequest {
        space_id: SpaceId,
        channel_id: ChannelId,
        inbox_address: InboxAddress,
        expiry: u64,
        summary: Summary,
    },
    SyncInfo {
        space_id: SpaceId,
        channel_id: ChannelId,
        inbox_address: InboxAddress,
        summary: Summary,
    },
    SyncInitiate {
        space_id: SpaceId,
        channel_id: ChannelId,
        inbox_address: InboxAddress,
        bundle: ManifestBundle,
    },
    SyncManifest {
        space_id: SpaceId,
        channel_id: ChannelId,
        inbox_address: InboxAddress,
        bundle: ManifestBundle,
    },
    SyncDelta {
        space_id: SpaceId,
        channel_id: ChannelId,
        payload: SyncDeltaPayload,
    },
}

/// Builds the `sync-request` broadcast: our own summary plus when the
/// candidate-collection window closes (spec §4.F, §4.G, §6).
pub fn build_sync_request(
    cache: &Cache,
    space_id: &SpaceId,
    channel_id: &ChannelId,
    our_inbox: &InboxAddress,
    expiry_ms: u64,
) -> SyncPayload {
    SyncPayload::SyncRequest {
        space_id: space_id.clone(),
        channel_id: channel_id.clone(),
        inbox_address: our_inbox.clone(),
        expiry: expiry_ms,
        summary: cache.summary(),
    }
}

/// Flags the spec names as reasons to bother sending a `sync-info` at all
/// (spec §4.G): any `true` means there's something worth exchanging
/// manifests over.
struct SyncInfoFlags {
    more_messages: bool,
    more_members: bool,
    newer_messages: bool,
    older_messages: bool,
    different_manifest_hash: bool,
}

impl SyncInfoFlags {
    fn compute(ours: &Summary, theirs: &Summary) -> Self {
        Self {
            more_messages: ours.message_count > theirs.message_count,
            more_members: ours.member_count > theirs.member_count,
            newer_messages: ours.newest_message_timestamp > theirs.newest_message_timestamp,
            older_messages: ours.message_count > 0 && ours.oldest_message_timestamp < theirs.oldest_message_timestamp,
            different_manifest_hash: ours.manifest_hash != theirs.manifest_hash,
        }
    }

    fn any(&self) -> bool {
        self.more_messages || self.more_members || self.newer_messages || self.older_messages || self.different_manifest_hash
    }
}

/// Builds the `sync-info` reply to a peer's `sync-request`, or `None` if
/// there's nothing worth exchanging (spec §4.G):
///
/// - `None` if we have neither messages nor members.
/// - `None` if `manifestHash` and `memberCount` both match `their_summary`.
/// - Otherwise `Some` provided any of `{moreMessages, moreMembers,
///   newerMessages, olderMessages, differentManifestHash}` holds.
pub fn build_sync_info(
    cache: &Cache,
    space_id: &SpaceId,
    channel_id: &ChannelId,
    our_inbox: &InboxAddress,
    their_summary: &Summary,
) -> Option<SyncPayload> {
    if !cache.has_any_content() {
        return None;
    }

    let ours = cache.summary();
    if ours.manifest_hash == their_summary.manifest_hash && ours.member_count == their_summary.member_count {
        return None;
    }

    let flags = SyncInfoFlags::compute(&ours, their_summary);
    if !flags.any() {
        return None;
    }

    Some(SyncPayload::SyncInfo {
        space_id: space_id.clone(),
        channel_id: channel_id.clone(),
        inbox_address: our_inbox.clone(),
        summary: ours,
    })
}

fn build_bundle(cache: &Cache, space_id: SpaceId, channel_id: ChannelId, our_peer_ids: Vec<PeerId>) -> ManifestBundle {
    ManifestBundle {
        manifest: cache.manifest(space_id, channel_id),
        member_digests: cache.member_digests(),
        peer_ids: our_peer_ids,
    }
}

pub fn build_sync_initiate(
    cache: &Cache,
    space_id: &SpaceId,
    channel_id: &ChannelId,
    our_inbox: &InboxAddress,
    our_peer_ids: Vec<PeerId>,
) -> SyncPayload {
    SyncPayload::SyncInitiate {
        space_id: space_id.clone(),
        channel_id: channel_id.clone(),
        inbox_address: our_inbox.clone(),
        bundle: build_bundle(cache, space_id.clone(), channel_id.clone(), our_peer_ids),
    }
}

pub fn build_sync_manifest(
    cache: &Cache,
    space_id: &SpaceId,
    channel_id: &ChannelId,
    our_inbox: &InboxAddress,
    our_peer_ids: Vec<PeerId>,
) -> SyncPayload {
    SyncPayload::SyncManifest {
        space_id: space_id.clone(),
        channel_id: channel_id.clone(),
        inbox_address: our_inbox.clone(),
        bundle: build_bundle(cache, space_id.clone(), channel_id.clone(), our_peer_ids),
    }
}

/// Computes what *we* should push to a peer holding `remote`, given our
/// own `local` manifest/digests/peers, and assembles the chunked
/// `sync-delta` sequence (spec §4.E, §4.G).
#[allow(clippy::too_many_arguments)]
pub fn plan_outgoing_deltas(
    cache: &Cache,
    space_id: &SpaceId,
    channel_id: &ChannelId,
    local: &ManifestBundle,
    remote: &ManifestBundle,
    our_peer_entries: &[PeerMapEntry],
    tombstones: Vec<crate::ids::MessageId>,
    max_chunk_size: usize,
) -> Vec<SyncPayload> {
    // Swapped order: "their" = remote's view of what *we* are missing from
    // *their* perspective doesn't apply here — we want what *they* are
    // missing from *us*, so the diff's "our" argument is the remote
    // manifest and "their" argument is our own (see module docs).
    let message_diff: MessageDiff = diff::compute_message_diff(&remote.manifest, &local.manifest);
    let member_diff: MemberDiff = diff::compute_member_diff(&remote.member_digests, &local.member_digests);
    let peer_diff: PeerDiff = diff::compute_peer_diff(&remote.peer_ids, &local.peer_ids);

    let reaction_delta = delta::build_reaction_delta(cache, &message_diff);
    let member_delta = delta::build_member_delta(cache, &member_diff);
    let peer_map_delta = delta::build_peer_map_delta(our_peer_entries, &peer_diff);

    let payloads = delta::build_sync_deltas(
        cache,
        &message_diff,
        &member_diff,
        tombstones,
        reaction_delta,
        member_delta,
        peer_map_delta,
        max_chunk_size,
    );

    payloads
        .into_iter()
        .map(|payload| SyncPayload::SyncDelta {
            space_id: space_id.clone(),
            channel_id: channel_id.clone(),
            payload,
        })
        .collect()
}

/// Applies an incoming `messageDelta`: persists and caches new/updated
/// messages, removes and tombstones deleted ones (spec §4.E, §7 — errors
/// propagate unchanged, no retries).
pub async fn apply_message_delta<S: SyncStorage>(
    storage: &S,
    cache: &mut Cache,
    tombstones: &TombstoneLog,
    space_id: &SpaceId,
    channel_id: &ChannelId,
    now_ms: u64,
    delta: MessageDelta,
) -> Result<()> {
    for message in delta.new_messages.into_iter().chain(delta.updated_messages) {
        storage.save_message(message.clone()).await.map_err(SyncError::StorageFailure)?;
        cache.upsert_message(message)?;
    }

    for message_id in delta.deleted_message_ids {
        storage
            .delete_message(space_id, channel_id, &message_id)
            .await
            .map_err(SyncError::StorageFailure)?;
        cache.remove_message(&message_id);
        tombstones.record(Tombstone {
            message_id,
            space_id: space_id.clone(),
            channel_id: channel_id.clone(),
            deleted_at: now_ms,
        });
    }

    Ok(())
}

/// Applies an incoming `reactionDelta`. A message that doesn't exist
/// locally yet is skipped — the ordering rules in spec §4.E mean its
/// message content arrives in the same or an earlier chunk, but if it
/// genuinely never arrives there's nothing to attach reactions to.
///
/// `entry.reactions` is taken as the message's *complete* reaction set,
/// replacing whatever was cached rather than merging into it. This is
/// correct only because [`crate::delta::build_reaction_delta`] always
/// ships a message's full reaction list, never a partial add/remove —
/// the sender-side contract this function relies on. A transport that
/// ever forwarded a partial `reactionDelta` (e.g. "member X added/removed
/// from this reaction") would need this to merge/un-merge per member
/// instead of replacing wholesale.
pub async fn apply_reaction_delta<S: SyncStorage>(storage: &S, cache: &mut Cache, reactions: Vec<MessageReactions>) -> Result<()> {
    for entry in reactions {
        let Some(mut message) = cache.get_message(&entry.message_id).cloned() else {
            warn!(message_id = %entry.message_id, "reaction delta for unknown message, skipping");
            continue;
        };
        message.reactions = entry.reactions;
        storage.save_message(message.clone()).await.map_err(SyncError::StorageFailure)?;
        cache.upsert_message(message)?;
    }
    Ok(())
}

/// Applies an incoming `memberDelta` (spec §4.E, §9).
pub async fn apply_member_delta<S: SyncStorage>(storage: &S, cache: &mut Cache, space_id: &SpaceId, delta: MemberDelta) -> Result<()> {
    for member in delta.upserted_members {
        storage
            .save_space_member(space_id, member.clone())
            .await
            .map_err(SyncError::StorageFailure)?;
        cache.upsert_member(member);
    }

    for address in delta.removed_addresses {
        storage
            .remove_space_member(space_id, &address)
            .await
            .map_err(SyncError::StorageFailure)?;
        cache.remove_member(&address);
    }

    Ok(())
}

/// Applies an incoming `peerMapDelta`. The core only tracks peer IDs for
/// diffing (spec §3, §9) — key material storage is a host concern.
pub fn apply_peer_map_delta(_delta: PeerMapDelta) {
    // No-op at this layer; hosts observing `SyncPayload::SyncDelta` are
    // expected to persist `peer_map_delta.entries` themselves.
}

/// Ties the payload cache, session manager, and tombstone log together
/// behind the five-step control flow (spec §4.G).
pub struct SyncProtocol<S, C> {
    storage: Arc<S>,
    cache: PayloadCache<S>,
    sessions: SessionManager<C>,
    tombstones: TombstoneLog,
    config: SyncConfig,
}

impl<S: SyncStorage, C: Clock> SyncProtocol<S, C> {
    pub fn new(storage: Arc<S>, clock: Arc<C>, config: SyncConfig) -> Self {
        let cache = PayloadCache::new(Arc::clone(&storage), config.max_messages);
        let sessions = SessionManager::new(clock, config.request_expiry_ms, config.aggressive_sync_timeout_ms);
        Self {
            storage,
            cache,
            sessions,
            tombstones: TombstoneLog::new(),
            config,
        }
    }

    pub fn tombstones(&self) -> &TombstoneLog {
        &self.tombstones
    }

    /// Starts a collecting session and returns the `sync-request` to
    /// broadcast (spec §4.F, §4.G).
    pub async fn request_sync(&self, space_id: &SpaceId, channel_id: &ChannelId, our_inbox: &InboxAddress) -> Result<SyncPayload> {
        self.sessions.start_collecting(space_id).await?;
        let expiry_ms = self.sessions.expiry_ms(space_id).await.unwrap_or(self.config.request_expiry_ms);
        let cache = self.cache.get(space_id, channel_id).await?;
        let cache = cache.lock().await;
        debug!(%space_id, %channel_id, "sync session started, collecting candidates");
        Ok(build_sync_request(&cache, space_id, channel_id, our_inbox, expiry_ms))
    }

    /// Builds our `sync-info` reply to an incoming `sync-request`, or
    /// `None` if there's nothing worth exchanging (spec §4.G).
    pub async fn handle_sync_request(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        our_inbox: &InboxAddress,
        their_summary: &Summary,
    ) -> Result<Option<SyncPayload>> {
        let cache = self.cache.get(space_id, channel_id).await?;
        let cache = cache.lock().await;
        Ok(build_sync_info(&cache, space_id, channel_id, our_inbox, their_summary))
    }

    /// Records a peer's `sync-info` reply as a candidate (spec §4.F). A
    /// `sync-info` payload is only ever sent when the peer had something
    /// worth offering (see [`build_sync_info`]), so its `summary` is
    /// unconditionally recorded as a candidate. An unsolicited or late
    /// reply — no session, an expired one, or one past `Collecting` — is
    /// silently dropped rather than surfaced as an error (spec §4.F, §7).
    pub async fn handle_sync_info(&self, space_id: &SpaceId, peer_id: PeerId, summary: Summary) -> Result<()> {
        self.sessions.add_candidate(space_id, Candidate { peer_id, summary }).await
    }

    /// If the aggressive timeout has elapsed, selects the best candidate,
    /// fires the host's initiate hook, and returns the `sync-initiate`
    /// payload to send it (spec §4.F — aggressive selection).
    pub async fn try_initiate(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        our_inbox: &InboxAddress,
        our_peer_ids: Vec<PeerId>,
    ) -> Result<Option<(PeerId, SyncPayload)>> {
        if !self.sessions.aggressive_timeout_elapsed(space_id).await {
            return Ok(None);
        }

        let Some(candidate) = self.sessions.select(space_id).await else {
            return Ok(None);
        };

        self.sessions.begin_sync(space_id).await;
        self.config.on_initiate_sync.on_initiate_sync(space_id, channel_id, candidate.peer_id).await;

        let cache = self.cache.get(space_id, channel_id).await?;
        let cache = cache.lock().await;
        info!(%space_id, %channel_id, peer_id = %candidate.peer_id, "selected sync candidate");
        Ok(Some((
            candidate.peer_id,
            build_sync_initiate(&cache, space_id, channel_id, our_inbox, our_peer_ids),
        )))
    }

    /// Builds our `sync-manifest` reply to an incoming `sync-initiate`.
    pub async fn handle_sync_initiate(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        our_inbox: &InboxAddress,
        our_peer_ids: Vec<PeerId>,
    ) -> Result<SyncPayload> {
        let cache = self.cache.get(space_id, channel_id).await?;
        let cache = cache.lock().await;
        Ok(build_sync_manifest(&cache, space_id, channel_id, our_inbox, our_peer_ids))
    }

    /// Computes and assembles the `sync-delta` sequence we owe `remote`,
    /// given our own bundle and theirs (spec §4.E, §4.G).
    pub async fn plan_deltas(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        local: &ManifestBundle,
        remote: &ManifestBundle,
        our_peer_entries: &[PeerMapEntry],
    ) -> Result<Vec<SyncPayload>> {
        let cache = self.cache.get(space_id, channel_id).await?;
        let cache = cache.lock().await;
        let tombstones = self.tombstones.list(space_id, channel_id).into_iter().map(|t| t.message_id).collect();

        let deltas = plan_outgoing_deltas(
            &cache,
            space_id,
            channel_id,
            local,
            remote,
            our_peer_entries,
            tombstones,
            self.config.max_chunk_size,
        );
        let (missing, outdated, extra) = {
            let diff = diff::compute_message_diff(&remote.manifest, &local.manifest);
            (diff.missing_ids.len(), diff.outdated_ids.len(), diff.extra_ids.len())
        };
        debug!(%space_id, %channel_id, missing, outdated, extra, payloads = deltas.len(), "planned outgoing sync deltas");
        Ok(deltas)
    }

    /// Applies one incoming `sync-delta` payload. Returns whether this was
    /// the final payload in the sequence, completing the session if so
    /// (spec §4.F, §4.G).
    pub async fn apply_delta(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        now_ms: u64,
        payload: SyncDeltaPayload,
    ) -> Result<bool> {
        let cache_entry = self.cache.get(space_id, channel_id).await?;
        let mut cache = cache_entry.lock().await;

        if let Some(message_delta) = payload.message_delta {
            apply_message_delta(
                self.storage.as_ref(),
                &mut cache,
                &self.tombstones,
                space_id,
                channel_id,
                now_ms,
                message_delta,
            )
            .await?;
        }

        if let Some(reaction_delta) = payload.reaction_delta {
            apply_reaction_delta(self.storage.as_ref(), &mut cache, reaction_delta).await?;
        }

        if let Some(member_delta) = payload.member_delta {
            apply_member_delta(self.storage.as_ref(), &mut cache, space_id, member_delta).await?;
        }

        if let Some(peer_map_delta) = payload.peer_map_delta {
            apply_peer_map_delta(peer_map_delta);
        }

        if payload.is_final {
            self.sessions.complete(space_id).await;
            info!(%space_id, %channel_id, "sync completed");
        }

        Ok(payload.is_final)
    }

    pub async fn cancel(&self, space_id: &SpaceId) {
        self.sessions.cancel(space_id).await;
    }

    pub async fn reap_expired_sessions(&self) -> usize {
        self.sessions.reap_expired().await
    }

    pub fn emit(&self, space_id: SpaceId, channel_id: ChannelId, status: SyncStatus) -> SyncEvent {
        SyncEvent::new(space_id, channel_id, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Member, Message, MessageContent};
    use crate::clock::ManualClock;
    use crate::storage::InMemoryStorage;

    fn message(id: &str, created: u64) -> Message {
        Message {
            message_id: id.into(),
            space_id: "s".into(),
            channel_id: "c".into(),
            sender_id: "alice".into(),
            created_date: created,
            modified_date: created,
            content: MessageContent::Post {
                text: "hi".into(),
                reply_id: None,
            },
            reactions: vec![],
            mentions: vec![],
            nonce: vec![],
            digest_algorithm: "sha256".into(),
            last_modified_hash: None,
        }
    }

    #[tokio::test]
    async fn sync_info_is_none_for_empty_channel() {
        let storage = Arc::new(InMemoryStorage::new());
        let clock = ManualClock::new(0);
        let protocol = SyncProtocol::new(storage, clock, SyncConfig::default());

        let their_summary = Summary::default();
        let payload = protocol
            .handle_sync_request(&"s".into(), &"c".into(), &"inbox".into(), &their_summary)
            .await
            .unwrap();
        assert!(payload.is_none());
    }

    #[tokio::test]
    async fn sync_info_is_none_when_summaries_match() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.save_message(message("m1", 1_000)).await.unwrap();
        let clock = ManualClock::new(0);
        let protocol = SyncProtocol::new(storage, clock, SyncConfig::default());

        let cache = protocol.cache.get(&"s".into(), &"c".into()).await.unwrap();
        let our_summary = cache.lock().await.summary();

        let payload = protocol
            .handle_sync_request(&"s".into(), &"c".into(), &"inbox".into(), &our_summary)
            .await
            .unwrap();
        assert!(payload.is_none());
    }

    #[tokio::test]
    async fn sync_info_reports_missing_messages() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.save_message(message("m1", 1_000)).await.unwrap();
        storage.save_message(message("m2", 2_000)).await.unwrap();
        let clock = ManualClock::new(0);
        let protocol = SyncProtocol::new(storage, clock, SyncConfig::default());

        let their_summary = Summary {
            message_count: 1,
            member_count: 0,
            oldest_message_timestamp: 1_000,
            newest_message_timestamp: 1_000,
            manifest_hash: String::new(),
        };

        let payload = protocol
            .handle_sync_request(&"s".into(), &"c".into(), &"inbox".into(), &their_summary)
            .await
            .unwrap()
            .expect("expected sync-info");
        match payload {
            SyncPayload::SyncInfo { summary, .. } => assert_eq!(summary.message_count, 2),
            _ => panic!("expected sync-info"),
        }
    }

    #[tokio::test]
    async fn end_to_end_delta_brings_receiver_up_to_date() {
        let sender_storage = Arc::new(InMemoryStorage::new());
        sender_storage.save_message(message("m1", 100)).await.unwrap();
        sender_storage.save_message(message("m2", 200)).await.unwrap();
        sender_storage
            .save_space_member(
                &"s".into(),
                Member {
                    address: "alice".into(),
                    inbox_address: None,
                    display_name: "Alice".into(),
                    profile_image: String::new(),
                },
            )
            .await
            .unwrap();

        let receiver_storage = Arc::new(InMemoryStorage::new());

        let clock = ManualClock::new(0);
        let sender = SyncProtocol::new(Arc::clone(&sender_storage), Arc::clone(&clock), SyncConfig::default());
        let receiver = SyncProtocol::new(Arc::clone(&receiver_storage), Arc::clone(&clock), SyncConfig::default());

        let space: SpaceId = "s".into();
        let channel: ChannelId = "c".into();

        let sender_bundle = match sender
            .handle_sync_initiate(&space, &channel, &"sender-inbox".into(), vec![])
            .await
            .unwrap()
        {
            SyncPayload::SyncManifest { bundle, .. } => bundle,
            _ => panic!("expected manifest"),
        };
        let receiver_bundle = match receiver
            .handle_sync_initiate(&space, &channel, &"receiver-inbox".into(), vec![])
            .await
            .unwrap()
        {
            SyncPayload::SyncManifest { bundle, .. } => bundle,
            _ => panic!("expected manifest"),
        };

        let deltas = sender
            .plan_deltas(&space, &channel, &sender_bundle, &receiver_bundle, &[])
            .await
            .unwrap();
        assert!(!deltas.is_empty());

        for payload in deltas {
            if let SyncPayload::SyncDelta { payload, .. } = payload {
                receiver.apply_delta(&space, &channel, 1_000, payload).await.unwrap();
            }
        }

        let receiver_cache = receiver.cache.get(&space, &channel).await.unwrap();
        let receiver_cache = receiver_cache.lock().await;
        assert_eq!(receiver_cache.message_count(), 2);
        assert_eq!(receiver_cache.member_count(), 1);
    }

    #[tokio::test]
    async fn deltas_with_nothing_new_yield_single_final_payload() {
        let storage = Arc::new(InMemoryStorage::new());
        let clock = ManualClock::new(0);
        let protocol = SyncProtocol::new(storage, clock, SyncConfig::default());
        let space: SpaceId = "s".into();
        let channel: ChannelId = "c".into();

        let empty_bundle = ManifestBundle {
            manifest: Manifest {
                space_id: space.clone(),
                channel_id: channel.clone(),
                ..Default::default()
            },
            member_digests: vec![],
            peer_ids: vec![],
        };

        let deltas = protocol
            .plan_deltas(&space, &channel, &empty_bundle, &empty_bundle, &[])
            .await
            .unwrap();
        assert_eq!(deltas.len(), 1);
        if let SyncPayload::SyncDelta { payload, .. } = &deltas[0] {
            assert!(payload.is_final);
        } else {
            panic!("expected sync-delta payload");
        }
    }
}
