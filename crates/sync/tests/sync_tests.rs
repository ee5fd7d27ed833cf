//! Integration tests for calimero-sync: end-to-end scenarios from spec §8
//! driven through [`SyncProtocol`] rather than the individual module unit
//! tests, which live alongside their modules in `src/`.

use std::sync::Arc;

use calimero_sync::{
    Cache, Candidate, ChannelId, Manifest, ManifestBundle, Member, Message, MessageContent, PayloadCache, PeerId,
    SessionManager, SpaceId, Summary, SyncConfig, SyncPayload, SyncProtocol,
};
use calimero_sync::clock::ManualClock;
use calimero_sync::storage::InMemoryStorage;

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

/// Scenario 1 (spec §8): nothing to offer, `buildSyncInfo` is `None`.
#[tokio::test]
async fn nothing_to_offer_yields_no_sync_info() {
    let storage = Arc::new(InMemoryStorage::new());
    let clock = ManualClock::new(0);
    let protocol = SyncProtocol::new(storage, clock, SyncConfig::default());

    let their_summary = Summary::default();
    let reply = protocol
        .handle_sync_request(&"s".into(), &"c".into(), &"inbox".into(), &their_summary)
        .await
        .unwrap();
    assert!(reply.is_none());
}

/// Scenario 2 (spec §8): matching summaries produce no `sync-info`.
#[tokio::test]
async fn matching_summary_yields_no_sync_info() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.save_message(message("m1", 1_000)).await.unwrap();
    storage
        .save_space_member(
            &"s".into(),
            Member {
                address: "a1".into(),
                inbox_address: None,
                display_name: "Alice".into(),
                profile_image: String::new(),
            },
        )
        .await
        .unwrap();

    let clock = ManualClock::new(0);
    let our_summary = {
        let cache = PayloadCache::new(Arc::clone(&storage), SyncConfig::default().max_messages);
        let entry = cache.get(&"s".into(), &"c".into()).await.unwrap();
        entry.lock().await.summary()
    };
    let protocol = SyncProtocol::new(storage, clock, SyncConfig::default());

    let reply = protocol
        .handle_sync_request(&"s".into(), &"c".into(), &"inbox".into(), &our_summary)
        .await
        .unwrap();
    assert!(reply.is_none());
}

/// Scenario 3 (spec §8): missing messages produce a `sync-info` payload
/// reflecting our larger message count.
#[tokio::test]
async fn missing_messages_yields_sync_info() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.save_message(message("m1", 1_000)).await.unwrap();
    storage.save_message(message("m2", 2_000)).await.unwrap();
    storage
        .save_space_member(
            &"s".into(),
            Member {
                address: "a1".into(),
                inbox_address: None,
                display_name: "Alice".into(),
                profile_image: String::new(),
            },
        )
        .await
        .unwrap();

    let clock = ManualClock::new(0);
    let protocol = SyncProtocol::new(storage, clock, SyncConfig::default());

    let their_summary = Summary {
        message_count: 1,
        member_count: 1,
        oldest_message_timestamp: 1_000,
        newest_message_timestamp: 1_000,
        manifest_hash: String::new(),
    };

    let reply = protocol
        .handle_sync_request(&"s".into(), &"c".into(), &"inbox".into(), &their_summary)
        .await
        .unwrap()
        .expect("expected a sync-info payload");

    match reply {
        SyncPayload::SyncInfo { summary, .. } => assert_eq!(summary.message_count, 2),
        other => panic!("expected sync-info, got {other:?}"),
    }
}

/// Scenario 4 (spec §8): when manifests are already identical, the delta
/// sequence is a single `{isFinal: true}` payload with no content.
#[tokio::test]
async fn identical_manifests_yield_single_empty_final_delta() {
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
    match &deltas[0] {
        SyncPayload::SyncDelta { payload, .. } => {
            assert!(payload.is_final);
            assert!(payload.message_delta.is_none());
        }
        other => panic!("expected sync-delta, got {other:?}"),
    }
}

/// Scenario 5 (spec §8): six 1 MiB messages, reactions on the even-indexed
/// ones, chunked at 5 MiB, against an empty peer — the union of
/// `newMessages` across chunks covers all six, and exactly one payload
/// carries the reaction delta.
#[tokio::test]
async fn chunked_delta_with_reactions_covers_all_messages() {
    use calimero_sync::cache::Reaction;

    let storage = Arc::new(InMemoryStorage::new());
    for i in 0..6u64 {
        let mut m = message(&format!("m{i}"), 1_000 + i);
        m.content = MessageContent::Post {
            text: "x".repeat(1024 * 1024),
            reply_id: None,
        };
        if i % 2 == 0 {
            m.reactions = vec![Reaction {
                emoji_id: "thumbsup".into(),
                member_ids: vec!["a1".into()],
            }];
        }
        storage.save_message(m).await.unwrap();
    }

    let clock = ManualClock::new(0);
    let config = SyncConfig::default().with_max_chunk_size(5 * 1024 * 1024);
    let protocol = SyncProtocol::new(storage, clock, config);

    let space: SpaceId = "s".into();
    let channel: ChannelId = "c".into();

    let local_bundle = match protocol
        .handle_sync_initiate(&space, &channel, &"inbox".into(), vec![])
        .await
        .unwrap()
    {
        SyncPayload::SyncManifest { bundle, .. } => bundle,
        other => panic!("expected sync-manifest, got {other:?}"),
    };
    let remote_bundle = ManifestBundle {
        manifest: Manifest {
            space_id: space.clone(),
            channel_id: channel.clone(),
            ..Default::default()
        },
        member_digests: vec![],
        peer_ids: vec![],
    };

    let deltas = protocol
        .plan_deltas(&space, &channel, &local_bundle, &remote_bundle, &[])
        .await
        .unwrap();

    assert!(deltas.len() >= 2, "expected at least two chunks for 6 MiB of messages");

    let mut all_new_ids = std::collections::HashSet::new();
    let mut reaction_payload_count = 0;
    let mut final_count = 0;
    for payload in &deltas {
        if let SyncPayload::SyncDelta { payload, .. } = payload {
            if let Some(md) = &payload.message_delta {
                for m in &md.new_messages {
                    all_new_ids.insert(m.message_id.clone());
                }
            }
            if payload.reaction_delta.is_some() {
                reaction_payload_count += 1;
            }
            if payload.is_final {
                final_count += 1;
            }
        }
    }

    assert_eq!(all_new_ids.len(), 6);
    assert_eq!(reaction_payload_count, 1);
    assert_eq!(final_count, 1);
    assert!(matches!(deltas.last().unwrap(), SyncPayload::SyncDelta { payload, .. } if payload.is_final));
}

/// Scenario 6 (spec §8): upsert, then remove, restores the prior manifest
/// hash (XOR self-inverse).
#[test]
fn xor_inverse_restores_prior_manifest_hash() {
    let mut cache = Cache::new();
    cache
        .upsert_message(message("m1", 1_000))
        .unwrap();
    let h0 = cache.summary().manifest_hash;

    cache.upsert_message(message("m2", 2_000)).unwrap();
    assert_ne!(cache.summary().manifest_hash, h0);

    cache.remove_message(&"m2".into());
    assert_eq!(cache.summary().manifest_hash, h0);
}

/// Candidate selection is a stable sort: message count desc, then member
/// count desc (spec §4.F).
#[tokio::test]
async fn session_manager_selects_richest_candidate() {
    let clock = ManualClock::new(0);
    let manager: SessionManager<ManualClock> = SessionManager::new(clock, 30_000, 1_000);
    let space: SpaceId = "s1".into();

    manager.start_collecting(&space).await.unwrap();
    manager
        .add_candidate(
            &space,
            Candidate {
                peer_id: PeerId(1),
                summary: Summary {
                    message_count: 3,
                    member_count: 1,
                    oldest_message_timestamp: 0,
                    newest_message_timestamp: 0,
                    manifest_hash: String::new(),
                },
            },
        )
        .await
        .unwrap();
    manager
        .add_candidate(
            &space,
            Candidate {
                peer_id: PeerId(2),
                summary: Summary {
                    message_count: 9,
                    member_count: 1,
                    oldest_message_timestamp: 0,
                    newest_message_timestamp: 0,
                    manifest_hash: String::new(),
                },
            },
        )
        .await
        .unwrap();

    let best = manager.select(&space).await.unwrap();
    assert_eq!(best.peer_id, PeerId(2));
}

/// A full payload cache load from storage, via [`PayloadCache::get`],
/// reflects the channel's messages bounded by `maxMessages` (spec §4.C).
#[tokio::test]
async fn payload_cache_loads_from_storage_on_first_access() {
    let storage = Arc::new(InMemoryStorage::new());
    storage.save_message(message("m1", 1_000)).await.unwrap();
    storage.save_message(message("m2", 2_000)).await.unwrap();

    let cache = PayloadCache::new(Arc::clone(&storage), 1_000);
    let entry = cache.get(&"s".into(), &"c".into()).await.unwrap();
    let entry = entry.lock().await;
    assert_eq!(entry.message_count(), 2);
}
