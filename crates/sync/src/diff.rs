//! Diff Engine (component D).
//!
//! Compares manifests / digest sets and yields the missing / outdated /
//! extra ID sets diff drives delta assembly from (spec §4.D).

use std::collections::{HashMap, HashSet};

use crate::digest::{Manifest, MemberDigest};
use crate::ids::{Address, MessageId, PeerId};

/// Result of comparing our manifest against a remote one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageDiff {
    /// IDs present in theirs, absent in ours.
    pub missing_ids: HashSet<MessageId>,
    /// IDs in both, with differing content hash where theirs is newer.
    pub outdated_ids: HashSet<MessageId>,
    /// IDs in ours, absent in theirs.
    pub extra_ids: HashSet<MessageId>,
}

/// Compares `our_manifest` against `their_manifest` (spec §4.D).
///
/// "Newest-modified wins": if content hashes differ but theirs is not
/// newer, we do nothing — we keep ours and rely on them detecting the
/// discrepancy reciprocally.
pub fn compute_message_diff(our_manifest: &Manifest, their_manifest: &Manifest) -> MessageDiff {
    let ours: HashMap<&MessageId, &crate::digest::MessageDigest> =
        our_manifest.digests.iter().map(|d| (&d.message_id, d)).collect();
    let theirs: HashMap<&MessageId, &crate::digest::MessageDigest> =
        their_manifest.digests.iter().map(|d| (&d.message_id, d)).collect();

    let mut missing_ids = HashSet::new();
    let mut outdated_ids = HashSet::new();
    let mut extra_ids = HashSet::new();

    for (id, their_digest) in &theirs {
        match ours.get(id) {
            None => {
                missing_ids.insert((*id).clone());
            }
            Some(our_digest) => {
                if our_digest.content_hash != their_digest.content_hash {
                    let our_effective = our_digest.modified_date.unwrap_or(our_digest.created_date);
                    let their_effective = their_digest.modified_date.unwrap_or(their_digest.created_date);
                    if their_effective > our_effective {
                        outdated_ids.insert((*id).clone());
                    }
                    // else: theirs is not newer, we keep ours (no-op).
                }
            }
        }
    }

    for id in ours.keys() {
        if !theirs.contains_key(id) {
            extra_ids.insert((*id).clone());
        }
    }

    MessageDiff {
        missing_ids,
        outdated_ids,
        extra_ids,
    }
}

/// Result of comparing member digest maps by address.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemberDiff {
    pub missing_addresses: HashSet<Address>,
    pub outdated_addresses: HashSet<Address>,
    pub extra_addresses: HashSet<Address>,
}

/// Compares our member digests against theirs. An entry is outdated if
/// either `displayNameHash` or `iconHash` differs (spec §4.D). There is no
/// newest-wins tie-break for members (spec §9 — open question, resolved:
/// the source always sends ours).
pub fn compute_member_diff(ours: &[MemberDigest], theirs: &[MemberDigest]) -> MemberDiff {
    let our_map: HashMap<&Address, &MemberDigest> = ours.iter().map(|d| (&d.address, d)).collect();
    let their_map: HashMap<&Address, &MemberDigest> = theirs.iter().map(|d| (&d.address, d)).collect();

    let mut missing_addresses = HashSet::new();
    let mut outdated_addresses = HashSet::new();
    let mut extra_addresses = HashSet::new();

    for (addr, their_digest) in &their_map {
        match our_map.get(addr) {
            None => {
                missing_addresses.insert((*addr).clone());
            }
            Some(our_digest) => {
                if our_digest.display_name_hash != their_digest.display_name_hash
                    || our_digest.icon_hash != their_digest.icon_hash
                {
                    outdated_addresses.insert((*addr).clone());
                }
            }
        }
    }

    for addr in our_map.keys() {
        if !their_map.contains_key(addr) {
            extra_addresses.insert((*addr).clone());
        }
    }

    MemberDiff {
        missing_addresses,
        outdated_addresses,
        extra_addresses,
    }
}

/// Result of comparing peer-map ID sets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PeerDiff {
    pub missing_peer_ids: HashSet<PeerId>,
    pub extra_peer_ids: HashSet<PeerId>,
}

/// Plain set difference over peer IDs (spec §4.D).
pub fn compute_peer_diff(ours: &[PeerId], theirs: &[PeerId]) -> PeerDiff {
    let our_set: HashSet<PeerId> = ours.iter().copied().collect();
    let their_set: HashSet<PeerId> = theirs.iter().copied().collect();

    PeerDiff {
        missing_peer_ids: their_set.difference(&our_set).copied().collect(),
        extra_peer_ids: our_set.difference(&their_set).copied().collect(),
    }
}
