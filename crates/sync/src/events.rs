//! Structured lifecycle events for host telemetry (spec ambient stack —
//! the distilled spec's control-flow narrative expressed as a type hosts
//! can match on instead of scraping log lines).

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, PeerId, SpaceId};

/// A point in a sync session's lifecycle, emitted alongside the matching
/// `tracing` call in [`crate::protocol`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SyncStatus {
    Started {
        peer_id: PeerId,
    },
    InfoExchanged {
        peer_id: PeerId,
    },
    CandidateSelected {
        peer_id: PeerId,
    },
    ManifestExchanged {
        peer_id: PeerId,
        missing: usize,
        outdated: usize,
        extra: usize,
    },
    DeltaApplied {
        peer_id: PeerId,
        new_messages: usize,
        updated_messages: usize,
        deleted_messages: usize,
    },
    Completed {
        peer_id: PeerId,
    },
    Cancelled,
    Expired,
    Failed {
        reason: String,
    },
}

/// A [`SyncStatus`] scoped to the `(space, channel)` it happened in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncEvent {
    pub space_id: SpaceId,
    pub channel_id: ChannelId,
    pub status: SyncStatus,
}

impl SyncEvent {
    pub fn new(space_id: SpaceId, channel_id: ChannelId, status: SyncStatus) -> Self {
        Self {
            space_id,
            channel_id,
            status,
        }
    }
}
