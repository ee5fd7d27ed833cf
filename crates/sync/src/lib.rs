//! Delta-sync core for Calimero messaging clients.
//!
//! This crate owns the five-step sync control flow (`sync-request` ->
//! `sync-info` -> `sync-initiate` -> `sync-manifest` -> `sync-delta`), the
//! per-channel payload cache that makes manifest construction and
//! incremental updates cheap, and the diff/delta machinery that turns two
//! manifests into a bounded sequence of wire payloads. Storage is an
//! injected [`storage::SyncStorage`] implementation; encryption, signing,
//! and transport are entirely the host's concern (not represented here at
//! all).
//!
//! NO ACTORS! — callers drive this crate directly; there is no internal
//! event loop or actor runtime.

pub mod cache;
pub mod clock;
pub mod config;
pub mod delta;
pub mod diff;
pub mod digest;
pub mod error;
pub mod events;
pub mod hash;
pub mod ids;
pub mod protocol;
pub mod session;
pub mod storage;

pub use cache::{Cache, Member, Message, MessageContent, PayloadCache, Reaction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{InitiateSyncHook, NoopInitiateSyncHook, RetryConfig, SyncConfig};
pub use delta::{MemberDelta, MessageDelta, MessageReactions, PeerMapDelta, PeerMapEntry, SyncDeltaPayload};
pub use diff::{MemberDiff, MessageDiff, PeerDiff};
pub use digest::{Manifest, MemberDigest, MessageDigest, ReactionDigest, Summary};
pub use error::{Result, SyncError};
pub use events::{SyncEvent, SyncStatus};
pub use ids::{Address, ChannelId, ChannelKey, InboxAddress, MessageId, PeerId, SpaceId};
pub use protocol::{ManifestBundle, SyncPayload, SyncProtocol};
pub use session::{Candidate, Session, SessionManager, SessionState};
pub use storage::{InMemoryStorage, MessagePage, PageDirection, SyncStorage, Tombstone, TombstoneLog};
