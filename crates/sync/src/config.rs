//! Tunables and host hooks for the sync core (spec §4, §6 — defaults
//! called out inline in the control-flow description).

use std::sync::Arc;

use async_trait::async_trait;

use crate::ids::{ChannelId, PeerId, SpaceId};

/// One day in milliseconds, used to express [`SyncConfig::tombstone_max_age_ms`]'s
/// default readably.
const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Called once a sync session selects a candidate peer, so the host can
/// actually dispatch the `sync-initiate` payload over its transport. The
/// core has no transport of its own (spec §1, §6).
#[async_trait]
pub trait InitiateSyncHook: Send + Sync {
    async fn on_initiate_sync(&self, space_id: &SpaceId, channel_id: &ChannelId, peer_id: PeerId);
}

/// A hook that does nothing, for hosts that drive `sync-initiate`
/// dispatch themselves from the session manager's state rather than via
/// callback.
pub struct NoopInitiateSyncHook;

#[async_trait]
impl InitiateSyncHook for NoopInitiateSyncHook {
    async fn on_initiate_sync(&self, _space_id: &SpaceId, _channel_id: &ChannelId, _peer_id: PeerId) {}
}

/// Host-side transport retry/backoff policy. The sync core itself never
/// retries a failed operation (spec §7); this configures the host's
/// surrounding send loop, which is out of scope for this crate but is
/// carried here as a config knob so hosts don't need a second config type
/// to drive retry behavior around sync calls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5_000,
        }
    }
}

/// Tunables for the sync core (spec §4, §6).
#[derive(Clone)]
pub struct SyncConfig {
    /// Bound on messages loaded into a channel's payload cache (spec §4.C).
    pub max_messages: usize,
    /// How long a collecting session waits before it's considered expired
    /// with no resolution (spec §4.F).
    pub request_expiry_ms: u64,
    /// How long a collecting session waits for more candidates before
    /// selecting the best one seen so far (spec §4.F).
    pub aggressive_sync_timeout_ms: u64,
    /// Byte budget per `sync-delta` chunk (spec §4.E).
    pub max_chunk_size: usize,
    /// How long a tombstone is retained before [`crate::storage::TombstoneLog::cleanup`]
    /// reaps it (spec §3, invariant 6).
    pub tombstone_max_age_ms: u64,
    pub retry: RetryConfig,
    pub on_initiate_sync: Arc<dyn InitiateSyncHook>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_messages: 1_000,
            request_expiry_ms: 30_000,
            aggressive_sync_timeout_ms: 1_000,
            max_chunk_size: 5 * 1024 * 1024,
            tombstone_max_age_ms: 30 * DAY_MS,
            retry: RetryConfig::default(),
            on_initiate_sync: Arc::new(NoopInitiateSyncHook),
        }
    }
}

impl SyncConfig {
    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_request_expiry_ms(mut self, ms: u64) -> Self {
        self.request_expiry_ms = ms;
        self
    }

    pub fn with_aggressive_sync_timeout_ms(mut self, ms: u64) -> Self {
        self.aggressive_sync_timeout_ms = ms;
        self
    }

    pub fn with_max_chunk_size(mut self, bytes: usize) -> Self {
        self.max_chunk_size = bytes;
        self
    }

    pub fn with_tombstone_max_age_ms(mut self, ms: u64) -> Self {
        self.tombstone_max_age_ms = ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_initiate_sync_hook(mut self, hook: Arc<dyn InitiateSyncHook>) -> Self {
        self.on_initiate_sync = hook;
        self
    }
}
