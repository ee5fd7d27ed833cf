//! Session Manager (component F, spec §4.F).
//!
//! One [`Session`] tracks a single space's sync attempt through
//! `Idle -> Collecting -> Selected -> Syncing -> {Done, Cancelled, Expired}`.
//! Candidates (peer summaries) accumulate during `Collecting`; an
//! aggressive timeout picks the best one seen so far rather than waiting
//! for every peer to respond.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::digest::Summary;
use crate::error::Result;
use crate::ids::{PeerId, SpaceId};

/// A peer's advertised state for a space, collected during `Collecting`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub peer_id: PeerId,
    pub summary: Summary,
}

/// Where a [`Session`] sits in its lifecycle (spec §4.F).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Collecting,
    Selected(Candidate),
    Syncing(Candidate),
    Done,
    Cancelled,
    Expired,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Expired)
    }
}

/// One space's in-progress (or finished) sync attempt.
#[derive(Clone, Debug)]
pub struct Session {
    pub space_id: SpaceId,
    pub state: SessionState,
    pub candidates: Vec<Candidate>,
    pub started_at_ms: u64,
    pub expires_at_ms: u64,
    /// Set once the first candidate arrives (spec §4.F — "on first
    /// candidate schedule aggressive timeout"); `None` means no candidate
    /// has shown up yet, so there's nothing to bound a wait on.
    pub aggressive_deadline_ms: Option<u64>,
}

impl Session {
    fn new(space_id: SpaceId, now_ms: u64, request_expiry_ms: u64) -> Self {
        Self {
            space_id,
            state: SessionState::Collecting,
            candidates: Vec::new(),
            started_at_ms: now_ms,
            expires_at_ms: now_ms + request_expiry_ms,
            aggressive_deadline_ms: None,
        }
    }

    fn is_expired(&self, now_ms: u64) -> bool {
        !self.state.is_terminal() && now_ms >= self.expires_at_ms
    }
}

/// Picks the best candidate: most messages wins, ties broken by member
/// count, in input order beyond that (stable sort, spec §4.F).
pub fn select_best_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        b.summary
            .message_count
            .cmp(&a.summary.message_count)
            .then(b.summary.member_count.cmp(&a.summary.member_count))
    });
    ranked.into_iter().next()
}

/// Tracks one [`Session`] per space (spec §4.F, §5 — per-key guarded
/// shared state, mirroring [`crate::cache::PayloadCache`]).
pub struct SessionManager<C> {
    clock: Arc<C>,
    request_expiry_ms: u64,
    aggressive_timeout_ms: u64,
    sessions: Mutex<HashMap<SpaceId, Session>>,
}

impl<C: crate::clock::Clock> SessionManager<C> {
    pub fn new(clock: Arc<C>, request_expiry_ms: u64, aggressive_timeout_ms: u64) -> Self {
        Self {
            clock,
            request_expiry_ms,
            aggressive_timeout_ms,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Starts collecting candidates for `space_id`. A no-op if a
    /// non-terminal session already exists; replaces a terminal or
    /// expired one (spec §4.F).
    pub async fn start_collecting(&self, space_id: &SpaceId) -> Result<()> {
        let now = self.clock.now_millis();
        let mut sessions = self.sessions.lock().await;

        let replace = match sessions.get(space_id) {
            None => true,
            Some(existing) => existing.state.is_terminal() || existing.is_expired(now),
        };

        if replace {
            sessions.insert(
                space_id.clone(),
                Session::new(space_id.clone(), now, self.request_expiry_ms),
            );
        }

        Ok(())
    }

    /// Records a candidate seen while collecting. A no-op (spec §4.F, §7 —
    /// `SessionExpired` is "treat as no-op", not a propagated error) if the
    /// session doesn't exist, has expired, or isn't in `Collecting`
    /// (late/duplicate offers from a peer are dropped once selection has
    /// happened). On the *first* candidate, schedules the aggressive
    /// timeout deadline (spec §4.F — "on first candidate schedule
    /// aggressive timeout").
    pub async fn add_candidate(&self, space_id: &SpaceId, candidate: Candidate) -> Result<()> {
        let now = self.clock.now_millis();
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(space_id) else {
            return Ok(());
        };

        if session.is_expired(now) {
            session.state = SessionState::Expired;
            return Ok(());
        }

        if matches!(session.state, SessionState::Collecting) {
            if session.candidates.is_empty() {
                session.aggressive_deadline_ms = Some(now + self.aggressive_timeout_ms);
            }
            session.candidates.push(candidate);
        }

        Ok(())
    }

    /// Returns `true` once the aggressive timeout has elapsed for a
    /// `Collecting` session, i.e. selection should happen now rather than
    /// waiting for more candidates (spec §4.F). Always `false` until a
    /// first candidate has arrived and scheduled the deadline.
    pub async fn aggressive_timeout_elapsed(&self, space_id: &SpaceId) -> bool {
        let now = self.clock.now_millis();
        let sessions = self.sessions.lock().await;
        sessions
            .get(space_id)
            .map(|s| {
                matches!(s.state, SessionState::Collecting)
                    && s.aggressive_deadline_ms.is_some_and(|deadline| now >= deadline)
            })
            .unwrap_or(false)
    }

    /// Picks the best candidate collected so far and transitions
    /// `Collecting -> Selected`. Returns `None` (spec §7 — no candidates
    /// is not an error) if there's nothing to select from, or the session
    /// is in any other state.
    pub async fn select(&self, space_id: &SpaceId) -> Option<Candidate> {
        let now = self.clock.now_millis();
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(space_id)?;

        if session.is_expired(now) {
            session.state = SessionState::Expired;
            return None;
        }

        if !matches!(session.state, SessionState::Collecting) {
            return None;
        }

        let best = select_best_candidate(&session.candidates).cloned()?;
        session.state = SessionState::Selected(best.clone());
        Some(best)
    }

    /// `Selected -> Syncing`. No-op (returns `false`) if the session isn't
    /// in `Selected`.
    pub async fn begin_sync(&self, space_id: &SpaceId) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(space_id) else {
            return false;
        };
        if let SessionState::Selected(candidate) = session.state.clone() {
            session.state = SessionState::Syncing(candidate);
            true
        } else {
            false
        }
    }

    /// Transitions to `Done`, clearing the session off the active map's
    /// future-expiry bookkeeping (spec §4.F — terminal states stop timers).
    pub async fn complete(&self, space_id: &SpaceId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(space_id) {
            session.state = SessionState::Done;
        }
    }

    /// Cancels a session from any non-terminal state (spec §4.F —
    /// `cancelSync`).
    pub async fn cancel(&self, space_id: &SpaceId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(space_id) {
            if !session.state.is_terminal() {
                session.state = SessionState::Cancelled;
            }
        }
    }

    /// Lazily reaps sessions whose expiry has passed, marking them
    /// `Expired` rather than removing them outright so a late caller can
    /// still observe why its session ended (spec §4.F).
    pub async fn reap_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut sessions = self.sessions.lock().await;
        let mut reaped = 0;
        for session in sessions.values_mut() {
            if session.is_expired(now) {
                session.state = SessionState::Expired;
                reaped += 1;
            }
        }
        reaped
    }

    pub async fn state(&self, space_id: &SpaceId) -> Option<SessionState> {
        self.sessions.lock().await.get(space_id).map(|s| s.state.clone())
    }

    /// The absolute epoch-millis deadline a session's candidate-collection
    /// window closes at, for stamping the `expiry` field of the
    /// `sync-request` payload that announced it (spec §4.F, §6).
    pub async fn expiry_ms(&self, space_id: &SpaceId) -> Option<u64> {
        self.sessions.lock().await.get(space_id).map(|s| s.expires_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn candidate(peer: u32, messages: usize, members: usize) -> Candidate {
        Candidate {
            peer_id: PeerId(peer),
            summary: Summary {
                message_count: messages,
                member_count: members,
                oldest_message_timestamp: 0,
                newest_message_timestamp: 0,
                manifest_hash: String::new(),
            },
        }
    }

    #[test]
    fn selects_highest_message_count() {
        let candidates = vec![candidate(1, 5, 1), candidate(2, 10, 1), candidate(3, 3, 9)];
        let best = select_best_candidate(&candidates).unwrap();
        assert_eq!(best.peer_id, PeerId(2));
    }

    #[test]
    fn ties_broken_by_member_count() {
        let candidates = vec![candidate(1, 5, 2), candidate(2, 5, 9)];
        let best = select_best_candidate(&candidates).unwrap();
        assert_eq!(best.peer_id, PeerId(2));
    }

    #[test]
    fn empty_candidates_select_none() {
        assert!(select_best_candidate(&[]).is_none());
    }

    #[tokio::test]
    async fn full_lifecycle_reaches_done() {
        let clock = ManualClock::new(0);
        let manager = SessionManager::new(Arc::clone(&clock), 30_000, 1_000);
        let space: SpaceId = "s1".into();

        manager.start_collecting(&space).await.unwrap();
        manager.add_candidate(&space, candidate(1, 5, 1)).await.unwrap();
        manager.add_candidate(&space, candidate(2, 10, 1)).await.unwrap();

        let selected = manager.select(&space).await.unwrap();
        assert_eq!(selected.peer_id, PeerId(2));
        assert!(manager.begin_sync(&space).await);
        manager.complete(&space).await;

        assert_eq!(manager.state(&space).await, Some(SessionState::Done));
    }

    #[tokio::test]
    async fn session_expires_after_request_expiry() {
        let clock = ManualClock::new(0);
        let manager = SessionManager::new(Arc::clone(&clock), 1_000, 10_000_000);
        let space: SpaceId = "s1".into();

        manager.start_collecting(&space).await.unwrap();
        clock.advance(2_000);

        assert_eq!(manager.reap_expired().await, 1);
        assert_eq!(manager.state(&space).await, Some(SessionState::Expired));
    }

    #[tokio::test]
    async fn aggressive_timeout_is_anchored_to_first_candidate_not_session_start() {
        let clock = ManualClock::new(0);
        let manager = SessionManager::new(Arc::clone(&clock), 30_000, 500);
        let space: SpaceId = "s1".into();

        manager.start_collecting(&space).await.unwrap();
        assert!(!manager.aggressive_timeout_elapsed(&space).await);

        // No candidate has arrived yet: even well past what would have been
        // a session-start-anchored deadline, the flag must not flip.
        clock.advance(2_000);
        assert!(!manager.aggressive_timeout_elapsed(&space).await);

        // First candidate arrives late (t=2000); the aggressive timeout
        // starts counting from here, not from session creation.
        manager.add_candidate(&space, candidate(1, 5, 1)).await.unwrap();
        assert!(!manager.aggressive_timeout_elapsed(&space).await);

        clock.advance(600);
        assert!(manager.aggressive_timeout_elapsed(&space).await);
    }

    #[tokio::test]
    async fn late_candidate_after_expiry_is_silently_dropped() {
        let clock = ManualClock::new(0);
        let manager = SessionManager::new(Arc::clone(&clock), 1_000, 500);
        let space: SpaceId = "s1".into();

        manager.start_collecting(&space).await.unwrap();
        clock.advance(2_000);

        manager.add_candidate(&space, candidate(1, 5, 1)).await.unwrap();
        assert_eq!(manager.state(&space).await, Some(SessionState::Expired));
    }

    #[tokio::test]
    async fn candidate_for_unknown_session_is_silently_dropped() {
        let clock = ManualClock::new(0);
        let manager: SessionManager<ManualClock> = SessionManager::new(Arc::clone(&clock), 30_000, 1_000);
        let space: SpaceId = "unknown".into();

        manager.add_candidate(&space, candidate(1, 5, 1)).await.unwrap();
        assert_eq!(manager.state(&space).await, None);
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_idempotent() {
        let clock = ManualClock::new(0);
        let manager = SessionManager::new(Arc::clone(&clock), 30_000, 1_000);
        let space: SpaceId = "s1".into();

        manager.start_collecting(&space).await.unwrap();
        manager.cancel(&space).await;
        manager.cancel(&space).await;

        assert_eq!(manager.state(&space).await, Some(SessionState::Cancelled));
    }

    #[tokio::test]
    async fn select_returns_none_without_candidates() {
        let clock = ManualClock::new(0);
        let manager = SessionManager::new(Arc::clone(&clock), 30_000, 1_000);
        let space: SpaceId = "s1".into();

        manager.start_collecting(&space).await.unwrap();
        assert!(manager.select(&space).await.is_none());
    }
}
