//! In-memory per-call session state.
//!
//! Sessions live only for the duration of a call; losing them on restart is
//! acceptable and by design. The table is the one resource shared across
//! concurrently progressing calls, so it is guarded by a mutex with an
//! explicit eviction rule (completion, or idle timeout via the background
//! sweeper).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// State machine position for one in-progress call.
#[derive(Debug, Clone)]
pub struct CallSession {
    /// Position in the question catalog. Monotonically non-decreasing; never
    /// changes on a follow-up outcome.
    pub question_index: usize,
    /// Consecutive unresolved attempts at the current question. Reset to
    /// zero whenever a question is accepted or advanced past.
    pub attempts: u32,
    /// Last webhook activity, used by idle eviction.
    last_activity: Instant,
}

impl CallSession {
    fn fresh() -> Self {
        Self {
            question_index: 0,
            attempts: 0,
            last_activity: Instant::now(),
        }
    }
}

/// Read-only snapshot of a session, taken before async collaborator calls so
/// the lock is never held across an `.await`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView {
    pub question_index: usize,
    pub attempts: u32,
}

/// Concurrent map from call id to session.
///
/// Uses `std::sync::Mutex` intentionally: every operation is a brief HashMap
/// access that never spans an `.await` point, so a synchronous lock is both
/// safe and cheaper than an async one. Within one call the telephony vendor
/// delivers webhooks strictly sequentially, so snapshot-then-apply across a
/// collaborator call cannot interleave with another event for the same call.
#[derive(Debug, Default)]
pub struct SessionTable {
    inner: Mutex<HashMap<String, CallSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session for a call, replacing any existing one (a
    /// re-delivered call-connected event restarts the survey).
    pub fn insert(&self, call_id: &str) {
        self.lock().insert(call_id.to_string(), CallSession::fresh());
    }

    /// Snapshots a session's position and touches its activity clock.
    pub fn view(&self, call_id: &str) -> Option<SessionView> {
        let mut map = self.lock();
        let session = map.get_mut(call_id)?;
        session.last_activity = Instant::now();
        Some(SessionView {
            question_index: session.question_index,
            attempts: session.attempts,
        })
    }

    /// Increments the unresolved-attempt counter; returns the new count.
    pub fn bump_attempts(&self, call_id: &str) -> Option<u32> {
        let mut map = self.lock();
        let session = map.get_mut(call_id)?;
        session.attempts += 1;
        session.last_activity = Instant::now();
        Some(session.attempts)
    }

    /// Moves a session to the next catalog position and clears the attempt
    /// counter; returns the new position.
    pub fn advance(&self, call_id: &str) -> Option<usize> {
        let mut map = self.lock();
        let session = map.get_mut(call_id)?;
        session.question_index += 1;
        session.attempts = 0;
        session.last_activity = Instant::now();
        Some(session.question_index)
    }

    pub fn remove(&self, call_id: &str) -> Option<CallSession> {
        self.lock().remove(call_id)
    }

    /// Evicts sessions idle for at least `max_idle`; returns how many.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, session| session.last_activity.elapsed() < max_idle);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CallSession>> {
        // A poisoned lock means another call panicked mid-update; the map
        // itself is still structurally sound, so keep serving calls.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
