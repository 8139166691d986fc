//! Process-wide correlation registry.
//!
//! Maps a job identifier to the slot its waiter is polling. One slot per
//! id: filenames are the correlation key and are not unique per request,
//! so a second [`CorrelationRegistry::arm`] for an id that is still in
//! flight is refused rather than overwriting the first waiter.
//!
//! All operations take one short `std::sync::Mutex` critical section that
//! only touches the map; nothing awaits or performs I/O while it is held.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::messages::NotificationMessage;

/// Lifecycle state of a correlation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    /// Armed and waiting for a notification.
    Pending,
    /// A matching notification was handed off.
    Fulfilled(NotificationMessage),
    /// The waiter's deadline passed without a notification.
    Expired,
}

/// Result of [`CorrelationRegistry::fulfill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillOutcome {
    /// A pending entry moved to [`EntryState::Fulfilled`].
    Fulfilled,
    /// The entry had already been fulfilled or expired; nothing changed.
    Duplicate,
    /// No entry exists for the id; nothing changed.
    NotArmed,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A waiter for this id is already in flight.
    #[error("A wait is already pending for '{0}'")]
    AlreadyPending(String),
}

/// Lock-guarded map of in-flight job waits.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    entries: Mutex<HashMap<String, EntryState>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending entry for `job_id`.
    ///
    /// Returns a guard that releases the entry when dropped, so the entry
    /// cannot outlive the request future that armed it even if that future
    /// is cancelled.
    pub fn arm(self: &Arc<Self>, job_id: &str) -> Result<CorrelationGuard, RegistryError> {
        let mut entries = self.lock();
        if entries.contains_key(job_id) {
            return Err(RegistryError::AlreadyPending(job_id.to_string()));
        }
        entries.insert(job_id.to_string(), EntryState::Pending);
        drop(entries);

        tracing::debug!(job_id, "Correlation entry armed");
        Ok(CorrelationGuard {
            registry: Arc::clone(self),
            job_id: job_id.to_string(),
            released: false,
        })
    }

    /// Hand a notification to the entry for `job_id`.
    ///
    /// Only a [`EntryState::Pending`] entry transitions; late or duplicate
    /// deliveries leave the registry untouched.
    pub fn fulfill(&self, job_id: &str, message: NotificationMessage) -> FulfillOutcome {
        let mut entries = self.lock();
        match entries.get_mut(job_id) {
            Some(state @ EntryState::Pending) => {
                *state = EntryState::Fulfilled(message);
                FulfillOutcome::Fulfilled
            }
            Some(_) => FulfillOutcome::Duplicate,
            None => FulfillOutcome::NotArmed,
        }
    }

    /// Mark a pending entry as expired. Fulfilled entries are left as-is.
    pub fn expire(&self, job_id: &str) {
        let mut entries = self.lock();
        if let Some(state @ EntryState::Pending) = entries.get_mut(job_id) {
            *state = EntryState::Expired;
        }
    }

    /// Non-blocking snapshot of the entry's state.
    pub fn peek(&self, job_id: &str) -> Option<EntryState> {
        self.lock().get(job_id).cloned()
    }

    /// Remove the entry unconditionally. Idempotent.
    pub fn release(&self, job_id: &str) {
        if let Some(state) = self.lock().remove(job_id) {
            tracing::debug!(job_id, ?state, "Correlation entry released");
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, EntryState>> {
        // Critical sections never panic midway, so a poisoned map is intact.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ownership of one armed registry entry.
///
/// Releasing is explicit via [`CorrelationGuard::release`] and implicit on
/// drop; either path removes the entry exactly once.
#[derive(Debug)]
pub struct CorrelationGuard {
    registry: Arc<CorrelationRegistry>,
    job_id: String,
    released: bool,
}

impl CorrelationGuard {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Remove the entry now. Later calls and the eventual drop are no-ops.
    pub fn release(&mut self) {
        if !self.released {
            self.registry.release(&self.job_id);
            self.released = true;
        }
    }
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn notification(file: &str, status: &str) -> NotificationMessage {
        NotificationMessage {
            file: file.into(),
            status: status.into(),
            path: format!("/out/{file}.gds"),
        }
    }

    #[test]
    fn arm_twice_is_rejected() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _guard = registry.arm("design.v").unwrap();

        assert_matches!(
            registry.arm("design.v"),
            Err(RegistryError::AlreadyPending(id)) if id == "design.v"
        );
    }

    #[test]
    fn arm_succeeds_again_after_release() {
        let registry = Arc::new(CorrelationRegistry::new());
        let mut guard = registry.arm("design.v").unwrap();
        guard.release();

        assert!(registry.arm("design.v").is_ok());
    }

    #[test]
    fn distinct_ids_do_not_conflict() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _a = registry.arm("a.v").unwrap();
        let _b = registry.arm("b.v").unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn fulfill_moves_pending_to_fulfilled() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _guard = registry.arm("design.v").unwrap();

        let outcome = registry.fulfill("design.v", notification("design.v", "done"));
        assert_eq!(outcome, FulfillOutcome::Fulfilled);
        assert_eq!(
            registry.peek("design.v"),
            Some(EntryState::Fulfilled(notification("design.v", "done")))
        );
    }

    #[test]
    fn duplicate_delivery_keeps_first_payload() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _guard = registry.arm("design.v").unwrap();
        registry.fulfill("design.v", notification("design.v", "done"));

        let outcome = registry.fulfill("design.v", notification("design.v", "failed"));
        assert_eq!(outcome, FulfillOutcome::Duplicate);
        assert_eq!(
            registry.peek("design.v"),
            Some(EntryState::Fulfilled(notification("design.v", "done")))
        );
    }

    #[test]
    fn fulfilled_never_returns_to_pending() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _guard = registry.arm("design.v").unwrap();
        registry.fulfill("design.v", notification("design.v", "done"));
        registry.expire("design.v");
        registry.fulfill("design.v", notification("design.v", "again"));

        assert_matches!(registry.peek("design.v"), Some(EntryState::Fulfilled(_)));
    }

    #[test]
    fn fulfill_without_entry_is_noop() {
        let registry = CorrelationRegistry::new();
        let outcome = registry.fulfill("ghost.v", notification("ghost.v", "done"));
        assert_eq!(outcome, FulfillOutcome::NotArmed);
        assert!(registry.is_empty());
    }

    #[test]
    fn other_ids_are_not_fulfilled() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _guard = registry.arm("design.v").unwrap();
        registry.fulfill("other.v", notification("other.v", "done"));

        assert_eq!(registry.peek("design.v"), Some(EntryState::Pending));
    }

    #[test]
    fn expire_moves_pending_to_expired_and_blocks_late_fulfil() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _guard = registry.arm("design.v").unwrap();
        registry.expire("design.v");

        assert_eq!(registry.peek("design.v"), Some(EntryState::Expired));
        assert_eq!(
            registry.fulfill("design.v", notification("design.v", "done")),
            FulfillOutcome::Duplicate
        );
    }

    #[test]
    fn release_is_idempotent() {
        let registry = Arc::new(CorrelationRegistry::new());
        let _other = registry.arm("other.v").unwrap();
        let mut guard = registry.arm("design.v").unwrap();

        guard.release();
        guard.release();
        registry.release("design.v");

        assert_eq!(registry.peek("design.v"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dropping_guard_releases_entry() {
        let registry = Arc::new(CorrelationRegistry::new());
        {
            let _guard = registry.arm("design.v").unwrap();
            assert_eq!(registry.peek("design.v"), Some(EntryState::Pending));
        }
        assert_eq!(registry.peek("design.v"), None);
    }

    #[test]
    fn stale_guard_does_not_release_newer_entry() {
        let registry = Arc::new(CorrelationRegistry::new());
        let mut first = registry.arm("design.v").unwrap();
        first.release();
        let _second = registry.arm("design.v").unwrap();

        drop(first);
        assert_eq!(registry.peek("design.v"), Some(EntryState::Pending));
    }
}
