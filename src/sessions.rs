use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{errors::ServiceError, services::CheckoutAttempt};

/// In-memory store of live checkout attempts, keyed by attempt id.
///
/// Each attempt sits behind its own async mutex: one logical session per
/// attempt, so the lock only serializes the wizard against late gateway
/// callbacks. The re-entrancy guard against double submission is the
/// state machine's in-flight state, not this lock.
#[derive(Clone, Default)]
pub struct AttemptStore {
    inner: Arc<DashMap<Uuid, Arc<Mutex<CheckoutAttempt>>>>,
}

impl AttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, attempt: CheckoutAttempt) -> Arc<Mutex<CheckoutAttempt>> {
        let id = attempt.id;
        let entry = Arc::new(Mutex::new(attempt));
        self.inner.insert(id, entry.clone());
        entry
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<Mutex<CheckoutAttempt>>, ServiceError> {
        self.inner
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("checkout attempt {} not found", id)))
    }

    /// Evicts terminal attempts whose retention window has elapsed,
    /// returning how many were removed. Attempts locked by an in-flight
    /// request are skipped until the next sweep.
    pub fn evict_terminal(&self, retain_for: Duration) -> usize {
        let cutoff = Utc::now() - retain_for;
        let before = self.inner.len();
        self.inner.retain(|_, entry| match entry.try_lock() {
            Ok(attempt) => !(attempt.state.is_terminal() && attempt.created_at < cutoff),
            Err(_) => true,
        });
        before.saturating_sub(self.inner.len())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
