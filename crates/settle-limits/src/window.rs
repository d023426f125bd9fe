//! Sliding-Window Store
//!
//! One timestamped token per admitted request, grouped per window key.
//! The whole drop-count-admit sequence is a single store-level operation;
//! two concurrent checks can never both observe "under the limit" and both
//! slip past it. Backed by a sorted-set store in production; the in-memory
//! implementation holds the per-key shard lock across the full sequence.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Window store error
#[derive(Debug, thiserror::Error)]
pub enum WindowStoreError {
    /// Store unreachable; the limiter fails open
    #[error("window store unavailable: {0}")]
    Unavailable(String),
}

/// Result of one atomic admission check
#[derive(Debug, Clone, Copy)]
pub struct WindowOutcome {
    /// Whether a token was added
    pub admitted: bool,
    /// Tokens in the window after the check
    pub count: u64,
    /// Timestamp of the oldest surviving token, if any
    pub oldest_ms: Option<u64>,
}

/// Sliding-window store contract
///
/// Implementations must execute the drop-count-admit sequence atomically
/// and expire each key after twice the window, bounding memory without
/// active pruning.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Drop tokens older than `now_ms - window_ms`, count survivors, and
    /// add a fresh token iff the count is below `limit`
    async fn admit(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        limit: u64,
    ) -> Result<WindowOutcome, WindowStoreError>;
}

#[derive(Default)]
struct Window {
    entries: Vec<(u64, Uuid)>,
}

/// In-memory sliding-window store
pub struct InMemoryWindowStore {
    windows: DashMap<String, Window>,
}

impl InMemoryWindowStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }
}

impl Default for InMemoryWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn admit(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        limit: u64,
    ) -> Result<WindowOutcome, WindowStoreError> {
        // the entry guard is the atomicity boundary: nobody else touches
        // this key until it drops
        let mut window = self.windows.entry(key.to_string()).or_default();

        let cutoff = now_ms.saturating_sub(window_ms);
        window.entries.retain(|(at, _)| *at >= cutoff);

        let survivors = window.entries.len() as u64;
        let admitted = survivors < limit;
        if admitted {
            window.entries.push((now_ms, Uuid::new_v4()));
        }

        Ok(WindowOutcome {
            admitted,
            count: window.entries.len() as u64,
            oldest_ms: window.entries.first().map(|(at, _)| *at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admits_until_limit() {
        let store = InMemoryWindowStore::new();
        for i in 0..3 {
            let outcome = store.admit("k", 1_000 + i, 60_000, 3).await.unwrap();
            assert!(outcome.admitted);
            assert_eq!(outcome.count, i + 1);
        }
        let rejected = store.admit("k", 1_010, 60_000, 3).await.unwrap();
        assert!(!rejected.admitted);
        assert_eq!(rejected.count, 3);
        assert_eq!(rejected.oldest_ms, Some(1_000));
    }

    #[tokio::test]
    async fn test_window_slides() {
        let store = InMemoryWindowStore::new();
        store.admit("k", 1_000, 1_000, 1).await.unwrap();
        assert!(!store.admit("k", 1_500, 1_000, 1).await.unwrap().admitted);
        // the first token has aged out of the trailing window
        assert!(store.admit("k", 2_100, 1_000, 1).await.unwrap().admitted);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = InMemoryWindowStore::new();
        store.admit("a", 1_000, 60_000, 1).await.unwrap();
        assert!(store.admit("b", 1_000, 60_000, 1).await.unwrap().admitted);
    }
}
