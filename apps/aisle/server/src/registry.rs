use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use metrics::gauge;
use uuid::Uuid;

/// Live sessions, keyed by connection id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
}

struct SessionEntry {
    peer: SocketAddr,
    opened_at: Instant,
    requests: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub connection_id: Uuid,
    pub peer: SocketAddr,
    pub age: Duration,
    pub requests: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live sessions after the insert.
    pub fn register(&self, connection_id: Uuid, peer: SocketAddr) -> usize {
        self.sessions.insert(
            connection_id,
            SessionEntry {
                peer,
                opened_at: Instant::now(),
                requests: AtomicU64::new(0),
            },
        );
        let active = self.sessions.len();
        gauge!("aisle_sessions_active", active as f64);
        active
    }

    /// Returns how many requests the session served, if it was registered.
    pub fn unregister(&self, connection_id: Uuid) -> Option<u64> {
        let removed = self
            .sessions
            .remove(&connection_id)
            .map(|(_, entry)| entry.requests.load(Ordering::Relaxed));
        gauge!("aisle_sessions_active", self.sessions.len() as f64);
        removed
    }

    pub fn record_request(&self, connection_id: Uuid) {
        if let Some(entry) = self.sessions.get(&connection_id) {
            entry.requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<SessionSnapshot> = self
            .sessions
            .iter()
            .map(|entry| SessionSnapshot {
                connection_id: *entry.key(),
                peer: entry.peer,
                age: now.saturating_duration_since(entry.opened_at),
                requests: entry.requests.load(Ordering::Relaxed),
            })
            .collect();
        snapshots.sort_by(|a, b| b.age.cmp(&a.age));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test_timeout::timeout]
    fn register_and_unregister_track_counts() {
        let registry = SessionRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        assert_eq!(registry.register(first, peer()), 1);
        assert_eq!(registry.register(second, peer()), 2);

        registry.record_request(first);
        registry.record_request(first);
        assert_eq!(registry.unregister(first), Some(2));
        assert_eq!(registry.unregister(first), None);
        assert_eq!(registry.len(), 1);

        registry.unregister(second);
        assert!(registry.is_empty());
    }

    #[test_timeout::timeout]
    fn snapshot_reports_requests() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.register(id, peer());
        registry.record_request(id);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].connection_id, id);
        assert_eq!(snapshot[0].requests, 1);
    }
}
