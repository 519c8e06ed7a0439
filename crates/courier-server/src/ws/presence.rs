//! Presence registry — who is online right now.
//!
//! Presence is derived from open connections: a user is online while at
//! least one of their connections is open. Connections are reference-counted
//! per user so closing one tab does not mark a user offline while another
//! tab remains open.
//!
//! The registry is an explicitly constructed instance handed to the session
//! layer; there is no global. State is in-memory only and starts empty on
//! every process start.

use std::collections::HashMap;

use metrics::gauge;
use parking_lot::Mutex;

use courier_core::ids::UserId;

use crate::metrics::PRESENCE_ONLINE_USERS;

/// Reference-counted set of online users.
pub struct PresenceRegistry {
    /// Open-connection count per user. A user is present iff their count
    /// is at least 1; entries never sit at zero.
    online: Mutex<HashMap<UserId, usize>>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            online: Mutex::new(HashMap::new()),
        }
    }

    /// Record one more open connection for `user_id`.
    ///
    /// Returns the fresh snapshot for the caller to broadcast. Joining is
    /// idempotent in the set sense (a second tab does not change the
    /// snapshot) but every join still produces a broadcastable snapshot.
    pub fn join(&self, user_id: &UserId) -> Vec<UserId> {
        let mut online = self.online.lock();
        *online.entry(user_id.clone()).or_insert(0) += 1;
        Self::snapshot_locked(&online)
    }

    /// Record one closed connection for `user_id`.
    ///
    /// The user leaves the set only when their last connection closes.
    /// Returns the fresh snapshot for the caller to broadcast.
    pub fn leave(&self, user_id: &UserId) -> Vec<UserId> {
        let mut online = self.online.lock();
        if let Some(count) = online.get_mut(user_id) {
            *count -= 1;
            if *count == 0 {
                let _ = online.remove(user_id);
            }
        }
        Self::snapshot_locked(&online)
    }

    /// Whether `user_id` currently holds at least one open connection.
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.online.lock().contains_key(user_id)
    }

    /// Sorted snapshot of every online user id.
    pub fn snapshot(&self) -> Vec<UserId> {
        Self::snapshot_locked(&self.online.lock())
    }

    /// Number of distinct online users.
    pub fn online_count(&self) -> usize {
        self.online.lock().len()
    }

    // Sorted for deterministic payloads.
    fn snapshot_locked(online: &HashMap<UserId, usize>) -> Vec<UserId> {
        gauge!(PRESENCE_ONLINE_USERS).set(online.len() as f64);
        let mut ids: Vec<UserId> = online.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_empty() {
        let presence = PresenceRegistry::new();
        assert!(presence.snapshot().is_empty());
        assert_eq!(presence.online_count(), 0);
        assert!(!presence.is_online(&UserId::from("u1")));
    }

    #[test]
    fn join_makes_user_online() {
        let presence = PresenceRegistry::new();
        let snapshot = presence.join(&UserId::from("u1"));
        assert_eq!(snapshot, vec![UserId::from("u1")]);
        assert!(presence.is_online(&UserId::from("u1")));
    }

    #[test]
    fn leave_makes_user_offline() {
        let presence = PresenceRegistry::new();
        let _ = presence.join(&UserId::from("u1"));
        let snapshot = presence.leave(&UserId::from("u1"));
        assert!(snapshot.is_empty());
        assert!(!presence.is_online(&UserId::from("u1")));
    }

    #[test]
    fn second_tab_does_not_change_snapshot() {
        let presence = PresenceRegistry::new();
        let first = presence.join(&UserId::from("u1"));
        let second = presence.join(&UserId::from("u1"));
        assert_eq!(first, second);
        assert_eq!(presence.online_count(), 1);
    }

    #[test]
    fn closing_one_of_two_tabs_keeps_user_online() {
        let presence = PresenceRegistry::new();
        let _ = presence.join(&UserId::from("u1"));
        let _ = presence.join(&UserId::from("u1"));

        let snapshot = presence.leave(&UserId::from("u1"));
        assert_eq!(snapshot, vec![UserId::from("u1")]);
        assert!(presence.is_online(&UserId::from("u1")));

        let snapshot = presence.leave(&UserId::from("u1"));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn leave_without_join_is_noop() {
        let presence = PresenceRegistry::new();
        let snapshot = presence.leave(&UserId::from("ghost"));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn snapshot_is_sorted() {
        let presence = PresenceRegistry::new();
        let _ = presence.join(&UserId::from("zeta"));
        let _ = presence.join(&UserId::from("alpha"));
        let _ = presence.join(&UserId::from("mid"));
        let snapshot = presence.snapshot();
        assert_eq!(
            snapshot,
            vec![UserId::from("alpha"), UserId::from("mid"), UserId::from("zeta")]
        );
    }

    #[test]
    fn concurrent_joins_and_leaves_balance() {
        use std::sync::Arc;
        let presence = Arc::new(PresenceRegistry::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let presence = presence.clone();
            handles.push(std::thread::spawn(move || {
                let user = UserId::from(format!("u{}", i % 2));
                for _ in 0..100 {
                    let _ = presence.join(&user);
                    let _ = presence.leave(&user);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(presence.online_count(), 0);
    }

    proptest! {
        // After any interleaving of joins and leaves, a user is online
        // exactly when they have more joins than leaves so far.
        #[test]
        fn refcount_invariant(ops in proptest::collection::vec((0..3usize, any::<bool>()), 0..64)) {
            let presence = PresenceRegistry::new();
            let mut counts = [0i64; 3];
            for (user, is_join) in ops {
                let id = UserId::from(format!("u{user}"));
                if is_join {
                    let _ = presence.join(&id);
                    counts[user] += 1;
                } else if counts[user] > 0 {
                    let _ = presence.leave(&id);
                    counts[user] -= 1;
                }
            }
            for (user, count) in counts.iter().enumerate() {
                let id = UserId::from(format!("u{user}"));
                prop_assert_eq!(presence.is_online(&id), *count > 0);
            }
        }
    }
}
