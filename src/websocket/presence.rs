use std::collections::HashSet;

use dashmap::DashMap;
use uuid::Uuid;

/// Online bookkeeping: identity -> the set of its open connection ids.
///
/// Display-only state. It is never consulted for authorization, and a
/// process restart resets everyone to offline until they reconnect.
#[derive(Debug, Default)]
pub struct PresenceStore {
    online: DashMap<Uuid, HashSet<Uuid>>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an open connection. Returns true when this was the identity's
    /// offline -> online transition.
    pub fn connect(&self, user_id: Uuid, connection_id: Uuid) -> bool {
        let mut connections = self.online.entry(user_id).or_default();
        let was_offline = connections.is_empty();
        connections.insert(connection_id);
        was_offline
    }

    /// Drop a connection. Returns true when the identity's last connection
    /// closed, i.e. the online -> offline transition.
    pub fn disconnect(&self, user_id: Uuid, connection_id: Uuid) -> bool {
        let went_offline = match self.online.get_mut(&user_id) {
            Some(mut connections) => {
                connections.remove(&connection_id);
                connections.is_empty()
            }
            None => return false,
        };

        if went_offline {
            self.online.remove_if(&user_id, |_, connections| connections.is_empty());
        }

        went_offline
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online
            .get(&user_id)
            .map_or(false, |connections| !connections.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_fires_once_for_many_connections() {
        let presence = PresenceStore::new();
        let user = Uuid::new_v4();
        let connections: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();

        let transitions: Vec<bool> = connections
            .iter()
            .map(|c| presence.connect(user, *c))
            .collect();

        assert_eq!(
            transitions.iter().filter(|t| **t).count(),
            1,
            "exactly one online transition"
        );
        assert!(transitions[0]);
        assert!(presence.is_online(user));
    }

    #[test]
    fn offline_fires_once_when_the_last_connection_closes() {
        let presence = PresenceStore::new();
        let user = Uuid::new_v4();
        let connections: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();

        for c in &connections {
            presence.connect(user, *c);
        }

        let transitions: Vec<bool> = connections
            .iter()
            .map(|c| presence.disconnect(user, *c))
            .collect();

        assert_eq!(
            transitions.iter().filter(|t| **t).count(),
            1,
            "exactly one offline transition"
        );
        assert!(transitions[4]);
        assert!(!presence.is_online(user));
    }

    #[test]
    fn interleaved_connects_and_disconnects() {
        let presence = PresenceStore::new();
        let user = Uuid::new_v4();
        let (c1, c2, c3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert!(presence.connect(user, c1)); // offline -> online
        assert!(!presence.connect(user, c2));
        assert!(!presence.disconnect(user, c1)); // c2 still open
        assert!(!presence.connect(user, c3));
        assert!(!presence.disconnect(user, c2));
        assert!(presence.disconnect(user, c3)); // online -> offline

        // The cycle can start over.
        assert!(presence.connect(user, Uuid::new_v4()));
    }

    #[test]
    fn disconnect_of_unknown_identity_is_a_no_op() {
        let presence = PresenceStore::new();
        assert!(!presence.disconnect(Uuid::new_v4(), Uuid::new_v4()));
    }

    #[test]
    fn duplicate_connect_of_the_same_connection_is_idempotent() {
        let presence = PresenceStore::new();
        let user = Uuid::new_v4();
        let c = Uuid::new_v4();

        assert!(presence.connect(user, c));
        assert!(!presence.connect(user, c));
        assert!(presence.disconnect(user, c));
    }

    #[test]
    fn identities_are_tracked_independently() {
        let presence = PresenceStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(presence.connect(alice, Uuid::new_v4()));
        assert!(presence.connect(bob, Uuid::new_v4()));
        assert!(presence.is_online(alice));
        assert!(presence.is_online(bob));
    }
}
