use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::{presence::PresenceStore, types::ServerEvent};

/// Outbound queue capacity per connection. Best-effort events are dropped
/// once a connection falls this far behind.
pub const OUTBOUND_BUFFER: usize = 256;

pub type WsSender = mpsc::Sender<ServerEvent>;

/// How hard to try when fanning an event out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Drop the event for any recipient whose outbound queue is full or
    /// gone. A stale typing indicator is worse than a missed one.
    BestEffort,
    /// Wait for queue capacity on every currently-subscribed recipient.
    Reliable,
}

struct ConnectionHandle {
    user_id: Uuid,
    tx: WsSender,
}

/// Registry of open sockets, their room memberships and presence state.
/// Process-local by design; scaling past one server process means backing
/// this with a shared store.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    connections: DashMap<Uuid, ConnectionHandle>,
    rooms: DashMap<Uuid, HashSet<Uuid>>,
    presence: PresenceStore,
}

impl ConnectionManager {
    pub fn new(presence: PresenceStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                connections: DashMap::new(),
                rooms: DashMap::new(),
                presence,
            }),
        }
    }

    /// Register an open socket. Returns true when its user came online.
    pub fn register(&self, connection_id: Uuid, user_id: Uuid, tx: WsSender) -> bool {
        self.inner
            .connections
            .insert(connection_id, ConnectionHandle { user_id, tx });
        self.inner.presence.connect(user_id, connection_id)
    }

    /// Drop a socket and every room membership it held. Returns true when
    /// its user went offline.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        let Some((_, handle)) = self.inner.connections.remove(&connection_id) else {
            return false;
        };
        for mut room in self.inner.rooms.iter_mut() {
            room.value_mut().remove(&connection_id);
        }
        self.inner.rooms.retain(|_, members| !members.is_empty());
        self.inner.presence.disconnect(handle.user_id, connection_id)
    }

    /// Admit a connection into a conversation's broadcast group. Membership
    /// is fan-out state only; it grants no write rights.
    pub fn join_room(&self, conversation_id: Uuid, connection_id: Uuid) {
        self.inner
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(connection_id);
    }

    /// Leaving a room never joined is a no-op, not an error.
    pub fn leave_room(&self, conversation_id: Uuid, connection_id: Uuid) {
        if let Some(mut members) = self.inner.rooms.get_mut(&conversation_id) {
            members.remove(&connection_id);
        }
    }

    pub fn room_size(&self, conversation_id: Uuid) -> usize {
        self.inner
            .rooms
            .get(&conversation_id)
            .map_or(0, |members| members.len())
    }

    /// Fan an event out to every connection in the room, optionally
    /// excluding the originating connection.
    pub async fn broadcast_room(
        &self,
        conversation_id: Uuid,
        exclude: Option<Uuid>,
        delivery: Delivery,
        event: ServerEvent,
    ) {
        // Snapshot the recipients before awaiting anything; no map guard
        // may be held across a suspension point.
        let targets: Vec<WsSender> = {
            let Some(members) = self.inner.rooms.get(&conversation_id) else {
                return;
            };
            members
                .iter()
                .filter(|id| Some(**id) != exclude)
                .filter_map(|id| self.inner.connections.get(id).map(|h| h.tx.clone()))
                .collect()
        };

        dispatch(targets, delivery, event).await;
    }

    /// Fan an event out to every open connection (presence transitions).
    pub async fn broadcast_all(&self, event: ServerEvent) {
        let targets: Vec<WsSender> = self
            .inner
            .connections
            .iter()
            .map(|entry| entry.tx.clone())
            .collect();

        dispatch(targets, Delivery::Reliable, event).await;
    }
}

async fn dispatch(targets: Vec<WsSender>, delivery: Delivery, event: ServerEvent) {
    for tx in targets {
        match delivery {
            Delivery::BestEffort => {
                // A slow or closed connection simply misses the event.
                let _ = tx.try_send(event.clone());
            }
            Delivery::Reliable => {
                if tx.send(event.clone()).await.is_err() {
                    tracing::debug!("dropping event for closed connection");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing_event() -> ServerEvent {
        ServerEvent::UserTyping {
            user_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_room_members_only() {
        let manager = ConnectionManager::new(PresenceStore::new());
        let room = Uuid::new_v4();

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        manager.register(a, Uuid::new_v4(), tx_a);
        manager.register(b, Uuid::new_v4(), tx_b);
        manager.join_room(room, a);
        // b never joins

        manager
            .broadcast_room(room, None, Delivery::Reliable, typing_event())
            .await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_can_exclude_the_origin() {
        let manager = ConnectionManager::new(PresenceStore::new());
        let room = Uuid::new_v4();

        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        manager.register(a, Uuid::new_v4(), tx_a);
        manager.register(b, Uuid::new_v4(), tx_b);
        manager.join_room(room, a);
        manager.join_room(room, b);

        manager
            .broadcast_room(room, Some(a), Delivery::Reliable, typing_event())
            .await;

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn best_effort_drops_for_a_backlogged_connection() {
        let manager = ConnectionManager::new(PresenceStore::new());
        let room = Uuid::new_v4();

        let (tx, mut rx) = mpsc::channel(1);
        let conn = Uuid::new_v4();
        manager.register(conn, Uuid::new_v4(), tx);
        manager.join_room(room, conn);

        // Fill the queue, then fan out best-effort twice more; neither may
        // block and both are dropped.
        manager
            .broadcast_room(room, None, Delivery::BestEffort, typing_event())
            .await;
        manager
            .broadcast_room(room, None, Delivery::BestEffort, typing_event())
            .await;
        manager
            .broadcast_room(room, None, Delivery::BestEffort, typing_event())
            .await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "overflow events were dropped");
    }

    #[tokio::test]
    async fn reliable_delivery_waits_for_capacity() {
        let manager = ConnectionManager::new(PresenceStore::new());
        let room = Uuid::new_v4();

        let (tx, mut rx) = mpsc::channel(1);
        let conn = Uuid::new_v4();
        manager.register(conn, Uuid::new_v4(), tx);
        manager.join_room(room, conn);

        let drain = tokio::spawn(async move {
            let mut received = 0;
            while rx.recv().await.is_some() {
                received += 1;
                if received == 3 {
                    break;
                }
            }
            received
        });

        for _ in 0..3 {
            manager
                .broadcast_room(
                    room,
                    None,
                    Delivery::Reliable,
                    ServerEvent::UserStoppedTyping {
                        user_id: Uuid::new_v4(),
                        conversation_id: room,
                    },
                )
                .await;
        }

        assert_eq!(drain.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn leave_of_a_room_never_joined_is_a_no_op() {
        let manager = ConnectionManager::new(PresenceStore::new());
        let room = Uuid::new_v4();

        let (tx, mut rx) = mpsc::channel(8);
        let conn = Uuid::new_v4();
        manager.register(conn, Uuid::new_v4(), tx);

        manager.leave_room(room, conn);
        manager.leave_room(Uuid::new_v4(), conn);

        assert_eq!(manager.room_size(room), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_clears_room_memberships() {
        let manager = ConnectionManager::new(PresenceStore::new());
        let room = Uuid::new_v4();
        let user = Uuid::new_v4();

        let (tx, _rx) = mpsc::channel(8);
        let conn = Uuid::new_v4();
        assert!(manager.register(conn, user, tx));
        manager.join_room(room, conn);
        assert_eq!(manager.room_size(room), 1);

        assert!(manager.unregister(conn), "last connection -> offline");
        assert_eq!(manager.room_size(room), 0);
    }
}
