//! Connection Registry
//!
//! Authoritative record of which user is connected and which connections
//! are subscribed to which chat. Both maps live behind one lock; every
//! composite update is a single write section.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::connection::{ConnectionHandle, ConnectionId};
use crate::domain::{ChatId, UserId};

#[derive(Default)]
struct RegistryState {
    /// Current connection per user
    users: HashMap<UserId, Arc<ConnectionHandle>>,
    /// Subscribers per chat, keyed by user
    chats: HashMap<ChatId, HashMap<UserId, Arc<ConnectionHandle>>>,
    /// Reverse index of `chats`
    subscriptions: HashMap<UserId, HashSet<ChatId>>,
}

impl RegistryState {
    fn detach_chats(&mut self, user_id: UserId) {
        let Some(chat_ids) = self.subscriptions.remove(&user_id) else {
            return;
        };
        for chat_id in chat_ids {
            if let Some(subscribers) = self.chats.get_mut(&chat_id) {
                subscribers.remove(&user_id);
                if subscribers.is_empty() {
                    self.chats.remove(&chat_id);
                }
            }
        }
    }
}

/// User and chat subscription maps.
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `conn` the user's current connection.
    ///
    /// A previous connection for the same user is detached from every chat
    /// and closed before the new one is inserted, and is returned.
    pub(crate) fn add_connection(&self, conn: Arc<ConnectionHandle>) -> Option<Arc<ConnectionHandle>> {
        let user_id = conn.user_id();
        let mut state = self.state.write();

        let previous = state.users.remove(&user_id);
        if let Some(old) = &previous {
            state.detach_chats(user_id);
            old.close();
        }
        state.users.insert(user_id, conn);

        previous
    }

    /// Subscribe the user's current connection to each chat.
    ///
    /// Idempotent. Does nothing for users who are not connected. Returns how
    /// many subscriptions were new.
    pub(crate) fn subscribe_to_chats(&self, user_id: UserId, chat_ids: &[ChatId]) -> usize {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(conn) = state.users.get(&user_id) else {
            return 0;
        };

        let subscriptions = state.subscriptions.entry(user_id).or_default();
        let mut added = 0;
        for chat_id in chat_ids {
            let subscribers = state.chats.entry(chat_id.clone()).or_default();
            if subscribers.insert(user_id, Arc::clone(conn)).is_none() {
                added += 1;
            }
            subscriptions.insert(chat_id.clone());
        }

        if subscriptions.is_empty() {
            state.subscriptions.remove(&user_id);
        }

        added
    }

    /// Remove the connection if it is still the user's current one.
    ///
    /// The user entry and every chat subscription go in the same write
    /// section, and the connection is closed before the lock is released.
    /// A stale id (the user reconnected since) is a no-op.
    pub(crate) fn remove_connection(
        &self,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Option<Arc<ConnectionHandle>> {
        let mut state = self.state.write();

        match state.users.get(&user_id) {
            Some(current) if current.id() == connection_id => {}
            _ => return None,
        }

        let conn = state.users.remove(&user_id)?;
        state.detach_chats(user_id);
        conn.close();

        Some(conn)
    }

    /// Remove and close every connection.
    pub(crate) fn drain(&self) -> Vec<Arc<ConnectionHandle>> {
        let mut state = self.state.write();
        state.chats.clear();
        state.subscriptions.clear();

        let drained: Vec<_> = state.users.drain().map(|(_, conn)| conn).collect();
        for conn in &drained {
            conn.close();
        }
        drained
    }

    /// Snapshot of a chat's current subscribers.
    pub fn subscribers_of(&self, chat_id: &ChatId) -> Vec<Arc<ConnectionHandle>> {
        self.state
            .read()
            .chats
            .get(chat_id)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn connection_of(&self, user_id: UserId) -> Option<Arc<ConnectionHandle>> {
        self.state.read().users.get(&user_id).cloned()
    }

    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.state.read().users.contains_key(&user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.state.read().users.len()
    }

    /// Chats the user's current connection is subscribed to.
    pub fn subscriptions_of(&self, user_id: UserId) -> HashSet<ChatId> {
        self.state
            .read()
            .subscriptions
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Check that every subscriber is its user's current connection and
    /// that the reverse index matches the chat map.
    pub fn is_consistent(&self) -> bool {
        let state = self.state.read();

        let forward_ok = state.chats.iter().all(|(chat_id, subscribers)| {
            !subscribers.is_empty()
                && subscribers.iter().all(|(user_id, conn)| {
                    conn.user_id() == *user_id
                        && state
                            .users
                            .get(user_id)
                            .is_some_and(|current| Arc::ptr_eq(current, conn))
                        && state
                            .subscriptions
                            .get(user_id)
                            .is_some_and(|chats| chats.contains(chat_id))
                })
        });

        let reverse_ok = state.subscriptions.iter().all(|(user_id, chat_ids)| {
            state.users.contains_key(user_id)
                && chat_ids.iter().all(|chat_id| {
                    state
                        .chats
                        .get(chat_id)
                        .is_some_and(|subscribers| subscribers.contains_key(user_id))
                })
        });

        forward_ok && reverse_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn connect(registry: &Registry, user_id: UserId) -> Arc<ConnectionHandle> {
        let (conn, _outbox) = ConnectionHandle::new(user_id, 8);
        registry.add_connection(conn.clone());
        conn
    }

    #[test]
    fn test_add_does_not_subscribe() {
        let registry = Registry::new();
        let user = UserId::new();
        connect(&registry, user);

        assert!(registry.is_connected(user));
        assert!(registry.subscriptions_of(user).is_empty());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = Registry::new();
        let user = UserId::new();
        let chat = ChatId::new("c1");
        connect(&registry, user);

        assert_eq!(registry.subscribe_to_chats(user, &[chat.clone()]), 1);
        assert_eq!(registry.subscribe_to_chats(user, &[chat.clone(), chat.clone()]), 0);
        assert_eq!(registry.subscribers_of(&chat).len(), 1);
    }

    #[test]
    fn test_subscribe_ignores_offline_users() {
        let registry = Registry::new();
        let chat = ChatId::new("c1");
        assert_eq!(registry.subscribe_to_chats(UserId::new(), &[chat.clone()]), 0);
        assert!(registry.subscribers_of(&chat).is_empty());
    }

    #[test]
    fn test_supersede_detaches_and_closes_previous() {
        let registry = Registry::new();
        let user = UserId::new();
        let chat = ChatId::new("c1");

        let first = connect(&registry, user);
        registry.subscribe_to_chats(user, &[chat.clone()]);

        let second = connect(&registry, user);
        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert!(registry.subscribers_of(&chat).is_empty());
        assert!(Arc::ptr_eq(&registry.connection_of(user).unwrap(), &second));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_stale_remove_keeps_successor() {
        let registry = Registry::new();
        let user = UserId::new();
        let first = connect(&registry, user);
        let second = connect(&registry, user);

        assert!(registry.remove_connection(user, first.id()).is_none());
        assert!(registry.is_connected(user));

        assert!(registry.remove_connection(user, second.id()).is_some());
        assert!(!registry.is_connected(user));
        assert!(second.is_closed());
    }

    #[test]
    fn test_remove_clears_every_chat() {
        let registry = Registry::new();
        let user = UserId::new();
        let chats = [ChatId::new("a"), ChatId::new("b"), ChatId::new("c")];
        let conn = connect(&registry, user);
        registry.subscribe_to_chats(user, &chats);

        registry.remove_connection(user, conn.id());
        for chat in &chats {
            assert!(registry.subscribers_of(chat).is_empty());
        }
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_drain_closes_everything() {
        let registry = Registry::new();
        let conns: Vec<_> = (0..3).map(|_| connect(&registry, UserId::new())).collect();

        assert_eq!(registry.drain().len(), 3);
        assert_eq!(registry.connection_count(), 0);
        assert!(conns.iter().all(|c| c.is_closed()));
    }

    #[test]
    fn test_random_sequences_stay_consistent() {
        for seed in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let registry = Registry::new();
            let users: Vec<UserId> = (0..6).map(|_| UserId::new()).collect();
            let chats: Vec<ChatId> = (0..4).map(|i| ChatId::new(format!("chat-{i}"))).collect();
            let mut live: HashMap<UserId, Arc<ConnectionHandle>> = HashMap::new();

            for _ in 0..300 {
                let user = users[rng.random_range(0..users.len())];
                match rng.random_range(0..4) {
                    0 => {
                        live.insert(user, connect(&registry, user));
                    }
                    1 => {
                        let picked: Vec<ChatId> = chats
                            .iter()
                            .filter(|_| rng.random_bool(0.5))
                            .cloned()
                            .collect();
                        registry.subscribe_to_chats(user, &picked);
                    }
                    2 => {
                        if let Some(conn) = live.remove(&user) {
                            registry.remove_connection(user, conn.id());
                        }
                    }
                    _ => {
                        // late unregistration from an arbitrary old id
                        registry.remove_connection(user, 0);
                    }
                }
                assert!(registry.is_consistent(), "seed {seed} broke the registry");
            }

            assert_eq!(registry.connection_count(), live.len());
            for chat in &chats {
                for conn in registry.subscribers_of(chat) {
                    assert!(!conn.is_closed());
                }
            }
        }
    }
}
