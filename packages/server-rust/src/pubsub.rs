//! Pub/sub channel registry: channel name -> subscriber client ids.
//!
//! Kept separate from [`crate::session::ClientRegistry`] so publish can go
//! straight to the subscriber set for a channel instead of scanning every
//! connected client.

use std::collections::HashMap;

use bytes::Bytes;

use crate::session::ClientId;

/// Maps channel name to the set of client ids subscribed to it.
#[derive(Default)]
pub struct PubSubRegistry {
    channels: HashMap<Bytes, Vec<ClientId>>,
}

impl PubSubRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `client` to `channel`. Idempotent.
    pub fn subscribe(&mut self, channel: Bytes, client: ClientId) {
        let subscribers = self.channels.entry(channel).or_default();
        if !subscribers.contains(&client) {
            subscribers.push(client);
        }
    }

    /// Unsubscribes `client` from `channel`. Drops the channel entry
    /// entirely once its last subscriber leaves.
    pub fn unsubscribe(&mut self, channel: &[u8], client: ClientId) {
        if let Some(subscribers) = self.channels.get_mut(channel) {
            subscribers.retain(|&id| id != client);
            if subscribers.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    /// Removes `client` from every channel it was subscribed to. Called on
    /// client teardown (disconnect, error, or reap).
    pub fn unsubscribe_all(&mut self, client: ClientId) {
        self.channels.retain(|_, subscribers| {
            subscribers.retain(|&id| id != client);
            !subscribers.is_empty()
        });
    }

    /// The subscriber ids for `channel`, or an empty slice if none.
    #[must_use]
    pub fn subscribers(&self, channel: &[u8]) -> &[ClientId] {
        self.channels.get(channel).map_or(&[], Vec::as_slice)
    }

    /// Number of subscribers currently on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &[u8]) -> usize {
        self.subscribers(channel).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn subscribe_and_publish_count() {
        let mut reg = PubSubRegistry::new();
        reg.subscribe(ch("news"), 1);
        reg.subscribe(ch("news"), 2);
        assert_eq!(reg.subscriber_count(b"news"), 2);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut reg = PubSubRegistry::new();
        reg.subscribe(ch("news"), 1);
        reg.subscribe(ch("news"), 1);
        assert_eq!(reg.subscriber_count(b"news"), 1);
    }

    #[test]
    fn unsubscribe_removes_empty_channel() {
        let mut reg = PubSubRegistry::new();
        reg.subscribe(ch("news"), 1);
        reg.unsubscribe(b"news", 1);
        assert_eq!(reg.subscriber_count(b"news"), 0);
        assert!(reg.channels.is_empty());
    }

    #[test]
    fn unsubscribe_all_clears_every_channel() {
        let mut reg = PubSubRegistry::new();
        reg.subscribe(ch("a"), 1);
        reg.subscribe(ch("b"), 1);
        reg.subscribe(ch("b"), 2);
        reg.unsubscribe_all(1);
        assert_eq!(reg.subscriber_count(b"a"), 0);
        assert_eq!(reg.subscriber_count(b"b"), 1);
    }
}
