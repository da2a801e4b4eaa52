//! Per-connection session state.
//!
//! A [`Client`] is shared between its own communicator task (which drains
//! the outbound queue and reads the socket) and every other task that
//! broadcasts to it or administers its channel membership. The queue is
//! the only way anyone else gets bytes onto this client's socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::channel::Channel;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub struct Client {
    id: u64,
    addr: SocketAddr,
    ip: String,
    alive: AtomicBool,
    nickname: Mutex<Option<String>>,
    channel: Mutex<Option<Arc<Channel>>>,
    outbox: mpsc::UnboundedSender<Arc<String>>,
}

impl Client {
    /// Build a client for a freshly accepted connection. The returned
    /// receiver is the communicator's end of the outbound queue.
    pub fn new(addr: SocketAddr) -> (Arc<Self>, mpsc::UnboundedReceiver<Arc<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            addr,
            ip: addr.ip().to_string(),
            alive: AtomicBool::new(true),
            nickname: Mutex::new(None),
            channel: Mutex::new(None),
            outbox: tx,
        });
        (client, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Peer IP as text, rendered once at accept time.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// One-way transition; idempotent.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Append a shared message to the outbound queue. Never blocks.
    pub fn enqueue(&self, message: Arc<String>) {
        let _ = self.outbox.send(message);
    }

    /// Convenience for single-recipient responses.
    pub fn reply(&self, message: impl Into<String>) {
        self.enqueue(Arc::new(message.into()));
    }

    pub fn nick(&self) -> Option<String> {
        self.nickname.lock().unwrap().clone()
    }

    pub(crate) fn set_nick(&self, nick: String) {
        *self.nickname.lock().unwrap() = Some(nick);
    }

    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.lock().unwrap().clone()
    }

    pub fn set_channel(&self, channel: Option<Arc<Channel>>) {
        *self.channel.lock().unwrap() = channel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    #[test]
    fn queue_preserves_enqueue_order() {
        let (client, mut rx) = Client::new(test_addr());
        client.reply("one");
        client.reply("two");
        client.reply("three");

        assert_eq!(*rx.try_recv().unwrap(), "one");
        assert_eq!(*rx.try_recv().unwrap(), "two");
        assert_eq!(*rx.try_recv().unwrap(), "three");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn mark_dead_is_one_way() {
        let (client, _rx) = Client::new(test_addr());
        assert!(client.is_alive());
        client.mark_dead();
        client.mark_dead();
        assert!(!client.is_alive());
    }

    #[test]
    fn ip_is_rendered_from_addr() {
        let (client, _rx) = Client::new(test_addr());
        assert_eq!(client.ip(), "127.0.0.1");
    }

    #[test]
    fn ids_are_unique() {
        let (a, _rx_a) = Client::new(test_addr());
        let (b, _rx_b) = Client::new(test_addr());
        assert_ne!(a.id(), b.id());
    }
}
