//! Process-wide engine state: the nickname registry, the channel map,
//! the live-client set, and the shutdown flag.
//!
//! Lock ordering, to be respected by every caller: `registered` before
//! `channels` before any per-channel lock before any per-client field
//! lock. The live-set lock is a peer and is never held while taking one
//! of the others. Every guard here is a `std::sync::Mutex` and no guard
//! is ever held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::channel::Channel;
use super::client::Client;

/// The engine-wide kill flag. Once triggered it never clears; every loop
/// in the process observes it and drains out.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set; immediately if it already is.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct Registry {
    registered: Mutex<HashMap<String, Arc<Client>>>,
    channels: Mutex<HashMap<String, Arc<Channel>>>,
    clients: Mutex<HashMap<u64, Arc<Client>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Nicknames ────────────────────────────────────────────────

    /// Install `nick` as the client's nickname. Fails only when another
    /// client currently holds it; re-claiming one's own nickname
    /// succeeds. The old binding, if any, is dropped atomically with the
    /// new installation.
    pub fn register_nick(&self, client: &Arc<Client>, nick: &str) -> bool {
        let mut registered = self.registered.lock().unwrap();

        if let Some(holder) = registered.get(nick) {
            if !Arc::ptr_eq(holder, client) {
                return false;
            }
        }

        if let Some(old) = client.nick() {
            if old != nick {
                registered.remove(&old);
            }
        }

        registered.insert(nick.to_owned(), Arc::clone(client));
        client.set_nick(nick.to_owned());
        true
    }

    /// Drop the client's nickname binding, if it is still theirs.
    pub fn unregister(&self, client: &Client) {
        if let Some(nick) = client.nick() {
            let mut registered = self.registered.lock().unwrap();
            if registered.get(&nick).is_some_and(|c| c.id() == client.id()) {
                registered.remove(&nick);
            }
        }
    }

    pub fn lookup_nick(&self, nick: &str) -> Option<Arc<Client>> {
        self.registered.lock().unwrap().get(nick).cloned()
    }

    pub fn registered_count(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    // ── Channels ─────────────────────────────────────────────────

    /// Join `client` to the named channel, creating it with `nick` as
    /// operator when absent. Returns `None` when the nick is banned
    /// there. Lookup-or-create and the membership insert are one
    /// critical section on the channel map, so a join can never land in
    /// a channel that a concurrent teardown has already unmapped, and an
    /// empty channel is never observable.
    pub fn join_channel(&self, name: &str, client: &Arc<Client>, nick: &str) -> Option<Arc<Channel>> {
        let mut channels = self.channels.lock().unwrap();
        match channels.get(name) {
            Some(channel) => {
                if channel.is_banned(nick) {
                    return None;
                }
                channel.add_member(client);
                Some(Arc::clone(channel))
            }
            None => {
                let channel = Arc::new(Channel::new(name, nick));
                channel.add_member(client);
                channels.insert(name.to_owned(), Arc::clone(&channel));
                Some(channel)
            }
        }
    }

    /// Remove the channel from the map if its member set has emptied.
    /// Re-checks emptiness under the map lock, so a concurrent join
    /// either lands before the removal or finds the channel gone.
    pub fn drop_channel_if_empty(&self, channel: &Arc<Channel>) {
        let mut channels = self.channels.lock().unwrap();
        if channel.is_empty() {
            if let Some(current) = channels.get(channel.name()) {
                if Arc::ptr_eq(current, channel) {
                    channels.remove(channel.name());
                }
            }
        }
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.lock().unwrap().get(name).cloned()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    // ── Live clients ─────────────────────────────────────────────

    pub fn insert_client(&self, client: &Arc<Client>) {
        self.clients.lock().unwrap().insert(client.id(), Arc::clone(client));
    }

    pub fn remove_client(&self, id: u64) {
        self.clients.lock().unwrap().remove(&id);
    }

    pub fn live_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}
