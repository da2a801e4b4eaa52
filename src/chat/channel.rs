//! Named multicast groups.
//!
//! A channel owns its member set plus the muted and banned nickname sets,
//! all behind one internal lock. The operator is the creator's nickname
//! and never changes for the channel's lifetime, even if that client
//! leaves or renames.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::client::Client;

pub struct Channel {
    name: String,
    operator: String,
    inner: Mutex<ChannelInner>,
}

#[derive(Default)]
struct ChannelInner {
    members: HashMap<u64, Arc<Client>>,
    muted: HashSet<String>,
    banned: HashSet<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator: operator.into(),
            inner: Mutex::new(ChannelInner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn add_member(&self, client: &Arc<Client>) {
        let mut inner = self.inner.lock().unwrap();
        inner.members.insert(client.id(), Arc::clone(client));
    }

    /// Returns whether the client was a member.
    pub fn remove_member(&self, id: u64) -> bool {
        self.inner.lock().unwrap().members.remove(&id).is_some()
    }

    pub fn is_member(&self, id: u64) -> bool {
        self.inner.lock().unwrap().members.contains_key(&id)
    }

    pub fn member_count(&self) -> usize {
        self.inner.lock().unwrap().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().members.is_empty()
    }

    /// Snapshot of the member list for broadcasting. The lock is released
    /// before the caller touches any per-client queue.
    pub fn members(&self) -> Vec<Arc<Client>> {
        self.inner.lock().unwrap().members.values().cloned().collect()
    }

    pub fn is_muted(&self, nick: &str) -> bool {
        self.inner.lock().unwrap().muted.contains(nick)
    }

    pub fn mute(&self, nick: &str) {
        self.inner.lock().unwrap().muted.insert(nick.to_owned());
    }

    pub fn unmute(&self, nick: &str) {
        self.inner.lock().unwrap().muted.remove(nick);
    }

    pub fn is_banned(&self, nick: &str) -> bool {
        self.inner.lock().unwrap().banned.contains(nick)
    }

    pub fn ban(&self, nick: &str) {
        self.inner.lock().unwrap().banned.insert(nick.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_client() -> Arc<Client> {
        let (client, _rx) = Client::new("127.0.0.1:9999".parse().unwrap());
        client
    }

    #[test]
    fn membership_round_trip() {
        let channel = Channel::new("#general", "alice");
        let member = test_client();

        assert!(channel.is_empty());
        channel.add_member(&member);
        assert!(channel.is_member(member.id()));
        assert_eq!(channel.member_count(), 1);

        assert!(channel.remove_member(member.id()));
        assert!(channel.is_empty());
        assert!(!channel.remove_member(member.id()));
    }

    #[test]
    fn add_member_twice_does_not_duplicate() {
        let channel = Channel::new("#general", "alice");
        let member = test_client();
        channel.add_member(&member);
        channel.add_member(&member);
        assert_eq!(channel.member_count(), 1);
    }

    #[test]
    fn mute_then_unmute_restores_prior_state() {
        let channel = Channel::new("#general", "alice");
        assert!(!channel.is_muted("bob"));

        channel.mute("bob");
        assert!(channel.is_muted("bob"));

        channel.unmute("bob");
        assert!(!channel.is_muted("bob"));
    }

    #[test]
    fn unmute_unknown_nick_is_a_no_op() {
        let channel = Channel::new("#general", "alice");
        channel.unmute("nobody");
        assert!(!channel.is_muted("nobody"));
    }

    #[test]
    fn ban_is_tracked_by_nick() {
        let channel = Channel::new("#general", "alice");
        channel.ban("mallory");
        assert!(channel.is_banned("mallory"));
        assert!(!channel.is_banned("bob"));
    }

    #[test]
    fn operator_is_fixed_at_creation() {
        let channel = Channel::new("#general", "alice");
        assert_eq!(channel.operator(), "alice");
        assert_eq!(channel.name(), "#general");
    }
}
