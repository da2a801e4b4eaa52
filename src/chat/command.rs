//! Command parsing and dispatch.
//!
//! A message starting with `/` is a command; anything else is chat text
//! for the issuer's current channel. Verbs match case-insensitively; a
//! verb that takes an argument is recognized by prefix followed by
//! end-of-message or a space, and the argument is the first
//! whitespace-delimited token after it. Every user-facing failure is a
//! response string queued back to the issuer, never an error anywhere
//! else.

use std::sync::Arc;

use super::client::Client;
use super::registry::Registry;
use super::server::broadcast;
use crate::config::{CHANNEL_NAME_MAX_LEN, MAX_MESSAGE_SIZE, NICK_MAX_LEN};

/// A parsed slash command. Argument slices borrow from the raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Quit,
    Connect,
    Ping,
    Nick(&'a str),
    Join(&'a str),
    Kick(&'a str),
    Mute(&'a str),
    Unmute(&'a str),
    Whois(&'a str),
    Unknown,
}

/// One inbound message, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Command(Command<'a>),
    Text(&'a str),
}

/// Match `message` against an argument-taking verb. Returns the first
/// token after the verb, or `""` when the verb stands alone — the
/// handlers turn an empty argument into their size-validation error.
fn match_verb<'a>(message: &'a str, verb: &str) -> Option<&'a str> {
    if message.len() < verb.len() || !message.is_char_boundary(verb.len()) {
        return None;
    }
    let (head, rest) = message.split_at(verb.len());
    if !head.eq_ignore_ascii_case(verb) {
        return None;
    }
    if rest.is_empty() {
        return Some("");
    }
    if !rest.starts_with(' ') {
        return None;
    }
    Some(rest.split_whitespace().next().unwrap_or(""))
}

pub fn parse(message: &str) -> Input<'_> {
    if !message.starts_with('/') {
        return Input::Text(message);
    }

    // Bare verbs match the whole message only.
    if message.eq_ignore_ascii_case("/quit") {
        return Input::Command(Command::Quit);
    }
    if message.eq_ignore_ascii_case("/connect") {
        return Input::Command(Command::Connect);
    }
    if message.eq_ignore_ascii_case("/ping") {
        return Input::Command(Command::Ping);
    }

    if let Some(arg) = match_verb(message, "/nick") {
        return Input::Command(Command::Nick(arg));
    }
    if let Some(arg) = match_verb(message, "/join") {
        return Input::Command(Command::Join(arg));
    }
    if let Some(arg) = match_verb(message, "/kick") {
        return Input::Command(Command::Kick(arg));
    }
    if let Some(arg) = match_verb(message, "/mute") {
        return Input::Command(Command::Mute(arg));
    }
    if let Some(arg) = match_verb(message, "/unmute") {
        return Input::Command(Command::Unmute(arg));
    }
    if let Some(arg) = match_verb(message, "/whois") {
        return Input::Command(Command::Whois(arg));
    }

    Input::Command(Command::Unknown)
}

// ── Validation ───────────────────────────────────────────────────

fn nickname_size_ok(nick: &str) -> bool {
    !nick.is_empty() && nick.len() <= NICK_MAX_LEN
}

fn nickname_chars_ok(nick: &str) -> bool {
    nick.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

fn channel_name_error(name: &str) -> Option<&'static str> {
    if name.is_empty() || name.len() > CHANNEL_NAME_MAX_LEN {
        return Some("Channel name size is invalid");
    }
    if !name.starts_with('#') && !name.starts_with('&') {
        return Some("Channels must start with either # or &");
    }
    if name.bytes().any(|b| b == b',' || b == 0x07 || b == b' ') {
        return Some("Channel name is not allowed");
    }
    None
}

// ── Dispatch ─────────────────────────────────────────────────────

/// Handle one inbound message from `client`. Purely synchronous: state
/// mutation and queued responses only, no I/O.
pub fn handle(message: &str, client: &Arc<Client>, registry: &Registry) {
    match parse(message) {
        Input::Text(text) => handle_text(text, client),
        Input::Command(command) => match command {
            Command::Quit => client.mark_dead(),
            Command::Connect => client.reply("Already connected!"),
            Command::Ping => client.reply("pong"),
            Command::Nick(arg) => handle_nick(arg, client, registry),
            Command::Join(arg) => handle_join(arg, client, registry),
            Command::Kick(arg) => handle_kick(arg, client, registry),
            Command::Mute(arg) => handle_mute(arg, client),
            Command::Unmute(arg) => handle_unmute(arg, client),
            Command::Whois(arg) => handle_whois(arg, client, registry),
            Command::Unknown => client.reply("Unknown command!"),
        },
    }
}

fn handle_nick(nick: &str, client: &Arc<Client>, registry: &Registry) {
    if !nickname_size_ok(nick) {
        client.reply("Nickname size is invalid");
        return;
    }
    if !nickname_chars_ok(nick) {
        client.reply("Nickname not allowed");
        return;
    }

    if registry.register_nick(client, nick) {
        client.reply("Nickname updated");
    } else {
        client.reply("Nickname not available");
    }
}

fn handle_join(name: &str, client: &Arc<Client>, registry: &Registry) {
    let Some(nick) = client.nick() else {
        client.reply("Identify yourself using /nick to be able to join a channel");
        return;
    };

    if let Some(error) = channel_name_error(name) {
        client.reply(error);
        return;
    }

    // Rejoining the current channel is a no-op; in particular it must
    // not tear the channel down through the leave path below.
    if let Some(current) = client.channel() {
        if current.name() == name {
            client.reply("Joined the channel!");
            return;
        }
    }

    let Some(channel) = registry.join_channel(name, client, &nick) else {
        client.reply("You are banned from this channel");
        return;
    };

    if let Some(previous) = client.channel() {
        previous.remove_member(client.id());
        registry.drop_channel_if_empty(&previous);
    }

    client.set_channel(Some(channel));
    client.reply("Joined the channel!");
}

fn handle_kick(nick: &str, client: &Arc<Client>, registry: &Registry) {
    let Some(channel) = client.channel() else {
        client.reply("You must be in a channel to kick someone");
        return;
    };
    let issuer = client.nick();
    if issuer.as_deref() != Some(channel.operator()) {
        client.reply("You must be the channel operator to kick someone");
        return;
    }
    if !nickname_size_ok(nick) {
        client.reply("Nickname size is invalid");
        return;
    }
    if issuer.as_deref() == Some(nick) {
        client.reply("You cant kick yourself");
        return;
    }

    let target = registry.lookup_nick(nick);
    let Some(target) = target.filter(|t| {
        t.channel().is_some_and(|ch| Arc::ptr_eq(&ch, &channel))
    }) else {
        client.reply("The user is not present");
        return;
    };

    channel.remove_member(target.id());
    target.set_channel(None);
    target.reply("You were kicked from the channel");
}

fn handle_mute(nick: &str, client: &Arc<Client>) {
    let Some(channel) = client.channel() else {
        client.reply("You must be in a channel to mute someone");
        return;
    };
    if client.nick().as_deref() != Some(channel.operator()) {
        client.reply("You must be the channel operator to mute someone");
        return;
    }
    if !nickname_size_ok(nick) {
        client.reply("Nickname size is invalid");
        return;
    }

    channel.mute(nick);
    client.reply(format!("The nick '{nick}' is now muted in the channel!"));
}

fn handle_unmute(nick: &str, client: &Arc<Client>) {
    let Some(channel) = client.channel() else {
        client.reply("You must be in a channel to unmute someone");
        return;
    };
    if client.nick().as_deref() != Some(channel.operator()) {
        client.reply("You must be the channel operator to unmute someone");
        return;
    }
    if !nickname_size_ok(nick) {
        client.reply("Nickname size is invalid");
        return;
    }

    channel.unmute(nick);
    client.reply(format!("The nick '{nick}' is now unmuted in the channel!"));
}

fn handle_whois(nick: &str, client: &Arc<Client>, registry: &Registry) {
    let Some(channel) = client.channel() else {
        client.reply("You must be in a channel to whois someone");
        return;
    };
    if client.nick().as_deref() != Some(channel.operator()) {
        client.reply("You must be the channel operator to whois someone");
        return;
    }
    if !nickname_size_ok(nick) {
        client.reply("Nickname size is invalid");
        return;
    }

    let target = registry.lookup_nick(nick);
    let Some(target) = target.filter(|t| {
        t.channel().is_some_and(|ch| Arc::ptr_eq(&ch, &channel))
    }) else {
        client.reply("The user is not present");
        return;
    };

    client.reply(target.ip().to_owned());
}

fn handle_text(text: &str, client: &Arc<Client>) {
    let Some(nick) = client.nick() else {
        client.reply("Identify yourself using /nick to be able to send a message");
        return;
    };
    let Some(channel) = client.channel() else {
        client.reply("You must join a channel using /join to send a message");
        return;
    };

    // Muted senders are dropped silently; nobody is told.
    if channel.is_muted(&nick) {
        return;
    }

    let prefix_len = nick.len() + 2;
    if prefix_len + text.len() <= MAX_MESSAGE_SIZE {
        broadcast(&channel, format!("{nick}: {text}"));
    } else {
        // Split so the first broadcast fills a whole wire message; both
        // halves carry the nickname prefix.
        let mut cut = MAX_MESSAGE_SIZE - prefix_len;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        broadcast(&channel, format!("{nick}: {}", &text[..cut]));
        broadcast(&channel, format!("{nick}: {}", &text[cut..]));
    }
}
