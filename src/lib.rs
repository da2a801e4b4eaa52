//! Shoal — a small channel-based chat server and its line client.
//!
//! Many TCP clients connect to one server process, pick a nickname with
//! `/nick`, join a channel with `/join`, and exchange plain text that is
//! broadcast to everyone in the channel. The wire protocol is
//! deliberately primitive: one receive is one message, capped at
//! [`config::MAX_MESSAGE_SIZE`] bytes, with no framing header.

pub mod chat;
pub mod config;
