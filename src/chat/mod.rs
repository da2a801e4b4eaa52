//! The chat engine: transport codec, per-connection sessions, channels,
//! the process-wide registry, the command dispatcher, and the server and
//! console entry points built on top of them.

pub mod channel;
pub mod client;
pub mod codec;
pub mod command;
pub mod console;
pub mod registry;
pub mod server;
