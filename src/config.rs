//! Protocol constants and command-line configuration.

use std::time::Duration;

/// Hard cap on a single wire message, in bytes. Senders split longer
/// payloads; receivers never see more than this per message.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Nicknames are 1..=50 bytes of `[A-Za-z0-9._-]`.
pub const NICK_MAX_LEN: usize = 50;

/// Channel names are 1..=200 bytes, starting with `#` or `&`.
pub const CHANNEL_NAME_MAX_LEN: usize = 200;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 60332;

/// Budget for one attempt at flushing a message to a peer.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Consecutive timed-out attempts on the same message before the
/// connection is declared dead.
pub const MAX_SEND_TRIES: u32 = 5;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("port out of bounds: {0}")]
    PortOutOfBounds(String),
}

/// Where to listen (server) or connect to (client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    pub host: String,
    pub port: u16,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

impl NetConfig {
    /// Parse `[port [host]]` positional arguments, falling back to the
    /// defaults for anything missing.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config = NetConfig::default();

        if let Some(raw) = args.next() {
            let port = raw
                .parse::<i64>()
                .ok()
                .filter(|p| (0..=65535).contains(p))
                .ok_or(ConfigError::PortOutOfBounds(raw))?;
            config.port = port as u16;
        }

        if let Some(host) = args.next() {
            config.host = host;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_args_uses_defaults() {
        let config = NetConfig::from_args(args(&[])).unwrap();
        assert_eq!(config, NetConfig::default());
    }

    #[test]
    fn port_only() {
        let config = NetConfig::from_args(args(&["7000"])).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn port_and_host() {
        let config = NetConfig::from_args(args(&["7000", "0.0.0.0"])).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn port_out_of_bounds() {
        let err = NetConfig::from_args(args(&["65536"])).unwrap_err();
        assert_eq!(err, ConfigError::PortOutOfBounds("65536".into()));

        let err = NetConfig::from_args(args(&["-1"])).unwrap_err();
        assert_eq!(err, ConfigError::PortOutOfBounds("-1".into()));
    }

    #[test]
    fn port_not_a_number() {
        assert!(NetConfig::from_args(args(&["sixty"])).is_err());
    }

    #[test]
    fn port_boundaries_accepted() {
        assert_eq!(NetConfig::from_args(args(&["0"])).unwrap().port, 0);
        assert_eq!(NetConfig::from_args(args(&["65535"])).unwrap().port, 65535);
    }
}
