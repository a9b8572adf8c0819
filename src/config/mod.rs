//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::time::DEFAULT_TICK_RATE;

/// Highest accepted simulation rate
pub const MAX_TICK_RATE: u32 = 240;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// Allowed client origins for CORS, comma-separated
    pub client_origin: String,

    /// Scheduler ticks per second
    pub tick_rate: u32,
    /// Seats per room
    pub max_room_players: usize,
    /// Frames buffered per connection before new ones are dropped
    pub outbox_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3003".to_string()),
        };

        let tick_rate: u32 = parse_or(&lookup, "TICK_RATE", DEFAULT_TICK_RATE)?;
        if !(1..=MAX_TICK_RATE).contains(&tick_rate) {
            return Err(ConfigError::Invalid {
                key: "TICK_RATE",
                reason: format!("must be between 1 and {MAX_TICK_RATE}"),
            });
        }

        let max_room_players: usize = parse_or(&lookup, "MAX_ROOM_PLAYERS", 2)?;
        if max_room_players < 2 {
            return Err(ConfigError::Invalid {
                key: "MAX_ROOM_PLAYERS",
                reason: "a match needs at least 2 players".to_string(),
            });
        }

        let outbox_capacity: usize = parse_or(&lookup, "OUTBOX_CAPACITY", 64)?;
        if outbox_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "OUTBOX_CAPACITY",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3003".to_string()),
            tick_rate,
            max_room_players,
            outbox_capacity,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("could not parse {raw:?}"),
        }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_addr.to_string(), "0.0.0.0:3003");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_room_players, 2);
        assert_eq!(config.outbox_capacity, 64);
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = config_from(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            config_from(&[("TICK_RATE", "0")]),
            Err(ConfigError::Invalid { key: "TICK_RATE", .. })
        ));
        assert!(matches!(
            config_from(&[("TICK_RATE", "fast")]),
            Err(ConfigError::Invalid { key: "TICK_RATE", .. })
        ));
        assert!(matches!(
            config_from(&[("MAX_ROOM_PLAYERS", "1")]),
            Err(ConfigError::Invalid { key: "MAX_ROOM_PLAYERS", .. })
        ));
        assert!(matches!(
            config_from(&[("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress)
        ));
    }
}
