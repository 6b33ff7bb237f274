use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::room::{Throttle, EVENT_JOIN, EVENT_LEAVE, EVENT_UPDATE_CODE};

pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub throttle: ThrottleConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which room store backend this deployment runs against.
pub struct StoreConfig {
    /// "memory", "mongo" or "cache"
    pub backend: String,
    pub mongo_url: String,
    pub mongo_database: String,
    pub redis_url: String,
}

/// Minimum inter-call interval per coordinator entry point, in
/// milliseconds. Zero disables the guard for that entry point.
pub struct ThrottleConfig {
    pub join_ms: u64,
    pub update_code_ms: u64,
    pub leave_ms: u64,
}

impl ThrottleConfig {
    pub fn build(&self) -> Throttle {
        let mut windows = HashMap::new();
        windows.insert(EVENT_JOIN, Duration::from_millis(self.join_ms));
        windows.insert(EVENT_UPDATE_CODE, Duration::from_millis(self.update_code_ms));
        windows.insert(EVENT_LEAVE, Duration::from_millis(self.leave_ms));
        Throttle::new(windows)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
            },
            store: StoreConfig {
                backend: env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".to_string()),
                mongo_url: env::var("MONGODB_URL")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                mongo_database: env::var("MONGODB_DATABASE")
                    .unwrap_or_else(|_| "codeshare".to_string()),
                redis_url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            throttle: ThrottleConfig {
                join_ms: env_u64("THROTTLE_JOIN_MS", 0),
                update_code_ms: env_u64("THROTTLE_UPDATE_CODE_MS", 30),
                leave_ms: env_u64("THROTTLE_LEAVE_MS", 0),
            },
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_host(host: &str, port: u16) -> Config {
        Config {
            server: ServerConfig {
                host: host.to_string(),
                port,
            },
            store: StoreConfig {
                backend: "memory".to_string(),
                mongo_url: "mongodb://localhost:27017".to_string(),
                mongo_database: "codeshare".to_string(),
                redis_url: "redis://localhost:6379".to_string(),
            },
            throttle: ThrottleConfig {
                join_ms: 0,
                update_code_ms: 30,
                leave_ms: 0,
            },
        }
    }

    #[test]
    fn test_parse_localhost() {
        let config = config_with_host("localhost", 8080);
        assert_eq!(config.bind_address(), ([127, 0, 0, 1], 8080));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = config_with_host("192.168.1.1", 3000);
        assert_eq!(config.bind_address(), ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_all_interfaces() {
        let config = config_with_host("0.0.0.0", 8080);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 8080));
    }

    #[test]
    fn test_parse_empty_host() {
        let config = config_with_host("", 8080);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 8080));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = config_with_host("invalid-hostname", 9000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_throttle_config_builds_guarded_windows() {
        let config = config_with_host("localhost", 8080);
        let throttle = config.throttle.build();
        // join unguarded (zero window), update guarded
        assert!(throttle.allow(EVENT_JOIN));
        assert!(throttle.allow(EVENT_JOIN));
        assert!(throttle.allow(EVENT_UPDATE_CODE));
        assert!(!throttle.allow(EVENT_UPDATE_CODE));
    }
}
