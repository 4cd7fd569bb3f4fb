use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub transport: TransportConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub struct CatalogConfig {
    /// Optional JSON file with code block definitions; built-in seed
    /// exercises are used when absent.
    pub path: Option<String>,
}

pub struct TransportConfig {
    pub ping_interval: Duration,
    pub liveness_timeout: Duration,
    pub poll_wait: Duration,
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
            catalog: CatalogConfig {
                path: env::var("CATALOG_PATH").ok(),
            },
            transport: TransportConfig {
                ping_interval: Duration::from_secs(parse_secs("PING_INTERVAL_SECS", 20)),
                liveness_timeout: Duration::from_secs(parse_secs("LIVENESS_TIMEOUT_SECS", 60)),
                poll_wait: Duration::from_secs(parse_secs("POLL_WAIT_SECS", 25)),
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

fn parse_secs(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
