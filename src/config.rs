//! Controller configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Default POF control channel port.
pub const DEFAULT_PORT: u16 = 6633;

/// Listener and runtime configuration.
#[derive(Debug, Clone)]
pub struct PofConfig {
    /// Address to bind the control channel listener to.
    pub address: IpAddr,
    /// TCP port to listen on.
    pub port: u16,
    /// Database snapshot to load before accepting connections, and to write on request.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for PofConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            snapshot_path: None,
        }
    }
}

/// Timeouts and intervals used by the connection machinery.
#[derive(Debug, Copy, Clone)]
pub struct Timeouts {
    /// Interval between keepalive ECHO_REQUESTs once a switch has reported its resources.
    pub echo_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            echo_interval: Duration::from_secs(2),
        }
    }
}
