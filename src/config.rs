use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub listen_address: IpAddr,
    pub control_port: u16,
    /// JSON topology file; when absent the topology is derived from each request.
    pub topology_file: Option<PathBuf>,
    /// Upper bound for one routing computation, in milliseconds.
    pub request_timeout_ms: Option<u64>,
    /// Longest accepted command line on the control socket.
    pub max_line_bytes: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_port: 8080,
            topology_file: None,
            request_timeout_ms: Some(5_000),
            max_line_bytes: 1 << 20, // 1 MiB
        }
    }
}

impl ControllerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ControllerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.control_port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
