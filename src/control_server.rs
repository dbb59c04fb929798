use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use crate::config::ControllerConfig;
use crate::messages::RouteRequest;
use crate::network::{DiscoveredTopology, TopologySource};
use crate::routing::{compute_routes, distance_report};
use crate::{RoutingError, SwitchId};

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
    pub request_id: String,
    pub data: Option<serde_json::Value>,
}

impl ControlResponse {
    fn ok(request_id: &Uuid, message: String, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                message,
                request_id: request_id.to_string(),
                data: Some(value),
            },
            Err(e) => Self::failure(request_id, format!("Failed to encode response: {}", e)),
        }
    }

    fn failure(request_id: &Uuid, message: String) -> Self {
        Self {
            success: false,
            message,
            request_id: request_id.to_string(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlCommand {
    pub command: String,
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DistancesArgs {
    anchor: SwitchId,
    #[serde(default)]
    request: RouteRequest,
}

/// Line-delimited JSON front end of the routing engine.
///
/// Holds no routing state: every command builds its own snapshot and graph,
/// so connections never contend on anything but the counters below.
pub struct ControlServer {
    config: ControllerConfig,
    topology: Option<Arc<dyn TopologySource>>,
    started_at: DateTime<Utc>,
    requests_served: AtomicU64,
}

impl ControlServer {
    pub fn new(config: ControllerConfig, topology: Option<Arc<dyn TopologySource>>) -> Self {
        Self {
            config,
            topology,
            started_at: Utc::now(),
            requests_served: AtomicU64::new(0),
        }
    }

    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let bind_addr = self.config.bind_addr();
        let listener = TcpListener::bind(bind_addr).await?;
        info!("Control server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    pub async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Control connection from {}", addr);
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_client(stream).await {
                            error!("Error handling control client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept control connection: {}", e);
                }
            }
        }
    }

    async fn handle_client(&self, mut stream: TcpStream) -> anyhow::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = Vec::new();
        let max_bytes = self.config.max_line_bytes;
        let limit = max_bytes as u64 + 1;

        loop {
            line.clear();
            let read = (&mut buf_reader).take(limit).read_until(b'\n', &mut line).await?;
            if read == 0 {
                break; // Connection closed
            }

            let terminated = line.last() == Some(&b'\n');
            let content = line.strip_suffix(b"\n").unwrap_or(&line[..]);

            // Size is checked on raw bytes, before any decoding or trimming.
            let response = if content.len() > max_bytes {
                if !terminated {
                    discard_line(&mut buf_reader).await?;
                }
                let id = Uuid::new_v4();
                warn!("[{}] Command exceeds {} bytes, ignored", id, max_bytes);
                ControlResponse::failure(&id, format!("Command exceeds {} bytes", max_bytes))
            } else {
                match std::str::from_utf8(content) {
                    Ok(text) if text.trim().is_empty() => continue,
                    Ok(text) => match serde_json::from_str::<ControlCommand>(text.trim()) {
                        Ok(command) => self.process_command(command).await,
                        Err(e) => ControlResponse::failure(
                            &Uuid::new_v4(),
                            format!("Invalid JSON command: {}", e),
                        ),
                    },
                    Err(e) => ControlResponse::failure(
                        &Uuid::new_v4(),
                        format!("Command is not valid UTF-8: {}", e),
                    ),
                }
            };

            let response_json = serde_json::to_string(&response)?;
            writer.write_all(format!("{}\n", response_json).as_bytes()).await?;
            writer.flush().await?;
        }

        Ok(())
    }

    pub async fn process_command(&self, command: ControlCommand) -> ControlResponse {
        let id = Uuid::new_v4();
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        debug!("[{}] Command '{}'", id, command.command);

        let response = match command.command.as_str() {
            "dijkstra" => self.dijkstra(&id, command.args).await,
            "distances" => self.distances(&id, command.args).await,
            "topology" => self.topology_snapshot(&id),
            "status" => self.status(&id),
            "help" => Self::help(&id),
            _ => ControlResponse::failure(&id, format!("Unknown command: {}", command.command)),
        };

        if !response.success {
            warn!("[{}] '{}' failed: {}", id, command.command, response.message);
        }
        response
    }

    async fn dijkstra(&self, id: &Uuid, args: Option<serde_json::Value>) -> ControlResponse {
        let request: RouteRequest = match parse_args(args) {
            Ok(request) => request,
            Err(message) => return ControlResponse::failure(id, message),
        };

        let topology = self.topology.clone();
        let outcome = self
            .run_blocking(move || {
                let snapshot = snapshot_for(topology.as_deref(), &request)?;
                compute_routes(&snapshot, &request)
            })
            .await;

        match outcome {
            Ok(routes) => {
                info!("[{}] Computed {} routes", id, routes.len());
                ControlResponse::ok(id, format!("Computed {} routes", routes.len()), routes)
            }
            Err(message) => ControlResponse::failure(id, message),
        }
    }

    async fn distances(&self, id: &Uuid, args: Option<serde_json::Value>) -> ControlResponse {
        let DistancesArgs { anchor, request } = match parse_args(args) {
            Ok(args) => args,
            Err(message) => return ControlResponse::failure(id, message),
        };

        let topology = self.topology.clone();
        let outcome = self
            .run_blocking(move || {
                let snapshot = snapshot_for(topology.as_deref(), &request)?;
                distance_report(&snapshot, &request, anchor)
            })
            .await;

        match outcome {
            Ok(report) => {
                ControlResponse::ok(id, format!("Distances from switch {}", anchor), report)
            }
            Err(message) => ControlResponse::failure(id, message),
        }
    }

    fn topology_snapshot(&self, id: &Uuid) -> ControlResponse {
        let Some(source) = &self.topology else {
            return ControlResponse::failure(
                id,
                "No topology source configured, topology is derived from each request".to_string(),
            );
        };
        match source.snapshot() {
            Ok(snapshot) => ControlResponse::ok(
                id,
                format!("{} switches, {} links", snapshot.switches.len(), snapshot.links.len()),
                snapshot,
            ),
            Err(e) => ControlResponse::failure(id, e.to_string()),
        }
    }

    fn status(&self, id: &Uuid) -> ControlResponse {
        let topology = self
            .topology
            .as_ref()
            .map_or_else(|| "derived from request".to_string(), |source| source.describe());

        ControlResponse::ok(
            id,
            "Status retrieved".to_string(),
            serde_json::json!({
                "started_at": self.started_at.to_rfc3339(),
                "uptime_seconds": (Utc::now() - self.started_at).num_seconds(),
                "requests_served": self.requests_served.load(Ordering::Relaxed),
                "topology": topology,
            }),
        )
    }

    fn help(id: &Uuid) -> ControlResponse {
        let commands = vec![
            ("dijkstra", "Compute gateways for every switch (args: route request)"),
            ("distances", "Shortest-path tree of one switch (args: {anchor, request})"),
            ("topology", "Show the current topology snapshot"),
            ("status", "Show server status"),
            ("help", "Show this help message"),
        ];

        ControlResponse::ok(id, "Available commands".to_string(), commands)
    }

    /// Runs a computation off the async workers, bounded by the configured timeout.
    /// A computation that times out is abandoned; nothing it produced is kept.
    async fn run_blocking<T, F>(&self, job: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, RoutingError> + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(job);
        let joined = match self.config.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => return Err(format!("Computation timed out after {:?}", limit)),
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("Computation aborted: {}", e)),
        }
    }
}

/// Skips the rest of the current line without buffering it.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

fn snapshot_for(
    source: Option<&dyn TopologySource>,
    request: &RouteRequest,
) -> Result<DiscoveredTopology, RoutingError> {
    match source {
        Some(source) => source.snapshot(),
        None => Ok(DiscoveredTopology::from_request(request)),
    }
}

fn parse_args<T: DeserializeOwned>(args: Option<serde_json::Value>) -> Result<T, String> {
    let args = args.ok_or_else(|| "Missing command arguments".to_string())?;
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))
}
