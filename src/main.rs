use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder;

use dijkstra_router::compute_routes;
use dijkstra_router::config::ControllerConfig;
use dijkstra_router::control_server::ControlServer;
use dijkstra_router::messages::RouteRequest;
use dijkstra_router::network::{DiscoveredTopology, FileTopology, TopologySource};

#[derive(Parser)]
#[command(name = "dijkstra_router", about = "Shortest-path gateway computation for SDN switches")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve routing computations on the control socket
    Serve {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        port: Option<u16>,

        /// Topology JSON file, re-read for every request
        #[arg(long)]
        topology: Option<PathBuf>,
    },
    /// Compute the routes of a request file once and print them as JSON
    Compute {
        #[arg(long)]
        request: PathBuf,

        #[arg(long)]
        topology: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Serve { config, port, topology } => serve(config, port, topology),
        Command::Compute { request, topology } => compute(request, topology),
    }
}

fn serve(config_path: Option<PathBuf>, port: Option<u16>, topology: Option<PathBuf>) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => ControllerConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    if let Some(port) = port {
        config.control_port = port;
    }
    if topology.is_some() {
        config.topology_file = topology;
    }

    let source: Option<Arc<dyn TopologySource>> = config
        .topology_file
        .clone()
        .map(|path| Arc::new(FileTopology::new(path)) as Arc<dyn TopologySource>);
    match &source {
        Some(source) => info!("Topology source: {}", source.describe()),
        None => info!("No topology source, deriving topology from each request"),
    }

    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let server = Arc::new(ControlServer::new(config, source));
        tokio::select! {
            result = server.start() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                Ok(())
            }
        }
    })
}

fn compute(request_path: PathBuf, topology_path: Option<PathBuf>) -> Result<()> {
    let content = std::fs::read_to_string(&request_path)
        .with_context(|| format!("reading request {}", request_path.display()))?;
    let request: RouteRequest = serde_json::from_str(&content)
        .with_context(|| format!("parsing request {}", request_path.display()))?;

    let topology = match topology_path {
        Some(path) => DiscoveredTopology::load_from_file(&path)
            .with_context(|| format!("loading topology {}", path.display()))?,
        None => DiscoveredTopology::from_request(&request),
    };

    let routes = compute_routes(&topology, &request)?;
    println!("{}", serde_json::to_string_pretty(&routes)?);
    Ok(())
}
