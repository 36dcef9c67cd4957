use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use voicemap::config::Config;
use voicemap::explorer::{ConversationExplorer, DiscoveryParams, ExplorerServices};
use voicemap::graph::ConversationGraph;
use voicemap::oracle::OpenAiOracle;
use voicemap::server::ViewerServer;
use voicemap::telephony::HammingVoiceClient;
use voicemap::transcribe::DeepgramTranscriber;

/// Map the decision tree of a voice AI agent by calling it.
#[derive(Debug, Parser)]
#[command(name = "voicemap", version, about)]
struct Args {
    /// Phone number of the target voice agent
    #[arg(long)]
    phone_number: String,

    /// Business domain of the target agent, e.g. "Air Conditioning and Plumbing company"
    #[arg(long)]
    business_type: String,

    /// Override the maximum exploration depth
    #[arg(long)]
    max_depth: Option<u32>,

    /// Override the maximum number of concurrent workers
    #[arg(long)]
    max_workers: Option<usize>,

    /// Skip starting the graph viewer endpoint
    #[arg(long, default_value_t = false)]
    no_viewer: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Voicemap starting..."
    );

    let mut exploration = config.exploration.clone();
    if let Some(max_depth) = args.max_depth {
        exploration.max_depth = max_depth;
    }
    if let Some(max_workers) = args.max_workers {
        exploration.max_workers = max_workers;
    }

    // Initialize collaborators
    let voice = match HammingVoiceClient::new(&config.hamming, &config.request).await {
        Ok(c) => {
            info!(base_url = %config.hamming.base_url, "Voice client initialized");
            Arc::new(c)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize voice client");
            return Err(e.into());
        }
    };

    let transcriber = match DeepgramTranscriber::new(&config.deepgram, &config.request) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!(error = %e, "Failed to initialize transcription client");
            return Err(e.into());
        }
    };

    let oracle = match OpenAiOracle::new(&config.openai, config.request.clone()) {
        Ok(c) => {
            info!(model = %config.openai.model, "Oracle client initialized");
            Arc::new(c)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize oracle client");
            return Err(e.into());
        }
    };

    let graph = Arc::new(ConversationGraph::new(
        exploration.node_similarity_threshold,
        exploration.response_similarity_threshold,
    ));

    // Optional read-only viewer for live visualization
    let viewer = if args.no_viewer {
        None
    } else {
        match ViewerServer::start(Arc::clone(&graph), &config.server.host, config.server.port).await
        {
            Ok(server) => {
                info!(addr = %server.addr(), "Graph viewer available at /api/graph");
                Some(server)
            }
            Err(e) => {
                error!(error = %e, "Failed to start graph viewer");
                return Err(e.into());
            }
        }
    };

    let recording_timeout = Duration::from_secs(config.hamming.recording_timeout_s);
    let explorer = ConversationExplorer::new(
        ExplorerServices {
            voice,
            transcriber,
            oracle,
            graph: Arc::clone(&graph),
        },
        DiscoveryParams {
            phone_number: args.phone_number,
            business_type: args.business_type,
            exploration,
            recording_timeout,
            shutdown_timeout: Duration::from_secs(60),
        },
    );

    let stats = match explorer.discover().await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "Discovery failed");
            return Err(e.into());
        }
    };

    info!(
        total_nodes = stats.total_nodes,
        terminal_nodes = stats.terminal_nodes,
        total_edges = stats.total_edges,
        max_depth_reached = stats.max_depth_reached,
        duration_s = stats.duration_secs(),
        "Discovery finished"
    );
    println!("{}", serde_json::to_string_pretty(&graph.snapshot())?);

    if let Some(viewer) = viewer {
        viewer.shutdown();
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        voicemap::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        voicemap::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
