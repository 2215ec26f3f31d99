//! Divine Grid - Entry Point
//!
//! Starts one session with the factions named on the command line and serves
//! it over HTTP and websocket until the process is stopped.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use divine_grid::agents::{DecisionProvider, EnrichmentService, HeuristicProvider, StaticEnrichment};
use divine_grid::core::config::GameConfig;
use divine_grid::core::error::{GameError, Result};
use divine_grid::llm::{LlmClient, LlmDecisionProvider, LlmEnrichment};
use divine_grid::session::SessionBuilder;
use divine_grid::transport::{self, ServerMessage};

#[derive(Parser, Debug)]
#[command(name = "divine-grid", about = "Serve a Divine Grid session")]
struct Args {
    /// TOML config file; unset fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Faction as `name` or `name:personality`, in turn order (2 to 4)
    #[arg(short, long = "faction", required = true)]
    factions: Vec<String>,

    /// Override the config seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the config listen address
    #[arg(long)]
    listen: Option<String>,

    /// Play every faction with the built-in heuristic, even if an LLM is configured
    #[arg(long)]
    offline: bool,
}

fn split_faction(arg: &str) -> (String, String) {
    match arg.split_once(':') {
        Some((name, seed)) => (name.trim().to_string(), seed.trim().to_string()),
        None => (arg.trim().to_string(), "a cautious ruler".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "divine_grid=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| GameError::Config(format!("bad listen address {}: {}", config.listen_addr, e)))?;

    let client = if args.offline {
        None
    } else {
        let client = LlmClient::from_env().ok();
        if client.is_none() {
            tracing::warn!("LLM_API_KEY not set - factions fall back to the heuristic");
        }
        client.map(Arc::new)
    };

    let enrichment: Arc<dyn EnrichmentService> = match &client {
        Some(client) => Arc::new(LlmEnrichment::new(client.clone())),
        None => Arc::new(StaticEnrichment::new()),
    };

    let mut builder = SessionBuilder::new(config).enrichment(enrichment);
    for arg in &args.factions {
        let (name, seed) = split_faction(arg);
        let provider: Arc<dyn DecisionProvider> = match &client {
            Some(client) => Arc::new(LlmDecisionProvider::new(client.clone())),
            None => Arc::new(HeuristicProvider::new()),
        };
        builder = builder.participant(name, seed, provider);
    }

    let running = builder.start()?;
    tracing::info!(
        session = %running.handle.id(),
        factions = args.factions.len(),
        llm = ?client.as_ref().map(|c| c.model()),
        "Divine Grid starting..."
    );

    let mut events = running.events;
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ServerMessage::GameOver { victory }) => tracing::info!(?victory, "game over"),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    transport::serve(addr, running.handle).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_faction() {
        assert_eq!(
            split_faction("Red:proud and loud"),
            ("Red".to_string(), "proud and loud".to_string())
        );
        assert_eq!(split_faction("Blue").0, "Blue");
    }

    #[test]
    fn test_args_require_factions() {
        assert!(Args::try_parse_from(["divine-grid"]).is_err());
        let args = Args::try_parse_from(["divine-grid", "-f", "Red", "-f", "Blue:sly", "--offline"]).unwrap();
        assert_eq!(args.factions.len(), 2);
        assert!(args.offline);
    }
}
