use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tailserve::{AppState, Config};

#[derive(Parser, Debug)]
#[command(name = "tailserve")]
#[command(about = "Serve a directory over HTTP with uploads, ranges and live log following")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "TAILSERVE_PORT", default_value = "8080")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, env = "TAILSERVE_BIND", default_value = "::")]
    bind: String,

    /// Root directory to serve files from
    #[arg(short, long, env = "TAILSERVE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, env = "TAILSERVE_VERBOSE")]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "TAILSERVE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tailserve=debug,tower_http=debug"
    } else {
        "tailserve=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    if !cli.root.is_dir() {
        return Err(format!("Root path is not a directory: {}", cli.root.display()).into());
    }

    // Containment checks compare against the canonical root
    let root_dir = cli.root.canonicalize()?;

    info!("Serving files from: {}", root_dir.display());

    let app = tailserve::app(AppState::with_config(root_dir, config));

    let addr: SocketAddr = SocketAddr::new(cli.bind.parse()?, cli.port);
    info!("Starting http server at {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
