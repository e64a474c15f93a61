use api_relay::{build_router, AppState, RelayConfig, SharedLog};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "api-relay",
    about = "Backend relay for the browser client — face detection, weather, and chat",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Relay log file path
    #[arg(long, default_value = "api-relay.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = RelayConfig::find_and_load(cli.config.as_deref())?;

    if let Ok(port) = std::env::var("PORT") {
        config.port = port
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid PORT value: {}", port))?;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    // Resolve credentials eagerly so a missing key fails at startup, not on
    // the first relayed request.
    let credentials = config.resolve_credentials()?;

    let log = SharedLog::new(&cli.log_file)?;

    info!("api-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Face detect: {}", config.face.detect_url);
    info!("  Weather:     {}", config.weather.base_url);
    info!("  Chat:        {} (model {})", config.chat.completions_url, config.chat.model);
    info!("  Static dir:  {}", config.static_dir);
    info!("  Port:        {}", config.port);
    info!("  Log file:    {}", cli.log_file.display());

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let state = Arc::new(AppState {
        config: config.clone(),
        credentials,
        client,
        log,
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
