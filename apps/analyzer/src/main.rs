use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use analyzer::analysis::{AnalysisPipeline, PdftoppmConverter, RandomIds};
use analyzer::client::PlatformClient;
use analyzer::config::Config;
use analyzer::llm_client::{self, LlmClient};
use analyzer::platform::local::LocalPlatform;
use analyzer::platform::{Identity, PlatformSlot};
use analyzer::routes::build_router;
use analyzer::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume analyzer v{}", env!("CARGO_PKG_VERSION"));

    // The client starts with no platform bound and waits for one to appear.
    let slot = Arc::new(PlatformSlot::empty());
    let client = Arc::new(PlatformClient::new(slot.clone(), config.readiness()));
    client.initialize();

    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (default model: {})", llm_client::DEFAULT_MODEL);

    let identity = Identity {
        uid: format!("local:{}", config.local_username),
        name: config.local_username.clone(),
        email: format!("{}@localhost", config.local_username),
    };
    let platform = LocalPlatform::open(&config.storage_root, identity, llm).await?;
    slot.install(platform);

    if client.wait_ready().await {
        info!("Platform ready");
    }

    let pipeline = Arc::new(AnalysisPipeline::new(
        &client,
        Arc::new(PdftoppmConverter::new(&config.pdftoppm_bin)),
        Arc::new(RandomIds),
    ));

    let state = AppState { client, pipeline };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS once a frontend origin is configured

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
