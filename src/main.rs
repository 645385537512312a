use statemate::{AppState, api::routes::create_router, config::Config};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("statemate=info,tower_http=info")),
        )
        .init();

    // Load configuration; a missing secrets file stops startup here
    let config = Config::load()?;
    let server_addr = config.server_addr;

    let app_state = AppState::from_config(config)?;
    app_state.prepare_dirs().await?;

    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;
    info!(%server_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
