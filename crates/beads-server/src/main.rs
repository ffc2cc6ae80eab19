use beads_server::config::Settings;
use beads_server::{router, AppState};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting Beads API Server");

    let settings = Settings::new().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let app_state = AppState::connect(settings.clone()).await?;

    info!(
        ring_capacity = settings.hub.ring_capacity,
        subscriber_capacity = settings.hub.subscriber_capacity,
        "Event hub initialized"
    );

    let addr = format!("{}:{}", &settings.host, &settings.port);
    info!("Starting server on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router(app_state)).await?;

    Ok(())
}
