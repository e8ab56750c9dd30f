use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use bookit::app::build_router;
use bookit::config::AppConfig;
use bookit::db;
use bookit::services::notify::webhook::WebhookNotifier;
use bookit::services::notify::{NoopNotifier, Notifier};
use bookit::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.session_secret == "changeme" {
        tracing::warn!("SESSION_SECRET is not set, using the development default");
    }

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("sending booking notifications to {url}");
            Box::new(WebhookNotifier::new(url.clone()))
        }
        None => Box::new(NoopNotifier),
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
