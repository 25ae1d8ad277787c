use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::internal::{api, policy::policy::RuleSet, skills};

const WORKSPACE_ENV: &str = "WARDEN_WORKSPACE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let workspace = std::env::var(WORKSPACE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("workspace"));
    std::fs::create_dir_all(&workspace)?;

    let registry = skills::builtin_registry(&workspace);
    let rules = RuleSet::load_from_env()?;
    tracing::info!(
        workspace = %workspace.display(),
        rules = rules.len(),
        "boundary configured"
    );

    let state = api::AppState::new(registry, rules);
    let app = api::create_router(state).layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], 7878));
    tracing::info!("warden API server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
