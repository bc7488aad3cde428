mod config;
mod controllers;
mod models;
mod prelude;
mod repository;
mod result;

pub use crate::result::Result;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{error_handling::HandleErrorLayer, http::StatusCode, Router};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing_subscriber::EnvFilter;

use crate::config::Backend;
use crate::repository::database::DatabaseRepository;
use crate::repository::memory::MemoryRepository;
use crate::repository::populate::populate;
use crate::repository::GameRepository;

#[derive(Clone)]
pub struct AppState {
    repo: Arc<dyn GameRepository>,
}

#[tokio::main]
async fn main() -> Result {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "game_library=info,tower_http=warn".into()),
        )
        .init();

    let cfg = config::build()?;
    let repo = build_repository(&cfg).await?;

    let addr: SocketAddr = format!("{}:{}", cfg.server_host, cfg.server_port).parse()?;

    let state = AppState { repo };

    let session_service = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|_| async {
            return StatusCode::BAD_REQUEST;
        }))
        .layer(
            SessionManagerLayer::new(MemoryStore::default())
                .with_expiry(Expiry::OnSessionEnd)
                .with_secure(false)
                .with_same_site(SameSite::Lax),
        );

    let router = Router::new();

    // dynamic paths
    let router = controllers::add_routes(router);

    // static assets
    let router = router.nest_service("/assets", ServeDir::new("assets"));

    let router = router.with_state(state).layer(session_service);

    tracing::info!(%addr, "game library listening");
    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .await?;

    return Ok(());
}

async fn build_repository(cfg: &config::Config) -> Result<Arc<dyn GameRepository>> {
    return Ok(match cfg.backend {
        Backend::Memory => {
            tracing::info!("using in-memory repository");
            let repo = MemoryRepository::new();
            populate(&repo, &cfg.data_path).await?;
            Arc::new(repo)
        }
        Backend::Database => {
            tracing::info!(url = %cfg.database_url, "using database repository");
            let repo = DatabaseRepository::connect(&cfg.database_url).await?;
            // Seed only a fresh database; restarts keep existing data.
            if repo.game_count().await? == 0 {
                populate(&repo, &cfg.data_path).await?;
            }
            Arc::new(repo)
        }
    });
}
