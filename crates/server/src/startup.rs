use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use configs::AppConfig;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::info;

use service::auth::mailer::{LogMailer, Mailer};
use service::auth::repo::seaorm::SeaOrmAuthRepository;
use service::auth::repository::AuthRepository;
use service::auth::{AuthConfig, AuthService};
use service::memory::MemoryStore;
use service::pagination::PageSettings;
use service::polls::repo::seaorm::SeaOrmPollRepository;
use service::polls::repository::PollRepository;
use service::polls::PollService;

use crate::errors::StartupError;
use crate::routes::{self, auth::ServerState};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Repositories for the configured store: in-process for `memory://`, PostgreSQL otherwise.
async fn build_repositories(
    cfg: &AppConfig,
) -> Result<(Arc<dyn AuthRepository>, Arc<dyn PollRepository>), StartupError> {
    if cfg.database.is_memory() {
        info!("using in-memory store");
        let store = Arc::new(MemoryStore::new());
        let auth: Arc<dyn AuthRepository> = store.clone();
        let polls: Arc<dyn PollRepository> = store;
        return Ok((auth, polls));
    }

    let db_cfg = models::db::DatabaseConfig::from(&cfg.database);
    let db = models::db::connect_with_config(&db_cfg)
        .await
        .map_err(|e| StartupError::Database(e.to_string()))?;
    if cfg.database.auto_migrate {
        migration::Migrator::up(&db, None)
            .await
            .map_err(|e| StartupError::Migration(e.to_string()))?;
        info!("migrations applied");
    }
    let auth: Arc<dyn AuthRepository> = Arc::new(SeaOrmAuthRepository::new(db.clone()));
    let polls: Arc<dyn PollRepository> = Arc::new(SeaOrmPollRepository::new(db));
    Ok((auth, polls))
}

/// Wire services for `cfg`, delivering mail through `mailer`.
pub async fn build_state(cfg: &AppConfig, mailer: Arc<dyn Mailer>) -> Result<ServerState, StartupError> {
    let (auth_repo, poll_repo) = build_repositories(cfg).await?;
    let auth = AuthService::new(auth_repo, mailer, AuthConfig::from_settings(&cfg.auth));
    Ok(ServerState {
        auth: Arc::new(auth),
        polls: Arc::new(PollService::new(poll_repo)),
        pages: PageSettings::from(&cfg.pagination),
        public_url: cfg.server.public_url.clone(),
    })
}

pub fn build_app(state: ServerState) -> Router {
    routes::build_router(state, build_cors())
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address: {e}")))
}

/// Public entry: build the app for `cfg` and serve it until the process stops.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&cfg, Arc::new(LogMailer)).await?;
    let app = build_app(state);

    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting polls api");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_url_needs_no_database() {
        let mut cfg = AppConfig::default();
        cfg.database.url = configs::MEMORY_DATABASE_URL.into();
        cfg.auth.secret = "s".into();
        let state = build_state(&cfg, Arc::new(LogMailer)).await.unwrap();
        assert_eq!(state.pages, PageSettings::default());
        assert!(state.public_url.is_none());
    }

    #[test]
    fn rejects_unparseable_host() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "not a host".into();
        assert!(matches!(bind_addr(&cfg), Err(StartupError::InvalidConfig(_))));
    }
}
