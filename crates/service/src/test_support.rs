#![cfg(test)]
use std::sync::Arc;

use tokio::sync::OnceCell;
use sea_orm::DatabaseConnection;
use migration::MigratorTrait;
use models::db::{connect_with_config, DatabaseConfig};

use crate::auth::password::HashCost;
use crate::auth::{mailer::RecordingMailer, AuthConfig, AuthService};
use crate::memory::MemoryStore;
use crate::polls::PollService;

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<bool> = OnceCell::const_new();

pub const FAST_HASH: HashCost = HashCost { memory_kib: 8, iterations: 1 };

/// A live database connection, or `None` when DB tests are disabled or unreachable.
pub async fn get_db() -> Option<DatabaseConnection> {
    if std::env::var("SKIP_DB_TESTS").is_ok() || std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let migrated = *MIGRATED
        .get_or_init(|| async {
            let cfg = DatabaseConfig::from_env();
            match connect_with_config(&cfg).await {
                Ok(db) => migration::Migrator::up(&db, None).await.is_ok(),
                Err(e) => {
                    eprintln!("skip: cannot connect to db: {}", e);
                    false
                }
            }
        })
        .await;
    if !migrated {
        return None;
    }

    // Return a fresh connection for the current test's runtime
    let mut cfg = DatabaseConfig::from_env();
    cfg.max_connections = cfg.max_connections.max(5);
    cfg.min_connections = 1;
    cfg.acquire_timeout = std::time::Duration::from_secs(10);
    connect_with_config(&cfg).await.ok()
}

pub fn test_auth_config() -> AuthConfig {
    let mut cfg = AuthConfig::new("test-secret");
    cfg.hash_cost = FAST_HASH;
    cfg
}

pub struct MemoryHarness {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub auth: AuthService<MemoryStore>,
    pub polls: PollService<MemoryStore>,
}

pub fn memory_harness(cfg: AuthConfig) -> MemoryHarness {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let auth = AuthService::new(store.clone(), mailer.clone(), cfg);
    let polls = PollService::new(store.clone());
    MemoryHarness { store, mailer, auth, polls }
}

/// Unique suffix so DB-backed tests never collide on unique columns.
pub fn unique(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().simple())
}
