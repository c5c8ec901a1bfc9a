use std::sync::Arc;

use crate::{
    auth::{
        password::{Argon2Hasher, Hasher},
        session::{PgSessionStore, SessionStore},
    },
    config::AppConfig,
    db,
    ids::{IdGenerator, TimeOrderedIds},
    users::repo::{PgUserRepository, UserRepository},
};

/// Capabilities shared by every handler. Each one is a trait object so
/// tests can swap in memory-backed or deterministic versions.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub hasher: Arc<dyn Hasher>,
    pub ids: Arc<dyn IdGenerator>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::connect(&config).await?;
        db::migrate(&db).await?;

        Ok(Self::from_parts(
            Arc::new(config),
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgSessionStore::new(db)),
            Arc::new(Argon2Hasher::new()),
            Arc::new(TimeOrderedIds),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn Hasher>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            config,
            users,
            sessions,
            hasher,
            ids,
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        use crate::{
            auth::{password::cheap_hasher, session::MemorySessionStore},
            ids::SequentialIds,
            users::repo::InMemoryUserRepository,
        };

        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(cheap_hasher()),
            Arc::new(SequentialIds::default()),
        )
    }
}
