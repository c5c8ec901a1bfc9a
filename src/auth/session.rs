use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{config::SessionConfig, users::repo_types::Role};

const SESSION_ID_LEN: usize = 32;

/// Values kept against a session id between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl SessionData {
    pub fn signed_in(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: Some(email.into()),
            role: Some(role),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.email.as_deref().is_some_and(|email| !email.is_empty())
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt session: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Live session data for `id`, if any.
    async fn get(&self, id: &str) -> Result<Option<SessionData>, SessionError>;

    /// Stores `data` for `max_age`. A zero or negative age expires the
    /// session immediately. Lapsed sessions are purged on every save.
    async fn save(&self, id: &str, data: &SessionData, max_age: Duration) -> Result<(), SessionError>;
}

pub fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

pub fn session_cookie(config: &SessionConfig, id: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .max_age(config.max_age())
        .build()
}

pub fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), "")).path("/").build()
}

pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionData>, SessionError> {
        let row = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            r#"
            SELECT email, role
              FROM sessions
             WHERE id = $1 AND expires_at > now()
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        let Some((email, role)) = row else {
            return Ok(None);
        };
        let role = role
            .map(|r| r.parse::<Role>())
            .transpose()
            .map_err(SessionError::Corrupt)?;
        Ok(Some(SessionData { email, role }))
    }

    async fn save(&self, id: &str, data: &SessionData, max_age: Duration) -> Result<(), SessionError> {
        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }

        if max_age <= Duration::ZERO {
            sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(id)
                .execute(&self.db)
                .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (id, email, role, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
               SET email = EXCLUDED.email,
                   role = EXCLUDED.role,
                   expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(id)
        .bind(data.email.as_deref())
        .bind(data.role.map(|r| r.as_str()))
        .bind(OffsetDateTime::now_utc() + max_age)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemorySessionStore;
