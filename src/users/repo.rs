use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    pagination::{self, Page, Paginated, Pagination},
    users::repo_types::{Role, User, UserChanges, UserRow},
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt user row: {0}")]
    Corrupt(String),
}

/// Persistence for user records. Each call is one storage primitive.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, RepoError>;

    /// `NotFound` when no row has this id.
    async fn read(&self, id: Uuid) -> Result<User, RepoError>;

    /// `NotFound` when no row has this email.
    async fn get_by_email(&self, email: &str) -> Result<User, RepoError>;

    /// Possibly empty; an empty result is not an error.
    async fn get_by_role(&self, role: Role) -> Result<Vec<User>, RepoError>;

    /// Newest first. A page past the end comes back empty, with real totals.
    async fn list(&self, pagination: Pagination) -> Result<Page<User>, RepoError>;

    /// Touches name and email only. Returns affected rows (0 or 1).
    async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<u64, RepoError>;

    /// Hard delete. Returns affected rows (0 or 1).
    async fn delete(&self, id: Uuid) -> Result<u64, RepoError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: UserRow) -> Result<User, RepoError> {
    User::try_from(row).map_err(RepoError::Corrupt)
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            UserRow::COLUMNS
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.db)
        .await?;
        into_user(row)
    }

    async fn read(&self, id: Uuid) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            UserRow::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(RepoError::NotFound)?;
        into_user(row)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1 ORDER BY id LIMIT 1",
            UserRow::COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(RepoError::NotFound)?;
        into_user(row)
    }

    async fn get_by_role(&self, role: Role) -> Result<Vec<User>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY id DESC",
            UserRow::COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(into_user).collect()
    }

    async fn list(&self, pagination: Pagination) -> Result<Page<User>, RepoError> {
        let page = pagination::execute::<UserRow>(&self.db, pagination).await?;
        page.try_map(into_user)
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
pub use memory::InMemoryUserRepository;
