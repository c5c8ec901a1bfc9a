use axum_extra::extract::cookie::CookieJar;
use time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::SessionContext,
        password::HashError,
        session::{new_session_id, removal_cookie, session_cookie, SessionData},
    },
    config::AdminConfig,
    error::{
        ApiError, RESP_DB_DATA_ACCESS_FAILURE, RESP_DB_DATA_INSERT_FAILURE,
        RESP_DB_DATA_REMOVE_FAILURE, RESP_DB_DATA_UPDATE_FAILURE,
    },
    pagination::{Page, Pagination},
    state::AppState,
    users::{
        dto::{CreateForm, LoginForm, UpdateForm},
        repo::RepoError,
        repo_types::{Role, User},
    },
    validation::Validate,
};

pub const RESP_ADMIN_ONLY: &str = "only an admin can create this role";
pub const RESP_INVALID_CREDENTIALS: &str = "invalid credentials";

pub async fn list_users(state: &AppState, pagination: Pagination) -> Result<Page<User>, ApiError> {
    pagination.validate()?;
    state
        .users
        .list(pagination)
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_ACCESS_FAILURE))
}

/// Privileged roles need an admin session; the session is only looked up
/// when one is requested.
pub async fn create_user(state: &AppState, jar: &CookieJar, form: CreateForm) -> Result<User, ApiError> {
    form.validate()?;

    if form.role.is_privileged() {
        let session = SessionContext::resolve(state, jar).await;
        if !session.has_role(Role::Admin) {
            warn!(role = %form.role, "privileged role requested without an admin session");
            return Err(ApiError::Unauthorized(RESP_ADMIN_ONLY));
        }
    }

    let user = build_user(state, form).await?;
    state
        .users
        .create(user)
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_INSERT_FAILURE))
}

async fn build_user(state: &AppState, form: CreateForm) -> Result<User, ApiError> {
    let hasher = state.hasher.clone();
    let password = form.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(HashError::from)??;
    Ok(User {
        id: state.ids.next_id(),
        name: form.name,
        email: form.email,
        password_hash,
        role: form.role,
    })
}

pub async fn read_user(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    state
        .users
        .read(id)
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_ACCESS_FAILURE))
}

/// Applies the change, then answers with the stored row rather than an echo
/// of the request.
pub async fn update_user(state: &AppState, id: Uuid, form: UpdateForm) -> Result<User, ApiError> {
    form.validate()?;

    let rows = state
        .users
        .update(id, &form.into_changes())
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_UPDATE_FAILURE))?;
    if rows == 0 {
        return Err(ApiError::NotFound);
    }

    read_user(state, id).await
}

pub async fn delete_user(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    let rows = state
        .users
        .delete(id)
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_REMOVE_FAILURE))?;
    if rows == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

pub async fn users_by_role(state: &AppState, role: Role) -> Result<Vec<User>, ApiError> {
    state
        .users
        .get_by_role(role)
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_ACCESS_FAILURE))
}

/// Verifies the credentials, stores `{email, role}` under a fresh session id
/// and returns the jar carrying the session cookie.
pub async fn login(state: &AppState, jar: CookieJar, form: LoginForm) -> Result<CookieJar, ApiError> {
    form.validate()?;

    let user = state
        .users
        .get_by_email(&form.email)
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_ACCESS_FAILURE))?;

    let hasher = state.hasher.clone();
    let (hash, password) = (user.password_hash.clone(), form.password);
    let verified = tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
        .await
        .map_err(HashError::from)?;
    if !verified {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized(RESP_INVALID_CREDENTIALS));
    }

    let config = &state.config.session;
    let session_id = new_session_id();
    state
        .sessions
        .save(
            &session_id,
            &SessionData::signed_in(user.email, user.role),
            config.max_age(),
        )
        .await?;

    info!(user_id = %user.id, "user logged in");
    Ok(jar.add(session_cookie(config, session_id)))
}

/// Always succeeds. A store failure while discarding the session is logged
/// and the cookie is removed regardless.
pub async fn logout(state: &AppState, jar: CookieJar) -> CookieJar {
    let config = &state.config.session;
    if let Some(cookie) = jar.get(&config.cookie_name) {
        if let Err(e) = state
            .sessions
            .save(cookie.value(), &SessionData::default(), Duration::ZERO)
            .await
        {
            warn!(error = %e, "clearing session failed");
        }
    }
    jar.remove(removal_cookie(config))
}

/// Creates the configured administrator unless a user with that email
/// already exists.
pub async fn ensure_admin(state: &AppState, admin: &AdminConfig) -> Result<(), ApiError> {
    match state.users.get_by_email(&admin.email).await {
        Ok(existing) if existing.role == Role::Admin => {
            info!(user_id = %existing.id, "bootstrap admin already present");
            return Ok(());
        }
        Ok(existing) => {
            warn!(
                user_id = %existing.id,
                role = %existing.role,
                "bootstrap admin email belongs to a non-admin user; no admin created"
            );
            return Ok(());
        }
        Err(RepoError::NotFound) => {}
        Err(e) => return Err(ApiError::storage(RESP_DB_DATA_ACCESS_FAILURE)(e)),
    }

    let form = CreateForm {
        name: admin.name.clone(),
        email: admin.email.clone(),
        password: admin.password.clone(),
        role: Role::Admin,
    };
    form.validate()?;

    let user = build_user(state, form).await?;
    let user = state
        .users
        .create(user)
        .await
        .map_err(ApiError::storage(RESP_DB_DATA_INSERT_FAILURE))?;
    info!(user_id = %user.id, "bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_config() -> AdminConfig {
        AdminConfig {
            name: "Site Admin".into(),
            email: "root@example.com".into(),
            password: "Adm1n!pass".into(),
        }
    }

    #[tokio::test]
    async fn stored_password_is_hashed() {
        let state = AppState::in_memory();
        let form = CreateForm {
            name: "John Doe".into(),
            email: "john@example.com".into(),
            password: "Passw0rd!".into(),
            role: Role::Regular,
        };
        let user = create_user(&state, &CookieJar::new(), form).await.unwrap();
        assert_ne!(user.password_hash, "Passw0rd!");
        assert!(state.hasher.verify(&user.password_hash, "Passw0rd!"));
    }

    #[tokio::test]
    async fn ids_are_fresh_per_create() {
        let state = AppState::in_memory();
        let mut ids = Vec::new();
        for name in ["Ann", "Bob"] {
            let form = CreateForm {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                password: "Passw0rd!".into(),
                role: Role::Regular,
            };
            ids.push(create_user(&state, &CookieJar::new(), form).await.unwrap().id);
        }
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let state = AppState::in_memory();
        ensure_admin(&state, &admin_config()).await.unwrap();
        ensure_admin(&state, &admin_config()).await.unwrap();

        let admins = state.users.get_by_role(Role::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "root@example.com");
    }

    #[tokio::test]
    async fn ensure_admin_leaves_a_non_admin_owner_alone() {
        let state = AppState::in_memory();
        let form = CreateForm {
            name: "Not Root".into(),
            email: "root@example.com".into(),
            password: "Passw0rd!".into(),
            role: Role::Regular,
        };
        create_user(&state, &CookieJar::new(), form).await.unwrap();

        ensure_admin(&state, &admin_config()).await.unwrap();
        assert!(state.users.get_by_role(Role::Admin).await.unwrap().is_empty());
        let owner = state.users.get_by_email("root@example.com").await.unwrap();
        assert_eq!(owner.role, Role::Regular);
    }

    #[tokio::test]
    async fn ensure_admin_rejects_a_weak_password() {
        let state = AppState::in_memory();
        let admin = AdminConfig {
            password: "password".into(),
            ..admin_config()
        };
        assert!(matches!(
            ensure_admin(&state, &admin).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn logout_without_cookie_is_fine() {
        let state = AppState::in_memory();
        let jar = logout(&state, CookieJar::new()).await;
        assert!(jar.get("session").is_none());
    }
}
