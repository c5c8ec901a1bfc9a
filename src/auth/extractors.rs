use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::session::SessionData;
use crate::{error::ApiError, state::AppState, users::repo_types::Role};

/// The caller's session, resolved from the session cookie.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub data: Option<SessionData>,
}

impl SessionContext {
    /// Store failures are logged and treated as no session.
    pub async fn resolve(state: &AppState, jar: &CookieJar) -> Self {
        let Some(id) = jar.get(&state.config.session.cookie_name).map(|c| c.value()) else {
            return Self::default();
        };

        let data = match state.sessions.get(id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "session lookup failed; treating request as anonymous");
                None
            }
        };
        Self { data }
    }

    pub fn is_logged_in(&self) -> bool {
        self.data.as_ref().is_some_and(SessionData::is_logged_in)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.data.as_ref().is_some_and(|d| d.has_role(role))
    }
}

/// Rejects the request with 401 unless the session holds a logged-in user.
pub struct RequireLogin(pub SessionData);

#[async_trait]
impl FromRequestParts<AppState> for RequireLogin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session = SessionContext::resolve(state, &jar).await;
        match session.data {
            Some(data) if data.is_logged_in() => Ok(RequireLogin(data)),
            _ => {
                warn!("request without a logged-in session");
                Err(ApiError::Unauthorized("you must log in"))
            }
        }
    }
}
