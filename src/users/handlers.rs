use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{RequireLogin, SessionContext},
    error::ApiError,
    pagination::Pagination,
    state::AppState,
    users::{
        dto::{CreateForm, ListResponse, LoginForm, RoleListResponse, UpdateForm, UserResponse},
        repo_types::Role,
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/roles/:role", get(users_by_role))
        .route(
            "/users/:id",
            get(read_user).put(update_user).delete(delete_user),
        )
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response, ApiError> {
    let bytes = serde_json::to_vec(body).map_err(|e| ApiError::from(e).logged("encode response"))?;
    Ok((status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response())
}

fn decode<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::Decode(e.body_text()).logged("decode request body"))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidParam("id").logged("parse id"))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let page = services::list_users(&state, Pagination::parse(&query))
        .await
        .map_err(|e| e.logged("list users"))?;

    json(
        StatusCode::OK,
        &ListResponse {
            total_items: page.total_rows,
            number_of_pages: page.total_pages,
            current_page: page.page,
            users: page.rows.into_iter().map(UserResponse::from).collect(),
        },
    )
}

#[instrument(skip(state, jar, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<CreateForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = decode(payload)?;
    let user = services::create_user(&state, &jar, form)
        .await
        .map_err(|e| e.logged("create user"))?;

    info!(user_id = %user.id, role = %user.role, "user created");
    json(StatusCode::CREATED, &UserResponse::from(user))
}

#[instrument(skip(state))]
pub async fn read_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let user = services::read_user(&state, id)
        .await
        .map_err(|e| e.logged("read user"))?;
    json(StatusCode::OK, &UserResponse::from(user))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let form = decode(payload)?;
    let user = services::update_user(&state, id, form)
        .await
        .map_err(|e| e.logged("update user"))?;

    info!(user_id = %user.id, "user updated");
    json(StatusCode::OK, &UserResponse::from(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    services::delete_user(&state, id)
        .await
        .map_err(|e| e.logged("delete user"))?;

    info!(user_id = %id, "user deleted");
    Ok(StatusCode::OK)
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    if SessionContext::resolve(&state, &jar).await.is_logged_in() {
        info!("already logged in");
        return Ok((jar, StatusCode::OK).into_response());
    }

    let form = decode(payload)?;
    let jar = services::login(&state, jar, form)
        .await
        .map_err(|e| e.logged("login"))?;
    Ok((jar, StatusCode::OK).into_response())
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = services::logout(&state, jar).await;
    info!("user logged out");
    (jar, StatusCode::OK)
}

#[instrument(skip(state, session))]
pub async fn users_by_role(
    State(state): State<AppState>,
    RequireLogin(session): RequireLogin,
    Path(role): Path<String>,
) -> Result<Response, ApiError> {
    let role: Role = role
        .parse()
        .map_err(|_| ApiError::InvalidParam("role").logged("parse role"))?;
    debug!(requested_by = session.email.as_deref().unwrap_or_default(), %role, "listing users by role");
    let users = services::users_by_role(&state, role)
        .await
        .map_err(|e| e.logged("list users by role"))?;

    json(
        StatusCode::OK,
        &RoleListResponse {
            users: users.into_iter().map(UserResponse::from).collect(),
        },
    )
}
