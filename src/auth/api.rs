//! Authentication API Endpoints
//! Mission: Provide login, token refresh and per-tenant user management endpoints

use crate::api::AppState;
use crate::auth::{
    jwt::TokenPair,
    models::{
        ApiResponse, CreateUserRequest, LoginData, LoginQuery, LoginRequest, RefreshData,
        RefreshRequest, UpdateUserRequest, UserResponse,
    },
    user_store::CredentialError,
};
use crate::records::handlers::update_response;
use crate::records::TenantScope;
use crate::store::StoreError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde_json::json;
use tracing::{error, info, warn};

/// Wall-clock format of the `expires` field, in server local time
const EXPIRES_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const MIN_PASSWORD_LEN: usize = 8;

fn format_expires(pair: &TokenPair) -> String {
    pair.access_expires_at
        .with_timezone(&Local)
        .format(EXPIRES_FORMAT)
        .to_string()
}

/// Login endpoint - POST /login?tenant_id=N
pub async fn login(
    State(state): State<AppState>,
    query: Result<Query<LoginQuery>, QueryRejection>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginData>>, AuthApiError> {
    // Malformed input gets the same answer as bad credentials
    let Json(payload) = payload.map_err(|_| AuthApiError::InvalidCredentials)?;
    let tenant_id = query
        .ok()
        .and_then(|Query(q)| q.tenant_id)
        .and_then(|t| t.trim().parse::<i64>().ok())
        .ok_or(AuthApiError::InvalidCredentials)?;

    info!("🔐 Login attempt: {} (tenant {})", payload.username, tenant_id);

    let user = state
        .users
        .verify_credentials(tenant_id, &payload.username, &payload.password)
        .await
        .map_err(|e| match e {
            CredentialError::InvalidCredentials => {
                warn!("❌ Failed login attempt: {} (tenant {})", payload.username, tenant_id);
                AuthApiError::InvalidCredentials
            }
            CredentialError::Store(e) => AuthApiError::from(e),
        })?;

    let pair = state.jwt.issue_token_pair(&user).map_err(|e| {
        error!("Failed to sign tokens: {e}");
        AuthApiError::InternalError
    })?;

    info!(
        "✅ Login successful: {} ({}, tenant {})",
        user.username,
        user.role.as_str(),
        user.tenant_id
    );

    Ok(Json(ApiResponse::ok(LoginData {
        username: user.username.clone(),
        roles: vec![user.role.as_str().to_string()],
        expires: format_expires(&pair),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    })))
}

/// Refresh endpoint - POST /refresh-token
pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RefreshData>>, AuthApiError> {
    let Json(payload) = payload.map_err(|_| AuthApiError::InvalidRefreshToken)?;

    let pair = state
        .jwt
        .refresh_access_token(&payload.refresh_token)
        .map_err(|e| {
            warn!("❌ Refresh rejected: {e}");
            AuthApiError::InvalidRefreshToken
        })?;

    Ok(Json(ApiResponse::ok(RefreshData {
        expires: format_expires(&pair),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    })))
}

/// List users - GET /users (Admin only)
pub async fn list_users(
    State(state): State<AppState>,
    scope: TenantScope,
) -> Result<Json<Vec<UserResponse>>, AuthApiError> {
    let users = state.users.list_users(scope.tenant_id).await?;
    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

/// Create user - POST /user (Admin only)
pub async fn create_user(
    State(state): State<AppState>,
    scope: TenantScope,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AuthApiError> {
    let Json(payload) = payload?;

    if payload.username.trim().is_empty() {
        return Err(AuthApiError::InvalidRequest(
            "Username must not be empty".to_string(),
        ));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthApiError::WeakPassword);
    }

    let user = state
        .users
        .create_user(
            scope.tenant_id,
            &payload.username,
            &payload.password,
            payload.role,
        )
        .await?;

    info!(
        "✅ User created by {}: {} ({})",
        scope.claims.username,
        user.username,
        user.role.as_str()
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Update user - PUT /user/:id (Admin only)
pub async fn update_user(
    State(state): State<AppState>,
    scope: TenantScope,
    user_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Response, AuthApiError> {
    let Path(user_id) = user_id?;
    let Json(payload) = payload?;

    if matches!(&payload.username, Some(name) if name.trim().is_empty()) {
        return Err(AuthApiError::InvalidRequest(
            "Username must not be empty".to_string(),
        ));
    }
    if matches!(&payload.password, Some(p) if p.len() < MIN_PASSWORD_LEN) {
        return Err(AuthApiError::WeakPassword);
    }

    let outcome = state
        .users
        .update_user(scope.tenant_id, user_id, payload)
        .await?;

    Ok(update_response(outcome.map(|user| UserResponse::from_user(&user))))
}

/// Delete user - DELETE /user/:id (Admin only)
pub async fn delete_user(
    State(state): State<AppState>,
    scope: TenantScope,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<serde_json::Value>, AuthApiError> {
    let Path(user_id) = user_id?;

    // Don't allow deleting yourself
    if user_id.to_string() == scope.claims.sub {
        return Err(AuthApiError::CannotDeleteSelf);
    }

    state.users.delete_user(scope.tenant_id, user_id).await?;

    info!("🗑️  User deleted by {}: {}", scope.claims.username, user_id);
    Ok(Json(json!({ "message": "User deleted" })))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    InvalidRefreshToken,
    InvalidRequest(String),
    UserNotFound,
    UserAlreadyExists,
    WeakPassword,
    CannotDeleteSelf,
    ServiceBusy,
    InternalError,
}

impl From<StoreError> for AuthApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AuthApiError::UserNotFound,
            StoreError::Conflict(_) => AuthApiError::UserAlreadyExists,
            StoreError::Busy | StoreError::Unavailable => AuthApiError::ServiceBusy,
            other => {
                error!("User store failure: {other}");
                AuthApiError::InternalError
            }
        }
    }
}

impl From<JsonRejection> for AuthApiError {
    fn from(rejection: JsonRejection) -> Self {
        AuthApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AuthApiError {
    fn from(rejection: PathRejection) -> Self {
        AuthApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            ),
            AuthApiError::InvalidRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired refresh token".to_string(),
            ),
            AuthApiError::InvalidRequest(message) => (StatusCode::BAD_REQUEST, message),
            AuthApiError::UserNotFound => {
                (StatusCode::NOT_FOUND, "no user found with given ID".to_string())
            }
            AuthApiError::UserAlreadyExists => {
                (StatusCode::CONFLICT, "Username already exists".to_string())
            }
            AuthApiError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            ),
            AuthApiError::CannotDeleteSelf => (
                StatusCode::BAD_REQUEST,
                "Cannot delete your own account".to_string(),
            ),
            AuthApiError::ServiceBusy => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service busy, try again later".to_string(),
            ),
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
