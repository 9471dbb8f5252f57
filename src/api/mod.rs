//! HTTP API
//! Mission: Wire the public auth endpoints and the role-gated record routes
//! into one router over shared application state

mod error;

pub use error::ApiError;

use crate::auth::{self, require_roles, JwtHandler, RoleGate, UserStore};
use crate::config::Config;
use crate::middleware::log_requests;
use crate::records::handlers::{create_record, delete_record, list_records, update_record};
use crate::records::{patrols::Patrol, plans, reports::Report, roads::{self, Road}};
use crate::store::{Store, StoreError};
use anyhow::Context;
use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub const ADMIN_ONLY: &[&str] = &[auth::models::ROLE_ADMIN];
pub const STAFF: &[&str] = &[auth::models::ROLE_ADMIN, auth::models::ROLE_INSPECTOR];

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub users: UserStore,
    pub jwt: Arc<JwtHandler>,
}

impl AppState {
    pub fn new(store: Store, jwt: Arc<JwtHandler>, bcrypt_cost: u32) -> Result<Self, StoreError> {
        let users = UserStore::new(store.clone(), bcrypt_cost)?;
        Ok(Self { store, users, jwt })
    }

    /// Open the store, build the token handler and bootstrap the first admin.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let jwt = JwtHandler::new(&config.jwt_secret, config.token_lifetimes())
            .context("Invalid JWT configuration")?;
        let store = Store::open(&config.database_path, config.store_config())
            .with_context(|| format!("Failed to open database {}", config.database_path))?;
        let state = Self::new(store, Arc::new(jwt), config.bcrypt_cost)
            .context("Failed to initialize user store")?;

        match &config.bootstrap_admin_password {
            Some(password) => {
                state
                    .users
                    .ensure_admin(
                        config.bootstrap_tenant_id,
                        &config.bootstrap_admin_username,
                        password,
                    )
                    .await
                    .context("Failed to bootstrap admin user")?;
            }
            None => info!("BOOTSTRAP_ADMIN_PASSWORD not set, skipping admin bootstrap"),
        }

        Ok(state)
    }
}

/// Health check - GET /health
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "store": state.store.stats(),
    }))
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let admin_gate = RoleGate::new(state.jwt.clone(), ADMIN_ONLY);
    let staff_gate = RoleGate::new(state.jwt.clone(), STAFF);

    // Road and user administration
    let admin_routes = Router::new()
        .route("/road", post(create_record::<Road>))
        .route(
            "/road/:id",
            put(update_record::<Road>).delete(roads::delete_road),
        )
        .route("/users", get(auth::api::list_users))
        .route("/user", post(auth::api::create_user))
        .route(
            "/user/:id",
            put(auth::api::update_user).delete(auth::api::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(admin_gate, require_roles));

    // Day-to-day inspection work
    let staff_routes = Router::new()
        .route("/roads", get(list_records::<Road>))
        .route("/plans", get(plans::list_plans))
        .route("/plan", post(plans::create_plan))
        .route(
            "/plan/:id",
            put(plans::update_plan).delete(plans::delete_plan),
        )
        .route("/patrols", get(list_records::<Patrol>))
        .route("/patrol", post(create_record::<Patrol>))
        .route(
            "/patrol/:id",
            put(update_record::<Patrol>).delete(delete_record::<Patrol>),
        )
        .route("/reports", get(list_records::<Report>))
        .route("/report", post(create_record::<Report>))
        .route(
            "/report/:id",
            put(update_record::<Report>).delete(delete_record::<Report>),
        )
        .route_layer(middleware::from_fn_with_state(staff_gate, require_roles));

    let public_routes = Router::new()
        .route("/login", post(auth::api::login))
        .route("/refresh-token", post(auth::api::refresh_token))
        .route("/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(staff_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
