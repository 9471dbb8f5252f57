//! Authentication Middleware
//! Mission: Admit a request only if it carries a valid access token whose
//! role is on the route's allow-list

use crate::auth::{jwt::JwtHandler, models::Claims};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Allow-list of roles for one group of routes
#[derive(Clone)]
pub struct RoleGate {
    jwt: Arc<JwtHandler>,
    allowed: Arc<[String]>,
}

impl RoleGate {
    pub fn new(jwt: Arc<JwtHandler>, allowed: &[&str]) -> Self {
        Self {
            jwt,
            allowed: allowed.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Exact, case-sensitive membership. No role implies another.
    pub fn permits(&self, role: &str) -> bool {
        self.allowed.iter().any(|r| r == role)
    }

    /// Validate the bearer token in `headers` and check its role.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let claims = self
            .jwt
            .verify_access(token)
            .map_err(|_| AuthError::InvalidToken)?;

        if !self.permits(&claims.role) {
            warn!(
                user = %claims.username,
                role = %claims.role,
                tenant_id = claims.tenant_id,
                "🚫 Role not permitted"
            );
            return Err(AuthError::Forbidden {
                required: self.allowed.to_vec(),
                role: claims.role,
            });
        }

        Ok(claims)
    }
}

/// Role gate middleware. Use with `middleware::from_fn_with_state(gate, require_roles)`.
pub async fn require_roles(
    State(gate): State<RoleGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = gate.authorize(req.headers())?;
    debug!(user = %claims.username, role = %claims.role, "Request authorized");

    // Handlers read the identity back out of the extensions
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Auth error types
#[derive(Debug)]
pub enum AuthError {
    Unauthenticated,
    InvalidToken,
    Forbidden { required: Vec<String>, role: String },
    TenantMismatch,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "success": false,
                    "message": "Missing authorization token. Use: Bearer {token}",
                }),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "message": "Invalid or expired token" }),
            ),
            AuthError::Forbidden { required, role } => (
                StatusCode::FORBIDDEN,
                json!({
                    "success": false,
                    "message": "Insufficient permissions",
                    "required_roles": required,
                    "role": role,
                }),
            ),
            AuthError::TenantMismatch => (
                StatusCode::FORBIDDEN,
                json!({
                    "success": false,
                    "message": "tenant_id does not match the authenticated tenant",
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenLifetimes;
    use crate::auth::models::{User, UserRole};
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn jwt() -> Arc<JwtHandler> {
        Arc::new(JwtHandler::new("gate-test-secret", TokenLifetimes::default()).unwrap())
    }

    fn create_test_user(role: UserRole) -> User {
        User {
            id: 1,
            tenant_id: 1,
            username: "testuser".to_string(),
            password_hash: "hash".to_string(),
            role,
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_auth_error_responses() {
        assert_eq!(
            AuthError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        let forbidden = AuthError::Forbidden {
            required: vec!["admin".into()],
            role: "inspector".into(),
        };
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::TenantMismatch.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_permits_is_exact() {
        let gate = RoleGate::new(jwt(), &["admin", "inspector"]);
        assert!(gate.permits("admin"));
        assert!(gate.permits("inspector"));
        assert!(!gate.permits("Admin"));
        assert!(!gate.permits("admin "));
        assert!(!gate.permits(""));
    }

    #[test]
    fn test_authorize_outcomes() {
        let jwt = jwt();
        let gate = RoleGate::new(jwt.clone(), &["admin"]);
        let admin = jwt.issue_token_pair(&create_test_user(UserRole::Admin)).unwrap();
        let inspector = jwt
            .issue_token_pair(&create_test_user(UserRole::Inspector))
            .unwrap();

        assert!(matches!(
            gate.authorize(&HeaderMap::new()),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            gate.authorize(&bearer("not-a-jwt")),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            gate.authorize(&bearer(&admin.refresh_token)),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            gate.authorize(&bearer(&inspector.access_token)),
            Err(AuthError::Forbidden { .. })
        ));

        let claims = gate.authorize(&bearer(&admin.access_token)).unwrap();
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn test_non_bearer_scheme_is_unauthenticated() {
        let gate = RoleGate::new(jwt(), &["admin"]);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(matches!(
            gate.authorize(&headers),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_middleware_exposes_claims_to_handler() {
        let jwt = jwt();
        let gate = RoleGate::new(jwt.clone(), &["inspector"]);
        let app = Router::new()
            .route(
                "/whoami",
                get(|axum::Extension(claims): axum::Extension<Claims>| async move {
                    claims.username
                }),
            )
            .route_layer(middleware::from_fn_with_state(gate, require_roles));

        let token = jwt
            .issue_token_pair(&create_test_user(UserRole::Inspector))
            .unwrap()
            .access_token;
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"testuser");
    }

    #[tokio::test]
    async fn test_forbidden_body_lists_required_roles() {
        let jwt = jwt();
        let gate = RoleGate::new(jwt.clone(), &["admin"]);
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(gate, require_roles));

        let token = jwt
            .issue_token_pair(&create_test_user(UserRole::Inspector))
            .unwrap()
            .access_token;
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/admin")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["required_roles"][0], "admin");
        assert_eq!(body["role"], "inspector");
    }
}
