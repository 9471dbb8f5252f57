//! Tenant Scope
//! Mission: Resolve the tenant a protected request acts on from its verified token

use crate::auth::middleware::AuthError;
use crate::auth::models::Claims;
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use tracing::warn;

/// Optional `?tenant_id=` accepted on protected routes.
#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Option<String>,
}

/// Tenant a protected request operates on, taken from the verified claims.
///
/// Requires the role gate to have run first. A `tenant_id` query parameter
/// is tolerated only if it names the same tenant as the token.
#[derive(Debug, Clone)]
pub struct TenantScope {
    pub tenant_id: i64,
    pub claims: Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantScope
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)?;

        let Query(query) =
            Query::<TenantQuery>::try_from_uri(&parts.uri).map_err(|_| AuthError::TenantMismatch)?;

        if let Some(raw) = query.tenant_id.as_deref().map(str::trim) {
            if !raw.is_empty() && raw.parse::<i64>().ok() != Some(claims.tenant_id) {
                warn!(
                    user = %claims.username,
                    token_tenant = claims.tenant_id,
                    requested = raw,
                    "🚫 Tenant mismatch"
                );
                return Err(AuthError::TenantMismatch);
            }
        }

        Ok(TenantScope {
            tenant_id: claims.tenant_id,
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::TokenKind;
    use axum::http::Request;

    fn claims(tenant_id: i64) -> Claims {
        Claims {
            sub: "1".to_string(),
            username: "alice".to_string(),
            role: "inspector".to_string(),
            tenant_id,
            iat: 0,
            exp: i64::MAX,
            jti: "j".to_string(),
            typ: TokenKind::Access,
        }
    }

    async fn extract(uri: &str, claims: Option<Claims>) -> Result<TenantScope, AuthError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        if let Some(claims) = claims {
            parts.extensions.insert(claims);
        }
        TenantScope::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_tenant_comes_from_claims() {
        let scope = extract("/roads", Some(claims(7))).await.unwrap();
        assert_eq!(scope.tenant_id, 7);
    }

    #[tokio::test]
    async fn test_matching_query_tenant_is_accepted() {
        let scope = extract("/roads?tenant_id=7", Some(claims(7))).await.unwrap();
        assert_eq!(scope.tenant_id, 7);
        assert!(extract("/roads?tenant_id=", Some(claims(7))).await.is_ok());
    }

    #[tokio::test]
    async fn test_mismatched_query_tenant_is_rejected() {
        assert!(matches!(
            extract("/roads?tenant_id=8", Some(claims(7))).await,
            Err(AuthError::TenantMismatch)
        ));
        assert!(matches!(
            extract("/roads?tenant_id=abc", Some(claims(7))).await,
            Err(AuthError::TenantMismatch)
        ));
    }

    #[tokio::test]
    async fn test_missing_claims_is_unauthenticated() {
        assert!(matches!(
            extract("/roads", None).await,
            Err(AuthError::Unauthenticated)
        ));
    }
}
