//! Authentication Models
//! Mission: Define tenant-scoped user, claim and login data structures

use crate::records::TenantRecord;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_INSPECTOR: &str = "inspector";

/// User account, owned by exactly one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub tenant_id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: UserRole,
}

impl TenantRecord for User {
    const TABLE: &'static str = "users";
    const KIND: &'static str = "user";
    const COLUMNS: &'static [&'static str] = &["username", "password_hash", "role"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role_str: String = row.get("role")?;
        let role = UserRole::parse(&role_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown role {role_str:?}").into(),
            )
        })?;

        Ok(User {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            username: row.get("username")?,
            password_hash: row.get("password_hash")?,
            role,
        })
    }
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin, // Full access, including road and user administration
    #[serde(rename = "inspector")]
    Inspector, // Plans, patrols, reports; read-only roads
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => ROLE_ADMIN,
            UserRole::Inspector => ROLE_INSPECTOR,
        }
    }

    /// Exact, case-sensitive match on the stored role name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ROLE_ADMIN => Some(UserRole::Admin),
            ROLE_INSPECTOR => Some(UserRole::Inspector),
            _ => None,
        }
    }
}

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims payload, shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub username: String,
    /// Kept as a plain string; the role gate compares it verbatim.
    pub role: String,
    pub tenant_id: i64,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub typ: TokenKind,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login query string (`/login?tenant_id=1`)
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub tenant_id: Option<String>,
}

/// Refresh request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `{ "success": true, "data": ... }` envelope used by the auth endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Login response payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub username: String,
    pub roles: Vec<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires: String,
}

/// Refresh response payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires: String,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub tenant_id: i64,
    pub username: String,
    pub role: UserRole,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Create user request
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: UserRole,
}

/// Partial user update; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_serialization() {
        let admin = UserRole::Admin;
        let json = serde_json::to_string(&admin).unwrap();
        assert_eq!(json, r#""admin""#);

        let inspector: UserRole = serde_json::from_str(r#""inspector""#).unwrap();
        assert_eq!(inspector, UserRole::Inspector);
    }

    #[test]
    fn test_user_role_parse_is_case_sensitive() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("inspector"), Some(UserRole::Inspector));
        assert_eq!(UserRole::parse("Admin"), None);
        assert_eq!(UserRole::parse("viewer"), None);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: 7,
            tenant_id: 1,
            username: "alice".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            role: UserRole::Inspector,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "inspector");
    }

    #[test]
    fn test_login_data_uses_camel_case() {
        let data = LoginData {
            username: "alice".to_string(),
            roles: vec!["admin".to_string()],
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires: "2026/01/01 00:00:00".to_string(),
        };
        let json = serde_json::to_value(ApiResponse::ok(data)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["accessToken"], "a");
        assert_eq!(json["data"]["refreshToken"], "r");
        assert_eq!(json["data"]["roles"][0], "admin");
    }

    #[test]
    fn test_refresh_request_accepts_camel_case() {
        let req: RefreshRequest = serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(req.refresh_token, "abc");
    }
}
