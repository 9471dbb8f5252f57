//! Authentication Module
//! Mission: Tenant-aware JWT issuance, refresh and role-gated API access

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use jwt::{JwtHandler, TokenLifetimes};
pub use middleware::{require_roles, RoleGate};
pub use user_store::UserStore;
