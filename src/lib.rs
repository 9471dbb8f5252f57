//! Road Patrol Backend Library
//!
//! Multi-tenant road inspection records behind JWT authentication and
//! role-gated routes. All database access is serialized through [`store::Store`].

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;
pub mod records;
pub mod store;
pub mod telemetry;
