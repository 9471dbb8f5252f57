//! HTTP middleware shared by every route.

pub mod logging;

pub use logging::log_requests;
