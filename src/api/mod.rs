//! REST API for the status pipeline.

#[cfg(feature = "server")]
pub mod status_routes;

#[cfg(feature = "server")]
pub use status_routes::{create_status_router, AppState};
