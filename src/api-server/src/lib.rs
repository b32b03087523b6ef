//! HTTP front end for the permission registry

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ErrorResponse, Result};
pub use server::{Server, ServerConfig};
pub use state::AppState;

/// API version
pub const API_VERSION: &str = "v1";
