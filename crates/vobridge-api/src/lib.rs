//! vobridge API crate - axum HTTP server and route handlers.
//!
//! Exposes the latest narrator phrase, arrow-key navigation, the narrator's
//! primary action, and a status document to remote clients.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, serve, start_server};
pub use state::AppState;
