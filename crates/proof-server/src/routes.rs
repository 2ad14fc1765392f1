//! API route definitions.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::AppState;

/// Create API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Grading and proof generation
        .route("/api/grade", post(handlers::grade))
        .route("/api/prove/test", post(handlers::prove_test))
        .route("/api/prove/ownership", post(handlers::prove_ownership))
        .route("/api/prove/grade-claim", post(handlers::prove_grade_claim))
        // Utility endpoints
        .route("/api/identity/generate", post(handlers::generate_identity))
}
