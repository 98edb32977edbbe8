pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::conversation::handlers as conversation;
use crate::onboarding::handlers as onboarding;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Onboarding
        .route("/api/v1/onboard", post(onboarding::handle_onboard))
        .route("/api/v1/profiles/:id", get(onboarding::handle_get_profile))
        // Conversation
        .route(
            "/api/v1/conversation/generate",
            post(conversation::handle_generate),
        )
        .route(
            "/api/v1/conversation",
            get(conversation::handle_history).delete(conversation::handle_clear),
        )
        .with_state(state)
}
