// Export route modules
pub mod chat;
pub mod events;
pub mod status;

use crate::state::AppState;
use axum::Router;

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(events::routes(state.clone()))
        .merge(status::routes(state))
}
