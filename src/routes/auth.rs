use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/verify", get(handlers::verify))
        .route("/auth/logout", post(handlers::logout))
}
