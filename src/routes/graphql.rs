use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use axum::extract::State;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;

use crate::error::AppError;
use crate::extractors::MaybeUser;
use crate::state::AppState;

/// GraphQL endpoint handler
async fn graphql_handler(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let mut request = req;

    // Resolvers that need a signed-in user look for this
    if let Some(user) = user {
        request = request.data(user);
    }

    let response = state.graphql_schema.execute(request).await;
    Json(response)
}

/// GraphQL Playground UI (development tool)
async fn graphql_playground(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    if !state.config.graphql.playground {
        return Err(AppError::not_found("playground"));
    }
    Ok(Html(playground_source(GraphQLPlaygroundConfig::new("/graphql"))))
}

/// GraphQL router
pub fn router() -> Router<AppState> {
    Router::new().route("/graphql", get(graphql_playground).post(graphql_handler))
}
