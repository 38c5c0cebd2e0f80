use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::auth::{login, session};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VerifyParams {
    pub token: Option<String>,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

/// GET /auth/verify?token=...: trade a login link for a session
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> AppResult<Response> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let conn = state.db.get()?;
    let user_id = login::redeem_login_token(&conn, &token)?;
    let session_token = session::create_session(&conn, &user_id, state.config.auth.session_hours)?;
    tracing::info!("User {} signed in", user_id);

    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &session_token,
        state.config.auth.session_hours,
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "token": session_token })),
    )
        .into_response())
}

/// POST /auth/logout: delete the session and clear the cookie
pub async fn logout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Response> {
    if let Some(user) = user {
        let conn = state.db.get()?;
        session::delete_session(&conn, &user.session_token)?;
        tracing::info!("User {} signed out", user.id);
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )],
    )
        .into_response())
}
