//! Authentication operation endpoints.
//!
//! Each handler forwards to the matching `AuthResolver` operation and maps
//! its error through `HTTPError`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::models::{ProfileUpdate, SignUpRequest};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers the auth operation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signin", post(sign_in))
        .route("/auth/signup", post(sign_up))
        .route("/auth/signout", post(sign_out))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/password", put(update_password))
        .route("/auth/profile", put(update_profile))
        .route("/auth/session", get(current_session))
        .route("/auth/oauth/:provider", get(oauth_redirect))
        .route("/auth/sso/:provider", get(sso_redirect))
        .route("/auth/invalidate", post(invalidate))
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct EmailBody {
    email: String,
}

#[derive(Deserialize)]
struct PasswordBody {
    password: String,
}

#[derive(Deserialize)]
struct RedirectQuery {
    /// Answer with a 303 redirect instead of a JSON body.
    #[serde(default)]
    follow: bool,
}

/// Turns a body that failed to parse into a validation error.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, HTTPError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        HTTPError::new(
            StatusCode::BAD_REQUEST,
            "validation_error",
            rejection.body_text(),
        )
    })
}

fn redirect_response(url: String, follow: bool) -> Response {
    if follow {
        Redirect::to(&url).into_response()
    } else {
        Json(json!({ "url": url })).into_response()
    }
}

async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let credentials = body(payload)?;
    let session = state
        .resolver
        .sign_in(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(session))
}

async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let request = body(payload)?;
    let outcome = state.resolver.sign_up(request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn sign_out(State(state): State<AppState>) -> Result<StatusCode, HTTPError> {
    state.resolver.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<EmailBody>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let EmailBody { email } = body(payload)?;
    state.resolver.reset_password(&email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "email": email.trim() })),
    ))
}

async fn update_password(
    State(state): State<AppState>,
    payload: Result<Json<PasswordBody>, JsonRejection>,
) -> Result<StatusCode, HTTPError> {
    let PasswordBody { password } = body(payload)?;
    state.resolver.update_password(&password).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_profile(
    State(state): State<AppState>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, HTTPError> {
    let update = body(payload)?;
    let session = state.resolver.update_profile(update).await?;
    Ok(Json(session))
}

async fn current_session(State(state): State<AppState>) -> Result<impl IntoResponse, HTTPError> {
    let check = state.resolver.get_current_session().await?;
    Ok(Json(check))
}

async fn oauth_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> Result<Response, HTTPError> {
    let url = state.resolver.sign_in_with_oauth(&provider).await?;
    Ok(redirect_response(url, query.follow))
}

async fn sso_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> Result<Response, HTTPError> {
    let url = state.resolver.sso_redirect(&provider)?;
    Ok(redirect_response(url, query.follow))
}

/// Called by downstream services after a 401 to drop the local session.
async fn invalidate(State(state): State<AppState>) -> impl IntoResponse {
    let invalidated = state.resolver.invalidate().await;
    Json(json!({ "invalidated": invalidated }))
}
