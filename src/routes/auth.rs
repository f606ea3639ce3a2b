use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::middleware::auth::AuthUser;
use crate::response::{created, message_only, success, ApiError};
use crate::services::auth::RegisterInput;
use crate::state::AppState;

use super::parse_json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignInRequest {
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkAccountRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenData {
    access_token: String,
}

#[derive(Serialize)]
struct UserData<T: Serialize> {
    user: T,
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = parse_json(payload)?;
    let result = state
        .auth()
        .register(RegisterInput {
            email: payload.email,
            password: payload.password,
            role: payload.role,
            first_name: payload.first_name,
            last_name: payload.last_name,
        })
        .await?;

    Ok(created("User registered successfully", result))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = parse_json(payload)?;
    let result = state.auth().login(&payload.email, &payload.password).await?;
    Ok(success("Login successful", result))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = parse_json(payload)?;
    let access_token = state
        .auth()
        .refresh_access_token(&payload.refresh_token)
        .await?;
    Ok(success(
        "Token refreshed successfully",
        AccessTokenData { access_token },
    ))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Response, ApiError> {
    let user = state.auth().get_user_by_id(&auth_user.id).await?;
    Ok(success("Success", UserData { user }))
}

/// Sessions are stateless JWTs: logout is client-side token disposal, the
/// endpoint only confirms it.
pub async fn logout(Extension(_auth_user): Extension<AuthUser>) -> Response {
    message_only("Logout successful")
}

pub async fn google_sign_in(
    State(state): State<AppState>,
    payload: Result<Json<GoogleSignInRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = parse_json(payload)?;
    if payload.id_token.trim().is_empty() {
        return Err(ApiError::validation("idToken is required"));
    }
    let result = state
        .auth()
        .google_sign_in(&payload.id_token, payload.role.as_deref())
        .await?;
    Ok(success("Google sign-in successful", result))
}

pub async fn anonymous_sign_in(State(state): State<AppState>) -> Result<Response, ApiError> {
    let result = state.auth().anonymous_sign_in().await?;
    Ok(success("Anonymous sign-in successful", result))
}

pub async fn link_account(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    payload: Result<Json<LinkAccountRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = parse_json(payload)?;
    let user = state
        .auth()
        .link_anonymous_account(&auth_user.id, &payload.email, &payload.password)
        .await?;
    Ok(success("Account linked successfully", UserData { user }))
}
