use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::models::Role;
use crate::response::ApiError;
use crate::state::AppState;
use crate::token;

/// Authenticated caller, attached to the request by `require_auth`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;
    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.to_string())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(req.headers()) else {
        return ApiError::authentication("No authentication token provided").into_response();
    };

    match token::verify_access_token(&token, &state.config().jwt_secret) {
        Ok(claims) => {
            let Some(role) = Role::parse(&claims.role) else {
                return ApiError::authentication("Invalid or expired token").into_response();
            };
            req.extensions_mut().insert(AuthUser {
                id: claims.id,
                email: claims.email,
                role,
            });
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "token verification failed");
            ApiError::authentication("Invalid or expired token").into_response()
        }
    }
}

/// Role guard used inside handlers once `require_auth` has run. Admin
/// passes every check (legacy accounts).
pub fn ensure_role(user: &AuthUser, allowed: &[Role]) -> Result<(), ApiError> {
    if user.role == Role::Admin || allowed.contains(&user.role) {
        return Ok(());
    }
    tracing::warn!(
        user_id = %user.id,
        role = user.role.as_str(),
        "authorization failed"
    );
    Err(ApiError::authorization(
        "You do not have permission to access this resource",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: "u1".into(),
            email: "u@example.com".into(),
            role,
        }
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi".into()));

        headers.insert(header::AUTHORIZATION, "Basic xyz".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);

        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn role_guard_allows_listed_and_admin() {
        assert!(ensure_role(&user(Role::Teacher), &[Role::Teacher]).is_ok());
        assert!(ensure_role(&user(Role::Admin), &[Role::Teacher]).is_ok());
        assert!(ensure_role(&user(Role::Student), &[Role::Teacher]).is_err());
        assert!(ensure_role(&user(Role::Guardian), &[Role::Teacher, Role::Guardian]).is_ok());
    }
}
