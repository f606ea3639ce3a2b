//! Auth orchestration: registration, login, token refresh, federated and
//! anonymous sign-in, and account linking.
//!
//! Unknown-email and wrong-password failures share one message so the
//! login surface cannot be used for account enumeration.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{operations::users, FirestoreClient};
use crate::models::{Provider, Role, TokenPair, User};
use crate::response::ApiError;
use crate::services::google_identity::{split_display_name, GoogleIdentityClient, IdentityError};
use crate::token;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub role: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<FirestoreClient>,
    identity: Arc<GoogleIdentityClient>,
    config: Arc<Config>,
}

impl AuthService {
    pub fn new(
        store: Arc<FirestoreClient>,
        identity: Arc<GoogleIdentityClient>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            identity,
            config,
        }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<AuthPayload, ApiError> {
        let mut field_errors = Vec::new();
        if input.email.trim().is_empty() {
            field_errors.push("email is required".to_string());
        } else if !is_valid_email(&input.email) {
            field_errors.push("email is not a valid address".to_string());
        }
        if input.password.is_empty() {
            field_errors.push("password is required".to_string());
        }
        if input.role.trim().is_empty() {
            field_errors.push("role is required".to_string());
        }
        if !field_errors.is_empty() {
            return Err(ApiError::validation_fields(
                "Email, password, and role are required",
                field_errors,
            ));
        }

        let Some(role) = Role::parse_registerable(&input.role) else {
            return Err(ApiError::validation(
                "Invalid role. Must be teacher, guardian, or student",
            ));
        };

        let email = input.email.trim().to_lowercase();
        if users::find_by_email(&self.store, &email).await?.is_some() {
            return Err(ApiError::conflict("User with this email already exists"));
        }

        let password_hash = self.hash_password(&input.password)?;
        let now = crate::response::now_iso();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            password: Some(password_hash),
            role,
            first_name: input.first_name,
            last_name: input.last_name,
            photo_url: String::new(),
            provider: Provider::Email,
            provider_id: None,
            is_active: true,
            is_anonymous: false,
            student_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let mut created = users::create_user(&self.store, &user).await?;
        created.password = None;

        tracing::info!(email = %email, "user registered");
        self.payload_for(created)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::validation("Email and password are required"));
        }

        let email = email.trim().to_lowercase();
        let Some(mut user) = users::find_by_email(&self.store, &email).await? else {
            return Err(ApiError::authentication(INVALID_CREDENTIALS));
        };

        if !user.is_active {
            return Err(ApiError::authentication(
                "Account is deactivated. Please contact support",
            ));
        }

        let password_ok = user
            .password
            .as_deref()
            .map(|hash| bcrypt::verify(password, hash).unwrap_or(false))
            .unwrap_or(false);
        if !password_ok {
            return Err(ApiError::authentication(INVALID_CREDENTIALS));
        }

        user.password = None;
        tracing::info!(email = %email, "user logged in");
        self.payload_for(user)
    }

    /// Exchange a refresh token for a new access token. The refresh token
    /// itself is not rotated.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        if refresh_token.trim().is_empty() {
            return Err(ApiError::validation("Refresh token is required"));
        }

        let claims = token::verify_refresh_token(refresh_token, &self.config.jwt_refresh_secret)
            .map_err(|_| ApiError::authentication("Invalid or expired refresh token"))?;

        let Some(user) = users::get_by_id(&self.store, &claims.id).await? else {
            return Err(ApiError::authentication("User not found"));
        };
        if !user.is_active {
            return Err(ApiError::authentication("Account is deactivated"));
        }

        self.sign_access(&user)
    }

    pub async fn google_sign_in(
        &self,
        id_token: &str,
        role: Option<&str>,
    ) -> Result<AuthPayload, ApiError> {
        let identity = self.identity.verify_id_token(id_token).await.map_err(
            |err| match err {
                IdentityError::MissingEmail => {
                    ApiError::authentication("Email not provided by Google")
                }
                _ => ApiError::authentication("Invalid or expired token"),
            },
        )?;

        let email = identity
            .email
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        let user = match users::find_by_email(&self.store, &email).await? {
            Some(existing) => {
                let now = crate::response::now_iso();
                let mut touched = users::touch_updated_at(&self.store, &existing.id, &now).await?;
                touched.password = None;
                tracing::info!(email = %email, "user logged in via Google");
                touched
            }
            None => {
                let (first_name, last_name) = split_display_name(identity.name.as_deref());
                let role = role
                    .and_then(Role::parse_registerable)
                    .unwrap_or(Role::Student);
                let now = crate::response::now_iso();
                let user = User {
                    id: Uuid::new_v4().to_string(),
                    email: email.clone(),
                    password: None,
                    role,
                    first_name,
                    last_name,
                    photo_url: identity.picture.unwrap_or_default(),
                    provider: Provider::Google,
                    provider_id: Some(identity.sub),
                    is_active: true,
                    is_anonymous: false,
                    student_ids: Vec::new(),
                    created_at: now.clone(),
                    updated_at: now,
                };
                let created = users::create_user(&self.store, &user).await?;
                tracing::info!(email = %email, "new user created via Google");
                created
            }
        };

        self.payload_for(user)
    }

    pub async fn anonymous_sign_in(&self) -> Result<AuthPayload, ApiError> {
        let now = crate::response::now_iso();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: format!("anonymous_{}@aptx.local", Uuid::new_v4().simple()),
            password: None,
            role: Role::Student,
            first_name: "Anonymous".to_string(),
            last_name: "User".to_string(),
            photo_url: String::new(),
            provider: Provider::Anonymous,
            provider_id: None,
            is_active: true,
            is_anonymous: true,
            student_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        let created = users::create_user(&self.store, &user).await?;
        tracing::info!(user_id = %created.id, "anonymous user created");
        self.payload_for(created)
    }

    /// Upgrade an anonymous account to email/password. The anonymous user
    /// is untouched when the target email is already owned.
    pub async fn link_anonymous_account(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ApiError::validation("Email and password are required"));
        }
        if !is_valid_email(email) {
            return Err(ApiError::validation("email is not a valid address"));
        }

        let email = email.trim().to_lowercase();
        if users::find_by_email(&self.store, &email).await?.is_some() {
            return Err(ApiError::conflict("Email already in use"));
        }

        let password_hash = self.hash_password(password)?;
        let mut fields = serde_json::Map::new();
        fields.insert("email".to_string(), serde_json::Value::String(email.clone()));
        fields.insert(
            "password".to_string(),
            serde_json::Value::String(password_hash),
        );
        fields.insert(
            "provider".to_string(),
            serde_json::Value::String(Provider::Email.as_str().to_string()),
        );
        fields.insert("isAnonymous".to_string(), serde_json::Value::Bool(false));
        fields.insert(
            "updatedAt".to_string(),
            serde_json::Value::String(crate::response::now_iso()),
        );

        let mut updated = users::update_user(&self.store, user_id, fields).await?;
        updated.password = None;

        tracing::info!(email = %email, "anonymous account linked to email");
        Ok(updated)
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<User, ApiError> {
        let Some(mut user) = users::get_by_id(&self.store, user_id).await? else {
            return Err(ApiError::not_found("User not found"));
        };
        user.password = None;
        Ok(user)
    }

    fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        bcrypt::hash(password, self.config.bcrypt_rounds)
            .map_err(|err| ApiError::internal(format!("password hash failed: {err}")))
    }

    fn sign_access(&self, user: &User) -> Result<String, ApiError> {
        token::sign_access_token(
            &user.id,
            &user.email,
            user.role.as_str(),
            &self.config.jwt_secret,
            &self.config.jwt_expire,
        )
        .map_err(|err| ApiError::internal(format!("token sign failed: {err}")))
    }

    fn payload_for(&self, user: User) -> Result<AuthPayload, ApiError> {
        let tokens = self.issue_tokens(&user)?;
        Ok(AuthPayload {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    fn issue_tokens(&self, user: &User) -> Result<TokenPair, ApiError> {
        let access_token = self.sign_access(user)?;
        let refresh_token = token::sign_refresh_token(
            &user.id,
            &user.email,
            &self.config.jwt_refresh_secret,
            &self.config.jwt_refresh_expire,
        )
        .map_err(|err| ApiError::internal(format!("token sign failed: {err}")))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.contains(' ') {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    domain.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("kid@example.com"));
        assert!(is_valid_email("  padded@example.org  "));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at.example.com"));
        assert!(!is_valid_email("spaced name@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
    }
}
