//! Account handlers: sign-up, sign-in, profile, password and LLM preferences

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docchat_common::{
    auth::{
        hash_password, password_strength, validate_email, verify_password, AuthUser,
        PasswordStrength, MIN_PASSWORD_LENGTH,
    },
    db::{models::User, UserCounts},
    errors::{AppError, Result},
    llm::{DEFAULT_MODEL, DEFAULT_PROVIDER},
};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 200))]
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default, alias = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(default, alias = "newPassword")]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LlmPreferencesRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "apiKeys")]
    pub api_keys: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordStrengthRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Serialize)]
pub struct SigninResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<UserCounts>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize)]
pub struct LlmPreferencesResponse {
    pub provider: String,
    pub model: String,
    pub api_keys: BTreeMap<String, String>,
}

impl ProfileResponse {
    fn new(user: User, counts: Option<UserCounts>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at.to_rfc3339(),
            counts,
        }
    }
}

/// Trimmed value, `None` when absent or blank
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Register a new account
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    let (email, password) = match (non_blank(request.email), request.password) {
        (Some(email), Some(password)) if !password.is_empty() => (email.to_lowercase(), password),
        _ => return Err(AppError::validation("Email and password are required")),
    };

    if !validate_email(&email) {
        return Err(AppError::Validation {
            message: "Invalid email format".to_string(),
            field: Some("email".to_string()),
        });
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation {
            message: format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            ),
            field: Some("password".to_string()),
        });
    }

    let strength = password_strength(&password);
    if !strength.is_acceptable() {
        return Err(AppError::Validation {
            message: format!("Password is too weak ({})", strength.label),
            field: Some("password".to_string()),
        });
    }

    if state.repo.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::UserExists);
    }

    let password_hash = hash_password(&password)?;
    let user = state
        .repo
        .create_user(email, password_hash, non_blank(request.name))
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully",
            user,
        }),
    ))
}

/// Exchange credentials for a bearer token
pub async fn signin(
    State(state): State<AppState>,
    Json(request): Json<SigninRequest>,
) -> Result<Json<SigninResponse>> {
    let (email, password) = match (non_blank(request.email), request.password) {
        (Some(email), Some(password)) if !password.is_empty() => (email.to_lowercase(), password),
        _ => return Err(AppError::validation("Email and password are required")),
    };

    let user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&password, &user.password_hash) {
        tracing::warn!(user_id = %user.id, "Sign-in with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = state.jwt.generate_token(user.id, &user.email)?;

    Ok(Json(SigninResponse {
        token,
        token_type: "Bearer",
        expires_in: state.jwt.expiration_secs(),
        user,
    }))
}

/// Current user's profile with record counts
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<ProfileResponse>> {
    let user = state
        .repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;
    let counts = state.repo.count_user_records(user.id).await?;

    Ok(Json(ProfileResponse::new(user, Some(counts))))
}

/// Update the display name
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("name".to_string()),
    })?;

    let user = state
        .repo
        .update_user_name(auth.user_id, non_blank(request.name))
        .await?;

    Ok(Json(ProfileResponse::new(user, None)))
}

/// Replace the password after checking the current one
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let (current, new) = match (request.current_password, request.new_password) {
        (Some(current), Some(new)) if !current.is_empty() && !new.is_empty() => (current, new),
        _ => {
            return Err(AppError::validation(
                "Current password and new password are required",
            ))
        }
    };

    if new.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation {
            message: format!(
                "New password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            ),
            field: Some("new_password".to_string()),
        });
    }

    let user = state
        .repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    if !verify_password(&current, &user.password_hash) {
        return Err(AppError::Validation {
            message: "Current password is incorrect".to_string(),
            field: Some("current_password".to_string()),
        });
    }

    state
        .repo
        .update_password(user.id, hash_password(&new)?)
        .await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

/// Stored provider, model and API keys
pub async fn get_llm_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<LlmPreferencesResponse>> {
    let user = state
        .repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let api_keys = state
        .repo
        .list_api_keys(user.id)
        .await?
        .into_iter()
        .map(|k| (k.provider, k.key))
        .collect();

    Ok(Json(LlmPreferencesResponse {
        provider: user.llm_provider.unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
        model: user.llm_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        api_keys,
    }))
}

/// Save provider, model and any API keys sent along
pub async fn save_llm_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<LlmPreferencesRequest>,
) -> Result<Json<SuccessResponse>> {
    let provider = non_blank(request.provider).unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    let model = non_blank(request.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());

    state
        .repo
        .update_llm_preferences(auth.user_id, provider, model)
        .await?;

    for (provider, key) in request.api_keys {
        let key = key.trim().to_string();
        if key.is_empty() {
            continue;
        }
        state.repo.upsert_api_key(auth.user_id, &provider, key).await?;
    }

    Ok(Json(SuccessResponse { success: true }))
}

/// Score a candidate password
pub async fn check_password_strength(
    Json(request): Json<PasswordStrengthRequest>,
) -> Json<PasswordStrength> {
    Json(password_strength(&request.password))
}
