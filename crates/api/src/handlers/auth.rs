//! Handlers for the `/auth` resource (registration, login, password recovery).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use hdlbridge_core::credentials::{validate_display_name, validate_password};
use hdlbridge_core::error::CoreError;
use hdlbridge_db::models::user::{CreateUser, UserResponse};
use hdlbridge_db::repositories::UserRepo;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, normalize_answer, verify_password};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Security question must not be empty"))]
    pub security_question: String,
    #[validate(length(min = 1, message = "Answer must not be empty"))]
    pub answer: String,
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/forgot-password/security-question`.
#[derive(Debug, Deserialize)]
pub struct SecurityQuestionRequest {
    pub email: String,
}

/// Request body for `POST /auth/forgot-password/reset`.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub answer: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct SecurityQuestionResponse {
    pub security_question: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;
    validate_display_name(&input.name)?;
    validate_password(&input.password)?;

    if UserRepo::email_exists(&state.pool, &input.email).await? {
        return Err(AppError::BadRequest("Email already registered".into()));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))?;
    let answer_hash = hash_password(&normalize_answer(&input.answer))
        .map_err(|e| AppError::InternalError(format!("Answer hashing failed: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            name: input.name.trim().to_string(),
            email: input.email,
            password_hash,
            security_question: input.security_question,
            answer_hash,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse { data: user.into() }),
    ))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns a bearer access token.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid credentials".into()));

    let user = UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::info!(user_id = user.id, "Failed login attempt");
        return Err(invalid());
    }

    let access_token = generate_access_token(user.id, &user.email, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation failed: {e}")))?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.config.jwt.expires_in_secs(),
    }))
}

/// POST /api/v1/auth/forgot-password/security-question
pub async fn security_question(
    State(state): State<AppState>,
    Json(input): Json<SecurityQuestionRequest>,
) -> AppResult<Json<DataResponse<SecurityQuestionResponse>>> {
    let user = UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .ok_or_else(|| CoreError::not_found("User", &input.email))?;

    Ok(Json(DataResponse {
        data: SecurityQuestionResponse {
            security_question: user.security_question,
        },
    }))
}

/// POST /api/v1/auth/forgot-password/reset
///
/// Replace the password after a case-insensitive security-answer check.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let user = UserRepo::find_by_email(&state.pool, &input.email)
        .await?
        .ok_or_else(|| CoreError::not_found("User", &input.email))?;

    let answer_valid = verify_password(&normalize_answer(&input.answer), &user.answer_hash)
        .map_err(|e| AppError::InternalError(format!("Answer verification error: {e}")))?;
    if !answer_valid {
        return Err(AppError::Core(CoreError::Unauthorized(
            "Incorrect security answer".into(),
        )));
    }

    validate_password(&input.new_password)?;
    let password_hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))?;
    UserRepo::update_password(&state.pool, user.id, &password_hash).await?;

    tracing::info!(user_id = user.id, "Password reset via security question");
    Ok(Json(DataResponse {
        data: MessageResponse {
            message: "Password reset successfully",
        },
    }))
}
