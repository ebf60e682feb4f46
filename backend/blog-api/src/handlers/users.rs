/// User handlers - registration and login
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::ValidateEmail;

use crate::db::user_repo;
use crate::error::{AppError, Result};
use auth_core::{jwt, password};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

/// Pull both credential fields out of a request body, rejecting requests
/// where either is missing or blank.
fn require_credentials(
    email: &Option<String>,
    password: &Option<String>,
) -> Result<(String, String)> {
    let email = email.as_deref().map(str::trim).unwrap_or_default();
    let password = password.as_deref().unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Both email and password are required".to_string(),
        ));
    }

    Ok((email.to_string(), password.to_string()))
}

/// Register endpoint handler
///
/// POST /api/users/register
pub async fn register(
    pool: web::Data<PgPool>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    let (email, password) = require_credentials(&payload.email, &payload.password)?;

    if !email.validate_email() {
        return Err(AppError::Validation(
            "Email address is not valid".to_string(),
        ));
    }

    // Pre-check for a friendly answer; the unique constraint still decides
    // the race between two concurrent registrations.
    if user_repo::email_exists(&pool, &email).await? {
        return Err(AppError::EmailInUse);
    }

    let password_hash = password::hash_password(&password)?;
    let user = user_repo::create_user(&pool, &email, &password_hash).await?;

    tracing::info!(user_id = user.id, "user registered");

    Ok(HttpResponse::Created().json(RegisterResponse {
        id: user.id,
        email: user.email,
    }))
}

/// Login endpoint handler
///
/// POST /api/users/login
pub async fn login(
    pool: web::Data<PgPool>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let (email, password) = require_credentials(&payload.email, &payload.password)?;

    // Unknown email and wrong password take the same exit.
    let user = match user_repo::find_by_email(&pool, &email).await? {
        Some(user) => user,
        None => return Err(AppError::InvalidCredentials),
    };

    if !password::verify_password(&password, &user.password_hash)? {
        tracing::warn!(user_id = user.id, "failed login attempt");
        return Err(AppError::InvalidCredentials);
    }

    let token = jwt::issue_token(user.id, &user.email)?;

    tracing::info!(user_id = user.id, "user logged in");

    Ok(HttpResponse::Ok().json(LoginResponse {
        message: "Login successful".to_string(),
        token,
    }))
}
