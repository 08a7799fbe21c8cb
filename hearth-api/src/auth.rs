use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::account::{self, NewAgent, NewUser};
use hearth_core::validation;

use crate::error::AppError;
use crate::mailer::templates;
use crate::middleware::auth::{AdminClaims, Claims};
use crate::response::{success_with_message, ApiResponse};
use crate::state::{AppState, AuthConfig};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_guest))
        .route("/auth/login", post(login_guest))
        .route("/auth/agent/register", post(register_agent))
        .route("/auth/agent/login", post(login_agent))
        .route("/auth/admin/login", post(login_admin))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub account_id: Uuid,
    pub role: String,
}

// ============================================================================
// Token issuing
// ============================================================================

fn expiry(auth: &AuthConfig) -> usize {
    (Utc::now() + chrono::Duration::seconds(auth.expiration as i64)).timestamp() as usize
}

pub fn issue_token(
    auth: &AuthConfig,
    account_id: Uuid,
    email: &str,
    role: &str,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: account_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: expiry(auth),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
}

pub fn issue_admin_token(
    auth: &AuthConfig,
    account_id: Uuid,
    email: &str,
    permissions: Vec<String>,
) -> Result<String, AppError> {
    let claims = AdminClaims {
        sub: account_id.to_string(),
        email: email.to_string(),
        role: "ADMIN".to_string(),
        permissions,
        exp: expiry(auth),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/auth/register
/// Create a guest account and return a session token.
async fn register_guest(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    validation::validate_non_empty("name", &req.name)?;
    validation::validate_email(&req.email)?;
    validation::validate_password(&req.password)?;

    let password_hash = account::hash_password(&req.password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let user = state
        .users
        .create(&NewUser {
            name: req.name,
            email: req.email,
            phone: req.phone,
            password_hash,
        })
        .await?;

    let _ = state
        .mailer
        .send(templates::welcome(&user.email, &user.name))
        .await;

    let token = issue_token(&state.auth, user.id, &user.email, "GUEST")?;
    Ok(success_with_message(
        AuthResponse {
            token,
            account_id: user.id,
            role: "GUEST".into(),
        },
        "account created",
    ))
}

/// POST /v1/auth/login
async fn login_guest(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".into()))?;

    let ok = account::verify_password(&req.password, &user.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if !ok {
        return Err(AppError::Unauthorized("invalid email or password".into()));
    }

    let token = issue_token(&state.auth, user.id, &user.email, "GUEST")?;
    Ok(success_with_message(
        AuthResponse {
            token,
            account_id: user.id,
            role: "GUEST".into(),
        },
        "logged in",
    ))
}

/// POST /v1/auth/agent/register
/// Agents start out pending and must be approved before listing.
async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    validation::validate_non_empty("name", &req.name)?;
    validation::validate_email(&req.email)?;
    validation::validate_password(&req.password)?;

    let password_hash = account::hash_password(&req.password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let agent = state
        .agents
        .create(&NewAgent {
            name: req.name,
            email: req.email,
            phone: req.phone,
            company: req.company,
            password_hash,
        })
        .await?;

    let token = issue_token(&state.auth, agent.id, &agent.email, "AGENT")?;
    Ok(success_with_message(
        AuthResponse {
            token,
            account_id: agent.id,
            role: "AGENT".into(),
        },
        "agent account created, pending approval",
    ))
}

/// POST /v1/auth/agent/login
async fn login_agent(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let agent = state
        .agents
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".into()))?;

    let ok = account::verify_password(&req.password, &agent.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if !ok {
        return Err(AppError::Unauthorized("invalid email or password".into()));
    }

    let token = issue_token(&state.auth, agent.id, &agent.email, "AGENT")?;
    Ok(success_with_message(
        AuthResponse {
            token,
            account_id: agent.id,
            role: "AGENT".into(),
        },
        "logged in",
    ))
}

/// POST /v1/auth/admin/login
/// Admin accounts are provisioned out of band; there is no registration.
async fn login_admin(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let admin = state
        .admins
        .find_by_email(&req.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid email or password".into()))?;

    let ok = account::verify_password(&req.password, &admin.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if !ok {
        return Err(AppError::Unauthorized("invalid email or password".into()));
    }

    let token = issue_admin_token(&state.auth, admin.id, &admin.email, admin.permissions)?;
    Ok(success_with_message(
        AuthResponse {
            token,
            account_id: admin.id,
            role: "ADMIN".into(),
        },
        "logged in",
    ))
}
