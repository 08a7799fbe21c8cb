use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::account::{self, User};
use hearth_core::validation;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::response::{message_only, paginated, success, ApiResponse, PageQuery, Paginated};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(profile).put(update_profile).delete(delete_account))
        .route("/users/me/password", put(update_password))
        .route("/users/me/favorites", get(list_favorites))
        .route(
            "/users/me/favorites/{property_id}",
            post(add_favorite).delete(remove_favorite),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/users/me
async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let user = state
        .users
        .get(claims.account_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("account not found".into()))?;

    Ok(success(user.into()))
}

/// PUT /v1/users/me
async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    validation::validate_non_empty("name", &req.name)?;

    let user = state
        .users
        .update_profile(claims.account_id()?, &req.name, req.phone.as_deref())
        .await?;

    Ok(success(user.into()))
}

/// PUT /v1/users/me/password
async fn update_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    validation::validate_password(&req.new_password)?;

    let id = claims.account_id()?;
    let user = state
        .users
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("account not found".into()))?;

    let ok = account::verify_password(&req.current_password, &user.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if !ok {
        return Err(AppError::Unauthorized("current password is incorrect".into()));
    }

    let hash = account::hash_password(&req.new_password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    state.users.update_password(id, &hash).await?;

    Ok(message_only("password updated"))
}

/// DELETE /v1/users/me
async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.users.delete(claims.account_id()?).await?;
    Ok(message_only("account deleted"))
}

/// GET /v1/users/me/favorites
async fn list_favorites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<crate::properties::PropertySummary>>, AppError> {
    let (page, per_page) = query.clamp(&state.rules);
    let (properties, total) = state
        .properties
        .list_favorites(claims.account_id()?, page, per_page)
        .await?;

    let items = properties.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// POST /v1/users/me/favorites/{property_id}
async fn add_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .properties
        .get(property_id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;

    state
        .users
        .add_favorite(claims.account_id()?, property_id)
        .await?;

    Ok(message_only("added to favorites"))
}

/// DELETE /v1/users/me/favorites/{property_id}
async fn remove_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .users
        .remove_favorite(claims.account_id()?, property_id)
        .await?;

    Ok(message_only("removed from favorites"))
}
