use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_catalog::plans;
use hearth_core::account::{self, Agent, AgentStatus, SubscriptionPlan};
use hearth_core::payment::{CardDetails, ChargeRequest, NewPayment, PaymentPurpose, PaymentStatus};
use hearth_core::validation;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::properties::PropertySummary;
use crate::response::{message_only, paginated, success, success_with_message, ApiResponse, PageQuery, Paginated};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/agents/me", get(profile).put(update_profile).delete(delete_account))
        .route("/agents/me/password", put(update_password))
        .route("/agents/me/properties", get(my_properties))
        .route("/agents/me/subscription", post(upgrade_subscription))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub status: AgentStatus,
    pub plan: SubscriptionPlan,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            email: agent.email,
            phone: agent.phone,
            company: agent.company,
            status: agent.status,
            plan: agent.plan,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeSubscriptionRequest {
    pub plan: SubscriptionPlan,
    pub card: CardDetails,
}

// ============================================================================
// Handlers
// ============================================================================

async fn current_agent(state: &AppState, claims: &Claims) -> Result<Agent, AppError> {
    state
        .agents
        .get(claims.account_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("account not found".into()))
}

/// GET /v1/agents/me
async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<AgentResponse>>, AppError> {
    let agent = current_agent(&state, &claims).await?;
    Ok(success(agent.into()))
}

/// PUT /v1/agents/me
async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<AgentResponse>>, AppError> {
    validation::validate_non_empty("name", &req.name)?;

    let agent = state
        .agents
        .update_profile(
            claims.account_id()?,
            &req.name,
            req.phone.as_deref(),
            req.company.as_deref(),
        )
        .await?;

    Ok(success(agent.into()))
}

/// PUT /v1/agents/me/password
async fn update_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    validation::validate_password(&req.new_password)?;

    let agent = current_agent(&state, &claims).await?;
    let ok = account::verify_password(&req.current_password, &agent.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if !ok {
        return Err(AppError::Unauthorized("current password is incorrect".into()));
    }

    let hash = account::hash_password(&req.new_password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    state.agents.update_password(agent.id, &hash).await?;

    Ok(message_only("password updated"))
}

/// DELETE /v1/agents/me
async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.agents.delete(claims.account_id()?).await?;
    Ok(message_only("account deleted"))
}

/// GET /v1/agents/me/properties
/// All of the agent's listings, any status.
async fn my_properties(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PropertySummary>>, AppError> {
    let (page, per_page) = query.clamp(&state.rules);

    let (properties, total) = state
        .properties
        .list(page, per_page, None, Some(claims.account_id()?))
        .await?;

    let items = properties.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// POST /v1/agents/me/subscription
/// Upgrade the listing plan; the plan price is charged as a subscription
/// payment.
async fn upgrade_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpgradeSubscriptionRequest>,
) -> Result<Json<ApiResponse<AgentResponse>>, AppError> {
    let agent = current_agent(&state, &claims).await?;

    if req.plan == agent.plan {
        return Err(AppError::Validation("already on this plan".into()));
    }

    let price_cents = plans::plan_price_cents(req.plan);
    if price_cents > 0 {
        req.card.validate(Utc::now())?;

        let outcome = state
            .gateway
            .charge(&ChargeRequest {
                amount_cents: price_cents,
                currency: state.rules.currency.clone(),
                card: req.card.clone(),
            })
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        state
            .payments
            .record(&NewPayment {
                user_id: agent.id,
                reservation_id: None,
                purpose: PaymentPurpose::Subscription,
                amount_cents: price_cents,
                currency: state.rules.currency.clone(),
                status: outcome.status.clone(),
                method: "card".into(),
                card_last_four: Some(req.card.last_four()),
                gateway_reference: Some(outcome.reference),
            })
            .await?;

        if outcome.status != PaymentStatus::Captured {
            return Err(AppError::Validation("payment was declined".into()));
        }
    }

    state.agents.set_plan(agent.id, req.plan).await?;
    let agent = current_agent(&state, &claims).await?;

    Ok(success_with_message(agent.into(), "subscription updated"))
}
