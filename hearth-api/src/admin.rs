use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use hearth_catalog::property::PropertyStatus;
use hearth_core::account::{AgentStatus, DashboardStats};
use hearth_core::payment::PaymentStatus;

use crate::agents::AgentResponse;
use crate::error::AppError;
use crate::mailer::templates;
use crate::middleware::auth::{has_permission, AdminClaims};
use crate::properties::PropertySummary;
use crate::response::{message_only, paginated, success, ApiResponse, PageQuery, Paginated};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/agents", get(list_agents))
        .route("/admin/agents/{id}/approve", post(approve_agent))
        .route("/admin/agents/{id}", delete(delete_agent))
        .route("/admin/properties", get(list_properties))
        .route("/admin/properties/{id}/status", put(update_property_status))
        .route("/admin/payments/{id}/refund", post(refund_payment))
        .route("/admin/stats", get(dashboard_stats))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AgentListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyListQuery {
    pub status: Option<String>,
    pub agent_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePropertyStatusRequest {
    pub status: PropertyStatus,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Defaults to everything still refundable on the payment.
    pub amount_cents: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct RefundResponse {
    pub refund_id: Uuid,
    pub amount_cents: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/admin/agents?status=&q=
async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<AgentListQuery>,
) -> Result<Json<Paginated<AgentResponse>>, AppError> {
    let status = match &query.status {
        Some(s) => Some(
            AgentStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };

    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = paging.clamp(&state.rules);

    let (agents, total) = state
        .agents
        .list(page, per_page, status, query.q.as_deref())
        .await?;

    let items = agents.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// POST /v1/admin/agents/{id}/approve
async fn approve_agent(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    require_permission(&claims, "agents.manage")?;
    state.agents.approve(id).await?;
    Ok(message_only("agent approved"))
}

/// DELETE /v1/admin/agents/{id}
/// Removes the agent and, via cascade, their listings.
async fn delete_agent(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    require_permission(&claims, "agents.manage")?;
    state.agents.delete(id).await?;
    Ok(message_only("agent deleted"))
}

/// GET /v1/admin/properties?status=&agent_id=
async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertyListQuery>,
) -> Result<Json<Paginated<PropertySummary>>, AppError> {
    let status = match &query.status {
        Some(s) => Some(
            PropertyStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };

    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = paging.clamp(&state.rules);

    let (properties, total) = state
        .properties
        .list(page, per_page, status, query.agent_id)
        .await?;

    let items = properties.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// PUT /v1/admin/properties/{id}/status
/// Listing moderation; approval notifies the owning agent.
async fn update_property_status(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePropertyStatusRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    require_permission(&claims, "properties.moderate")?;

    let property = state
        .properties
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;

    state.properties.set_status(id, req.status).await?;

    if req.status == PropertyStatus::Active {
        if let Some(agent) = state.agents.get(property.agent_id).await? {
            let _ = state
                .mailer
                .send(templates::property_approval(
                    &agent.email,
                    &agent.name,
                    &property.title,
                ))
                .await;
        }
    }

    Ok(message_only("property status updated"))
}

/// POST /v1/admin/payments/{id}/refund
/// Manual refund against a captured payment, capped at what has not been
/// refunded yet.
async fn refund_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<ApiResponse<RefundResponse>>, AppError> {
    require_permission(&claims, "payments.refund")?;

    let payment = state
        .payments
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("payment not found".into()))?;

    if payment.status != PaymentStatus::Captured && payment.status != PaymentStatus::Refunded {
        return Err(AppError::Validation("payment was never captured".into()));
    }

    let already_refunded = state.payments.refund_total(id).await?;
    let refundable = payment.amount_cents - already_refunded;
    let amount_cents = req.amount_cents.unwrap_or(refundable);

    if amount_cents <= 0 || amount_cents > refundable {
        return Err(AppError::Validation(format!(
            "refund must be between 1 and {refundable} cents"
        )));
    }

    let reference = payment.gateway_reference.as_deref().unwrap_or_default();
    let outcome = state
        .gateway
        .refund(reference, amount_cents)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let refund = state
        .payments
        .record_refund(
            id,
            amount_cents,
            req.reason.as_deref(),
            Some(&outcome.reference),
        )
        .await?;
    state
        .payments
        .update_status(id, PaymentStatus::Refunded)
        .await?;

    Ok(success(RefundResponse {
        refund_id: refund.id,
        amount_cents: refund.amount_cents,
    }))
}

/// GET /v1/admin/stats
async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardStats>>, AppError> {
    let stats = state.admins.dashboard_stats().await?;
    Ok(success(stats))
}

fn require_permission(claims: &AdminClaims, permission: &str) -> Result<(), AppError> {
    if !has_permission(claims, permission) {
        return Err(AppError::Forbidden(format!(
            "missing permission: {permission}"
        )));
    }
    Ok(())
}
