use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::payment::{
    CardDetails, ChargeRequest, NewPayment, Payment, PaymentPurpose, PaymentStatus,
};
use hearth_shared::events::{ReservationConfirmedEvent, ReservationEvent};

use crate::error::AppError;
use crate::mailer::templates;
use crate::middleware::auth::Claims;
use crate::reservations::{booking_manager, owned_reservation};
use crate::response::{paginated, success_with_message, ApiResponse, PageQuery, Paginated};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments))
        .route("/payments/card", post(pay_reservation))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CardPaymentRequest {
    pub reservation_id: Uuid,
    pub card: CardDetails,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub purpose: PaymentPurpose,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: String,
    pub card_last_four: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            reservation_id: p.reservation_id,
            purpose: p.purpose,
            amount_cents: p.amount_cents,
            currency: p.currency,
            status: p.status,
            method: p.method,
            card_last_four: p.card_last_four,
            created_at: p.created_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/payments/card
/// Charge the reservation total. A captured charge confirms the
/// reservation; a declined one is recorded and leaves it pending.
async fn pay_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CardPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentResponse>>, AppError> {
    let reservation = owned_reservation(&state, &claims, req.reservation_id).await?;

    // The transition guard also rejects paying cancelled/confirmed rows.
    let manager = booking_manager(&state);
    let next_status = manager.confirm(&reservation)?;

    req.card.validate(Utc::now())?;

    let outcome = state
        .gateway
        .charge(&ChargeRequest {
            amount_cents: reservation.total_cents,
            currency: state.rules.currency.clone(),
            card: req.card.clone(),
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let payment = state
        .payments
        .record(&NewPayment {
            user_id: reservation.guest_id,
            reservation_id: Some(reservation.id),
            purpose: PaymentPurpose::Reservation,
            amount_cents: reservation.total_cents,
            currency: state.rules.currency.clone(),
            status: outcome.status.clone(),
            method: "card".into(),
            card_last_four: Some(req.card.last_four()),
            gateway_reference: Some(outcome.reference.clone()),
        })
        .await?;

    if outcome.status != PaymentStatus::Captured {
        return Err(AppError::Validation("payment was declined".into()));
    }

    state
        .reservations
        .update_status(reservation.id, next_status)
        .await?;

    if let Some(guest) = state.users.get(reservation.guest_id).await? {
        let _ = state
            .mailer
            .send(templates::payment_receipt(
                &guest.email,
                &guest.name,
                payment.amount_cents,
                payment.card_last_four.as_deref().unwrap_or(""),
            ))
            .await;
    }

    let _ = state
        .events_tx
        .send(ReservationEvent::Confirmed(ReservationConfirmedEvent {
            reservation_id: reservation.id,
            payment_id: payment.id,
            amount_cents: payment.amount_cents,
            timestamp: Utc::now().timestamp(),
        }));

    Ok(success_with_message(payment.into(), "reservation confirmed"))
}

/// GET /v1/payments
async fn list_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PaymentResponse>>, AppError> {
    let (page, per_page) = query.clamp(&state.rules);

    let (payments, total) = state
        .payments
        .by_user(claims.account_id()?, page, per_page)
        .await?;

    let items = payments.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}
