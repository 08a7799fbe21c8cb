use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_booking::changes::ChangeHandler;
use hearth_booking::manager::{BookingManager, CancellationPolicy};
use hearth_booking::models::{NewReservation, Reservation, ReservationStatus};
use hearth_catalog::property::PropertyStatus;
use hearth_core::payment::PaymentStatus;
use hearth_core::validation;
use hearth_shared::events::{
    ReservationCancelledEvent, ReservationCreatedEvent, ReservationEvent,
};

use crate::error::AppError;
use crate::mailer::templates;
use crate::middleware::auth::Claims;
use crate::properties::quote_engine;
use crate::response::{paginated, success, success_with_message, ApiResponse, PageQuery, Paginated};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_reservations).post(create_reservation))
        .route("/reservations/upcoming", get(upcoming_reservations))
        .route("/reservations/past", get(past_reservations))
        .route("/reservations/{id}", get(view_reservation))
        .route("/reservations/{id}/cancel", post(cancel_reservation))
        .route("/reservations/{id}/dates", put(update_dates))
        .route("/reservations/{id}/guests", put(update_guests))
        .route("/reservations/{id}/payments", get(reservation_payments))
}

pub fn booking_manager(state: &AppState) -> BookingManager {
    BookingManager::new(CancellationPolicy {
        deadline_hours: state.rules.cancellation_deadline_hours,
        refund_percentage: state.rules.refund_percentage,
    })
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests_count: i32,
    pub special_requests: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub property_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests_count: i32,
    pub total_cents: i64,
    pub status: ReservationStatus,
    pub special_requests: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            property_id: r.property_id,
            check_in: r.check_in,
            check_out: r.check_out,
            guests_count: r.guests_count,
            total_cents: r.total_cents,
            status: r.status,
            special_requests: r.special_requests,
            cancellation_reason: r.cancellation_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListReservationsQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub refund_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDatesRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGuestsRequest {
    pub guests_count: i32,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/reservations
/// Book a stay. The availability check and the insert run as one atomic
/// unit in the repository; a conflict surfaces as 409.
async fn create_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    validation::validate_date_range(req.check_in, req.check_out)?;

    let property = state
        .properties
        .get(req.property_id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;

    if property.status != PropertyStatus::Active {
        return Err(AppError::Validation(
            "property is not available for booking".into(),
        ));
    }
    if req.guests_count < 1 || req.guests_count > property.max_guests {
        return Err(AppError::Validation(format!(
            "property sleeps at most {} guests",
            property.max_guests
        )));
    }

    // Price is always quoted server-side.
    let total_cents = quote_engine(&state.rules).quote(
        req.check_in,
        req.check_out,
        property.nightly_rate_cents,
    )?;

    let guest_id = claims.account_id()?;
    let reservation = state
        .reservations
        .create(&NewReservation {
            property_id: req.property_id,
            guest_id,
            check_in: req.check_in,
            check_out: req.check_out,
            guests_count: req.guests_count,
            total_cents,
            special_requests: req.special_requests,
        })
        .await?;

    if let Some(guest) = state.users.get(guest_id).await? {
        let _ = state
            .mailer
            .send(templates::reservation_confirmation(
                &guest.email,
                &guest.name,
                &property.title,
                reservation.check_in,
                reservation.check_out,
                total_cents,
            ))
            .await;
    }

    let _ = state
        .events_tx
        .send(ReservationEvent::Created(ReservationCreatedEvent {
            reservation_id: reservation.id,
            property_id: reservation.property_id,
            guest_id,
            check_in: reservation.check_in,
            check_out: reservation.check_out,
            total_cents,
            timestamp: Utc::now().timestamp(),
        }));

    Ok(success_with_message(
        reservation.into(),
        "reservation created, awaiting payment",
    ))
}

/// GET /v1/reservations?status=&page=&per_page=
async fn list_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<Paginated<ReservationResponse>>, AppError> {
    let status = match &query.status {
        Some(s) => Some(
            ReservationStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };

    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = paging.clamp(&state.rules);

    let (reservations, total) = state
        .reservations
        .list_by_guest(claims.account_id()?, page, per_page, status)
        .await?;

    let items = reservations.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// GET /v1/reservations/upcoming
async fn upcoming_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<ReservationResponse>>, AppError> {
    let (page, per_page) = query.clamp(&state.rules);
    let today = Utc::now().date_naive();

    let (reservations, total) = state
        .reservations
        .upcoming(claims.account_id()?, today, page, per_page)
        .await?;

    let items = reservations.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// GET /v1/reservations/past
async fn past_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<ReservationResponse>>, AppError> {
    let (page, per_page) = query.clamp(&state.rules);
    let today = Utc::now().date_naive();

    let (reservations, total) = state
        .reservations
        .past(claims.account_id()?, today, page, per_page)
        .await?;

    let items = reservations.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// GET /v1/reservations/{id}
async fn view_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let reservation = owned_reservation(&state, &claims, id).await?;
    Ok(success(reservation.into()))
}

/// POST /v1/reservations/{id}/cancel
/// Rejected inside the cancellation deadline. Refunds 80% of the total
/// against the captured payment, when one exists.
async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ApiResponse<CancelResponse>>, AppError> {
    let reservation = owned_reservation(&state, &claims, id).await?;

    let manager = booking_manager(&state);
    let refund_due = manager.cancel(&reservation, Utc::now())?;

    state.reservations.cancel(id, req.reason.as_deref()).await?;

    // Only refund what was actually captured.
    let mut refund_cents = 0;
    if let Some(payment) = state.payments.latest_captured_for_reservation(id).await? {
        let already_refunded = state.payments.refund_total(payment.id).await?;
        refund_cents = refund_due.min(payment.amount_cents - already_refunded).max(0);

        if refund_cents > 0 {
            let reference = payment.gateway_reference.as_deref().unwrap_or_default();
            let outcome = state
                .gateway
                .refund(reference, refund_cents)
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

            state
                .payments
                .record_refund(
                    payment.id,
                    refund_cents,
                    req.reason.as_deref(),
                    Some(&outcome.reference),
                )
                .await?;
            state
                .payments
                .update_status(payment.id, PaymentStatus::Refunded)
                .await?;
        }
    }

    let property_title = state
        .properties
        .get(reservation.property_id)
        .await?
        .map(|p| p.title)
        .unwrap_or_else(|| "your stay".into());
    if let Some(guest) = state.users.get(reservation.guest_id).await? {
        let _ = state
            .mailer
            .send(templates::booking_cancellation(
                &guest.email,
                &guest.name,
                &property_title,
                refund_cents,
            ))
            .await;
    }

    let _ = state
        .events_tx
        .send(ReservationEvent::Cancelled(ReservationCancelledEvent {
            reservation_id: id,
            property_id: reservation.property_id,
            refund_cents,
            timestamp: Utc::now().timestamp(),
        }));

    Ok(success_with_message(
        CancelResponse { refund_cents },
        "reservation cancelled",
    ))
}

/// PUT /v1/reservations/{id}/dates
/// Re-runs the availability check excluding this reservation, atomically
/// with the update; the total is re-quoted at the property's current rate.
async fn update_dates(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDatesRequest>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let reservation = owned_reservation(&state, &claims, id).await?;

    let range = ChangeHandler::validate_date_change(&reservation, req.check_in, req.check_out)?;

    let property = state
        .properties
        .get(reservation.property_id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;

    let total_cents = quote_engine(&state.rules).quote(
        req.check_in,
        req.check_out,
        property.nightly_rate_cents,
    )?;

    let updated = state.reservations.update_dates(id, &range, total_cents).await?;
    Ok(success(updated.into()))
}

/// PUT /v1/reservations/{id}/guests
async fn update_guests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGuestsRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let reservation = owned_reservation(&state, &claims, id).await?;

    let property = state
        .properties
        .get(reservation.property_id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;

    ChangeHandler::validate_guest_change(&reservation, req.guests_count, property.max_guests)?;

    state.reservations.update_guests(id, req.guests_count).await?;
    Ok(success_with_message((), "guest count updated"))
}

/// GET /v1/reservations/{id}/payments
async fn reservation_payments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<crate::payments::PaymentResponse>>>, AppError> {
    owned_reservation(&state, &claims, id).await?;

    let payments = state.payments.by_reservation(id).await?;
    Ok(success(payments.into_iter().map(Into::into).collect()))
}

/// Fetch a reservation and require that `claims` owns it.
pub async fn owned_reservation(
    state: &AppState,
    claims: &Claims,
    id: Uuid,
) -> Result<Reservation, AppError> {
    let reservation = state
        .reservations
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("reservation not found".into()))?;

    if reservation.guest_id != claims.account_id()? {
        return Err(AppError::Forbidden(
            "you do not have access to this reservation".into(),
        ));
    }
    Ok(reservation)
}
