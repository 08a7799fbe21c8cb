use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::availability::StayRange;
use crate::models::{NewReservation, Reservation, ReservationStatus};

#[derive(Debug, thiserror::Error)]
pub enum ReservationStoreError {
    /// The requested dates conflict with another live reservation. Returned
    /// from the atomic create/date-change paths when the in-transaction
    /// re-check (or the exclusion constraint) fires.
    #[error("property is not available for the selected dates")]
    Unavailable,

    #[error("reservation not found")]
    NotFound,

    #[error("storage error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Repository trait for reservation data access.
///
/// `create` and `update_dates` are required to perform their availability
/// check and the following write as one atomic unit (transaction plus a
/// per-property lock), so two concurrent overlapping requests can never
/// both commit.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, reservation: &NewReservation)
        -> Result<Reservation, ReservationStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, ReservationStoreError>;

    /// Read-only availability probe for the standalone check endpoint.
    async fn is_available(
        &self,
        property_id: Uuid,
        range: &StayRange,
        exclude: Option<Uuid>,
    ) -> Result<bool, ReservationStoreError>;

    async fn list_by_guest(
        &self,
        guest_id: Uuid,
        page: u32,
        per_page: u32,
        status: Option<ReservationStatus>,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError>;

    /// Confirmed reservations with check-in today or later.
    async fn upcoming(
        &self,
        guest_id: Uuid,
        today: NaiveDate,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError>;

    /// Reservations whose check-out has passed.
    async fn past(
        &self,
        guest_id: Uuid,
        today: NaiveDate,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError>;

    async fn update_dates(
        &self,
        id: Uuid,
        range: &StayRange,
        total_cents: i64,
    ) -> Result<Reservation, ReservationStoreError>;

    async fn update_guests(&self, id: Uuid, guests_count: i32)
        -> Result<(), ReservationStoreError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<(), ReservationStoreError>;

    async fn cancel(&self, id: Uuid, reason: Option<&str>)
        -> Result<(), ReservationStoreError>;

    /// Cancel `pending` reservations created before `cutoff`, releasing
    /// their dates. Returns how many were expired.
    async fn expire_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, ReservationStoreError>;
}
