use chrono::NaiveDate;

use crate::availability::StayRange;
use crate::models::{Reservation, ReservationStatus};

/// Handles guest-initiated modifications to an existing reservation.
pub struct ChangeHandler;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChangeError {
    #[error("cancelled reservations cannot be modified")]
    NotModifiable,

    #[error("check-out must be after check-in")]
    InvalidRange,

    #[error("property sleeps at most {max} guests")]
    TooManyGuests { max: i32 },
}

impl ChangeHandler {
    /// Validate a date change. The availability re-check (excluding the
    /// reservation itself) and the re-quote happen at the repository and
    /// handler layers; this guards shape and state.
    pub fn validate_date_change(
        reservation: &Reservation,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<StayRange, ChangeError> {
        if !Self::is_modifiable(reservation) {
            return Err(ChangeError::NotModifiable);
        }
        if check_out <= check_in {
            return Err(ChangeError::InvalidRange);
        }
        Ok(StayRange::new(check_in, check_out))
    }

    /// Validate a guest-count change against the property's capacity.
    pub fn validate_guest_change(
        reservation: &Reservation,
        guests_count: i32,
        max_guests: i32,
    ) -> Result<(), ChangeError> {
        if !Self::is_modifiable(reservation) {
            return Err(ChangeError::NotModifiable);
        }
        if guests_count < 1 || guests_count > max_guests {
            return Err(ChangeError::TooManyGuests { max: max_guests });
        }
        Ok(())
    }

    fn is_modifiable(reservation: &Reservation) -> bool {
        matches!(
            reservation.status,
            ReservationStatus::Pending | ReservationStatus::Confirmed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn reservation(status: ReservationStatus) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            check_in: d("2024-06-10"),
            check_out: d("2024-06-10") + Duration::days(5),
            guests_count: 2,
            total_cents: 100_000,
            status,
            special_requests: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_date_change_on_live_reservation() {
        let r = reservation(ReservationStatus::Confirmed);
        let range =
            ChangeHandler::validate_date_change(&r, d("2024-07-01"), d("2024-07-05")).unwrap();
        assert_eq!(range, StayRange::new(d("2024-07-01"), d("2024-07-05")));
    }

    #[test]
    fn test_date_change_rejects_inverted_range() {
        let r = reservation(ReservationStatus::Pending);
        assert_eq!(
            ChangeHandler::validate_date_change(&r, d("2024-07-05"), d("2024-07-01")),
            Err(ChangeError::InvalidRange)
        );
        assert_eq!(
            ChangeHandler::validate_date_change(&r, d("2024-07-01"), d("2024-07-01")),
            Err(ChangeError::InvalidRange)
        );
    }

    #[test]
    fn test_cancelled_not_modifiable() {
        let r = reservation(ReservationStatus::Cancelled);
        assert_eq!(
            ChangeHandler::validate_date_change(&r, d("2024-07-01"), d("2024-07-05")),
            Err(ChangeError::NotModifiable)
        );
        assert_eq!(
            ChangeHandler::validate_guest_change(&r, 2, 4),
            Err(ChangeError::NotModifiable)
        );
    }

    #[test]
    fn test_guest_count_capacity() {
        let r = reservation(ReservationStatus::Confirmed);
        assert!(ChangeHandler::validate_guest_change(&r, 4, 4).is_ok());
        assert_eq!(
            ChangeHandler::validate_guest_change(&r, 5, 4),
            Err(ChangeError::TooManyGuests { max: 4 })
        );
        assert!(ChangeHandler::validate_guest_change(&r, 0, 4).is_err());
    }
}
