use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::models::{Reservation, ReservationStatus};

/// How close to check-in a reservation may still be cancelled, and what
/// fraction of the total comes back.
#[derive(Debug, Clone)]
pub struct CancellationPolicy {
    pub deadline_hours: i64,
    pub refund_percentage: u32,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            deadline_hours: 48,
            refund_percentage: 80,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("cancellation deadline has passed")]
    DeadlinePassed,
}

/// Guards reservation lifecycle transitions. Persistence happens in the
/// repository; this type only decides whether a transition is legal.
pub struct BookingManager {
    policy: CancellationPolicy,
}

impl BookingManager {
    pub fn new(policy: CancellationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CancellationPolicy {
        &self.policy
    }

    /// Transition: pending -> confirmed, driven by a successful payment.
    pub fn confirm(&self, reservation: &Reservation) -> Result<ReservationStatus, BookingError> {
        match reservation.status {
            ReservationStatus::Pending => Ok(ReservationStatus::Confirmed),
            other => Err(BookingError::InvalidTransition {
                from: other.as_str(),
                to: "confirmed",
            }),
        }
    }

    /// Transition: pending | confirmed -> cancelled, rejected once fewer
    /// than `deadline_hours` remain before check-in. Returns the refund due
    /// (zero for unpaid reservations; the caller decides whether anything
    /// was captured to refund against).
    pub fn cancel(
        &self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> Result<i64, BookingError> {
        if reservation.status == ReservationStatus::Cancelled {
            return Err(BookingError::InvalidTransition {
                from: "cancelled",
                to: "cancelled",
            });
        }

        let check_in_start = reservation
            .check_in
            .and_time(NaiveTime::MIN)
            .and_utc();
        let deadline = check_in_start - Duration::hours(self.policy.deadline_hours);
        if now > deadline {
            return Err(BookingError::DeadlinePassed);
        }

        Ok(reservation.total_cents * i64::from(self.policy.refund_percentage) / 100)
    }
}

impl Default for BookingManager {
    fn default() -> Self {
        Self::new(CancellationPolicy::default())
    }
}
