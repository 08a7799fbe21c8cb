use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Reservation;

/// A half-open stay interval `[check_in, check_out)`.
///
/// Half-open means one party's check-out day can be another's check-in day:
/// same-day turnover never counts as a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self { check_in, check_out }
    }

    /// Two half-open intervals [a,b) and [c,d) overlap iff a < d and c < b.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

/// Whether `candidate` is free of conflicts among `existing` reservations.
///
/// Only reservations whose status blocks the calendar are considered;
/// `exclude` skips the reservation being edited so a date change does not
/// conflict with itself. Callers validate the range (non-empty, not
/// inverted) before this runs.
///
/// This is the in-memory counterpart of the repository's SQL scan; the
/// repository additionally wraps its scan and the subsequent write in one
/// transaction under a per-property lock.
pub fn is_available(existing: &[Reservation], candidate: &StayRange, exclude: Option<Uuid>) -> bool {
    !existing.iter().any(|r| {
        r.status.blocks_calendar() && Some(r.id) != exclude && r.range().overlaps(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReservationStatus;
    use chrono::Utc;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn reservation(check_in: &str, check_out: &str, status: ReservationStatus) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            check_in: d(check_in),
            check_out: d(check_out),
            guests_count: 2,
            total_cents: 50_000,
            status,
            special_requests: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_set_is_available() {
        let range = StayRange::new(d("2024-06-10"), d("2024-06-15"));
        assert!(is_available(&[], &range, None));
    }

    #[test]
    fn test_contained_range_conflicts() {
        let existing = vec![reservation("2024-06-10", "2024-06-15", ReservationStatus::Confirmed)];
        let range = StayRange::new(d("2024-06-12"), d("2024-06-14"));
        assert!(!is_available(&existing, &range, None));
    }

    #[test]
    fn test_containing_range_conflicts() {
        let existing = vec![reservation("2024-06-10", "2024-06-15", ReservationStatus::Confirmed)];
        let range = StayRange::new(d("2024-06-08"), d("2024-06-20"));
        assert!(!is_available(&existing, &range, None));
    }

    #[test]
    fn test_partial_overlap_at_start_conflicts() {
        let existing = vec![reservation("2024-06-10", "2024-06-15", ReservationStatus::Confirmed)];
        let range = StayRange::new(d("2024-06-08"), d("2024-06-11"));
        assert!(!is_available(&existing, &range, None));
    }

    #[test]
    fn test_back_to_back_is_available() {
        let existing = vec![reservation("2024-06-10", "2024-06-15", ReservationStatus::Confirmed)];
        // Checking in on the existing check-out day: same-day turnover.
        let after = StayRange::new(d("2024-06-15"), d("2024-06-20"));
        assert!(is_available(&existing, &after, None));

        let before = StayRange::new(d("2024-06-05"), d("2024-06-10"));
        assert!(is_available(&existing, &before, None));
    }

    #[test]
    fn test_cancelled_never_conflicts() {
        let existing = vec![reservation("2024-06-10", "2024-06-15", ReservationStatus::Cancelled)];
        let range = StayRange::new(d("2024-06-12"), d("2024-06-14"));
        assert!(is_available(&existing, &range, None));
    }

    #[test]
    fn test_pending_blocks_calendar() {
        let existing = vec![reservation("2024-06-10", "2024-06-15", ReservationStatus::Pending)];
        let range = StayRange::new(d("2024-06-12"), d("2024-06-14"));
        assert!(!is_available(&existing, &range, None));
    }

    #[test]
    fn test_self_exclusion() {
        let existing = vec![reservation("2024-06-10", "2024-06-15", ReservationStatus::Confirmed)];
        let own_id = existing[0].id;
        let same_range = StayRange::new(d("2024-06-10"), d("2024-06-15"));
        // Re-checking a reservation's own unchanged range must pass.
        assert!(is_available(&existing, &same_range, Some(own_id)));
        assert!(!is_available(&existing, &same_range, None));
    }
}
