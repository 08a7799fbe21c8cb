use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stay-length limits and the refund fraction applied on cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    pub min_stay_nights: i64,
    pub max_stay_nights: i64,
    /// Percentage of the total returned when a reservation is cancelled
    /// ahead of the deadline.
    pub refund_percentage: u32,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            min_stay_nights: 1,
            max_stay_nights: 30,
            refund_percentage: 80,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("check-out must be after check-in")]
    EmptyStay,

    #[error("stay must be between {min} and {max} nights")]
    StayLengthOutOfBounds { min: i64, max: i64 },
}

/// Server-side price calculation. Totals are always quoted here, never
/// taken from the client.
pub struct QuoteEngine {
    config: QuoteConfig,
}

impl QuoteEngine {
    pub fn new(config: QuoteConfig) -> Self {
        Self { config }
    }

    /// Number of nights in `[check_in, check_out)`.
    pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
        (check_out - check_in).num_days()
    }

    /// Total price for a stay at the given nightly rate.
    pub fn quote(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        nightly_rate_cents: i64,
    ) -> Result<i64, QuoteError> {
        let nights = Self::nights(check_in, check_out);
        if nights <= 0 {
            return Err(QuoteError::EmptyStay);
        }
        if nights < self.config.min_stay_nights || nights > self.config.max_stay_nights {
            return Err(QuoteError::StayLengthOutOfBounds {
                min: self.config.min_stay_nights,
                max: self.config.max_stay_nights,
            });
        }
        Ok(nights * nightly_rate_cents)
    }

    /// Refund owed when a paid reservation is cancelled ahead of the
    /// deadline. Integer cents, rounded down.
    pub fn refund_amount(&self, total_cents: i64) -> i64 {
        total_cents * i64::from(self.config.refund_percentage) / 100
    }
}

impl Default for QuoteEngine {
    fn default() -> Self {
        Self::new(QuoteConfig::default())
    }
}
