use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use hearth_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Captured,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "captured" => Some(PaymentStatus::Captured),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// What a payment row was taken for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPurpose {
    Reservation,
    Subscription,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Reservation => "reservation",
            PaymentPurpose::Subscription => "subscription",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reservation" => Some(PaymentPurpose::Reservation),
            "subscription" => Some(PaymentPurpose::Subscription),
            _ => None,
        }
    }
}

/// Card details as submitted by the client. The PAN and CVV are masked in
/// Debug output and are never persisted; only the last four digits survive
/// into the payment record.
#[derive(Clone, Debug, Deserialize)]
pub struct CardDetails {
    pub number: Masked<String>,
    pub holder: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvv: Masked<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CardError {
    #[error("card number failed validation")]
    InvalidNumber,
    #[error("card is expired")]
    Expired,
    #[error("security code must be 3 or 4 digits")]
    InvalidCvv,
}

impl CardDetails {
    /// Validate number (Luhn + length), expiry and CVV against `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), CardError> {
        let digits: String = self.number.0.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() < 13 || digits.len() > 19 || !luhn_valid(&digits) {
            return Err(CardError::InvalidNumber);
        }
        if !(1..=12).contains(&self.exp_month) {
            return Err(CardError::Expired);
        }
        // A card is valid through the last day of its expiry month.
        let (year, month) = (now.year(), now.month());
        if self.exp_year < year || (self.exp_year == year && self.exp_month < month) {
            return Err(CardError::Expired);
        }
        if self.cvv.0.len() < 3 || self.cvv.0.len() > 4 || !self.cvv.0.chars().all(|c| c.is_ascii_digit()) {
            return Err(CardError::InvalidCvv);
        }
        Ok(())
    }

    pub fn last_four(&self) -> String {
        let digits: String = self.number.0.chars().filter(|c| c.is_ascii_digit()).collect();
        let start = digits.len().saturating_sub(4);
        digits[start..].to_string()
    }
}

/// Luhn checksum over an ASCII digit string.
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    let mut double = false;
    for c in digits.chars().rev() {
        let Some(d) = c.to_digit(10) else {
            return false;
        };
        let mut d = d;
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    !digits.is_empty() && sum % 10 == 0
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub card: CardDetails,
}

#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub status: PaymentStatus,
    /// Gateway-side reference for the charge (e.g. ch_0a1b2c...).
    pub reference: String,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Authorize and capture a card charge.
    async fn charge(
        &self,
        request: &ChargeRequest,
    ) -> Result<ChargeOutcome, Box<dyn std::error::Error + Send + Sync>>;

    /// Return part or all of a captured charge.
    async fn refund(
        &self,
        reference: &str,
        amount_cents: i64,
    ) -> Result<ChargeOutcome, Box<dyn std::error::Error + Send + Sync>>;
}

/// Test PAN that the mock gateway declines (standard gateway test number).
pub const DECLINE_TEST_PAN: &str = "4000000000000002";

/// Stand-in gateway. Real provider integration sits behind [`PaymentAdapter`];
/// this implementation validates the card and settles everything locally.
pub struct MockCardGateway;

#[async_trait]
impl PaymentAdapter for MockCardGateway {
    async fn charge(
        &self,
        request: &ChargeRequest,
    ) -> Result<ChargeOutcome, Box<dyn std::error::Error + Send + Sync>> {
        request.card.validate(Utc::now())?;

        let status = if request.card.number.0 == DECLINE_TEST_PAN {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Captured
        };

        tracing::info!(
            amount_cents = request.amount_cents,
            currency = %request.currency,
            status = status.as_str(),
            "mock gateway charge"
        );

        Ok(ChargeOutcome {
            status,
            reference: format!("ch_{}", Uuid::new_v4().simple()),
        })
    }

    async fn refund(
        &self,
        reference: &str,
        amount_cents: i64,
    ) -> Result<ChargeOutcome, Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(reference, amount_cents, "mock gateway refund");
        Ok(ChargeOutcome {
            status: PaymentStatus::Refunded,
            reference: format!("re_{}", Uuid::new_v4().simple()),
        })
    }
}

/// A recorded payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub purpose: PaymentPurpose,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: String,
    pub card_last_four: Option<String>,
    pub gateway_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub purpose: PaymentPurpose,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: String,
    pub card_last_four: Option<String>,
    pub gateway_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount_cents: i64,
    pub reason: Option<String>,
    pub gateway_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentStoreError {
    #[error("payment not found")]
    NotFound,

    #[error("storage error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Repository trait for payment records.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn record(&self, payment: &NewPayment) -> Result<Payment, PaymentStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Payment>, PaymentStoreError>;

    async fn by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<Payment>, PaymentStoreError>;

    async fn by_user(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Payment>, u64), PaymentStoreError>;

    async fn update_status(&self, id: Uuid, status: PaymentStatus)
        -> Result<(), PaymentStoreError>;

    /// Most recent captured payment for a reservation, if any. Used when a
    /// cancellation needs something to refund against.
    async fn latest_captured_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Payment>, PaymentStoreError>;

    async fn record_refund(
        &self,
        payment_id: Uuid,
        amount_cents: i64,
        reason: Option<&str>,
        gateway_reference: Option<&str>,
    ) -> Result<Refund, PaymentStoreError>;

    /// Sum of refunds already issued against a payment.
    async fn refund_total(&self, payment_id: Uuid) -> Result<i64, PaymentStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str) -> CardDetails {
        CardDetails {
            number: Masked(number.to_string()),
            holder: "A GUEST".into(),
            exp_month: 12,
            exp_year: 2099,
            cvv: Masked("123".into()),
        }
    }

    #[test]
    fn test_luhn_known_good() {
        assert!(luhn_valid("4242424242424242"));
        assert!(luhn_valid("5555555555554444"));
        assert!(luhn_valid("378282246310005"));
    }

    #[test]
    fn test_luhn_rejects_off_by_one() {
        assert!(!luhn_valid("4242424242424241"));
        assert!(!luhn_valid("4242424242424243"));
        assert!(!luhn_valid(""));
        assert!(!luhn_valid("4242abcd42424242"));
    }

    #[test]
    fn test_card_validation() {
        assert!(card("4242 4242 4242 4242").validate(Utc::now()).is_ok());
        assert_eq!(
            card("1234567890123456").validate(Utc::now()),
            Err(CardError::InvalidNumber)
        );

        let mut expired = card("4242424242424242");
        expired.exp_year = 2020;
        assert_eq!(expired.validate(Utc::now()), Err(CardError::Expired));

        let mut bad_cvv = card("4242424242424242");
        bad_cvv.cvv = Masked("12".into());
        assert_eq!(bad_cvv.validate(Utc::now()), Err(CardError::InvalidCvv));
    }

    #[test]
    fn test_last_four() {
        assert_eq!(card("4242 4242 4242 4242").last_four(), "4242");
    }

    #[tokio::test]
    async fn test_mock_gateway_captures_valid_card() {
        let outcome = MockCardGateway
            .charge(&ChargeRequest {
                amount_cents: 12_500,
                currency: "USD".into(),
                card: card("4242424242424242"),
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Captured);
        assert!(outcome.reference.starts_with("ch_"));
    }

    #[tokio::test]
    async fn test_mock_gateway_declines_test_pan() {
        let outcome = MockCardGateway
            .charge(&ChargeRequest {
                amount_cents: 12_500,
                currency: "USD".into(),
                card: card(DECLINE_TEST_PAN),
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, PaymentStatus::Failed);
    }
}
