use async_trait::async_trait;
use chrono::Utc;
use hearth_core::payment::{
    NewPayment, Payment, PaymentPurpose, PaymentRepository, PaymentStatus, PaymentStoreError,
    Refund,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::boxed;

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    reservation_id: Option<Uuid>,
    purpose: String,
    amount_cents: i64,
    currency: String,
    status: String,
    method: String,
    card_last_four: Option<String>,
    gateway_reference: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment, PaymentStoreError> {
        let status = PaymentStatus::parse(&self.status).ok_or_else(|| {
            PaymentStoreError::Backend(format!("unknown payment status: {}", self.status).into())
        })?;
        let purpose = PaymentPurpose::parse(&self.purpose).ok_or_else(|| {
            PaymentStoreError::Backend(format!("unknown payment purpose: {}", self.purpose).into())
        })?;
        Ok(Payment {
            id: self.id,
            user_id: self.user_id,
            reservation_id: self.reservation_id,
            purpose,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status,
            method: self.method,
            card_last_four: self.card_last_four,
            gateway_reference: self.gateway_reference,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    payment_id: Uuid,
    amount_cents: i64,
    reason: Option<String>,
    gateway_reference: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

const PAYMENT_COLUMNS: &str = "id, user_id, reservation_id, purpose, amount_cents, currency, \
                               status, method, card_last_four, gateway_reference, created_at";

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn record(&self, payment: &NewPayment) -> Result<Payment, PaymentStoreError> {
        let row: PaymentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO payments
                (id, user_id, reservation_id, purpose, amount_cents, currency, status, method,
                 card_last_four, gateway_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PAYMENT_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(payment.user_id)
        .bind(payment.reservation_id)
        .bind(payment.purpose.as_str())
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.method)
        .bind(&payment.card_last_four)
        .bind(&payment.gateway_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        row.into_payment()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>, PaymentStoreError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(boxed)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<Payment>, PaymentStoreError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE reservation_id = $1 ORDER BY created_at DESC"
        ))
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn by_user(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Payment>, u64), PaymentStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;

        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(user_id)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM payments WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(boxed)?;

        let payments = rows
            .into_iter()
            .map(PaymentRow::into_payment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((payments, total as u64))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), PaymentStoreError> {
        let result = sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(boxed)?;

        if result.rows_affected() == 0 {
            return Err(PaymentStoreError::NotFound);
        }
        Ok(())
    }

    async fn latest_captured_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Payment>, PaymentStoreError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE reservation_id = $1 AND status = 'captured'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        ))
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(boxed)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        amount_cents: i64,
        reason: Option<&str>,
        gateway_reference: Option<&str>,
    ) -> Result<Refund, PaymentStoreError> {
        let row: RefundRow = sqlx::query_as(
            r#"
            INSERT INTO refunds (id, payment_id, amount_cents, reason, gateway_reference)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, payment_id, amount_cents, reason, gateway_reference, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(amount_cents)
        .bind(reason)
        .bind(gateway_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(Refund {
            id: row.id,
            payment_id: row.payment_id,
            amount_cents: row.amount_cents,
            reason: row.reason,
            gateway_reference: row.gateway_reference,
            created_at: row.created_at,
        })
    }

    async fn refund_total(&self, payment_id: Uuid) -> Result<i64, PaymentStoreError> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM refunds WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(total)
    }
}
