use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hearth_booking::availability::StayRange;
use hearth_booking::models::{NewReservation, Reservation, ReservationStatus};
use hearth_booking::repository::{ReservationRepository, ReservationStoreError};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::boxed;

pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    property_id: Uuid,
    guest_id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests_count: i32,
    total_cents: i64,
    status: String,
    special_requests: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReservationRow {
    fn into_reservation(self) -> Result<Reservation, ReservationStoreError> {
        let status = ReservationStatus::parse(&self.status).ok_or_else(|| {
            ReservationStoreError::Backend(
                format!("unknown reservation status: {}", self.status).into(),
            )
        })?;
        Ok(Reservation {
            id: self.id,
            property_id: self.property_id,
            guest_id: self.guest_id,
            check_in: self.check_in,
            check_out: self.check_out,
            guests_count: self.guests_count,
            total_cents: self.total_cents,
            status,
            special_requests: self.special_requests,
            cancellation_reason: self.cancellation_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const RESERVATION_COLUMNS: &str = "id, property_id, guest_id, check_in, check_out, guests_count, \
                                   total_cents, status, special_requests, cancellation_reason, \
                                   created_at, updated_at";

/// Postgres exclusion-violation SQLSTATE; raised by the calendar constraint
/// if a conflicting row slips past the in-transaction re-check.
const EXCLUSION_VIOLATION: &str = "23P01";

fn map_err(e: sqlx::Error) -> ReservationStoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return ReservationStoreError::Unavailable;
        }
    }
    ReservationStoreError::Backend(Box::new(e))
}

/// Serialize writers per property: the first 8 bytes of the property id
/// double as the advisory lock key.
fn property_lock_key(property_id: &Uuid) -> i64 {
    let b = property_id.as_bytes();
    i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

/// Take the per-property advisory lock (transaction-scoped) and re-run the
/// overlap scan. Half-open semantics: back-to-back stays do not conflict.
async fn lock_and_check(
    tx: &mut Transaction<'_, Postgres>,
    property_id: Uuid,
    range: &StayRange,
    exclude: Option<Uuid>,
) -> Result<bool, ReservationStoreError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(property_lock_key(&property_id))
        .execute(&mut **tx)
        .await
        .map_err(boxed)?;

    let (conflicts,): (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM reservations
            WHERE property_id = $1
              AND status IN ('pending', 'confirmed')
              AND check_in < $3
              AND check_out > $2
              AND ($4::uuid IS NULL OR id <> $4)
        )
        "#,
    )
    .bind(property_id)
    .bind(range.check_in)
    .bind(range.check_out)
    .bind(exclude)
    .fetch_one(&mut **tx)
    .await
    .map_err(boxed)?;

    Ok(!conflicts)
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn create(
        &self,
        reservation: &NewReservation,
    ) -> Result<Reservation, ReservationStoreError> {
        let mut tx = self.pool.begin().await.map_err(boxed)?;

        let range = StayRange::new(reservation.check_in, reservation.check_out);
        if !lock_and_check(&mut tx, reservation.property_id, &range, None).await? {
            return Err(ReservationStoreError::Unavailable);
        }

        let row: ReservationRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO reservations
                (id, property_id, guest_id, check_in, check_out, guests_count, total_cents,
                 status, special_requests)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
            RETURNING {RESERVATION_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(reservation.property_id)
        .bind(reservation.guest_id)
        .bind(reservation.check_in)
        .bind(reservation.check_out)
        .bind(reservation.guests_count)
        .bind(reservation.total_cents)
        .bind(&reservation.special_requests)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit().await.map_err(boxed)?;
        row.into_reservation()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, ReservationStoreError> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(boxed)?;

        row.map(ReservationRow::into_reservation).transpose()
    }

    async fn is_available(
        &self,
        property_id: Uuid,
        range: &StayRange,
        exclude: Option<Uuid>,
    ) -> Result<bool, ReservationStoreError> {
        let (conflicts,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE property_id = $1
                  AND status IN ('pending', 'confirmed')
                  AND check_in < $3
                  AND check_out > $2
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(property_id)
        .bind(range.check_in)
        .bind(range.check_out)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(!conflicts)
    }

    async fn list_by_guest(
        &self,
        guest_id: Uuid,
        page: u32,
        per_page: u32,
        status: Option<ReservationStatus>,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;
        let status = status.map(|s| s.as_str());

        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS} FROM reservations
            WHERE guest_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(guest_id)
        .bind(status)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reservations
             WHERE guest_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(guest_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        let reservations = rows
            .into_iter()
            .map(ReservationRow::into_reservation)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((reservations, total as u64))
    }

    async fn upcoming(
        &self,
        guest_id: Uuid,
        today: NaiveDate,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;

        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS} FROM reservations
            WHERE guest_id = $1 AND status = 'confirmed' AND check_in >= $2
            ORDER BY check_in ASC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(guest_id)
        .bind(today)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reservations
             WHERE guest_id = $1 AND status = 'confirmed' AND check_in >= $2",
        )
        .bind(guest_id)
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        let reservations = rows
            .into_iter()
            .map(ReservationRow::into_reservation)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((reservations, total as u64))
    }

    async fn past(
        &self,
        guest_id: Uuid,
        today: NaiveDate,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;

        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS} FROM reservations
            WHERE guest_id = $1 AND check_out < $2
            ORDER BY check_out DESC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(guest_id)
        .bind(today)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reservations WHERE guest_id = $1 AND check_out < $2",
        )
        .bind(guest_id)
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        let reservations = rows
            .into_iter()
            .map(ReservationRow::into_reservation)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((reservations, total as u64))
    }

    async fn update_dates(
        &self,
        id: Uuid,
        range: &StayRange,
        total_cents: i64,
    ) -> Result<Reservation, ReservationStoreError> {
        let mut tx = self.pool.begin().await.map_err(boxed)?;

        let (property_id,): (Uuid,) =
            sqlx::query_as("SELECT property_id FROM reservations WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(boxed)?
                .ok_or(ReservationStoreError::NotFound)?;

        // The reservation's own row must not count against its new dates.
        if !lock_and_check(&mut tx, property_id, range, Some(id)).await? {
            return Err(ReservationStoreError::Unavailable);
        }

        let row: ReservationRow = sqlx::query_as(&format!(
            r#"
            UPDATE reservations
            SET check_in = $2, check_out = $3, total_cents = $4, updated_at = now()
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(range.check_in)
        .bind(range.check_out)
        .bind(total_cents)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_err)?;

        tx.commit().await.map_err(boxed)?;
        row.into_reservation()
    }

    async fn update_guests(
        &self,
        id: Uuid,
        guests_count: i32,
    ) -> Result<(), ReservationStoreError> {
        let result = sqlx::query(
            "UPDATE reservations SET guests_count = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(guests_count)
        .execute(&self.pool)
        .await
        .map_err(boxed)?;

        if result.rows_affected() == 0 {
            return Err(ReservationStoreError::NotFound);
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<(), ReservationStoreError> {
        let result =
            sqlx::query("UPDATE reservations SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await
                .map_err(boxed)?;

        if result.rows_affected() == 0 {
            return Err(ReservationStoreError::NotFound);
        }
        Ok(())
    }

    async fn cancel(&self, id: Uuid, reason: Option<&str>) -> Result<(), ReservationStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled', cancellation_reason = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(boxed)?;

        if result.rows_affected() == 0 {
            return Err(ReservationStoreError::NotFound);
        }
        Ok(())
    }

    async fn expire_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, ReservationStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'cancelled', cancellation_reason = 'payment hold expired',
                updated_at = now()
            WHERE status = 'pending' AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(result.rows_affected())
    }
}
