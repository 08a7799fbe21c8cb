use async_trait::async_trait;
use hearth_core::account::{AccountStoreError, Admin, AdminRepository, DashboardStats};
use sqlx::PgPool;
use uuid::Uuid;

use crate::boxed;

pub struct StoreAdminRepository {
    pool: PgPool,
}

impl StoreAdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AdminRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    permissions: Vec<String>,
}

#[async_trait]
impl AdminRepository for StoreAdminRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, AccountStoreError> {
        let row: Option<AdminRow> = sqlx::query_as(
            "SELECT id, name, email, password_hash, permissions FROM admins WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(row.map(|r| Admin {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            permissions: r.permissions,
        }))
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, AccountStoreError> {
        #[derive(sqlx::FromRow)]
        struct StatsRow {
            total_users: i64,
            total_agents: i64,
            pending_agents: i64,
            total_properties: i64,
            active_properties: i64,
            total_reservations: i64,
            total_revenue_cents: i64,
        }

        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM agents) AS total_agents,
                (SELECT COUNT(*) FROM agents WHERE status = 'pending') AS pending_agents,
                (SELECT COUNT(*) FROM properties) AS total_properties,
                (SELECT COUNT(*) FROM properties WHERE status = 'active') AS active_properties,
                (SELECT COUNT(*) FROM reservations) AS total_reservations,
                (SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE status = 'captured')
                    AS total_revenue_cents
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(DashboardStats {
            total_users: row.total_users as u64,
            total_agents: row.total_agents as u64,
            pending_agents: row.pending_agents as u64,
            total_properties: row.total_properties as u64,
            active_properties: row.active_properties as u64,
            total_reservations: row.total_reservations as u64,
            total_revenue_cents: row.total_revenue_cents,
        })
    }
}
