use async_trait::async_trait;
use chrono::Utc;
use hearth_core::account::{
    AccountStoreError, Agent, AgentRepository, AgentStatus, NewAgent, SubscriptionPlan,
};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreAgentRepository {
    pool: PgPool,
}

impl StoreAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
    password_hash: String,
    status: String,
    plan: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl AgentRow {
    fn into_agent(self) -> Result<Agent, AccountStoreError> {
        let status = AgentStatus::parse(&self.status).ok_or_else(|| {
            AccountStoreError::Backend(format!("unknown agent status: {}", self.status).into())
        })?;
        let plan = SubscriptionPlan::parse(&self.plan).ok_or_else(|| {
            AccountStoreError::Backend(format!("unknown plan: {}", self.plan).into())
        })?;
        Ok(Agent {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            password_hash: self.password_hash,
            status,
            plan,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn map_err(e: sqlx::Error) -> AccountStoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.kind() == sqlx::error::ErrorKind::UniqueViolation {
            return AccountStoreError::EmailTaken;
        }
    }
    AccountStoreError::Backend(Box::new(e))
}

const AGENT_COLUMNS: &str =
    "id, name, email, phone, company, password_hash, status, plan, created_at, updated_at";

#[async_trait]
impl AgentRepository for StoreAgentRepository {
    async fn create(&self, agent: &NewAgent) -> Result<Agent, AccountStoreError> {
        let row: AgentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO agents (id, name, email, phone, company, password_hash, status, plan)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', 'base')
            RETURNING {AGENT_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(&agent.name)
        .bind(&agent.email)
        .bind(&agent.phone)
        .bind(&agent.company)
        .bind(&agent.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;

        row.into_agent()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Agent>, AccountStoreError> {
        let row: Option<AgentRow> =
            sqlx::query_as(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)?;

        row.map(AgentRow::into_agent).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Agent>, AccountStoreError> {
        let row: Option<AgentRow> =
            sqlx::query_as(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)?;

        row.map(AgentRow::into_agent).transpose()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        phone: Option<&str>,
        company: Option<&str>,
    ) -> Result<Agent, AccountStoreError> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            r#"
            UPDATE agents
            SET name = $2, phone = $3, company = $4, updated_at = now()
            WHERE id = $1
            RETURNING {AGENT_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(name)
        .bind(phone)
        .bind(company)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.ok_or(AccountStoreError::NotFound)?.into_agent()
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AccountStoreError> {
        let result =
            sqlx::query("UPDATE agents SET password_hash = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await
                .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(AccountStoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AccountStoreError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(AccountStoreError::NotFound);
        }
        Ok(())
    }

    async fn approve(&self, id: Uuid) -> Result<(), AccountStoreError> {
        let result =
            sqlx::query("UPDATE agents SET status = 'approved', updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(AccountStoreError::NotFound);
        }
        Ok(())
    }

    async fn set_plan(&self, id: Uuid, plan: SubscriptionPlan) -> Result<(), AccountStoreError> {
        let result = sqlx::query("UPDATE agents SET plan = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(plan.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;

        if result.rows_affected() == 0 {
            return Err(AccountStoreError::NotFound);
        }
        Ok(())
    }

    async fn list(
        &self,
        page: u32,
        per_page: u32,
        status: Option<AgentStatus>,
        keyword: Option<&str>,
    ) -> Result<(Vec<Agent>, u64), AccountStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;
        let status = status.map(|s| s.as_str());
        let pattern = keyword.map(|k| format!("%{}%", k));

        let rows: Vec<AgentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {AGENT_COLUMNS} FROM agents
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2 OR company ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(status)
        .bind(&pattern)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM agents
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2 OR company ILIKE $2)
            "#,
        )
        .bind(status)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)?;

        let agents = rows
            .into_iter()
            .map(AgentRow::into_agent)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((agents, total as u64))
    }
}
