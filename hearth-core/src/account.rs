use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried in JWT claims and checked by the route middleware.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Guest,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "GUEST",
            Role::Agent => "AGENT",
            Role::Admin => "ADMIN",
        }
    }
}

/// Listing subscription tier for agents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Base,
    Gold,
    Vip,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Base => "base",
            SubscriptionPlan::Gold => "gold",
            SubscriptionPlan::Vip => "vip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "base" => Some(SubscriptionPlan::Base),
            "gold" => Some(SubscriptionPlan::Gold),
            "vip" => Some(SubscriptionPlan::Vip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Approved,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AgentStatus::Pending),
            "approved" => Some(AgentStatus::Approved),
            _ => None,
        }
    }
}

/// A guest account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A property manager account. Agents start out `pending` and cannot list
/// properties until an admin approves them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: AgentStatus,
    pub plan: SubscriptionPlan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub password_hash: String,
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password.as_bytes(), bcrypt::DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password.as_bytes(), hash)
}

/// Errors surfaced by account repositories.
#[derive(Debug, thiserror::Error)]
pub enum AccountStoreError {
    #[error("email is already registered")]
    EmailTaken,

    #[error("account not found")]
    NotFound,

    #[error("storage error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Repository trait for guest accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &NewUser) -> Result<User, AccountStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<User>, AccountStoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountStoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        phone: Option<&str>,
    ) -> Result<User, AccountStoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str)
        -> Result<(), AccountStoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), AccountStoreError>;

    async fn add_favorite(&self, user_id: Uuid, property_id: Uuid)
        -> Result<(), AccountStoreError>;

    async fn remove_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<(), AccountStoreError>;

    async fn is_favorite(&self, user_id: Uuid, property_id: Uuid)
        -> Result<bool, AccountStoreError>;
}

/// Repository trait for agent accounts.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn create(&self, agent: &NewAgent) -> Result<Agent, AccountStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Agent>, AccountStoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Agent>, AccountStoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        phone: Option<&str>,
        company: Option<&str>,
    ) -> Result<Agent, AccountStoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str)
        -> Result<(), AccountStoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), AccountStoreError>;

    async fn approve(&self, id: Uuid) -> Result<(), AccountStoreError>;

    async fn set_plan(&self, id: Uuid, plan: SubscriptionPlan) -> Result<(), AccountStoreError>;

    /// Paginated listing for the admin console, optionally filtered by
    /// status and a keyword over name/email/company.
    async fn list(
        &self,
        page: u32,
        per_page: u32,
        status: Option<AgentStatus>,
        keyword: Option<&str>,
    ) -> Result<(Vec<Agent>, u64), AccountStoreError>;
}

/// Aggregate numbers for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_agents: u64,
    pub pending_agents: u64,
    pub total_properties: u64,
    pub active_properties: u64,
    pub total_reservations: u64,
    pub total_revenue_cents: i64,
}

/// Repository trait for admin accounts.
#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, AccountStoreError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, AccountStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn test_plan_parse() {
        assert_eq!(SubscriptionPlan::parse("gold"), Some(SubscriptionPlan::Gold));
        assert_eq!(SubscriptionPlan::parse("platinum"), None);
        assert_eq!(SubscriptionPlan::Vip.as_str(), "vip");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: None,
            password_hash: "$2b$12$secret".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }
}
