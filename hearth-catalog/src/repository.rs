use async_trait::async_trait;
use uuid::Uuid;

use crate::property::{NewProperty, Property, PropertyImage, PropertyStatus};

#[derive(Debug, thiserror::Error)]
pub enum PropertyStoreError {
    #[error("property not found")]
    NotFound,

    #[error("storage error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Repository trait for listing data access.
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn create(&self, property: &NewProperty) -> Result<Property, PropertyStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Property>, PropertyStoreError>;

    async fn update(
        &self,
        id: Uuid,
        title: &str,
        description: Option<&str>,
        location: &str,
        nightly_rate_cents: i64,
        max_guests: i32,
        amenities: &serde_json::Value,
    ) -> Result<Property, PropertyStoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), PropertyStoreError>;

    async fn set_status(&self, id: Uuid, status: PropertyStatus)
        -> Result<(), PropertyStoreError>;

    async fn list(
        &self,
        page: u32,
        per_page: u32,
        status: Option<PropertyStatus>,
        agent_id: Option<Uuid>,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError>;

    /// Keyword search over title, description and location. Only `active`
    /// listings are returned.
    async fn search(
        &self,
        keyword: &str,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError>;

    /// Live (non-rejected, non-deleted) listing count for quota checks.
    async fn count_for_agent(&self, agent_id: Uuid) -> Result<u64, PropertyStoreError>;

    async fn add_image(
        &self,
        property_id: Uuid,
        url: &str,
        is_primary: bool,
    ) -> Result<PropertyImage, PropertyStoreError>;

    async fn remove_image(
        &self,
        property_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), PropertyStoreError>;

    async fn images(&self, property_id: Uuid) -> Result<Vec<PropertyImage>, PropertyStoreError>;

    /// Favorited listings for a guest, newest first.
    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError>;
}
