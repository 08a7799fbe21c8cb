use async_trait::async_trait;
use chrono::Utc;
use hearth_catalog::property::{NewProperty, Property, PropertyImage, PropertyStatus};
use hearth_catalog::repository::{PropertyRepository, PropertyStoreError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::boxed;

pub struct StorePropertyRepository {
    pool: PgPool,
}

impl StorePropertyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: Uuid,
    agent_id: Uuid,
    title: String,
    description: Option<String>,
    location: String,
    nightly_rate_cents: i64,
    max_guests: i32,
    amenities: serde_json::Value,
    status: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl PropertyRow {
    fn into_property(self) -> Result<Property, PropertyStoreError> {
        let status = PropertyStatus::parse(&self.status).ok_or_else(|| {
            PropertyStoreError::Backend(format!("unknown property status: {}", self.status).into())
        })?;
        Ok(Property {
            id: self.id,
            agent_id: self.agent_id,
            title: self.title,
            description: self.description,
            location: self.location,
            nightly_rate_cents: self.nightly_rate_cents,
            max_guests: self.max_guests,
            amenities: self.amenities,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: Uuid,
    property_id: Uuid,
    url: String,
    is_primary: bool,
    created_at: chrono::DateTime<Utc>,
}

impl From<ImageRow> for PropertyImage {
    fn from(row: ImageRow) -> Self {
        PropertyImage {
            id: row.id,
            property_id: row.property_id,
            url: row.url,
            is_primary: row.is_primary,
            created_at: row.created_at,
        }
    }
}

const PROPERTY_COLUMNS: &str = "id, agent_id, title, description, location, nightly_rate_cents, \
                                max_guests, amenities, status, created_at, updated_at";

#[async_trait]
impl PropertyRepository for StorePropertyRepository {
    async fn create(&self, property: &NewProperty) -> Result<Property, PropertyStoreError> {
        let row: PropertyRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO properties
                (id, agent_id, title, description, location, nightly_rate_cents, max_guests,
                 amenities, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
            RETURNING {PROPERTY_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(property.agent_id)
        .bind(&property.title)
        .bind(&property.description)
        .bind(&property.location)
        .bind(property.nightly_rate_cents)
        .bind(property.max_guests)
        .bind(&property.amenities)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        row.into_property()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Property>, PropertyStoreError> {
        let row: Option<PropertyRow> = sqlx::query_as(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(boxed)?;

        row.map(PropertyRow::into_property).transpose()
    }

    async fn update(
        &self,
        id: Uuid,
        title: &str,
        description: Option<&str>,
        location: &str,
        nightly_rate_cents: i64,
        max_guests: i32,
        amenities: &serde_json::Value,
    ) -> Result<Property, PropertyStoreError> {
        let row: Option<PropertyRow> = sqlx::query_as(&format!(
            r#"
            UPDATE properties
            SET title = $2, description = $3, location = $4, nightly_rate_cents = $5,
                max_guests = $6, amenities = $7, updated_at = now()
            WHERE id = $1
            RETURNING {PROPERTY_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(location)
        .bind(nightly_rate_cents)
        .bind(max_guests)
        .bind(amenities)
        .fetch_optional(&self.pool)
        .await
        .map_err(boxed)?;

        row.ok_or(PropertyStoreError::NotFound)?.into_property()
    }

    async fn delete(&self, id: Uuid) -> Result<(), PropertyStoreError> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(boxed)?;

        if result.rows_affected() == 0 {
            return Err(PropertyStoreError::NotFound);
        }
        Ok(())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: PropertyStatus,
    ) -> Result<(), PropertyStoreError> {
        let result =
            sqlx::query("UPDATE properties SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await
                .map_err(boxed)?;

        if result.rows_affected() == 0 {
            return Err(PropertyStoreError::NotFound);
        }
        Ok(())
    }

    async fn list(
        &self,
        page: u32,
        per_page: u32,
        status: Option<PropertyStatus>,
        agent_id: Option<Uuid>,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;
        let status = status.map(|s| s.as_str());

        let rows: Vec<PropertyRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PROPERTY_COLUMNS} FROM properties
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR agent_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        ))
        .bind(status)
        .bind(agent_id)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM properties
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR agent_id = $2)
            "#,
        )
        .bind(status)
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        let properties = rows
            .into_iter()
            .map(PropertyRow::into_property)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((properties, total as u64))
    }

    async fn search(
        &self,
        keyword: &str,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;
        let pattern = format!("%{}%", keyword);

        let rows: Vec<PropertyRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PROPERTY_COLUMNS} FROM properties
            WHERE status = 'active'
              AND (title ILIKE $1 OR description ILIKE $1 OR location ILIKE $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(&pattern)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM properties
            WHERE status = 'active'
              AND (title ILIKE $1 OR description ILIKE $1 OR location ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        let properties = rows
            .into_iter()
            .map(PropertyRow::into_property)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((properties, total as u64))
    }

    async fn count_for_agent(&self, agent_id: Uuid) -> Result<u64, PropertyStoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM properties WHERE agent_id = $1 AND status <> 'rejected'",
        )
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(count as u64)
    }

    async fn add_image(
        &self,
        property_id: Uuid,
        url: &str,
        is_primary: bool,
    ) -> Result<PropertyImage, PropertyStoreError> {
        let row: ImageRow = sqlx::query_as(
            r#"
            INSERT INTO property_images (id, property_id, url, is_primary)
            VALUES ($1, $2, $3, $4)
            RETURNING id, property_id, url, is_primary, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(property_id)
        .bind(url)
        .bind(is_primary)
        .fetch_one(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(row.into())
    }

    async fn remove_image(
        &self,
        property_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), PropertyStoreError> {
        let result =
            sqlx::query("DELETE FROM property_images WHERE id = $1 AND property_id = $2")
                .bind(image_id)
                .bind(property_id)
                .execute(&self.pool)
                .await
                .map_err(boxed)?;

        if result.rows_affected() == 0 {
            return Err(PropertyStoreError::NotFound);
        }
        Ok(())
    }

    async fn images(&self, property_id: Uuid) -> Result<Vec<PropertyImage>, PropertyStoreError> {
        let rows: Vec<ImageRow> = sqlx::query_as(
            "SELECT id, property_id, url, is_primary, created_at
             FROM property_images WHERE property_id = $1
             ORDER BY is_primary DESC, created_at ASC",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError> {
        let offset = (page.saturating_sub(1)) * per_page;

        let rows: Vec<PropertyRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.agent_id, p.title, p.description, p.location, p.nightly_rate_cents,
                   p.max_guests, p.amenities, p.status, p.created_at, p.updated_at
            FROM properties p
            JOIN favorites f ON f.property_id = p.id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(i64::from(per_page))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(boxed)?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(boxed)?;

        let properties = rows
            .into_iter()
            .map(PropertyRow::into_property)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((properties, total as u64))
    }
}
