use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing lifecycle. New listings start `pending` and only become bookable
/// once an admin moves them to `active`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    Pending,
    Active,
    Inactive,
    Rejected,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Pending => "pending",
            PropertyStatus::Active => "active",
            PropertyStatus::Inactive => "inactive",
            PropertyStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PropertyStatus::Pending),
            "active" => Some(PropertyStatus::Active),
            "inactive" => Some(PropertyStatus::Inactive),
            "rejected" => Some(PropertyStatus::Rejected),
            _ => None,
        }
    }
}

/// A bookable listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub nightly_rate_cents: i64,
    pub max_guests: i32,
    pub amenities: serde_json::Value,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyImage {
    pub id: Uuid,
    pub property_id: Uuid,
    pub url: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProperty {
    pub agent_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub nightly_rate_cents: i64,
    pub max_guests: i32,
    pub amenities: serde_json::Value,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PropertyError {
    #[error("title is required")]
    MissingTitle,

    #[error("location is required")]
    MissingLocation,

    #[error("nightly rate must be between {min} and {max} cents")]
    RateOutOfBounds { min: i64, max: i64 },

    #[error("max guests must be between 1 and {max}")]
    GuestsOutOfBounds { max: i32 },
}

/// Listing field bounds, sourced from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRules {
    pub min_nightly_rate_cents: i64,
    pub max_nightly_rate_cents: i64,
    pub max_guests_per_property: i32,
    pub max_images_per_property: u32,
}

impl Default for ListingRules {
    fn default() -> Self {
        Self {
            min_nightly_rate_cents: 1_000,
            max_nightly_rate_cents: 1_000_000,
            max_guests_per_property: 20,
            max_images_per_property: 10,
        }
    }
}

impl NewProperty {
    /// Field validation performed before any row is written.
    pub fn validate(&self, rules: &ListingRules) -> Result<(), PropertyError> {
        if self.title.trim().is_empty() {
            return Err(PropertyError::MissingTitle);
        }
        if self.location.trim().is_empty() {
            return Err(PropertyError::MissingLocation);
        }
        if self.nightly_rate_cents < rules.min_nightly_rate_cents
            || self.nightly_rate_cents > rules.max_nightly_rate_cents
        {
            return Err(PropertyError::RateOutOfBounds {
                min: rules.min_nightly_rate_cents,
                max: rules.max_nightly_rate_cents,
            });
        }
        if self.max_guests < 1 || self.max_guests > rules.max_guests_per_property {
            return Err(PropertyError::GuestsOutOfBounds {
                max: rules.max_guests_per_property,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> NewProperty {
        NewProperty {
            agent_id: Uuid::new_v4(),
            title: "Canal-side loft".into(),
            description: None,
            location: "Amsterdam".into(),
            nightly_rate_cents: 14_500,
            max_guests: 4,
            amenities: serde_json::json!({"wifi": true}),
        }
    }

    #[test]
    fn test_valid_listing() {
        assert!(listing().validate(&ListingRules::default()).is_ok());
    }

    #[test]
    fn test_rate_bounds() {
        let mut p = listing();
        p.nightly_rate_cents = 999;
        assert!(matches!(
            p.validate(&ListingRules::default()),
            Err(PropertyError::RateOutOfBounds { .. })
        ));
        p.nightly_rate_cents = 1_000_001;
        assert!(p.validate(&ListingRules::default()).is_err());
    }

    #[test]
    fn test_guest_bounds() {
        let mut p = listing();
        p.max_guests = 0;
        assert!(matches!(
            p.validate(&ListingRules::default()),
            Err(PropertyError::GuestsOutOfBounds { .. })
        ));
        p.max_guests = 21;
        assert!(p.validate(&ListingRules::default()).is_err());
    }

    #[test]
    fn test_blank_title() {
        let mut p = listing();
        p.title = "   ".into();
        assert_eq!(
            p.validate(&ListingRules::default()),
            Err(PropertyError::MissingTitle)
        );
    }
}
