use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_booking::availability::StayRange;
use hearth_catalog::pricing::{QuoteConfig, QuoteEngine};
use hearth_catalog::property::{ListingRules, NewProperty, Property, PropertyImage, PropertyStatus};
use hearth_catalog::plans;
use hearth_core::account::AgentStatus;
use hearth_core::validation;
use hearth_store::app_config::BusinessRules;

use crate::error::AppError;
use crate::middleware::auth::AgentAuth;
use crate::response::{message_only, paginated, success, ApiResponse, PageQuery, Paginated};
use crate::state::AppState;

/// The `/properties` resource mixes public reads with agent-only writes on
/// the same paths, so authentication rides on the [`AgentAuth`] extractor
/// rather than a router-wide layer.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/properties", get(list_properties).post(create_property))
        .route("/properties/search", get(search_properties))
        .route(
            "/properties/{id}",
            get(view_property).put(update_property).delete(delete_property),
        )
        .route("/properties/{id}/availability", get(check_availability))
}

pub fn listing_rules(rules: &BusinessRules) -> ListingRules {
    ListingRules {
        min_nightly_rate_cents: rules.min_nightly_rate_cents,
        max_nightly_rate_cents: rules.max_nightly_rate_cents,
        max_guests_per_property: rules.max_guests_per_property,
        max_images_per_property: rules.max_images_per_property,
    }
}

pub fn quote_engine(rules: &BusinessRules) -> QuoteEngine {
    QuoteEngine::new(QuoteConfig {
        min_stay_nights: rules.min_stay_nights,
        max_stay_nights: rules.max_stay_nights,
        refund_percentage: rules.refund_percentage,
    })
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PropertySummary {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub title: String,
    pub location: String,
    pub nightly_rate_cents: i64,
    pub max_guests: i32,
    pub status: PropertyStatus,
}

impl From<Property> for PropertySummary {
    fn from(p: Property) -> Self {
        Self {
            id: p.id,
            agent_id: p.agent_id,
            title: p.title,
            location: p.location,
            nightly_rate_cents: p.nightly_rate_cents,
            max_guests: p.max_guests,
            status: p.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<PropertyImage>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub nightly_rate_cents: i64,
    pub max_guests: i32,
    #[serde(default)]
    pub amenities: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cents: Option<i64>,
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /v1/properties
/// Active listings, newest first.
async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PropertySummary>>, AppError> {
    let (page, per_page) = query.clamp(&state.rules);
    let (properties, total) = state
        .properties
        .list(page, per_page, Some(PropertyStatus::Active), None)
        .await?;

    let items = properties.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// GET /v1/properties/search?q=
async fn search_properties(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Paginated<PropertySummary>>, AppError> {
    validation::validate_non_empty("q", &query.q)?;

    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = paging.clamp(&state.rules);
    let (properties, total) = state.properties.search(&query.q, page, per_page).await?;

    let items = properties.into_iter().map(Into::into).collect();
    Ok(paginated(items, total, page, per_page))
}

/// GET /v1/properties/{id}
async fn view_property(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PropertyDetail>>, AppError> {
    let property = state
        .properties
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;
    let images = state.properties.images(id).await?;

    Ok(success(PropertyDetail { property, images }))
}

/// GET /v1/properties/{id}/availability?check_in=&check_out=
/// Standalone availability probe; reserves nothing. Includes the would-be
/// total when the range is free.
async fn check_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<AvailabilityResponse>>, AppError> {
    validation::validate_date_range(query.check_in, query.check_out)?;

    let property = state
        .properties
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;

    let range = StayRange::new(query.check_in, query.check_out);
    let available = property.status == PropertyStatus::Active
        && state.reservations.is_available(id, &range, None).await?;

    let total_cents = if available {
        Some(quote_engine(&state.rules).quote(
            query.check_in,
            query.check_out,
            property.nightly_rate_cents,
        )?)
    } else {
        None
    };

    Ok(success(AvailabilityResponse { available, total_cents }))
}

// ============================================================================
// Agent handlers
// ============================================================================

/// POST /v1/properties
/// New listings start `pending` and count against the agent's plan quota.
async fn create_property(
    State(state): State<AppState>,
    AgentAuth(claims): AgentAuth,
    Json(req): Json<PropertyRequest>,
) -> Result<Json<ApiResponse<PropertySummary>>, AppError> {
    let agent_id = claims.account_id()?;
    let agent = state
        .agents
        .get(agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("account not found".into()))?;

    if agent.status != AgentStatus::Approved {
        return Err(AppError::Forbidden(
            "agent account is pending approval".into(),
        ));
    }

    let current = state.properties.count_for_agent(agent_id).await?;
    plans::ensure_can_list(agent.plan, current)?;

    let new_property = NewProperty {
        agent_id,
        title: req.title,
        description: req.description,
        location: req.location,
        nightly_rate_cents: req.nightly_rate_cents,
        max_guests: req.max_guests,
        amenities: req.amenities,
    };
    new_property.validate(&listing_rules(&state.rules))?;

    let property = state.properties.create(&new_property).await?;
    Ok(success(property.into()))
}

/// PUT /v1/properties/{id}
async fn update_property(
    State(state): State<AppState>,
    AgentAuth(claims): AgentAuth,
    Path(id): Path<Uuid>,
    Json(req): Json<PropertyRequest>,
) -> Result<Json<ApiResponse<PropertySummary>>, AppError> {
    let property = owned_property(&state, &claims, id).await?;

    let candidate = NewProperty {
        agent_id: property.agent_id,
        title: req.title,
        description: req.description,
        location: req.location,
        nightly_rate_cents: req.nightly_rate_cents,
        max_guests: req.max_guests,
        amenities: req.amenities,
    };
    candidate.validate(&listing_rules(&state.rules))?;

    let updated = state
        .properties
        .update(
            id,
            &candidate.title,
            candidate.description.as_deref(),
            &candidate.location,
            candidate.nightly_rate_cents,
            candidate.max_guests,
            &candidate.amenities,
        )
        .await?;

    Ok(success(updated.into()))
}

/// DELETE /v1/properties/{id}
async fn delete_property(
    State(state): State<AppState>,
    AgentAuth(claims): AgentAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    owned_property(&state, &claims, id).await?;
    state.properties.delete(id).await?;
    Ok(message_only("property deleted"))
}

/// Fetch a property and require that `claims` owns it.
pub async fn owned_property(
    state: &AppState,
    claims: &crate::middleware::auth::Claims,
    id: Uuid,
) -> Result<Property, AppError> {
    let property = state
        .properties
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("property not found".into()))?;

    if property.agent_id != claims.account_id()? {
        return Err(AppError::Forbidden(
            "you do not manage this property".into(),
        ));
    }
    Ok(property)
}
