use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use hearth_api::auth::{issue_admin_token, issue_token};
use hearth_api::middleware::rate_limit::RateLimiter;
use hearth_api::state::{AppState, AuthConfig};
use hearth_api::{app, mailer::LogMailer};
use hearth_booking::availability::{self, StayRange};
use hearth_booking::models::{NewReservation, Reservation, ReservationStatus};
use hearth_booking::repository::{ReservationRepository, ReservationStoreError};
use hearth_catalog::property::{NewProperty, Property, PropertyImage, PropertyStatus};
use hearth_catalog::repository::{PropertyRepository, PropertyStoreError};
use hearth_core::account::{
    AccountStoreError, Admin, AdminRepository, Agent, AgentRepository, AgentStatus,
    DashboardStats, NewAgent, NewUser, SubscriptionPlan, User, UserRepository,
};
use hearth_core::counter::CounterStore;
use hearth_core::payment::{
    MockCardGateway, NewPayment, Payment, PaymentPurpose, PaymentRepository, PaymentStatus,
    PaymentStoreError, Refund,
};
use hearth_store::app_config::{BusinessRules, UploadConfig};

// ============================================================================
// In-memory fakes
// ============================================================================

type Favorites = Arc<Mutex<Vec<(Uuid, Uuid)>>>;

#[derive(Default)]
struct MemoryUsers {
    items: Mutex<Vec<User>>,
    favorites: Favorites,
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn create(&self, user: &NewUser) -> Result<User, AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|u| u.email == user.email) {
            return Err(AccountStoreError::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            password_hash: user.password_hash.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        items.push(user.clone());
        Ok(user)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, AccountStoreError> {
        Ok(self.items.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountStoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        phone: Option<&str>,
    ) -> Result<User, AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let user = items
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(AccountStoreError::NotFound)?;
        user.name = name.to_string();
        user.phone = phone.map(String::from);
        Ok(user.clone())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let user = items
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(AccountStoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|u| u.id != id);
        if items.len() == before {
            return Err(AccountStoreError::NotFound);
        }
        Ok(())
    }

    async fn add_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<(), AccountStoreError> {
        let mut favorites = self.favorites.lock().unwrap();
        if !favorites.contains(&(user_id, property_id)) {
            favorites.push((user_id, property_id));
        }
        Ok(())
    }

    async fn remove_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<(), AccountStoreError> {
        self.favorites
            .lock()
            .unwrap()
            .retain(|(u, p)| !(*u == user_id && *p == property_id));
        Ok(())
    }

    async fn is_favorite(
        &self,
        user_id: Uuid,
        property_id: Uuid,
    ) -> Result<bool, AccountStoreError> {
        Ok(self
            .favorites
            .lock()
            .unwrap()
            .contains(&(user_id, property_id)))
    }
}

#[derive(Default)]
struct MemoryAgents {
    items: Mutex<Vec<Agent>>,
}

#[async_trait]
impl AgentRepository for MemoryAgents {
    async fn create(&self, agent: &NewAgent) -> Result<Agent, AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|a| a.email == agent.email) {
            return Err(AccountStoreError::EmailTaken);
        }
        let agent = Agent {
            id: Uuid::new_v4(),
            name: agent.name.clone(),
            email: agent.email.clone(),
            phone: agent.phone.clone(),
            company: agent.company.clone(),
            password_hash: agent.password_hash.clone(),
            status: AgentStatus::Pending,
            plan: SubscriptionPlan::Base,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        items.push(agent.clone());
        Ok(agent)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Agent>, AccountStoreError> {
        Ok(self.items.lock().unwrap().iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Agent>, AccountStoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        phone: Option<&str>,
        company: Option<&str>,
    ) -> Result<Agent, AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let agent = items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AccountStoreError::NotFound)?;
        agent.name = name.to_string();
        agent.phone = phone.map(String::from);
        agent.company = company.map(String::from);
        Ok(agent.clone())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let agent = items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AccountStoreError::NotFound)?;
        agent.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|a| a.id != id);
        if items.len() == before {
            return Err(AccountStoreError::NotFound);
        }
        Ok(())
    }

    async fn approve(&self, id: Uuid) -> Result<(), AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let agent = items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AccountStoreError::NotFound)?;
        agent.status = AgentStatus::Approved;
        Ok(())
    }

    async fn set_plan(&self, id: Uuid, plan: SubscriptionPlan) -> Result<(), AccountStoreError> {
        let mut items = self.items.lock().unwrap();
        let agent = items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AccountStoreError::NotFound)?;
        agent.plan = plan;
        Ok(())
    }

    async fn list(
        &self,
        _page: u32,
        _per_page: u32,
        status: Option<AgentStatus>,
        _keyword: Option<&str>,
    ) -> Result<(Vec<Agent>, u64), AccountStoreError> {
        let items: Vec<Agent> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|a| status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }
}

#[derive(Default)]
struct MemoryAdmins {
    items: Mutex<Vec<Admin>>,
}

#[async_trait]
impl AdminRepository for MemoryAdmins {
    async fn find_by_email(&self, email: &str) -> Result<Option<Admin>, AccountStoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, AccountStoreError> {
        Ok(DashboardStats::default())
    }
}

#[derive(Default)]
struct MemoryProperties {
    items: Mutex<Vec<Property>>,
    images: Mutex<Vec<PropertyImage>>,
    favorites: Favorites,
}

#[async_trait]
impl PropertyRepository for MemoryProperties {
    async fn create(&self, property: &NewProperty) -> Result<Property, PropertyStoreError> {
        let property = Property {
            id: Uuid::new_v4(),
            agent_id: property.agent_id,
            title: property.title.clone(),
            description: property.description.clone(),
            location: property.location.clone(),
            nightly_rate_cents: property.nightly_rate_cents,
            max_guests: property.max_guests,
            amenities: property.amenities.clone(),
            status: PropertyStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.items.lock().unwrap().push(property.clone());
        Ok(property)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Property>, PropertyStoreError> {
        Ok(self.items.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        title: &str,
        description: Option<&str>,
        location: &str,
        nightly_rate_cents: i64,
        max_guests: i32,
        amenities: &Value,
    ) -> Result<Property, PropertyStoreError> {
        let mut items = self.items.lock().unwrap();
        let property = items
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PropertyStoreError::NotFound)?;
        property.title = title.to_string();
        property.description = description.map(String::from);
        property.location = location.to_string();
        property.nightly_rate_cents = nightly_rate_cents;
        property.max_guests = max_guests;
        property.amenities = amenities.clone();
        Ok(property.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), PropertyStoreError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|p| p.id != id);
        if items.len() == before {
            return Err(PropertyStoreError::NotFound);
        }
        Ok(())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: PropertyStatus,
    ) -> Result<(), PropertyStoreError> {
        let mut items = self.items.lock().unwrap();
        let property = items
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PropertyStoreError::NotFound)?;
        property.status = status;
        Ok(())
    }

    async fn list(
        &self,
        _page: u32,
        _per_page: u32,
        status: Option<PropertyStatus>,
        agent_id: Option<Uuid>,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError> {
        let items: Vec<Property> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .filter(|p| agent_id.is_none_or(|a| p.agent_id == a))
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }

    async fn search(
        &self,
        keyword: &str,
        _page: u32,
        _per_page: u32,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError> {
        let needle = keyword.to_lowercase();
        let items: Vec<Property> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.status == PropertyStatus::Active)
            .filter(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.location.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }

    async fn count_for_agent(&self, agent_id: Uuid) -> Result<u64, PropertyStoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.agent_id == agent_id && p.status != PropertyStatus::Rejected)
            .count() as u64)
    }

    async fn add_image(
        &self,
        property_id: Uuid,
        url: &str,
        is_primary: bool,
    ) -> Result<PropertyImage, PropertyStoreError> {
        let image = PropertyImage {
            id: Uuid::new_v4(),
            property_id,
            url: url.to_string(),
            is_primary,
            created_at: Utc::now(),
        };
        self.images.lock().unwrap().push(image.clone());
        Ok(image)
    }

    async fn remove_image(
        &self,
        property_id: Uuid,
        image_id: Uuid,
    ) -> Result<(), PropertyStoreError> {
        let mut images = self.images.lock().unwrap();
        let before = images.len();
        images.retain(|i| !(i.id == image_id && i.property_id == property_id));
        if images.len() == before {
            return Err(PropertyStoreError::NotFound);
        }
        Ok(())
    }

    async fn images(&self, property_id: Uuid) -> Result<Vec<PropertyImage>, PropertyStoreError> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.property_id == property_id)
            .cloned()
            .collect())
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        _page: u32,
        _per_page: u32,
    ) -> Result<(Vec<Property>, u64), PropertyStoreError> {
        let favorite_ids: Vec<Uuid> = self
            .favorites
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, p)| *p)
            .collect();
        let items: Vec<Property> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| favorite_ids.contains(&p.id))
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }
}

/// Reuses the domain availability predicate, so the fake makes the same
/// accept/reject decisions as the SQL scan.
#[derive(Default)]
struct MemoryReservations {
    items: Mutex<Vec<Reservation>>,
}

#[async_trait]
impl ReservationRepository for MemoryReservations {
    async fn create(
        &self,
        new: &NewReservation,
    ) -> Result<Reservation, ReservationStoreError> {
        let mut items = self.items.lock().unwrap();
        let candidate = StayRange::new(new.check_in, new.check_out);
        let existing: Vec<Reservation> = items
            .iter()
            .filter(|r| r.property_id == new.property_id)
            .cloned()
            .collect();
        if !availability::is_available(&existing, &candidate, None) {
            return Err(ReservationStoreError::Unavailable);
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            property_id: new.property_id,
            guest_id: new.guest_id,
            check_in: new.check_in,
            check_out: new.check_out,
            guests_count: new.guests_count,
            total_cents: new.total_cents,
            status: ReservationStatus::Pending,
            special_requests: new.special_requests.clone(),
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        items.push(reservation.clone());
        Ok(reservation)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Reservation>, ReservationStoreError> {
        Ok(self.items.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn is_available(
        &self,
        property_id: Uuid,
        range: &StayRange,
        exclude: Option<Uuid>,
    ) -> Result<bool, ReservationStoreError> {
        let items = self.items.lock().unwrap();
        let existing: Vec<Reservation> = items
            .iter()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect();
        Ok(availability::is_available(&existing, range, exclude))
    }

    async fn list_by_guest(
        &self,
        guest_id: Uuid,
        _page: u32,
        _per_page: u32,
        status: Option<ReservationStatus>,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError> {
        let items: Vec<Reservation> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.guest_id == guest_id)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }

    async fn upcoming(
        &self,
        guest_id: Uuid,
        today: NaiveDate,
        _page: u32,
        _per_page: u32,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError> {
        let items: Vec<Reservation> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.guest_id == guest_id
                    && r.status == ReservationStatus::Confirmed
                    && r.check_in >= today
            })
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }

    async fn past(
        &self,
        guest_id: Uuid,
        today: NaiveDate,
        _page: u32,
        _per_page: u32,
    ) -> Result<(Vec<Reservation>, u64), ReservationStoreError> {
        let items: Vec<Reservation> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.guest_id == guest_id && r.check_out < today)
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }

    async fn update_dates(
        &self,
        id: Uuid,
        range: &StayRange,
        total_cents: i64,
    ) -> Result<Reservation, ReservationStoreError> {
        let mut items = self.items.lock().unwrap();
        let property_id = items
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.property_id)
            .ok_or(ReservationStoreError::NotFound)?;

        let existing: Vec<Reservation> = items
            .iter()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect();
        if !availability::is_available(&existing, range, Some(id)) {
            return Err(ReservationStoreError::Unavailable);
        }

        let reservation = items.iter_mut().find(|r| r.id == id).unwrap();
        reservation.check_in = range.check_in;
        reservation.check_out = range.check_out;
        reservation.total_cents = total_cents;
        Ok(reservation.clone())
    }

    async fn update_guests(
        &self,
        id: Uuid,
        guests_count: i32,
    ) -> Result<(), ReservationStoreError> {
        let mut items = self.items.lock().unwrap();
        let reservation = items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ReservationStoreError::NotFound)?;
        reservation.guests_count = guests_count;
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<(), ReservationStoreError> {
        let mut items = self.items.lock().unwrap();
        let reservation = items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ReservationStoreError::NotFound)?;
        reservation.status = status;
        Ok(())
    }

    async fn cancel(
        &self,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<(), ReservationStoreError> {
        let mut items = self.items.lock().unwrap();
        let reservation = items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ReservationStoreError::NotFound)?;
        reservation.status = ReservationStatus::Cancelled;
        reservation.cancellation_reason = reason.map(String::from);
        Ok(())
    }

    async fn expire_stale_pending(
        &self,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<u64, ReservationStoreError> {
        let mut items = self.items.lock().unwrap();
        let mut expired = 0;
        for reservation in items.iter_mut() {
            if reservation.status == ReservationStatus::Pending && reservation.created_at < cutoff
            {
                reservation.status = ReservationStatus::Cancelled;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[derive(Default)]
struct MemoryPayments {
    items: Mutex<Vec<Payment>>,
    refunds: Mutex<Vec<Refund>>,
}

#[async_trait]
impl PaymentRepository for MemoryPayments {
    async fn record(&self, payment: &NewPayment) -> Result<Payment, PaymentStoreError> {
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            reservation_id: payment.reservation_id,
            purpose: payment.purpose,
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
            status: payment.status.clone(),
            method: payment.method.clone(),
            card_last_four: payment.card_last_four.clone(),
            gateway_reference: payment.gateway_reference.clone(),
            created_at: Utc::now(),
        };
        self.items.lock().unwrap().push(payment.clone());
        Ok(payment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>, PaymentStoreError> {
        Ok(self.items.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<Payment>, PaymentStoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.reservation_id == Some(reservation_id))
            .cloned()
            .collect())
    }

    async fn by_user(
        &self,
        user_id: Uuid,
        _page: u32,
        _per_page: u32,
    ) -> Result<(Vec<Payment>, u64), PaymentStoreError> {
        let items: Vec<Payment> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok((items, total))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), PaymentStoreError> {
        let mut items = self.items.lock().unwrap();
        let payment = items
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PaymentStoreError::NotFound)?;
        payment.status = status;
        Ok(())
    }

    async fn latest_captured_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Payment>, PaymentStoreError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.reservation_id == Some(reservation_id) && p.status == PaymentStatus::Captured
            })
            .last()
            .cloned())
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        amount_cents: i64,
        reason: Option<&str>,
        gateway_reference: Option<&str>,
    ) -> Result<Refund, PaymentStoreError> {
        let refund = Refund {
            id: Uuid::new_v4(),
            payment_id,
            amount_cents,
            reason: reason.map(String::from),
            gateway_reference: gateway_reference.map(String::from),
            created_at: Utc::now(),
        };
        self.refunds.lock().unwrap().push(refund.clone());
        Ok(refund)
    }

    async fn refund_total(&self, payment_id: Uuid) -> Result<i64, PaymentStoreError> {
        Ok(self
            .refunds
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .map(|r| r.amount_cents)
            .sum())
    }
}

#[derive(Default)]
struct MemoryCounter {
    counts: Mutex<HashMap<String, u64>>,
}

#[async_trait]
impl CounterStore for MemoryCounter {
    async fn get(&self, key: &str) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(*self.counts.lock().unwrap().get(key).unwrap_or(&0))
    }

    async fn incr(
        &self,
        key: &str,
        _window: Duration,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn ttl(
        &self,
        key: &str,
    ) -> Result<Option<Duration>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self
            .counts
            .lock()
            .unwrap()
            .contains_key(key)
            .then_some(Duration::from_secs(30)))
    }
}

// ============================================================================
// Harness
// ============================================================================

fn business_rules() -> BusinessRules {
    BusinessRules {
        currency: "USD".into(),
        min_nightly_rate_cents: 1_000,
        max_nightly_rate_cents: 1_000_000,
        max_guests_per_property: 20,
        max_images_per_property: 10,
        min_stay_nights: 1,
        max_stay_nights: 30,
        cancellation_deadline_hours: 48,
        refund_percentage: 80,
        pending_hold_minutes: 30,
        default_page_size: 10,
        max_page_size: 100,
    }
}

struct Harness {
    state: AppState,
    app: Router,
    counter: Arc<MemoryCounter>,
}

fn harness_with_limit(limit: u32) -> Harness {
    let favorites: Favorites = Arc::default();
    let counter = Arc::new(MemoryCounter::default());

    let (events_tx, _) = tokio::sync::broadcast::channel(16);
    let state = AppState {
        users: Arc::new(MemoryUsers {
            items: Mutex::new(Vec::new()),
            favorites: favorites.clone(),
        }),
        agents: Arc::new(MemoryAgents::default()),
        admins: Arc::new(MemoryAdmins::default()),
        properties: Arc::new(MemoryProperties {
            items: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            favorites,
        }),
        reservations: Arc::new(MemoryReservations::default()),
        payments: Arc::new(MemoryPayments::default()),
        gateway: Arc::new(MockCardGateway),
        mailer: Arc::new(LogMailer),
        events_tx,
        auth: AuthConfig {
            secret: "test-secret".into(),
            expiration: 3600,
        },
        rules: business_rules(),
        uploads: UploadConfig {
            dir: "/tmp/hearth-test-uploads".into(),
            max_bytes: 5 * 1024 * 1024,
        },
    };

    let limiter = Arc::new(RateLimiter::new(
        counter.clone(),
        limit,
        Duration::from_secs(60),
    ));
    let app = app(state.clone(), limiter);

    Harness { state, app, counter }
}

fn harness() -> Harness {
    harness_with_limit(10_000)
}

impl Harness {
    async fn seed_guest(&self) -> (Uuid, String) {
        let user = self
            .state
            .users
            .create(&NewUser {
                name: "Ada Guest".into(),
                email: "ada@example.com".into(),
                phone: None,
                password_hash: hearth_core::account::hash_password("hunter2hunter2").unwrap(),
            })
            .await
            .unwrap();
        let token = issue_token(&self.state.auth, user.id, &user.email, "GUEST").unwrap();
        (user.id, token)
    }

    async fn seed_agent(&self) -> (Uuid, String) {
        let agent = self
            .state
            .agents
            .create(&NewAgent {
                name: "Hugo Host".into(),
                email: "hugo@example.com".into(),
                phone: None,
                company: None,
                password_hash: hearth_core::account::hash_password("hunter2hunter2").unwrap(),
            })
            .await
            .unwrap();
        self.state.agents.approve(agent.id).await.unwrap();
        let token = issue_token(&self.state.auth, agent.id, &agent.email, "AGENT").unwrap();
        (agent.id, token)
    }

    async fn seed_active_property(&self, agent_id: Uuid, nightly_rate_cents: i64) -> Uuid {
        let property = self
            .state
            .properties
            .create(&NewProperty {
                agent_id,
                title: "Canal-side loft".into(),
                description: None,
                location: "Amsterdam".into(),
                nightly_rate_cents,
                max_guests: 4,
                amenities: json!({}),
            })
            .await
            .unwrap();
        self.state
            .properties
            .set_status(property.id, PropertyStatus::Active)
            .await
            .unwrap();
        property.id
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

fn date(days_from_now: i64) -> NaiveDate {
    Utc::now().date_naive() + chrono::Duration::days(days_from_now)
}

fn card_json(number: &str) -> Value {
    json!({
        "number": number,
        "holder": "ADA GUEST",
        "exp_month": 12,
        "exp_year": 2099,
        "cvv": "123",
    })
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health() {
    let h = harness();
    let (status, body) = h.send("GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "running");
}

#[tokio::test]
async fn test_register_and_login_flow() {
    let h = harness();

    let (status, body) = h
        .send(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "hunter2hunter2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // The issued token opens the profile.
    let (status, body) = h.send("GET", "/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ada@example.com");

    // Duplicate registration is rejected.
    let (status, _) = h
        .send(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "hunter2hunter2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Wrong password fails login.
    let (status, _) = h
        .send(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h
        .send(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "hunter2hunter2"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token_and_role() {
    let h = harness();

    let (status, _) = h.send("GET", "/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h
        .send("GET", "/v1/users/me", Some("not-a-real-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A guest token does not open agent or admin surfaces.
    let (_, guest_token) = h.seed_guest().await;
    let (status, _) = h
        .send("GET", "/v1/agents/me", Some(&guest_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h
        .send("GET", "/v1/admin/stats", Some(&guest_token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_budget_and_retry_after() {
    let h = harness_with_limit(2);

    for _ in 0..2 {
        let (status, _) = h.send("GET", "/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Third request in the window is rejected with a retry hint.
    let request = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get("Retry-After")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after <= 60);

    // Budgets are per endpoint: another resource still responds.
    let (status, _) = h.send("GET", "/v1/properties", None, None).await;
    assert_eq!(status, StatusCode::OK);

    // Window elapse (the store forgetting the key) restores service.
    h.counter.counts.lock().unwrap().clear();
    let (status, _) = h.send("GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_booking_flow_with_conflict() {
    let h = harness();
    let (_, guest_token) = h.seed_guest().await;
    let (agent_id, _) = h.seed_agent().await;
    let property_id = h.seed_active_property(agent_id, 10_000).await;

    // Book five nights.
    let (status, body) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(10),
                "check_out": date(15),
                "guests_count": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_cents"], 50_000);
    assert_eq!(body["data"]["status"], "pending");

    // An overlapping request conflicts...
    let (status, _) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(12),
                "check_out": date(14),
                "guests_count": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // ...but a back-to-back stay does not.
    let (status, _) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(15),
                "check_out": date(18),
                "guests_count": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Inverted range never reaches the availability check.
    let (status, _) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(20),
                "check_out": date(20),
                "guests_count": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_availability_endpoint() {
    let h = harness();
    let (_, guest_token) = h.seed_guest().await;
    let (agent_id, _) = h.seed_agent().await;
    let property_id = h.seed_active_property(agent_id, 10_000).await;

    let uri = format!(
        "/v1/properties/{}/availability?check_in={}&check_out={}",
        property_id,
        date(10),
        date(12)
    );
    let (status, body) = h.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available"], true);
    assert_eq!(body["data"]["total_cents"], 20_000);

    // Book it, then the same range reads unavailable with no quote.
    let (status, _) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(10),
                "check_out": date(12),
                "guests_count": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h.send("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available"], false);
    assert!(body["data"]["total_cents"].is_null());
}

#[tokio::test]
async fn test_payment_confirms_reservation() {
    let h = harness();
    let (_, guest_token) = h.seed_guest().await;
    let (agent_id, _) = h.seed_agent().await;
    let property_id = h.seed_active_property(agent_id, 10_000).await;

    let (_, body) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(10),
                "check_out": date(15),
                "guests_count": 2,
            })),
        )
        .await;
    let reservation_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .send(
            "POST",
            "/v1/payments/card",
            Some(&guest_token),
            Some(json!({
                "reservation_id": reservation_id,
                "card": card_json("4242424242424242"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "captured");
    assert_eq!(body["data"]["card_last_four"], "4242");

    let (status, body) = h
        .send(
            "GET",
            &format!("/v1/reservations/{reservation_id}"),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");

    // Paying a confirmed reservation again is an invalid transition.
    let (status, _) = h
        .send(
            "POST",
            "/v1/payments/card",
            Some(&guest_token),
            Some(json!({
                "reservation_id": reservation_id,
                "card": card_json("4242424242424242"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_declined_card_leaves_reservation_pending() {
    let h = harness();
    let (_, guest_token) = h.seed_guest().await;
    let (agent_id, _) = h.seed_agent().await;
    let property_id = h.seed_active_property(agent_id, 10_000).await;

    let (_, body) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(10),
                "check_out": date(15),
                "guests_count": 2,
            })),
        )
        .await;
    let reservation_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .send(
            "POST",
            "/v1/payments/card",
            Some(&guest_token),
            Some(json!({
                "reservation_id": reservation_id,
                "card": card_json(hearth_core::payment::DECLINE_TEST_PAN),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = h
        .send(
            "GET",
            &format!("/v1/reservations/{reservation_id}"),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(body["data"]["status"], "pending");
}

#[tokio::test]
async fn test_cancellation_policy_and_refund() {
    let h = harness();
    let (_, guest_token) = h.seed_guest().await;
    let (agent_id, _) = h.seed_agent().await;
    let property_id = h.seed_active_property(agent_id, 10_000).await;

    // Far-out stay, paid in full.
    let (_, body) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(10),
                "check_out": date(15),
                "guests_count": 2,
            })),
        )
        .await;
    let reservation_id = body["data"]["id"].as_str().unwrap().to_string();
    h.send(
        "POST",
        "/v1/payments/card",
        Some(&guest_token),
        Some(json!({
            "reservation_id": reservation_id,
            "card": card_json("4242424242424242"),
        })),
    )
    .await;

    let (status, body) = h
        .send(
            "POST",
            &format!("/v1/reservations/{reservation_id}/cancel"),
            Some(&guest_token),
            Some(json!({"reason": "change of plans"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // 80% of the 50_000 total comes back.
    assert_eq!(body["data"]["refund_cents"], 40_000);

    // A stay starting tomorrow is inside the 48h deadline.
    let (_, body) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(1),
                "check_out": date(3),
                "guests_count": 2,
            })),
        )
        .await;
    let late_id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = h
        .send(
            "POST",
            &format!("/v1/reservations/{late_id}/cancel"),
            Some(&guest_token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_date_change_excludes_self() {
    let h = harness();
    let (_, guest_token) = h.seed_guest().await;
    let (agent_id, _) = h.seed_agent().await;
    let property_id = h.seed_active_property(agent_id, 10_000).await;

    let (_, body) = h
        .send(
            "POST",
            "/v1/reservations",
            Some(&guest_token),
            Some(json!({
                "property_id": property_id,
                "check_in": date(10),
                "check_out": date(15),
                "guests_count": 2,
            })),
        )
        .await;
    let reservation_id = body["data"]["id"].as_str().unwrap().to_string();

    // Shifting within the reservation's own range must not self-conflict.
    let (status, body) = h
        .send(
            "PUT",
            &format!("/v1/reservations/{reservation_id}/dates"),
            Some(&guest_token),
            Some(json!({"check_in": date(11), "check_out": date(16)})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_cents"], 50_000);

    // A second booking elsewhere in the calendar blocks a move onto it.
    h.send(
        "POST",
        "/v1/reservations",
        Some(&guest_token),
        Some(json!({
            "property_id": property_id,
            "check_in": date(20),
            "check_out": date(25),
            "guests_count": 2,
        })),
    )
    .await;
    let (status, _) = h
        .send(
            "PUT",
            &format!("/v1/reservations/{reservation_id}/dates"),
            Some(&guest_token),
            Some(json!({"check_in": date(21), "check_out": date(23)})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_listing_quota_enforced() {
    let h = harness();
    let (agent_id, agent_token) = h.seed_agent().await;

    // The base plan allows four listings.
    for i in 0..4 {
        let (status, _) = h
            .send(
                "POST",
                "/v1/properties",
                Some(&agent_token),
                Some(json!({
                    "title": format!("Listing {i}"),
                    "location": "Amsterdam",
                    "nightly_rate_cents": 10_000,
                    "max_guests": 2,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = h
        .send(
            "POST",
            "/v1/properties",
            Some(&agent_token),
            Some(json!({
                "title": "One too many",
                "location": "Amsterdam",
                "nightly_rate_cents": 10_000,
                "max_guests": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Gold raises the ceiling.
    h.state
        .agents
        .set_plan(agent_id, SubscriptionPlan::Gold)
        .await
        .unwrap();
    let (status, _) = h
        .send(
            "POST",
            "/v1/properties",
            Some(&agent_token),
            Some(json!({
                "title": "Fifth listing",
                "location": "Amsterdam",
                "nightly_rate_cents": 10_000,
                "max_guests": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_listing_field_bounds() {
    let h = harness();
    let (_, agent_token) = h.seed_agent().await;

    let (status, _) = h
        .send(
            "POST",
            "/v1/properties",
            Some(&agent_token),
            Some(json!({
                "title": "Too cheap",
                "location": "Amsterdam",
                "nightly_rate_cents": 500,
                "max_guests": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h
        .send(
            "POST",
            "/v1/properties",
            Some(&agent_token),
            Some(json!({
                "title": "Too crowded",
                "location": "Amsterdam",
                "nightly_rate_cents": 10_000,
                "max_guests": 50,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_favorites_roundtrip() {
    let h = harness();
    let (_, guest_token) = h.seed_guest().await;
    let (agent_id, _) = h.seed_agent().await;
    let property_id = h.seed_active_property(agent_id, 10_000).await;

    let (status, _) = h
        .send(
            "POST",
            &format!("/v1/users/me/favorites/{property_id}"),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .send("GET", "/v1/users/me/favorites", Some(&guest_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["id"], property_id.to_string());

    let (status, _) = h
        .send(
            "DELETE",
            &format!("/v1/users/me/favorites/{property_id}"),
            Some(&guest_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = h
        .send("GET", "/v1/users/me/favorites", Some(&guest_token), None)
        .await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_admin_refund_requires_permission_and_caps_amount() {
    let h = harness();
    let admin_id = Uuid::new_v4();
    let full_token = issue_admin_token(
        &h.state.auth,
        admin_id,
        "root@example.com",
        vec!["payments.refund".into()],
    )
    .unwrap();
    let limited_token =
        issue_admin_token(&h.state.auth, admin_id, "root@example.com", vec![]).unwrap();

    let payment = h
        .state
        .payments
        .record(&NewPayment {
            user_id: Uuid::new_v4(),
            reservation_id: None,
            purpose: PaymentPurpose::Subscription,
            amount_cents: 10_000,
            currency: "USD".into(),
            status: PaymentStatus::Captured,
            method: "card".into(),
            card_last_four: Some("4242".into()),
            gateway_reference: Some("ch_test".into()),
        })
        .await
        .unwrap();
    let uri = format!("/v1/admin/payments/{}/refund", payment.id);

    // The permission gate comes before any payment lookup.
    let (status, _) = h
        .send("POST", &uri, Some(&limited_token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h
        .send(
            "POST",
            &uri,
            Some(&full_token),
            Some(json!({"amount_cents": 2_500})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amount_cents"], 2_500);

    // Only 7_500 is still refundable.
    let (status, _) = h
        .send(
            "POST",
            &uri,
            Some(&full_token),
            Some(json!({"amount_cents": 8_000})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pagination_envelope_shape() {
    let h = harness();
    let (agent_id, _) = h.seed_agent().await;
    h.seed_active_property(agent_id, 10_000).await;

    let (status, body) = h.send("GET", "/v1/properties", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["per_page"], 10);
    assert_eq!(body["pagination"]["current_page"], 1);
    assert_eq!(body["pagination"]["total_pages"], 1);
}
