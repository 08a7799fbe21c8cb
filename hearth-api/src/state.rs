use std::sync::Arc;

use hearth_booking::repository::ReservationRepository;
use hearth_catalog::repository::PropertyRepository;
use hearth_core::account::{AdminRepository, AgentRepository, UserRepository};
use hearth_core::payment::{PaymentAdapter, PaymentRepository};
use hearth_shared::events::ReservationEvent;
use hearth_store::app_config::{BusinessRules, UploadConfig};
use tokio::sync::broadcast;

use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub admins: Arc<dyn AdminRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub gateway: Arc<dyn PaymentAdapter>,
    pub mailer: Arc<dyn Mailer>,
    pub events_tx: broadcast::Sender<ReservationEvent>,
    pub auth: AuthConfig,
    pub rules: BusinessRules,
    pub uploads: UploadConfig,
}
