pub mod availability;
pub mod changes;
pub mod manager;
pub mod models;
pub mod repository;

pub use availability::StayRange;
pub use changes::ChangeHandler;
pub use manager::{BookingManager, CancellationPolicy};
pub use models::{NewReservation, Reservation, ReservationStatus};
pub use repository::ReservationRepository;
