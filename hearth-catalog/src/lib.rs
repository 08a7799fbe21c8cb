pub mod plans;
pub mod pricing;
pub mod property;
pub mod repository;

pub use pricing::{QuoteConfig, QuoteEngine};
pub use property::{NewProperty, Property, PropertyImage, PropertyStatus};
pub use repository::PropertyRepository;
