//! Pricing rules engine for coaching session bookings.
//!
//! Automatic cart discounts, coupon validation and cancellation refunds.
//! The checkout and cancellation flows call this module over HTTP/JSON.

pub mod calculators;
pub mod clock;
pub mod error;
pub mod models;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;
pub mod store;

// Re-export commonly used items
pub use calculators::{calculate_discounts, calculate_refund, round_money, validate_coupon};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::PricingError;
pub use routes::router;
pub use store::{InMemoryPricingStore, PgPricingStore, PricingStore};
