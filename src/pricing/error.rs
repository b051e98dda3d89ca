//! Error type shared by the pricing engine, its services and stores.

/// Pricing failure.
///
/// Business outcomes such as a rejected coupon are not errors; they are
/// reported through [`super::calculators::CouponOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// Malformed input or a malformed stored rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A referenced record (e.g. a refund policy) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl PricingError {
    pub fn validation(message: impl Into<String>) -> Self {
        PricingError::Validation(message.into())
    }

    /// Machine-readable tag used in JSON error bodies.
    pub fn error_type(&self) -> &'static str {
        match self {
            PricingError::Validation(_) => "validation_error",
            PricingError::NotFound(_) => "not_found",
            PricingError::Store(_) => "store_error",
        }
    }
}
