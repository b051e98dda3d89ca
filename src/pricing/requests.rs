//! Request DTOs for pricing API endpoints.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::models::DiscountCartItem;

/// A cart line in the request
#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub session_id: Uuid,
    pub child_name: String,
    /// Minor units (pence)
    pub price: i64,
    #[serde(default)]
    pub session_start_date: Option<DateTime<Utc>>,
}

impl From<CartItemRequest> for DiscountCartItem {
    fn from(item: CartItemRequest) -> Self {
        DiscountCartItem {
            session_id: item.session_id,
            child_name: item.child_name,
            price: item.price,
            session_start_date: item.session_start_date,
        }
    }
}

/// Request to calculate automatic discounts
#[derive(Debug, Deserialize)]
pub struct CalculateDiscountsRequest {
    pub items: Vec<CartItemRequest>,
}

/// Request to validate a coupon code
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub cart_total: i64,
    #[serde(default)]
    pub session_ids: Vec<Uuid>,
}

/// Request to consume one use of a coupon after payment
#[derive(Debug, Deserialize)]
pub struct RedeemCouponRequest {
    pub coupon_id: Uuid,
}

/// Request for a full checkout quote
#[derive(Debug, Deserialize)]
pub struct CheckoutQuoteRequest {
    pub items: Vec<CartItemRequest>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Request to calculate a cancellation refund
#[derive(Debug, Deserialize)]
pub struct CalculateRefundRequest {
    /// Falls back to the default policy
    #[serde(default)]
    pub policy_id: Option<Uuid>,
    pub session_start_date: DateTime<Utc>,
    /// Falls back to now
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub original_amount: i64,
}

/// Convert request lines into engine cart items
pub fn into_cart(items: Vec<CartItemRequest>) -> Vec<DiscountCartItem> {
    items.into_iter().map(DiscountCartItem::from).collect()
}
