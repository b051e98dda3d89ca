//! Pricing service functions with store access.
//!
//! These functions load rules, coupons and policies (through the cache where
//! one exists), then hand them to the pure calculators. Each fetch happens
//! once at entry and is never retried.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::AppCache;

use super::calculators::{
    self, normalize_code, CouponOutcome, CouponRejection, DiscountResult, RefundCalculationResult,
};
use super::error::PricingError;
use super::models::{DiscountCartItem, DiscountRule, RefundPolicy};
use super::store::PricingStore;

/// Result of a checkout quote: automatic discounts, then the coupon
#[derive(Debug, Clone)]
pub struct CheckoutQuote {
    pub discounts: DiscountResult,
    /// `None` when no coupon code was entered.
    pub coupon: Option<CouponOutcome>,
    pub coupon_discount: i64,
    pub payable_total: i64,
}

/// Load active discount rules, from cache when possible.
pub async fn load_active_rules(
    store: &dyn PricingStore,
    cache: &AppCache,
) -> Result<Arc<Vec<DiscountRule>>, PricingError> {
    if let Some(cached) = cache.active_rules().await {
        tracing::debug!("Cache HIT for active discount rules");
        return Ok(cached);
    }

    tracing::debug!("Cache MISS for active discount rules");
    let rules = Arc::new(store.list_active_discount_rules().await?);
    cache.store_active_rules(Arc::clone(&rules)).await;
    Ok(rules)
}

/// Calculate automatic discounts for a checkout cart.
pub async fn calculate_cart_discounts(
    store: &dyn PricingStore,
    cache: &AppCache,
    items: &[DiscountCartItem],
    now: DateTime<Utc>,
) -> Result<DiscountResult, PricingError> {
    let rules = load_active_rules(store, cache).await?;
    calculators::calculate_discounts(&rules, items, now)
}

/// Validate a customer-entered coupon code against a cart total.
///
/// A blank code is rejected without a lookup.
pub async fn check_coupon(
    store: &dyn PricingStore,
    code: &str,
    cart_total: i64,
    session_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<CouponOutcome, PricingError> {
    let code = normalize_code(code);
    let coupon = if code.is_empty() {
        None
    } else {
        store.find_coupon_by_code(&code).await?
    };

    let outcome = calculators::validate_coupon(coupon.as_ref(), cart_total, session_ids, now)?;

    match &outcome {
        CouponOutcome::Accepted { discount, .. } => {
            tracing::info!(code = %code, discount, "Coupon accepted");
        }
        CouponOutcome::Rejected(reason) => {
            tracing::info!(code = %code, reason = reason.reason(), "Coupon rejected");
        }
    }

    Ok(outcome)
}

/// Quote a checkout: automatic discounts first, then the coupon against the
/// discounted total. A rejected coupon does not fail the quote.
pub async fn quote_checkout(
    store: &dyn PricingStore,
    cache: &AppCache,
    items: &[DiscountCartItem],
    coupon_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CheckoutQuote, PricingError> {
    let discounts = calculate_cart_discounts(store, cache, items, now).await?;

    let coupon = match coupon_code {
        Some(code) => {
            let mut session_ids: Vec<Uuid> = items.iter().map(|item| item.session_id).collect();
            session_ids.sort_unstable();
            session_ids.dedup();
            Some(check_coupon(store, code, discounts.final_total, &session_ids, now).await?)
        }
        None => None,
    };

    let coupon_discount = coupon.as_ref().map(CouponOutcome::discount).unwrap_or(0);
    let payable_total = (discounts.final_total - coupon_discount).max(0);

    Ok(CheckoutQuote {
        discounts,
        coupon,
        coupon_discount,
        payable_total,
    })
}

/// Record one use of a coupon after payment succeeded.
///
/// Returns `false` if the coupon was already at its cap.
pub async fn redeem_coupon(
    store: &dyn PricingStore,
    coupon_id: Uuid,
) -> Result<bool, PricingError> {
    let redeemed = store.redeem_coupon(coupon_id).await?;
    if redeemed {
        tracing::info!(%coupon_id, "Coupon redeemed");
    } else {
        tracing::warn!(
            %coupon_id,
            reason = CouponRejection::UsageLimitReached.reason(),
            "Coupon redemption refused"
        );
    }
    Ok(redeemed)
}

/// Load a refund policy by id, or the default policy when `policy_id` is
/// `None`, from cache when possible.
pub async fn load_refund_policy(
    store: &dyn PricingStore,
    cache: &AppCache,
    policy_id: Option<Uuid>,
) -> Result<Arc<RefundPolicy>, PricingError> {
    match policy_id {
        Some(id) => {
            if let Some(cached) = cache.refund_policies.get(&id).await {
                tracing::debug!(policy_id = %id, "Cache HIT for refund policy");
                return Ok(cached);
            }
            let policy = store
                .get_refund_policy(id)
                .await?
                .ok_or_else(|| PricingError::NotFound(format!("refund policy {}", id)))?;
            let policy = Arc::new(policy);
            cache.refund_policies.insert(id, Arc::clone(&policy)).await;
            Ok(policy)
        }
        None => {
            if let Some(cached) = cache.default_refund_policy().await {
                tracing::debug!("Cache HIT for default refund policy");
                return Ok(cached);
            }
            let policy = store
                .get_default_refund_policy()
                .await?
                .ok_or_else(|| PricingError::NotFound("default refund policy".to_string()))?;
            let policy = Arc::new(policy);
            cache.store_default_refund_policy(Arc::clone(&policy)).await;
            Ok(policy)
        }
    }
}

/// Calculate the refund owed for a cancelled booking.
pub async fn calculate_cancellation_refund(
    store: &dyn PricingStore,
    cache: &AppCache,
    policy_id: Option<Uuid>,
    session_start: DateTime<Utc>,
    cancelled_at: DateTime<Utc>,
    original_amount: i64,
) -> Result<RefundCalculationResult, PricingError> {
    let policy = load_refund_policy(store, cache, policy_id).await?;
    calculators::calculate_refund(&policy, session_start, cancelled_at, original_amount)
}
