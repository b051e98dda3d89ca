//! PricingStore trait and implementations.
//!
//! The engine reads rules, coupons and policies through this seam. The
//! PostgreSQL store backs production; the in-memory store backs tests and
//! local runs without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::calculators::normalize_code;
use super::error::PricingError;
use super::models::{Coupon, DiscountRule, RefundPolicy};
use super::queries;

/// Source of pricing configuration.
#[async_trait]
pub trait PricingStore: Send + Sync {
    /// Active rules, in any order; the engine orders them.
    async fn list_active_discount_rules(&self) -> Result<Vec<DiscountRule>, PricingError>;

    /// Look up a coupon by its normalized code.
    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, PricingError>;

    async fn get_refund_policy(&self, policy_id: Uuid)
        -> Result<Option<RefundPolicy>, PricingError>;

    async fn get_default_refund_policy(&self) -> Result<Option<RefundPolicy>, PricingError>;

    /// Atomically consume one use of a coupon if it is under its cap.
    async fn redeem_coupon(&self, coupon_id: Uuid) -> Result<bool, PricingError>;
}

fn store_error(err: crate::error::AppError) -> PricingError {
    match err {
        crate::error::AppError::Pricing(inner) => inner,
        other => PricingError::Store(other.to_string()),
    }
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgPricingStore {
    pool: PgPool,
}

impl PgPricingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PricingStore for PgPricingStore {
    async fn list_active_discount_rules(&self) -> Result<Vec<DiscountRule>, PricingError> {
        queries::list_active_discount_rules(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, PricingError> {
        queries::find_coupon_by_code(&self.pool, code)
            .await
            .map_err(store_error)
    }

    async fn get_refund_policy(
        &self,
        policy_id: Uuid,
    ) -> Result<Option<RefundPolicy>, PricingError> {
        queries::get_refund_policy(&self.pool, policy_id)
            .await
            .map_err(store_error)
    }

    async fn get_default_refund_policy(&self) -> Result<Option<RefundPolicy>, PricingError> {
        queries::get_default_refund_policy(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn redeem_coupon(&self, coupon_id: Uuid) -> Result<bool, PricingError> {
        queries::redeem_coupon(&self.pool, coupon_id)
            .await
            .map_err(store_error)
    }
}

/// In-memory store
#[derive(Default)]
pub struct InMemoryPricingStore {
    rules: RwLock<Vec<DiscountRule>>,
    coupons: RwLock<HashMap<String, Coupon>>,
    policies: RwLock<Vec<RefundPolicy>>,
    fail_reads: RwLock<bool>,
}

impl InMemoryPricingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_rule(&self, rule: DiscountRule) {
        self.rules.write().await.push(rule);
    }

    /// Codes are stored normalized, as the admin tool does.
    pub async fn add_coupon(&self, mut coupon: Coupon) {
        coupon.code = normalize_code(&coupon.code);
        self.coupons.write().await.insert(coupon.code.clone(), coupon);
    }

    pub async fn add_policy(&self, policy: RefundPolicy) {
        self.policies.write().await.push(policy);
    }

    pub async fn coupon(&self, code: &str) -> Option<Coupon> {
        self.coupons.read().await.get(&normalize_code(code)).cloned()
    }

    /// Make every read fail, to exercise store-failure paths.
    pub async fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.write().await = fail;
    }

    async fn check_reads(&self) -> Result<(), PricingError> {
        if *self.fail_reads.read().await {
            return Err(PricingError::Store("in-memory store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PricingStore for InMemoryPricingStore {
    async fn list_active_discount_rules(&self) -> Result<Vec<DiscountRule>, PricingError> {
        self.check_reads().await?;
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect())
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, PricingError> {
        self.check_reads().await?;
        Ok(self.coupons.read().await.get(code).cloned())
    }

    async fn get_refund_policy(
        &self,
        policy_id: Uuid,
    ) -> Result<Option<RefundPolicy>, PricingError> {
        self.check_reads().await?;
        Ok(self
            .policies
            .read()
            .await
            .iter()
            .find(|policy| policy.id == policy_id)
            .cloned())
    }

    async fn get_default_refund_policy(&self) -> Result<Option<RefundPolicy>, PricingError> {
        self.check_reads().await?;
        Ok(self
            .policies
            .read()
            .await
            .iter()
            .find(|policy| policy.is_default)
            .cloned())
    }

    async fn redeem_coupon(&self, coupon_id: Uuid) -> Result<bool, PricingError> {
        // The write lock makes the check and the increment one step.
        let mut coupons = self.coupons.write().await;
        let Some(coupon) = coupons.values_mut().find(|c| c.id == coupon_id) else {
            return Ok(false);
        };
        if !coupon.is_active || !coupon.has_uses_left() {
            return Ok(false);
        }
        coupon.used_count += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::models::DiscountValueType;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn coupon(max_uses: Option<i32>) -> Coupon {
        Coupon {
            id: Uuid::from_u128(1),
            code: " summer5 ".to_string(),
            discount_type: DiscountValueType::Fixed,
            discount_value: dec!(500),
            min_purchase: None,
            max_uses,
            used_count: 0,
            valid_from: None,
            valid_until: None,
            applicable_sessions: vec![],
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_coupon_codes_stored_normalized() {
        let store = InMemoryPricingStore::new();
        store.add_coupon(coupon(None)).await;

        let found = store.find_coupon_by_code("SUMMER5").await.unwrap();
        assert_eq!(found.map(|c| c.code), Some("SUMMER5".to_string()));
        assert!(store.find_coupon_by_code("summer5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redeem_stops_at_cap() {
        let store = InMemoryPricingStore::new();
        store.add_coupon(coupon(Some(2))).await;
        let id = Uuid::from_u128(1);

        assert!(store.redeem_coupon(id).await.unwrap());
        assert!(store.redeem_coupon(id).await.unwrap());
        assert!(!store.redeem_coupon(id).await.unwrap());
        assert_eq!(store.coupon("SUMMER5").await.unwrap().used_count, 2);
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_respect_cap() {
        let store = Arc::new(InMemoryPricingStore::new());
        store.add_coupon(coupon(Some(3))).await;
        let id = Uuid::from_u128(1);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.redeem_coupon(id).await.unwrap() })
            })
            .collect();

        let mut redeemed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                redeemed += 1;
            }
        }

        assert_eq!(redeemed, 3);
        assert_eq!(store.coupon("SUMMER5").await.unwrap().used_count, 3);
    }

    #[tokio::test]
    async fn test_redeem_unknown_or_inactive() {
        let store = InMemoryPricingStore::new();
        assert!(!store.redeem_coupon(Uuid::from_u128(1)).await.unwrap());

        let mut inactive = coupon(None);
        inactive.is_active = false;
        store.add_coupon(inactive).await;
        assert!(!store.redeem_coupon(Uuid::from_u128(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_failing_reads() {
        let store = InMemoryPricingStore::new();
        store.set_fail_reads(true).await;
        let err = store.list_active_discount_rules().await.unwrap_err();
        assert!(matches!(err, PricingError::Store(_)));
    }
}
