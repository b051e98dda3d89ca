//! In-memory caching using moka
//!
//! Discount rules and refund policies change only when an administrator
//! edits them, so they are cached with a short TTL. Coupons are never cached:
//! their usage counts move with every redemption.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pricing::models::{DiscountRule, RefundPolicy};
use crate::pricing::store::PricingStore;

const ACTIVE_RULES_KEY: &str = "rules:active";
const DEFAULT_POLICY_KEY: &str = "policy:default";

/// Application cache for pricing configuration
#[derive(Clone)]
pub struct AppCache {
    /// Active discount rules (single entry)
    pub discount_rules: Cache<String, Arc<Vec<DiscountRule>>>,
    /// Refund policies (id -> policy)
    pub refund_policies: Cache<Uuid, Arc<RefundPolicy>>,
    /// Default refund policy (single entry)
    pub default_policy: Cache<String, Arc<RefundPolicy>>,
}

impl AppCache {
    /// Create a new cache instance; `ttl` bounds how long an admin edit
    /// can go unnoticed.
    pub fn new(ttl: Duration) -> Self {
        Self {
            discount_rules: Cache::builder().max_capacity(1).time_to_live(ttl).build(),

            // Refund policies: a handful per business
            refund_policies: Cache::builder()
                .max_capacity(100)
                .time_to_live(ttl)
                .build(),

            default_policy: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub async fn active_rules(&self) -> Option<Arc<Vec<DiscountRule>>> {
        self.discount_rules.get(ACTIVE_RULES_KEY).await
    }

    pub async fn store_active_rules(&self, rules: Arc<Vec<DiscountRule>>) {
        self.discount_rules
            .insert(ACTIVE_RULES_KEY.to_string(), rules)
            .await;
    }

    pub async fn default_refund_policy(&self) -> Option<Arc<RefundPolicy>> {
        self.default_policy.get(DEFAULT_POLICY_KEY).await
    }

    /// Cache the default policy under both its id and the default key.
    pub async fn store_default_refund_policy(&self, policy: Arc<RefundPolicy>) {
        self.refund_policies
            .insert(policy.id, Arc::clone(&policy))
            .await;
        self.default_policy
            .insert(DEFAULT_POLICY_KEY.to_string(), policy)
            .await;
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            rules_cached: self.discount_rules.entry_count() > 0,
            refund_policies_size: self.refund_policies.entry_count(),
            default_policy_cached: self.default_policy.entry_count() > 0,
        }
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.discount_rules.invalidate_all();
        self.refund_policies.invalidate_all();
        self.default_policy.invalidate_all();
        info!("All pricing caches invalidated");
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub rules_cached: bool,
    pub refund_policies_size: u64,
    pub default_policy_cached: bool,
}

/// Start background cache warmer
///
/// Warms the cache on startup and refreshes it every `every`.
pub async fn start_cache_warmer(cache: AppCache, store: Arc<dyn PricingStore>, every: Duration) {
    let mut interval = interval(every);
    loop {
        // First tick completes immediately
        interval.tick().await;
        warm_cache(&cache, store.as_ref()).await;
    }
}

/// Warm the cache with the rules and default policy every checkout needs
pub async fn warm_cache(cache: &AppCache, store: &dyn PricingStore) {
    info!("Starting pricing cache warm-up...");

    match store.list_active_discount_rules().await {
        Ok(rules) => cache.store_active_rules(Arc::new(rules)).await,
        Err(e) => warn!("Failed to warm discount rules cache: {}", e),
    }

    match store.get_default_refund_policy().await {
        Ok(Some(policy)) => cache.store_default_refund_policy(Arc::new(policy)).await,
        Ok(None) => warn!("No default refund policy configured"),
        Err(e) => warn!("Failed to warm refund policy cache: {}", e),
    }

    cache.discount_rules.run_pending_tasks().await;
    cache.default_policy.run_pending_tasks().await;
    cache.refund_policies.run_pending_tasks().await;
    info!("Pricing cache warm-up complete. Stats: {:?}", cache.stats());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::models::RefundRule;
    use crate::pricing::store::InMemoryPricingStore;
    use rust_decimal_macros::dec;

    fn default_policy() -> RefundPolicy {
        RefundPolicy {
            id: Uuid::from_u128(3),
            name: "Standard".to_string(),
            rules: vec![RefundRule {
                days_before_session: 7,
                refund_percentage: dec!(100),
            }],
            is_default: true,
        }
    }

    #[tokio::test]
    async fn test_warm_and_invalidate() {
        let store = InMemoryPricingStore::new();
        store.add_policy(default_policy()).await;
        let cache = AppCache::new(Duration::from_secs(60));

        warm_cache(&cache, &store).await;

        assert!(cache.active_rules().await.is_some());
        assert_eq!(
            cache.default_refund_policy().await.map(|p| p.id),
            Some(Uuid::from_u128(3))
        );
        assert!(cache.refund_policies.get(&Uuid::from_u128(3)).await.is_some());

        cache.invalidate_all();
        assert!(cache.active_rules().await.is_none());
        assert!(cache.default_refund_policy().await.is_none());
    }

    #[tokio::test]
    async fn test_warm_survives_store_failure() {
        let store = InMemoryPricingStore::new();
        store.set_fail_reads(true).await;
        let cache = AppCache::new(Duration::from_secs(60));

        warm_cache(&cache, &store).await;

        assert!(cache.active_rules().await.is_none());
        assert!(!cache.stats().rules_cached);
    }
}
