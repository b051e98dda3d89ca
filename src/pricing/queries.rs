//! Database queries for the pricing engine.
//!
//! Rows are fetched with sqlx and converted into domain types; a row that
//! fails conversion is reported as a validation error rather than skipped.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

use super::models::{
    Coupon, CouponRow, DiscountRule, DiscountRuleRow, RefundPolicy, RefundPolicyRow,
};

/// List active discount rules, highest priority first
pub async fn list_active_discount_rules(pool: &PgPool) -> Result<Vec<DiscountRule>, AppError> {
    let rows = sqlx::query_as::<_, DiscountRuleRow>(
        r#"
        SELECT
            id, name, rule_type,
            min_children, min_quantity, days_before_session,
            discount_type, discount_value, applies_to,
            is_active, priority
        FROM pricing_discount_rules
        WHERE is_active = true
        ORDER BY priority DESC, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let rules = rows
        .into_iter()
        .map(DiscountRule::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rules)
}

/// Find a coupon by its normalized (uppercase) code
pub async fn find_coupon_by_code(pool: &PgPool, code: &str) -> Result<Option<Coupon>, AppError> {
    let row = sqlx::query_as::<_, CouponRow>(
        r#"
        SELECT
            id, code, discount_type, discount_value,
            min_purchase, max_uses, used_count,
            valid_from, valid_until,
            applicable_sessions, is_active
        FROM pricing_coupons
        WHERE code = $1
        "#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Coupon::try_from).transpose()?)
}

/// Get a refund policy by id
pub async fn get_refund_policy(
    pool: &PgPool,
    policy_id: Uuid,
) -> Result<Option<RefundPolicy>, AppError> {
    let row = sqlx::query_as::<_, RefundPolicyRow>(
        r#"
        SELECT id, name, rules, is_default
        FROM pricing_refund_policies
        WHERE id = $1
        "#,
    )
    .bind(policy_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(RefundPolicy::from))
}

/// Get the policy flagged as default
pub async fn get_default_refund_policy(pool: &PgPool) -> Result<Option<RefundPolicy>, AppError> {
    let row = sqlx::query_as::<_, RefundPolicyRow>(
        r#"
        SELECT id, name, rules, is_default
        FROM pricing_refund_policies
        WHERE is_default = true
        ORDER BY id
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(RefundPolicy::from))
}

/// Consume one use of a coupon.
///
/// The cap check and the increment are one statement, so concurrent
/// redemptions cannot push `used_count` past `max_uses`. Returns `false`
/// when the coupon is inactive, unknown or already at its cap.
pub async fn redeem_coupon(pool: &PgPool, coupon_id: Uuid) -> Result<bool, AppError> {
    let redeemed: Option<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE pricing_coupons
        SET used_count = used_count + 1
        WHERE id = $1
          AND is_active = true
          AND (max_uses IS NULL OR used_count < max_uses)
        RETURNING id
        "#,
    )
    .bind(coupon_id)
    .fetch_optional(pool)
    .await?;

    Ok(redeemed.is_some())
}
