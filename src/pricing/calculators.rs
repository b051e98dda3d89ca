//! Core pricing calculation functions.
//!
//! Pure functions for pricing math - no store or clock access. Callers pass
//! the rules, coupon or policy they loaded and the current time.
//!
//! All money is `i64` minor units (pence). Percentages are `Decimal` and
//! every percentage result is rounded half-up to a whole minor unit.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::error::PricingError;
use super::models::{
    AppliesTo, Coupon, Deduction, DiscountCartItem, DiscountRule, DiscountRuleType, RefundPolicy,
    RefundRule,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Round to a whole minor unit, halves away from zero.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use coaching_pricing::pricing::round_money;
///
/// assert_eq!(round_money(dec!(2.5)), dec!(3));
/// assert_eq!(round_money(dec!(2.49)), dec!(2));
/// ```
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// `percentage`% of `amount`, rounded half-up to a whole minor unit.
pub fn percent_of(amount: i64, percentage: Decimal) -> i64 {
    let raw = Decimal::from(amount) * percentage / Decimal::ONE_HUNDRED;
    round_money(raw).to_i64().unwrap_or_default()
}

impl Deduction {
    /// Amount to take off `amount`, never more than `amount` itself.
    pub fn against(self, amount: i64) -> i64 {
        let cut = match self {
            Deduction::Percent(pct) => percent_of(amount, pct),
            Deduction::Flat(value) => value,
        };
        cut.clamp(0, amount.max(0))
    }
}

/// Whole days from `from` until `to`, rounded down.
///
/// Negative once `to` has passed.
pub fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Trim and uppercase a coupon code the way codes are stored.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Format minor units as a bare decimal amount, e.g. `1250` -> `12.50`.
pub fn format_amount(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency.to_ascii_uppercase().as_str() {
        "GBP" => Some("£"),
        "EUR" => Some("€"),
        "USD" | "AUD" | "CAD" | "NZD" => Some("$"),
        _ => None,
    }
}

/// Format minor units for display in `currency`, e.g. `1250`, `GBP` -> `£12.50`.
///
/// Codes without a known symbol are suffixed instead: `12.50 CHF`.
pub fn format_money(amount: i64, currency: &str) -> String {
    match currency_symbol(currency) {
        Some(symbol) => {
            let sign = if amount < 0 { "-" } else { "" };
            format!("{}{}{}", sign, symbol, format_amount(amount.saturating_abs()))
        }
        None => format!("{} {}", format_amount(amount), currency.to_ascii_uppercase()),
    }
}

// ==================== Discounts ====================

/// One rule that matched the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDiscount {
    pub rule: DiscountRule,
    pub savings: i64,
    pub items_affected: usize,
}

/// Per-line breakdown after every rule has been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinePrice {
    pub session_id: Uuid,
    pub child_name: String,
    pub original_price: i64,
    pub final_price: i64,
}

/// Result of automatic discount calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountResult {
    pub original_total: i64,
    pub discount_amount: i64,
    pub final_total: i64,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub lines: Vec<LinePrice>,
}

/// Calculate automatic discounts for a cart.
///
/// Active rules run in `priority` order (highest first, ties by `id`
/// ascending). Each rule deducts from the running line prices left by the
/// rules before it, so stacked rules compound rather than all applying to
/// the original prices. Eligibility depends only on the cart's shape.
///
/// Every rule and item is validated before anything is applied.
pub fn calculate_discounts(
    rules: &[DiscountRule],
    items: &[DiscountCartItem],
    now: DateTime<Utc>,
) -> Result<DiscountResult, PricingError> {
    if let Some(item) = items.iter().find(|item| item.price < 0) {
        return Err(PricingError::validation(format!(
            "price for session {} must not be negative",
            item.session_id
        )));
    }

    let mut ordered = rules
        .iter()
        .filter(|rule| rule.is_active)
        .map(|rule| rule.deduction().map(|deduction| (rule, deduction)))
        .collect::<Result<Vec<_>, _>>()?;
    ordered.sort_by(|(a, _), (b, _)| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    let original_total = items
        .iter()
        .try_fold(0i64, |total, item| total.checked_add(item.price))
        .ok_or_else(|| PricingError::validation("cart total is too large"))?;
    let mut running: Vec<i64> = items.iter().map(|item| item.price).collect();
    let mut applied_discounts = Vec::new();

    for (rule, deduction) in ordered {
        let targets = select_targets(rule, items, &running, now);
        if targets.is_empty() {
            continue;
        }

        let mut savings = 0;
        for &idx in &targets {
            let cut = deduction.against(running[idx]);
            running[idx] -= cut;
            savings += cut;
        }

        tracing::debug!(
            rule_id = %rule.id,
            rule_type = rule.rule_type.as_str(),
            savings,
            items = targets.len(),
            "Discount rule applied"
        );

        applied_discounts.push(AppliedDiscount {
            rule: rule.clone(),
            savings,
            items_affected: targets.len(),
        });
    }

    let discount_amount: i64 = applied_discounts.iter().map(|a| a.savings).sum();
    let final_total = (original_total - discount_amount).max(0);

    let lines = items
        .iter()
        .zip(&running)
        .map(|(item, &final_price)| LinePrice {
            session_id: item.session_id,
            child_name: item.child_name.clone(),
            original_price: item.price,
            final_price,
        })
        .collect();

    Ok(DiscountResult {
        original_total,
        discount_amount,
        final_total,
        applied_discounts,
        lines,
    })
}

/// Indices (ascending) of the lines a rule discounts; empty if it does not match.
fn select_targets(
    rule: &DiscountRule,
    items: &[DiscountCartItem],
    running: &[i64],
    now: DateTime<Utc>,
) -> Vec<usize> {
    let every_line: Vec<usize> = (0..items.len()).collect();

    match rule.rule_type {
        DiscountRuleType::Sibling => {
            let children = distinct_children(items);
            if children < rule.min_children() as usize {
                return Vec::new();
            }
            match rule.discount.applies_to {
                AppliesTo::All => every_line,
                AppliesTo::Additional => {
                    cheapest(&every_line, running, children.saturating_sub(1))
                }
            }
        }
        DiscountRuleType::Bulk => {
            if items.is_empty() || items.len() < rule.min_quantity() as usize {
                return Vec::new();
            }
            match rule.discount.applies_to {
                AppliesTo::All => every_line,
                AppliesTo::Additional => {
                    cheapest(&every_line, running, items.len().saturating_sub(1))
                }
            }
        }
        DiscountRuleType::EarlyBird => {
            let qualifying: Vec<usize> = every_line
                .into_iter()
                .filter(|&idx| books_early(&items[idx], rule.days_before_session(), now))
                .collect();
            match rule.discount.applies_to {
                AppliesTo::All => qualifying,
                AppliesTo::Additional => {
                    cheapest(&qualifying, running, qualifying.len().saturating_sub(1))
                }
            }
        }
    }
}

/// Children are counted case-insensitively, ignoring surrounding whitespace.
fn distinct_children(items: &[DiscountCartItem]) -> usize {
    items
        .iter()
        .map(|item| item.child_name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

fn books_early(item: &DiscountCartItem, days_before_session: i64, now: DateTime<Utc>) -> bool {
    let (Some(start), Some(lead)) = (item.session_start_date, TimeDelta::try_days(days_before_session))
    else {
        return false;
    };
    start - now >= lead
}

/// The `count` cheapest candidates by running price. Equal prices go to the
/// later cart line first, so the earliest line keeps full price.
fn cheapest(candidates: &[usize], running: &[i64], count: usize) -> Vec<usize> {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|&a, &b| running[a].cmp(&running[b]).then_with(|| b.cmp(&a)));
    ranked.truncate(count);
    ranked.sort_unstable();
    ranked
}

// ==================== Coupons ====================

/// Why a coupon cannot be used. The message is shown to the customer as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponRejection {
    /// Unknown, blank or deactivated code.
    #[error("Invalid coupon code")]
    InvalidCode,
    #[error("This coupon is not yet valid")]
    NotYetValid,
    #[error("This coupon has expired")]
    Expired,
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("A minimum spend of {} is required for this coupon", format_amount(*.minimum))]
    MinimumNotMet { minimum: i64 },
    #[error("This coupon is not valid for the selected sessions")]
    NotApplicable,
}

impl CouponRejection {
    /// Short tag for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            CouponRejection::InvalidCode => "invalid_code",
            CouponRejection::NotYetValid => "not_yet_valid",
            CouponRejection::Expired => "expired",
            CouponRejection::UsageLimitReached => "usage_limit_reached",
            CouponRejection::MinimumNotMet { .. } => "minimum_not_met",
            CouponRejection::NotApplicable => "not_applicable",
        }
    }

    /// Customer-facing message with amounts shown in `currency`.
    pub fn message(&self, currency: &str) -> String {
        match self {
            CouponRejection::MinimumNotMet { minimum } => format!(
                "A minimum spend of {} is required for this coupon",
                format_money(*minimum, currency)
            ),
            other => other.to_string(),
        }
    }
}

/// Outcome of coupon validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponOutcome {
    Accepted { coupon: Coupon, discount: i64 },
    Rejected(CouponRejection),
}

impl CouponOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, CouponOutcome::Accepted { .. })
    }

    /// Discount granted, zero when rejected.
    pub fn discount(&self) -> i64 {
        match self {
            CouponOutcome::Accepted { discount, .. } => *discount,
            CouponOutcome::Rejected(_) => 0,
        }
    }
}

/// Validate a looked-up coupon against a cart.
///
/// Checks run in order and stop at the first failure: validity window,
/// usage cap, minimum purchase, session scope. A coupon restricted to some
/// sessions is accepted when any cart session is on its list.
///
/// Never touches `used_count`; redemption happens after payment.
pub fn validate_coupon(
    coupon: Option<&Coupon>,
    cart_total: i64,
    session_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<CouponOutcome, PricingError> {
    if cart_total < 0 {
        return Err(PricingError::validation("cart total must not be negative"));
    }

    let coupon = match coupon {
        Some(coupon) if coupon.is_active => coupon,
        _ => return Ok(CouponOutcome::Rejected(CouponRejection::InvalidCode)),
    };
    let deduction = coupon.deduction()?;

    if coupon.valid_from.is_some_and(|from| now < from) {
        return Ok(CouponOutcome::Rejected(CouponRejection::NotYetValid));
    }
    if coupon.valid_until.is_some_and(|until| now > until) {
        return Ok(CouponOutcome::Rejected(CouponRejection::Expired));
    }
    if !coupon.has_uses_left() {
        return Ok(CouponOutcome::Rejected(CouponRejection::UsageLimitReached));
    }
    if let Some(minimum) = coupon.min_purchase {
        if cart_total < minimum {
            return Ok(CouponOutcome::Rejected(CouponRejection::MinimumNotMet { minimum }));
        }
    }
    if !coupon.applicable_sessions.is_empty()
        && !session_ids
            .iter()
            .any(|id| coupon.applicable_sessions.contains(id))
    {
        return Ok(CouponOutcome::Rejected(CouponRejection::NotApplicable));
    }

    Ok(CouponOutcome::Accepted {
        coupon: coupon.clone(),
        discount: deduction.against(cart_total),
    })
}

// ==================== Refunds ====================

/// Result of refund calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundCalculationResult {
    pub policy_id: Uuid,
    pub days_until_session: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub refund_percentage: Decimal,
    pub refund_amount: i64,
    pub original_amount: i64,
    pub matched_rule: Option<RefundRule>,
}

/// Calculate the refund for a cancellation.
///
/// Lead time is floored to whole days, so cancelling 6 days 23 hours ahead
/// counts as 6. The first rule, longest lead time first, whose
/// `days_before_session` the lead time reaches sets the percentage; no match
/// refunds nothing.
pub fn calculate_refund(
    policy: &RefundPolicy,
    session_start: DateTime<Utc>,
    cancelled_at: DateTime<Utc>,
    original_amount: i64,
) -> Result<RefundCalculationResult, PricingError> {
    if original_amount < 0 {
        return Err(PricingError::validation("original amount must not be negative"));
    }
    if let Some(rule) = policy
        .rules
        .iter()
        .find(|r| r.refund_percentage < Decimal::ZERO || r.refund_percentage > Decimal::ONE_HUNDRED)
    {
        return Err(PricingError::validation(format!(
            "refund policy {} has percentage {} outside 0-100",
            policy.id, rule.refund_percentage
        )));
    }

    let days_until_session = whole_days_between(cancelled_at, session_start);

    let mut rules: Vec<&RefundRule> = policy.rules.iter().collect();
    rules.sort_by(|a, b| b.days_before_session.cmp(&a.days_before_session));
    let matched_rule = rules
        .into_iter()
        .find(|rule| days_until_session >= rule.days_before_session)
        .cloned();

    let refund_percentage = matched_rule
        .as_ref()
        .map(|rule| rule.refund_percentage)
        .unwrap_or(Decimal::ZERO);

    Ok(RefundCalculationResult {
        policy_id: policy.id,
        days_until_session,
        refund_percentage,
        refund_amount: percent_of(original_amount, refund_percentage),
        original_amount,
        matched_rule,
    })
}
