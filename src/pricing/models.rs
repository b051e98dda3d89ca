//! Pricing models: discount rules, coupons, refund policies and cart items.
//!
//! The `*Row` structs use sqlx's FromRow derive for direct database
//! deserialization and are converted into the domain types with `TryFrom`,
//! which rejects unknown enum tags and out-of-range values.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::error::PricingError;

/// Sibling rules need at least this many distinct children when unset.
pub const DEFAULT_MIN_CHILDREN: u32 = 2;
/// Bulk rules need at least this many cart lines when unset.
pub const DEFAULT_MIN_QUANTITY: u32 = 2;
/// Early-bird lead time when unset: any session that has not started.
pub const DEFAULT_DAYS_BEFORE_SESSION: i64 = 0;

/// Upper bound on lead-time conditions, about ten years.
const MAX_DAYS_BEFORE_SESSION: i64 = 3650;

/// Kind of automatic discount rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountRuleType {
    Sibling,
    Bulk,
    EarlyBird,
}

impl DiscountRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountRuleType::Sibling => "sibling",
            DiscountRuleType::Bulk => "bulk",
            DiscountRuleType::EarlyBird => "early_bird",
        }
    }
}

impl FromStr for DiscountRuleType {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sibling" => Ok(DiscountRuleType::Sibling),
            "bulk" => Ok(DiscountRuleType::Bulk),
            "early_bird" => Ok(DiscountRuleType::EarlyBird),
            other => Err(PricingError::validation(format!(
                "unknown discount rule type '{}'",
                other
            ))),
        }
    }
}

/// Percentage off, or a flat amount in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountValueType {
    Percentage,
    Fixed,
}

impl DiscountValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountValueType::Percentage => "percentage",
            DiscountValueType::Fixed => "fixed",
        }
    }
}

impl FromStr for DiscountValueType {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(DiscountValueType::Percentage),
            "fixed" => Ok(DiscountValueType::Fixed),
            other => Err(PricingError::validation(format!(
                "unknown discount type '{}'",
                other
            ))),
        }
    }
}

/// Which lines of an eligible cart a rule discounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    /// Every eligible line.
    All,
    /// Every eligible line except the one that pays full price.
    Additional,
}

impl FromStr for AppliesTo {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(AppliesTo::All),
            "additional" => Ok(AppliesTo::Additional),
            other => Err(PricingError::validation(format!(
                "unknown applies_to '{}'",
                other
            ))),
        }
    }
}

/// A validated deduction, ready to be taken off a line or cart total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deduction {
    /// Percentage in [0, 100].
    Percent(Decimal),
    /// Flat amount in minor units.
    Flat(i64),
}

impl Deduction {
    /// Validate a stored (type, value) pair.
    pub fn from_value(value_type: DiscountValueType, value: Decimal) -> Result<Self, PricingError> {
        match value_type {
            DiscountValueType::Percentage => {
                if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                    return Err(PricingError::validation(format!(
                        "percentage discount {} is outside 0-100",
                        value
                    )));
                }
                Ok(Deduction::Percent(value))
            }
            DiscountValueType::Fixed => {
                if value < Decimal::ZERO || !value.fract().is_zero() {
                    return Err(PricingError::validation(format!(
                        "fixed discount {} must be a non-negative whole number of minor units",
                        value
                    )));
                }
                value.to_i64().map(Deduction::Flat).ok_or_else(|| {
                    PricingError::validation(format!("fixed discount {} is too large", value))
                })
            }
        }
    }
}

/// Eligibility thresholds; only the field matching the rule type is read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default)]
    pub min_children: Option<u32>,
    #[serde(default)]
    pub min_quantity: Option<u32>,
    #[serde(default)]
    pub days_before_session: Option<i64>,
}

/// What an eligible rule takes off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDiscount {
    #[serde(rename = "type")]
    pub value_type: DiscountValueType,
    pub value: Decimal,
    pub applies_to: AppliesTo,
}

/// Automatic discount rule, maintained by administrators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub id: Uuid,
    pub name: String,
    pub rule_type: DiscountRuleType,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub discount: RuleDiscount,
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
}

impl DiscountRule {
    /// Check the rule's invariants and return its deduction.
    pub fn deduction(&self) -> Result<Deduction, PricingError> {
        if let Some(days) = self.conditions.days_before_session {
            if !(0..=MAX_DAYS_BEFORE_SESSION).contains(&days) {
                return Err(PricingError::validation(format!(
                    "rule {} has days_before_session {} outside 0-{}",
                    self.id, days, MAX_DAYS_BEFORE_SESSION
                )));
            }
        }
        Deduction::from_value(self.discount.value_type, self.discount.value)
            .map_err(|e| PricingError::validation(format!("rule {}: {}", self.id, e)))
    }

    pub fn min_children(&self) -> u32 {
        self.conditions.min_children.unwrap_or(DEFAULT_MIN_CHILDREN)
    }

    pub fn min_quantity(&self) -> u32 {
        self.conditions.min_quantity.unwrap_or(DEFAULT_MIN_QUANTITY)
    }

    pub fn days_before_session(&self) -> i64 {
        self.conditions
            .days_before_session
            .unwrap_or(DEFAULT_DAYS_BEFORE_SESSION)
    }
}

/// One session booking for one child, as submitted at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCartItem {
    pub session_id: Uuid,
    pub child_name: String,
    /// Price in minor units (pence).
    pub price: i64,
    #[serde(default)]
    pub session_start_date: Option<DateTime<Utc>>,
}

/// Admin-issued coupon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    /// Stored uppercase.
    pub code: String,
    pub discount_type: DiscountValueType,
    pub discount_value: Decimal,
    pub min_purchase: Option<i64>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Empty means every session.
    #[serde(default)]
    pub applicable_sessions: Vec<Uuid>,
    pub is_active: bool,
}

impl Coupon {
    pub fn deduction(&self) -> Result<Deduction, PricingError> {
        Deduction::from_value(self.discount_type, self.discount_value)
            .map_err(|e| PricingError::validation(format!("coupon {}: {}", self.code, e)))
    }

    pub fn has_uses_left(&self) -> bool {
        match self.max_uses {
            Some(max) => self.used_count < max,
            None => true,
        }
    }
}

/// One row of a refund policy's lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRule {
    pub days_before_session: i64,
    pub refund_percentage: Decimal,
}

/// Cancellation refund policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    pub id: Uuid,
    pub name: String,
    pub rules: Vec<RefundRule>,
    pub is_default: bool,
}

/// Discount rule from pricing_discount_rules
#[derive(Debug, Clone, FromRow)]
pub struct DiscountRuleRow {
    pub id: Uuid,
    pub name: String,
    pub rule_type: String,
    pub min_children: Option<i32>,
    pub min_quantity: Option<i32>,
    pub days_before_session: Option<i32>,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub applies_to: String,
    pub is_active: bool,
    pub priority: i32,
}

fn non_negative(field: &str, value: Option<i32>) -> Result<Option<u32>, PricingError> {
    value
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| PricingError::validation(format!("{} must not be negative", field)))
        })
        .transpose()
}

impl TryFrom<DiscountRuleRow> for DiscountRule {
    type Error = PricingError;

    fn try_from(row: DiscountRuleRow) -> Result<Self, Self::Error> {
        Ok(DiscountRule {
            id: row.id,
            name: row.name,
            rule_type: row.rule_type.parse()?,
            conditions: RuleConditions {
                min_children: non_negative("min_children", row.min_children)?,
                min_quantity: non_negative("min_quantity", row.min_quantity)?,
                days_before_session: row.days_before_session.map(i64::from),
            },
            discount: RuleDiscount {
                value_type: row.discount_type.parse()?,
                value: row.discount_value,
                applies_to: row.applies_to.parse()?,
            },
            is_active: row.is_active,
            priority: row.priority,
        })
    }
}

/// Coupon from pricing_coupons
#[derive(Debug, Clone, FromRow)]
pub struct CouponRow {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub min_purchase: Option<i64>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub applicable_sessions: Vec<Uuid>,
    pub is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = PricingError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: row.id,
            code: row.code,
            discount_type: row.discount_type.parse()?,
            discount_value: row.discount_value,
            min_purchase: row.min_purchase,
            max_uses: row.max_uses,
            used_count: row.used_count,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            applicable_sessions: row.applicable_sessions,
            is_active: row.is_active,
        })
    }
}

/// Refund policy from pricing_refund_policies (rules kept as jsonb)
#[derive(Debug, Clone, FromRow)]
pub struct RefundPolicyRow {
    pub id: Uuid,
    pub name: String,
    pub rules: Json<Vec<RefundRule>>,
    pub is_default: bool,
}

impl From<RefundPolicyRow> for RefundPolicy {
    fn from(row: RefundPolicyRow) -> Self {
        RefundPolicy {
            id: row.id,
            name: row.name,
            rules: row.rules.0,
            is_default: row.is_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rule_row() -> DiscountRuleRow {
        DiscountRuleRow {
            id: Uuid::nil(),
            name: "Sibling 10%".to_string(),
            rule_type: "sibling".to_string(),
            min_children: Some(2),
            min_quantity: None,
            days_before_session: None,
            discount_type: "percentage".to_string(),
            discount_value: dec!(10),
            applies_to: "additional".to_string(),
            is_active: true,
            priority: 10,
        }
    }

    #[test]
    fn test_rule_row_conversion() {
        let rule = DiscountRule::try_from(rule_row()).unwrap();
        assert_eq!(rule.rule_type, DiscountRuleType::Sibling);
        assert_eq!(rule.discount.value_type, DiscountValueType::Percentage);
        assert_eq!(rule.discount.applies_to, AppliesTo::Additional);
        assert_eq!(rule.min_children(), 2);
    }

    #[test]
    fn test_rule_row_unknown_type_rejected() {
        let mut row = rule_row();
        row.rule_type = "loyalty".to_string();
        let err = DiscountRule::try_from(row).unwrap_err();
        assert!(matches!(err, PricingError::Validation(_)));
    }

    #[test]
    fn test_rule_row_negative_threshold_rejected() {
        let mut row = rule_row();
        row.min_children = Some(-1);
        assert!(DiscountRule::try_from(row).is_err());
    }

    #[test]
    fn test_condition_defaults() {
        let mut rule = DiscountRule::try_from(rule_row()).unwrap();
        rule.conditions = RuleConditions::default();
        assert_eq!(rule.min_children(), DEFAULT_MIN_CHILDREN);
        assert_eq!(rule.min_quantity(), DEFAULT_MIN_QUANTITY);
        assert_eq!(rule.days_before_session(), DEFAULT_DAYS_BEFORE_SESSION);
    }

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(
            Deduction::from_value(DiscountValueType::Percentage, dec!(100)).unwrap(),
            Deduction::Percent(dec!(100))
        );
        assert_eq!(
            Deduction::from_value(DiscountValueType::Percentage, dec!(0)).unwrap(),
            Deduction::Percent(dec!(0))
        );
        assert!(Deduction::from_value(DiscountValueType::Percentage, dec!(100.01)).is_err());
        assert!(Deduction::from_value(DiscountValueType::Percentage, dec!(-1)).is_err());
    }

    #[test]
    fn test_fixed_must_be_whole_minor_units() {
        assert_eq!(
            Deduction::from_value(DiscountValueType::Fixed, dec!(500)).unwrap(),
            Deduction::Flat(500)
        );
        assert!(Deduction::from_value(DiscountValueType::Fixed, dec!(5.50)).is_err());
        assert!(Deduction::from_value(DiscountValueType::Fixed, dec!(-500)).is_err());
    }

    #[test]
    fn test_rule_lead_time_bounds() {
        let mut rule = DiscountRule::try_from(rule_row()).unwrap();
        rule.conditions.days_before_session = Some(-3);
        assert!(rule.deduction().is_err());
        rule.conditions.days_before_session = Some(30);
        assert!(rule.deduction().is_ok());
    }

    #[test]
    fn test_coupon_uses_left() {
        let mut coupon = Coupon {
            id: Uuid::nil(),
            code: "SPRING".to_string(),
            discount_type: DiscountValueType::Fixed,
            discount_value: dec!(500),
            min_purchase: None,
            max_uses: None,
            used_count: 42,
            valid_from: None,
            valid_until: None,
            applicable_sessions: vec![],
            is_active: true,
        };
        assert!(coupon.has_uses_left());

        coupon.max_uses = Some(43);
        assert!(coupon.has_uses_left());

        coupon.max_uses = Some(42);
        assert!(!coupon.has_uses_left());
    }

    #[test]
    fn test_rule_json_shape() {
        let json = serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "name": "Early bird",
            "rule_type": "early_bird",
            "conditions": { "days_before_session": 7 },
            "discount": { "type": "percentage", "value": "15", "applies_to": "all" },
            "is_active": true,
            "priority": 5
        });
        let rule: DiscountRule = serde_json::from_value(json).unwrap();
        assert_eq!(rule.rule_type, DiscountRuleType::EarlyBird);
        assert_eq!(rule.days_before_session(), 7);
        assert_eq!(rule.discount.value, dec!(15));
    }
}
