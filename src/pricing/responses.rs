//! Response DTOs for pricing API endpoints.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::calculators::{
    format_money, AppliedDiscount, CouponOutcome, DiscountResult, LinePrice,
    RefundCalculationResult,
};
use super::models::{Coupon, DiscountValueType, RefundRule};
use super::services::CheckoutQuote;

/// Money value for JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct MoneyResponse {
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub display: String,
}

impl MoneyResponse {
    pub fn new(amount: i64, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
            display: format_money(amount, currency),
        }
    }
}

/// One matched rule
#[derive(Debug, Serialize)]
pub struct AppliedDiscountResponse {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub rule_type: &'static str,
    pub savings: MoneyResponse,
    pub items_affected: usize,
}

impl AppliedDiscountResponse {
    fn new(applied: &AppliedDiscount, currency: &str) -> Self {
        Self {
            rule_id: applied.rule.id,
            rule_name: applied.rule.name.clone(),
            rule_type: applied.rule.rule_type.as_str(),
            savings: MoneyResponse::new(applied.savings, currency),
            items_affected: applied.items_affected,
        }
    }
}

/// One cart line after discounts
#[derive(Debug, Serialize)]
pub struct LinePriceResponse {
    pub session_id: Uuid,
    pub child_name: String,
    pub original_price: MoneyResponse,
    pub final_price: MoneyResponse,
}

impl LinePriceResponse {
    fn new(line: &LinePrice, currency: &str) -> Self {
        Self {
            session_id: line.session_id,
            child_name: line.child_name.clone(),
            original_price: MoneyResponse::new(line.original_price, currency),
            final_price: MoneyResponse::new(line.final_price, currency),
        }
    }
}

/// Response for discount calculation
#[derive(Debug, Serialize)]
pub struct DiscountResultResponse {
    pub original_total: MoneyResponse,
    pub discount_amount: MoneyResponse,
    pub final_total: MoneyResponse,
    pub applied_discounts: Vec<AppliedDiscountResponse>,
    pub lines: Vec<LinePriceResponse>,
}

impl DiscountResultResponse {
    pub fn new(result: &DiscountResult, currency: &str) -> Self {
        Self {
            original_total: MoneyResponse::new(result.original_total, currency),
            discount_amount: MoneyResponse::new(result.discount_amount, currency),
            final_total: MoneyResponse::new(result.final_total, currency),
            applied_discounts: result
                .applied_discounts
                .iter()
                .map(|a| AppliedDiscountResponse::new(a, currency))
                .collect(),
            lines: result
                .lines
                .iter()
                .map(|l| LinePriceResponse::new(l, currency))
                .collect(),
        }
    }
}

/// Public view of a coupon; usage counts are not exposed
#[derive(Debug, Serialize)]
pub struct CouponSummary {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountValueType,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount_value: Decimal,
}

impl From<&Coupon> for CouponSummary {
    fn from(coupon: &Coupon) -> Self {
        Self {
            id: coupon.id,
            code: coupon.code.clone(),
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
        }
    }
}

/// Response for coupon validation: `{valid, discount?, coupon?, error?}`
#[derive(Debug, Serialize)]
pub struct CouponValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<MoneyResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CouponValidationResponse {
    pub fn new(outcome: &CouponOutcome, currency: &str) -> Self {
        match outcome {
            CouponOutcome::Accepted { coupon, discount } => Self {
                valid: true,
                discount: Some(MoneyResponse::new(*discount, currency)),
                coupon: Some(CouponSummary::from(coupon)),
                error: None,
            },
            CouponOutcome::Rejected(reason) => Self {
                valid: false,
                discount: None,
                coupon: None,
                error: Some(reason.message(currency)),
            },
        }
    }
}

/// Response for coupon redemption
#[derive(Debug, Serialize)]
pub struct RedeemCouponResponse {
    pub coupon_id: Uuid,
    pub redeemed: bool,
}

/// Response for a checkout quote
#[derive(Debug, Serialize)]
pub struct CheckoutQuoteResponse {
    pub discounts: DiscountResultResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<CouponValidationResponse>,
    pub coupon_discount: MoneyResponse,
    pub payable_total: MoneyResponse,
}

impl CheckoutQuoteResponse {
    pub fn new(quote: &CheckoutQuote, currency: &str) -> Self {
        Self {
            discounts: DiscountResultResponse::new(&quote.discounts, currency),
            coupon: quote
                .coupon
                .as_ref()
                .map(|outcome| CouponValidationResponse::new(outcome, currency)),
            coupon_discount: MoneyResponse::new(quote.coupon_discount, currency),
            payable_total: MoneyResponse::new(quote.payable_total, currency),
        }
    }
}

/// Response for refund calculation
#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub policy_id: Uuid,
    pub days_until_session: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub refund_percentage: Decimal,
    pub refund_amount: MoneyResponse,
    pub original_amount: MoneyResponse,
    pub matched_rule: Option<RefundRule>,
}

impl RefundResponse {
    pub fn new(result: &RefundCalculationResult, currency: &str) -> Self {
        Self {
            policy_id: result.policy_id,
            days_until_session: result.days_until_session,
            refund_percentage: result.refund_percentage,
            refund_amount: MoneyResponse::new(result.refund_amount, currency),
            original_amount: MoneyResponse::new(result.original_amount, currency),
            matched_rule: result.matched_rule.clone(),
        }
    }
}

/// Generic pricing error response
#[derive(Debug, Serialize)]
pub struct PricingErrorResponse {
    pub error_type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::calculators::CouponRejection;

    #[test]
    fn test_money_display() {
        let money = MoneyResponse::new(8400, "GBP");
        assert_eq!(money.display, "£84.00");
        assert_eq!(money.currency, "GBP");

        let money = MoneyResponse::new(1250, "EUR");
        assert_eq!(money.display, "€12.50");
        assert_eq!(money.currency, "EUR");
    }

    #[test]
    fn test_minimum_spend_message_uses_currency() {
        let outcome = CouponOutcome::Rejected(CouponRejection::MinimumNotMet { minimum: 5000 });
        let json = serde_json::to_value(CouponValidationResponse::new(&outcome, "EUR")).unwrap();
        assert_eq!(
            json["error"],
            "A minimum spend of €50.00 is required for this coupon"
        );
    }

    #[test]
    fn test_rejected_coupon_shape() {
        let outcome = CouponOutcome::Rejected(CouponRejection::Expired);
        let json = serde_json::to_value(CouponValidationResponse::new(&outcome, "GBP")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "valid": false, "error": "This coupon has expired" })
        );
    }
}
