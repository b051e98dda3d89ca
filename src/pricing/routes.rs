//! Pricing API route handlers
//!
//! JSON endpoints called by the checkout and cancellation handlers:
//! - `POST /discounts/calculate`: automatic discounts for a cart
//! - `POST /coupons/validate`: check a coupon code
//! - `POST /coupons/redeem`: consume one coupon use after payment
//! - `POST /checkout/quote`: discounts plus coupon, payable total
//! - `POST /refunds/calculate`: refund owed for a cancellation
//! - `POST /cache/invalidate`: drop cached rules and policies after an edit

use axum::{extract::State, routing::post, Json, Router};

use crate::cache::CacheStats;
use crate::error::{AppError, Result};
use crate::AppState;

use super::requests::{
    into_cart, CalculateDiscountsRequest, CalculateRefundRequest, CheckoutQuoteRequest,
    RedeemCouponRequest, ValidateCouponRequest,
};
use super::responses::{
    CheckoutQuoteResponse, CouponValidationResponse, DiscountResultResponse,
    RedeemCouponResponse, RefundResponse,
};
use super::services;

/// Build the pricing router; mounted under `/api/pricing`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/discounts/calculate", post(calculate_discounts))
        .route("/coupons/validate", post(validate_coupon))
        .route("/coupons/redeem", post(redeem_coupon))
        .route("/checkout/quote", post(quote_checkout))
        .route("/refunds/calculate", post(calculate_refund))
        .route("/cache/invalidate", post(invalidate_cache))
}

async fn calculate_discounts(
    State(state): State<AppState>,
    Json(request): Json<CalculateDiscountsRequest>,
) -> Result<Json<DiscountResultResponse>> {
    let items = into_cart(request.items);
    let result = services::calculate_cart_discounts(
        state.store.as_ref(),
        &state.cache,
        &items,
        state.clock.now(),
    )
    .await?;

    Ok(Json(DiscountResultResponse::new(&result, &state.currency)))
}

async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<CouponValidationResponse>> {
    let outcome = services::check_coupon(
        state.store.as_ref(),
        &request.code,
        request.cart_total,
        &request.session_ids,
        state.clock.now(),
    )
    .await?;

    Ok(Json(CouponValidationResponse::new(&outcome, &state.currency)))
}

async fn redeem_coupon(
    State(state): State<AppState>,
    Json(request): Json<RedeemCouponRequest>,
) -> Result<Json<RedeemCouponResponse>> {
    let redeemed = services::redeem_coupon(state.store.as_ref(), request.coupon_id).await?;
    if !redeemed {
        return Err(AppError::Conflict(format!(
            "coupon {} cannot be redeemed",
            request.coupon_id
        )));
    }

    Ok(Json(RedeemCouponResponse {
        coupon_id: request.coupon_id,
        redeemed,
    }))
}

async fn quote_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutQuoteRequest>,
) -> Result<Json<CheckoutQuoteResponse>> {
    let items = into_cart(request.items);
    let quote = services::quote_checkout(
        state.store.as_ref(),
        &state.cache,
        &items,
        request.coupon_code.as_deref(),
        state.clock.now(),
    )
    .await?;

    Ok(Json(CheckoutQuoteResponse::new(&quote, &state.currency)))
}

async fn calculate_refund(
    State(state): State<AppState>,
    Json(request): Json<CalculateRefundRequest>,
) -> Result<Json<RefundResponse>> {
    let cancelled_at = request.cancelled_at.unwrap_or_else(|| state.clock.now());
    let result = services::calculate_cancellation_refund(
        state.store.as_ref(),
        &state.cache,
        request.policy_id,
        request.session_start_date,
        cancelled_at,
        request.original_amount,
    )
    .await?;

    Ok(Json(RefundResponse::new(&result, &state.currency)))
}

async fn invalidate_cache(State(state): State<AppState>) -> Json<CacheStats> {
    state.cache.invalidate_all();
    Json(state.cache.stats())
}
