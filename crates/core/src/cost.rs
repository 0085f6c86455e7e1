//! Cost attribution for finished generations.
//!
//! Pricing is pluggable: a [`CostModel`] receives the route's
//! [`PricingHint`] and the provider-reported metrics and may decline to
//! price a job by returning `None`. No provider prices are built in.

use crate::report::GenerationMetrics;

/// Pricing configuration attached to a model route.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PricingHint {
    /// Price in cents per second of provider compute time.
    pub price_per_second_cents: Option<f64>,
}

/// Computes the cost of one finished generation, in cents.
pub trait CostModel: Send + Sync {
    fn cost_cents(&self, pricing: &PricingHint, metrics: &GenerationMetrics) -> Option<i64>;
}

/// Never prices anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPricing;

impl CostModel for NoPricing {
    fn cost_cents(&self, _pricing: &PricingHint, _metrics: &GenerationMetrics) -> Option<i64> {
        None
    }
}

/// `predict_time_secs * price_per_second_cents`, rounded up to a whole cent.
///
/// Returns `None` when either the price or the reported time is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerSecondPricing;

impl CostModel for PerSecondPricing {
    fn cost_cents(&self, pricing: &PricingHint, metrics: &GenerationMetrics) -> Option<i64> {
        let price = pricing.price_per_second_cents?;
        let seconds = metrics.predict_time_secs?;
        if !price.is_finite() || !seconds.is_finite() || price < 0.0 || seconds < 0.0 {
            return None;
        }
        Some((price * seconds).ceil() as i64)
    }
}
