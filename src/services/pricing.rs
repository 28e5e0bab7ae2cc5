use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    config::PricingConfig,
    models::{CartSnapshot, PricingQuote, ShippingMethod},
};

/// Pricing calculator. Pure and deterministic; quotes are recomputed on
/// every call and never cached across cart mutations.
#[derive(Debug, Clone, Default)]
pub struct PricingService;

impl PricingService {
    pub fn new() -> Self {
        Self
    }

    /// Produces the pricing breakdown for a cart and shipping method.
    ///
    /// Tax applies to `(subtotal - discount + shipping_cost)` and is
    /// rounded half-up to whole currency units. Only standard shipping is
    /// eligible for the free-shipping threshold.
    pub fn quote(
        &self,
        cart: &CartSnapshot,
        method: ShippingMethod,
        config: &PricingConfig,
    ) -> PricingQuote {
        let subtotal = cart.subtotal();
        let discount = cart.discount.min(subtotal).max(Decimal::ZERO);
        let shipping_cost = self.shipping_cost(subtotal, method, config);

        let taxable = subtotal - discount + shipping_cost;
        let tax = (taxable * config.tax_rate)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        PricingQuote {
            subtotal,
            discount,
            shipping_cost,
            tax,
            total: subtotal - discount + shipping_cost + tax,
        }
    }

    fn shipping_cost(
        &self,
        subtotal: Decimal,
        method: ShippingMethod,
        config: &PricingConfig,
    ) -> Decimal {
        match method {
            ShippingMethod::Standard if subtotal >= config.free_shipping_threshold => Decimal::ZERO,
            ShippingMethod::Standard => config.standard_shipping_fee,
            ShippingMethod::Express => config.express_shipping_fee,
            ShippingMethod::SameDay => config.same_day_shipping_fee,
        }
    }
}
