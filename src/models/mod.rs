use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::PackageDefaults;

/// A single cart line. The unit price is resolved upstream (variant price
/// if present, else the product base price) before the snapshot is taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Read-only snapshot of the cart taken when a checkout attempt starts.
/// The live cart is only cleared after settlement; the snapshot itself is
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    /// Already-applied coupon amount, passed through to the quote.
    #[serde(default)]
    pub discount: Decimal,
}

impl CartSnapshot {
    pub fn new(lines: Vec<CartLine>, discount: Decimal) -> Self {
        Self { lines, discount }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}

/// Customer address as referenced by a checkout selection. Owned by the
/// customer account; the order backend records it immutably once an order
/// is placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Input for inline address creation during the shipping step.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewAddress {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 6))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country: String,
}

/// Shipping methods. Only `Standard` is eligible for the free-shipping
/// threshold override.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
    SameDay,
}

/// Payment methods supported at checkout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    /// Online payment captured by the external gateway widget
    Gateway,
    /// Cash on delivery; settled at order acceptance
    Cod,
}

/// The wizard's mutable selections. Billing defaults to the shipping
/// address unless overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSelection {
    pub shipping_address: Option<Address>,
    pub billing_address_id: Option<Uuid>,
    pub shipping_method: ShippingMethod,
    pub payment_method: Option<PaymentMethod>,
}

impl CheckoutSelection {
    pub fn billing_address_id(&self) -> Option<Uuid> {
        self.billing_address_id
            .or_else(|| self.shipping_address.as_ref().map(|a| a.id))
    }
}

/// Derived pricing breakdown. Never persisted; recomputed whenever the
/// cart, shipping method, or configuration changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingQuote {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Order identifiers returned by the order backend. The backend owns the
/// order status; the client never mutates it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub total: Decimal,
}

/// Ephemeral gateway-side order, 1:1 with a storefront order attempt.
/// Discarded after reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub gateway_key: String,
    /// Amount in minor currency units; must equal the order total.
    pub amount_minor: i64,
    pub currency: String,
    pub gateway_order_ref: String,
}

/// Prefill data seeded into the capture widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturePrefill {
    pub name: String,
    pub phone: String,
}

/// Everything the opaque capture widget needs to be instantiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub gateway_key: String,
    pub amount_minor: i64,
    pub currency: String,
    pub gateway_order_ref: String,
    pub prefill: CapturePrefill,
}

/// Stable reasons reported to the order backend's fail endpoint. The
/// backend treats these as significant enum values; renaming them is a
/// contract change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    CancelledByUser,
    PaymentFailed,
    /// Capture reported success but backend verification failed; money may
    /// have moved, so the backend routes this to refund investigation.
    VerificationFailed,
}

/// Terminal record handed to the confirmation presenter. A single literal
/// record, not a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    pub success: bool,
    pub order_id: Option<Uuid>,
    pub order_number: Option<String>,
    pub total: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Package dimensions forwarded to the shipment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDimensions {
    pub length_cm: Decimal,
    pub width_cm: Decimal,
    pub height_cm: Decimal,
    pub weight_kg: Decimal,
}

impl From<&PackageDefaults> for PackageDimensions {
    fn from(defaults: &PackageDefaults) -> Self {
        Self {
            length_cm: defaults.length_cm,
            width_cm: defaults.width_cm,
            height_cm: defaults.height_cm,
            weight_kg: defaults.weight_kg,
        }
    }
}

/// Converts a major-unit amount to minor currency units (paise, cents).
/// Fails on amounts that overflow i64.
pub fn minor_units(amount: Decimal) -> Option<i64> {
    (amount * dec!(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
