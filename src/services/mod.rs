pub mod checkout;
pub mod pricing;
pub mod reconciliation;
pub mod shipments;

pub use checkout::{CheckoutAttempt, CheckoutService, CheckoutState, Placement};
pub use pricing::PricingService;
pub use reconciliation::PaymentReconciliationService;
pub use shipments::ShipmentService;
