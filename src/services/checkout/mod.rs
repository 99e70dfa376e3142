pub mod address;
pub mod pricing;
pub mod session;
pub mod shipping;
pub mod store;

pub use address::AddressValidator;
pub use pricing::PricingEngine;
pub use session::{
    CheckoutSessionService, ConfirmPaymentResult, CreateCheckoutSessionRequest,
    UpdateCheckoutSessionRequest,
};
pub use shipping::ShippingCalculator;
pub use store::{InMemorySessionStore, SeaOrmSessionStore, SessionStore};
