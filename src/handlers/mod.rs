pub mod checkout;
pub mod health;
pub mod orders;
pub mod payments;

pub use checkout::checkout_routes;
pub use health::health_routes;
pub use orders::order_routes;
pub use payments::payment_routes;
