pub mod checkout_session;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
