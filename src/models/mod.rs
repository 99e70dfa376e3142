pub mod checkout;
pub mod order;
pub mod payment;

pub use checkout::{
    Address, Buyer, CheckoutItem, CheckoutSession, CheckoutStatus, FulfillmentOption, Totals,
};
pub use order::{Order, OrderLineItem, OrderStatus};
pub use payment::{
    PaymentApproveRequest, PaymentApproveResponse, PaymentCancelRequest, PaymentCancelResponse,
    PaymentItem, PaymentPrepareRequest, PaymentPrepareResponse, PaymentRecord, PaymentStatus,
    PaymentType,
};
