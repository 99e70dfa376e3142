pub mod encryption;
pub mod kakaopay;
pub mod orchestrator;
pub mod provider;
pub mod store;

pub use encryption::{AesGcmFieldCipher, EncryptionService};
pub use kakaopay::KakaoPayProvider;
pub use orchestrator::PaymentService;
pub use provider::{PspPaymentStatus, PspProvider};
pub use store::{InMemoryPaymentStore, PaymentStore, SeaOrmPaymentStore};
