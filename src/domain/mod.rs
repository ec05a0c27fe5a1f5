//! Domain entities, free of storage and HTTP concerns.

pub mod otp;
pub mod product;
pub mod transaction;
pub mod user;

pub use otp::{Otp, OtpScope, OtpStatus};
pub use product::{Product, ProductDraft};
pub use transaction::{
    EnrichedTransaction, ExternalInvoice, HistoryPage, IncomeRow, PaymentInfo, PurchaseQuote,
    Transaction,
};
pub use user::{Role, User, UserStatus};
