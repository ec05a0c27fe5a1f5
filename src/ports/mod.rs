//! Ports: the traits the services depend on. Adapters live in `crate::adapters`
//! and `crate::xendit`.

mod gateway;
mod mailer;
mod repository;

pub use gateway::{
    GatewayError, InvoiceCustomer, InvoiceFee, InvoiceItem, InvoiceRequest, PaymentGateway,
};
pub use mailer::{MailMessage, Mailer};
pub use repository::{
    OtpRepository, ProductRepository, Repositories, RepositoryError, RepositoryResult,
    TransactionRepository, UserRepository,
};
