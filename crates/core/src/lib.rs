pub mod config;
pub mod domain;
pub mod errors;
pub mod ingest;

pub use domain::customer::{CustomerId, CustomerProfile, CustomerRecord};
pub use domain::trigger::ObjectLocation;
pub use errors::{ApplicationError, DomainError, HandlerFailure};
pub use ingest::{content_preview, decode_content, parse_customers, ParsedCustomers};
