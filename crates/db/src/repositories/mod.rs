use async_trait::async_trait;
use thiserror::Error;

use intake_core::domain::customer::{CustomerId, CustomerRecord};

pub mod customer;
pub mod memory;

pub use customer::{SqlCustomerRepository, SqliteStoreOpener};
pub use memory::{InMemoryCustomerRepository, InMemoryStoreOpener};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Inserts the record, or overwrites every non-identifier column of the
    /// row that already has its identifier.
    async fn upsert(&self, record: &CustomerRecord) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<CustomerRecord>, RepositoryError>;
    async fn count(&self) -> Result<i64, RepositoryError>;
}

/// A repository holding an open connection that must be released.
#[async_trait]
pub trait CustomerStore: CustomerRepository {
    async fn close(&self);
}

/// Opens a ready-to-write store: connected, with the schema in place.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    type Store: CustomerStore;

    async fn open(&self) -> Result<Self::Store, RepositoryError>;
}
