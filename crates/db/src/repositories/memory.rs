use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use intake_core::domain::customer::{CustomerId, CustomerRecord};

use super::{CustomerRepository, CustomerStore, RepositoryError, StoreOpener};

#[derive(Clone, Default)]
pub struct InMemoryCustomerRepository {
    customers: Arc<RwLock<BTreeMap<CustomerId, CustomerRecord>>>,
}

impl InMemoryCustomerRepository {
    pub async fn snapshot(&self) -> Vec<CustomerRecord> {
        self.customers.read().await.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn upsert(&self, record: &CustomerRecord) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<CustomerRecord>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id).cloned())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(i64::try_from(customers.len()).unwrap_or(i64::MAX))
    }
}

/// Hands out stores over one shared in-memory table and counts how often
/// stores are opened and closed.
#[derive(Clone, Default)]
pub struct InMemoryStoreOpener {
    repository: InMemoryCustomerRepository,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    open_failure: Option<String>,
    failing_upsert: Option<CustomerId>,
}

impl InMemoryStoreOpener {
    pub fn failing_open(reason: impl Into<String>) -> Self {
        Self { open_failure: Some(reason.into()), ..Self::default() }
    }

    pub fn failing_upsert(id: CustomerId) -> Self {
        Self { failing_upsert: Some(id), ..Self::default() }
    }

    pub fn repository(&self) -> &InMemoryCustomerRepository {
        &self.repository
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StoreOpener for InMemoryStoreOpener {
    type Store = InMemoryStore;

    async fn open(&self) -> Result<Self::Store, RepositoryError> {
        if let Some(reason) = &self.open_failure {
            return Err(RepositoryError::Unavailable(reason.clone()));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryStore {
            repository: self.repository.clone(),
            closes: Arc::clone(&self.closes),
            closed: AtomicBool::new(false),
            failing_upsert: self.failing_upsert,
        })
    }
}

pub struct InMemoryStore {
    repository: InMemoryCustomerRepository,
    closes: Arc<AtomicUsize>,
    closed: AtomicBool,
    failing_upsert: Option<CustomerId>,
}

impl InMemoryStore {
    fn ensure_open(&self) -> Result<(), RepositoryError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("store is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryStore {
    async fn upsert(&self, record: &CustomerRecord) -> Result<(), RepositoryError> {
        self.ensure_open()?;
        if self.failing_upsert == Some(record.id) {
            return Err(RepositoryError::Unavailable(format!(
                "write rejected for customer {}",
                record.id
            )));
        }
        self.repository.upsert(record).await
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<CustomerRecord>, RepositoryError> {
        self.ensure_open()?;
        self.repository.find_by_id(id).await
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        self.ensure_open()?;
        self.repository.count().await
    }
}

#[async_trait::async_trait]
impl CustomerStore for InMemoryStore {
    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
