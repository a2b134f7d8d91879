use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::object_store::{ObjectStore, StorageError};
use crate::workflow::{WorkflowError, WorkflowStarter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageCall {
    Fetch { bucket: String, key: String },
    Copy { bucket: String, source_key: String, destination_key: String },
    Delete { bucket: String, key: String },
}

#[derive(Default)]
struct ObjectStoreState {
    objects: HashMap<(String, String), Vec<u8>>,
    calls: Vec<StorageCall>,
    failing: Option<&'static str>,
}

/// Bucket contents held in memory, with a log of every call made.
///
/// `failing_on("copy")` (or `"fetch"`, `"delete"`) makes that operation
/// return a request error after it has been logged.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<ObjectStoreState>>,
}

impl InMemoryObjectStore {
    pub fn with_object(self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.lock().objects.insert((bucket.to_owned(), key.to_owned()), body.into());
        self
    }

    pub fn failing_on(self, operation: &'static str) -> Self {
        self.lock().failing = Some(operation);
        self
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.lock().objects.contains_key(&(bucket.to_owned(), key.to_owned()))
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(&(bucket.to_owned(), key.to_owned())).cloned()
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ObjectStoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn injected(operation: &'static str, bucket: &str, key: &str) -> StorageError {
    StorageError::Request {
        operation,
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        reason: "injected failure".to_owned(),
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut state = self.lock();
        state.calls.push(StorageCall::Fetch { bucket: bucket.to_owned(), key: key.to_owned() });
        if state.failing == Some("fetch") {
            return Err(injected("fetch", bucket, key));
        }

        state
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound { bucket: bucket.to_owned(), key: key.to_owned() })
    }

    async fn copy(
        &self,
        bucket: &str,
        source_key: &str,
        destination_key: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.calls.push(StorageCall::Copy {
            bucket: bucket.to_owned(),
            source_key: source_key.to_owned(),
            destination_key: destination_key.to_owned(),
        });
        if state.failing == Some("copy") {
            return Err(injected("copy", bucket, source_key));
        }

        let body = state
            .objects
            .get(&(bucket.to_owned(), source_key.to_owned()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_owned(),
                key: source_key.to_owned(),
            })?;
        state.objects.insert((bucket.to_owned(), destination_key.to_owned()), body);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        let mut state = self.lock();
        state.calls.push(StorageCall::Delete { bucket: bucket.to_owned(), key: key.to_owned() });
        if state.failing == Some("delete") {
            return Err(injected("delete", bucket, key));
        }

        state.objects.remove(&(bucket.to_owned(), key.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
struct WorkflowState {
    executions: Vec<(String, String)>,
    failure: Option<String>,
}

/// Records every execution request and answers with a synthetic ARN.
#[derive(Clone, Default)]
pub struct RecordingWorkflowStarter {
    state: Arc<Mutex<WorkflowState>>,
}

impl RecordingWorkflowStarter {
    pub fn failing(reason: impl Into<String>) -> Self {
        let starter = Self::default();
        starter.lock().failure = Some(reason.into());
        starter
    }

    /// `(state_machine_arn, input)` pairs in call order.
    pub fn executions(&self) -> Vec<(String, String)> {
        self.lock().executions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl WorkflowStarter for RecordingWorkflowStarter {
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        input: &str,
    ) -> Result<String, WorkflowError> {
        let mut state = self.lock();
        state.executions.push((state_machine_arn.to_owned(), input.to_owned()));
        if let Some(reason) = &state.failure {
            return Err(WorkflowError::Start {
                state_machine_arn: state_machine_arn.to_owned(),
                reason: reason.clone(),
            });
        }

        let execution_name = format!("execution-{}", state.executions.len());
        Ok(format!(
            "{}:{execution_name}",
            state_machine_arn.replacen(":stateMachine:", ":execution:", 1)
        ))
    }
}
