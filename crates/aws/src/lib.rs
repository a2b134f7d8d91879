//! AWS integration for intake.
//!
//! - **Object store** (`object_store`) - fetch, copy and delete CSV drops in S3
//! - **Workflow** (`workflow`) - start the downstream Step Functions execution
//! - **Fakes** (`memory`) - in-memory implementations for handler tests
//!
//! Clients are built once per process with [`load_sdk_config`] and handed to
//! the handler explicitly; nothing here is a global.

pub mod memory;
pub mod object_store;
pub mod workflow;

pub use memory::{InMemoryObjectStore, RecordingWorkflowStarter, StorageCall};
pub use object_store::{ObjectStore, S3ObjectStore, StorageError};
pub use workflow::{StepFunctionsStarter, WorkflowError, WorkflowStarter};

pub async fn load_sdk_config(region: Option<&str>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_owned()));
    }
    loader.load().await
}
