use async_trait::async_trait;
use aws_sdk_sfn as sfn;
use sfn::error::DisplayErrorContext;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("could not start execution of `{state_machine_arn}`: {reason}")]
    Start { state_machine_arn: String, reason: String },
}

#[async_trait]
pub trait WorkflowStarter: Send + Sync {
    /// Starts one execution with `input` (JSON text) and returns its ARN.
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        input: &str,
    ) -> Result<String, WorkflowError>;
}

#[derive(Clone, Debug)]
pub struct StepFunctionsStarter {
    inner: sfn::Client,
}

impl StepFunctionsStarter {
    pub fn new(inner: sfn::Client) -> Self {
        Self { inner }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(sfn::Client::new(config))
    }
}

#[async_trait]
impl WorkflowStarter for StepFunctionsStarter {
    #[instrument(skip(self, input))]
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        input: &str,
    ) -> Result<String, WorkflowError> {
        let output = self
            .inner
            .start_execution()
            .state_machine_arn(state_machine_arn)
            .input(input)
            .send()
            .await
            .map_err(|error| WorkflowError::Start {
                state_machine_arn: state_machine_arn.to_owned(),
                reason: DisplayErrorContext(&error).to_string(),
            })?;

        Ok(output.execution_arn().to_owned())
    }
}
