mod bootstrap;
mod handler;
mod response;

use std::sync::Arc;

use anyhow::Result;
use intake_core::config::LoadOptions;
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use uuid::Uuid;

use crate::response::IngestResponse;

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let handler = Arc::new(bootstrap::bootstrap(LoadOptions::default()).await?);
    tracing::info!(
        event_name = "system.lambda.started",
        correlation_id = "bootstrap",
        state_machine_arn = %handler.settings().state_machine_arn,
        "ingestion handler ready"
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move { invoke(&handler, event).await }
    }))
    .await
    .map_err(|error| anyhow::anyhow!("lambda runtime stopped: {error}"))?;

    Ok(())
}

async fn invoke(
    handler: &bootstrap::LambdaHandler,
    event: LambdaEvent<Value>,
) -> Result<IngestResponse, lambda_runtime::Error> {
    let (payload, context) = event.into_parts();
    let correlation_id = if context.request_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        context.request_id
    };

    handler.handle(payload, &correlation_id).await.map_err(lambda_runtime::Error::from)
}
