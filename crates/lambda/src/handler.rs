use intake_aws::{ObjectStore, WorkflowStarter};
use intake_core::config::AppConfig;
use intake_core::domain::trigger::ObjectLocation;
use intake_core::errors::{ApplicationError, HandlerFailure};
use intake_core::ingest::{content_preview, decode_content, parse_customers, PREVIEW_CHARS};
use intake_db::{CustomerRepository, CustomerStore, RepositoryError, StoreOpener};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::response::{IngestResponse, WorkflowInput};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerSettings {
    pub processed_prefix: String,
    pub state_machine_arn: String,
}

impl HandlerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            processed_prefix: config.storage.processed_prefix.clone(),
            state_machine_arn: config.workflow.state_machine_arn.clone(),
        }
    }
}

/// Ingests one CSV drop per invocation: parse, upsert, move to the
/// processed prefix, then start the downstream workflow.
pub struct IngestionHandler<O, W, S> {
    objects: O,
    workflow: W,
    stores: S,
    settings: HandlerSettings,
}

impl<O, W, S> IngestionHandler<O, W, S>
where
    O: ObjectStore,
    W: WorkflowStarter,
    S: StoreOpener,
{
    pub fn new(objects: O, workflow: W, stores: S, settings: HandlerSettings) -> Self {
        Self { objects, workflow, stores, settings }
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    #[instrument(skip(self, payload))]
    pub async fn handle(
        &self,
        payload: Value,
        correlation_id: &str,
    ) -> Result<IngestResponse, HandlerFailure> {
        info!(event_name = "ingest.received", correlation_id, event = %payload, "received event");

        match self.process(payload, correlation_id).await {
            Ok(response) => Ok(response),
            Err(failure) => {
                error!(
                    event_name = "ingest.failed",
                    correlation_id,
                    error_class = failure.error_class(),
                    error = %failure,
                    "error processing file"
                );
                Err(failure.into_failure())
            }
        }
    }

    async fn process(
        &self,
        payload: Value,
        correlation_id: &str,
    ) -> Result<IngestResponse, ApplicationError> {
        let location = ObjectLocation::from_trigger(payload)?;
        info!(
            event_name = "ingest.location_resolved",
            correlation_id,
            bucket = %location.bucket,
            key = %location.key,
            "processing file"
        );

        if location.is_processed(&self.settings.processed_prefix) {
            info!(
                event_name = "ingest.skipped",
                correlation_id,
                key = %location.key,
                "file is already in the processed prefix; skipping"
            );
            return Ok(IngestResponse::skipped());
        }

        let mut store: Option<S::Store> = None;
        let outcome = self.ingest(&location, &mut store, correlation_id).await;
        if let Some(store) = store.take() {
            store.close().await;
            debug!(event_name = "ingest.store_closed", correlation_id, "customer store closed");
        }
        outcome
    }

    async fn ingest(
        &self,
        location: &ObjectLocation,
        store: &mut Option<S::Store>,
        correlation_id: &str,
    ) -> Result<IngestResponse, ApplicationError> {
        let bytes = self.objects.fetch(&location.bucket, &location.key).await.map_err(|error| {
            ApplicationError::Fetch {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                reason: error.to_string(),
            }
        })?;
        let content = decode_content(&bytes);
        let preview = content_preview(&content, PREVIEW_CHARS);
        info!(
            event_name = "ingest.fetched",
            correlation_id,
            bytes = bytes.len(),
            preview,
            "fetched file"
        );

        let parsed = parse_customers(&content)?;
        if parsed.header_present {
            let opened = store.insert(self.stores.open().await.map_err(persistence)?);
            for record in &parsed.records {
                if let Some(first_name) = record.profile.first_name.as_deref() {
                    debug!(customer_id = %record.id, first_name, "upserting customer");
                }
                opened.upsert(record).await.map_err(persistence)?;
            }
            info!(
                event_name = "ingest.customers_upserted",
                correlation_id,
                rows = parsed.records.len(),
                "customer data processed"
            );
        } else {
            warn!(
                event_name = "ingest.header_missing",
                correlation_id,
                key = %location.key,
                "First Name column not found in the CSV file"
            );
        }

        let processed = location.processed(&self.settings.processed_prefix);
        self.relocate(location, &processed, correlation_id).await?;

        let input = serde_json::to_string(&WorkflowInput {
            bucket_name: &processed.bucket,
            object_key: &processed.key,
            file_preview: preview,
        })
        .map_err(|error| ApplicationError::Workflow(error.to_string()))?;

        let execution_arn = self
            .workflow
            .start_execution(&self.settings.state_machine_arn, &input)
            .await
            .map_err(|error| ApplicationError::Workflow(error.to_string()))?;
        info!(
            event_name = "ingest.workflow_started",
            correlation_id,
            execution_arn = %execution_arn,
            "workflow execution started"
        );
        let rows_upserted = if parsed.header_present { parsed.records.len() } else { 0 };
        info!(
            event_name = "ingest.summary",
            correlation_id,
            key = %location.key,
            processed_key = %processed.key,
            header_present = parsed.header_present,
            rows_parsed = parsed.records.len(),
            rows_upserted,
            "ingestion complete"
        );

        Ok(IngestResponse::processed(execution_arn))
    }

    async fn relocate(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
        correlation_id: &str,
    ) -> Result<(), ApplicationError> {
        self.objects.copy(&source.bucket, &source.key, &destination.key).await.map_err(
            |error| ApplicationError::Copy {
                source_key: source.key.clone(),
                destination_key: destination.key.clone(),
                reason: error.to_string(),
            },
        )?;
        info!(event_name = "ingest.copied", correlation_id, key = %destination.key, "file copied");

        if let Err(error) = self.objects.delete(&source.bucket, &source.key).await {
            warn!(
                event_name = "ingest.delete_failed",
                correlation_id,
                source_key = %source.key,
                destination_key = %destination.key,
                "copy kept under both keys after delete failure"
            );
            return Err(ApplicationError::Delete {
                source_key: source.key.clone(),
                destination_key: destination.key.clone(),
                reason: error.to_string(),
            });
        }
        info!(event_name = "ingest.deleted", correlation_id, key = %source.key, "original file deleted");

        Ok(())
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use intake_aws::{InMemoryObjectStore, RecordingWorkflowStarter, StorageCall};
    use intake_core::config::DatabaseConfig;
    use intake_core::domain::customer::CustomerId;
    use intake_core::errors::FAILURE_MESSAGE;
    use intake_db::{
        CustomerRepository, CustomerStore, InMemoryStoreOpener, SqliteStoreOpener, StoreOpener,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::{HandlerSettings, IngestionHandler};
    use crate::response::{PROCESSED_MESSAGE, SKIPPED_MESSAGE};

    const BUCKET: &str = "customer-drop";
    const KEY: &str = "incoming/customers.csv";
    const ARN: &str = "arn:aws:states:us-east-2:000000000000:stateMachine:customer-etl";
    const CSV: &str = "First Name,Last Name\nAda,Lovelace\nAlan,Turing\n";

    struct Harness {
        objects: InMemoryObjectStore,
        workflow: RecordingWorkflowStarter,
        stores: InMemoryStoreOpener,
    }

    impl Harness {
        fn new(objects: InMemoryObjectStore) -> Self {
            Self::with(objects, RecordingWorkflowStarter::default(), InMemoryStoreOpener::default())
        }

        fn with(
            objects: InMemoryObjectStore,
            workflow: RecordingWorkflowStarter,
            stores: InMemoryStoreOpener,
        ) -> Self {
            Self { objects, workflow, stores }
        }

        fn handler(
            &self,
        ) -> IngestionHandler<InMemoryObjectStore, RecordingWorkflowStarter, InMemoryStoreOpener>
        {
            IngestionHandler::new(
                self.objects.clone(),
                self.workflow.clone(),
                self.stores.clone(),
                HandlerSettings {
                    processed_prefix: "processed/".to_string(),
                    state_machine_arn: ARN.to_string(),
                },
            )
        }
    }

    fn direct(key: &str) -> Value {
        json!({ "bucketName": BUCKET, "objectKey": key })
    }

    fn failure_json(error: &intake_core::errors::HandlerFailure) -> Value {
        serde_json::from_str(&error.to_string()).expect("failure renders as json")
    }

    #[tokio::test]
    async fn processed_keys_short_circuit_without_side_effects() {
        let harness = Harness::new(InMemoryObjectStore::default());

        let response = harness
            .handler()
            .handle(direct("processed/incoming/customers.csv"), "corr-skip")
            .await
            .expect("skip succeeds");

        assert_eq!(response.status_code, 200);
        assert_eq!(response.parsed_body().expect("body").message, SKIPPED_MESSAGE);
        assert!(harness.objects.calls().is_empty(), "no fetch, copy or delete");
        assert!(harness.workflow.executions().is_empty(), "no workflow start");
        assert_eq!(harness.stores.opens(), 0, "store is never opened");
    }

    #[tokio::test]
    async fn happy_path_upserts_relocates_and_starts_workflow() {
        let harness = Harness::new(InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV));

        let response =
            harness.handler().handle(direct(KEY), "corr-ok").await.expect("ingestion succeeds");

        let body = response.parsed_body().expect("body");
        assert_eq!(response.status_code, 200);
        assert_eq!(body.message, PROCESSED_MESSAGE);
        let execution_arn = body.execution_arn.expect("execution arn");
        assert!(execution_arn.contains(":execution:customer-etl:"));

        let repo = harness.stores.repository();
        assert_eq!(repo.count().await.expect("count"), 2);
        let first = repo.find_by_id(CustomerId(1)).await.expect("find").expect("row 1");
        let second = repo.find_by_id(CustomerId(2)).await.expect("find").expect("row 2");
        assert_eq!(first.profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(second.profile.first_name.as_deref(), Some("Alan"));

        assert!(harness.objects.contains(BUCKET, "processed/incoming/customers.csv"));
        assert!(!harness.objects.contains(BUCKET, KEY));

        assert_eq!(harness.stores.opens(), 1);
        assert_eq!(harness.stores.closes(), 1);
    }

    #[tokio::test]
    async fn workflow_input_carries_processed_key_and_preview() {
        let long_csv = format!("First Name,Last Name\n{}", "Ada,Lovelace\n".repeat(20));
        let harness =
            Harness::new(InMemoryObjectStore::default().with_object(BUCKET, KEY, long_csv.clone()));

        harness.handler().handle(direct(KEY), "corr-input").await.expect("ingestion succeeds");

        let executions = harness.workflow.executions();
        assert_eq!(executions.len(), 1);
        let (arn, input) = &executions[0];
        assert_eq!(arn, ARN);

        let input: Value = serde_json::from_str(input).expect("input json");
        assert_eq!(input["bucketName"], BUCKET);
        assert_eq!(input["objectKey"], "processed/incoming/customers.csv");
        assert_ne!(input["objectKey"], KEY);
        let preview = input["filePreview"].as_str().expect("preview");
        assert_eq!(preview.chars().count(), 100);
        assert!(long_csv.starts_with(preview));
    }

    #[tokio::test]
    async fn storage_notification_and_direct_shapes_ingest_identically() {
        let notification = json!({
            "Records": [{ "s3": { "bucket": { "name": BUCKET }, "object": { "key": KEY } } }]
        });

        for payload in [notification, direct(KEY)] {
            let harness =
                Harness::new(InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV));
            harness.handler().handle(payload, "corr-shape").await.expect("ingestion succeeds");

            assert_eq!(
                harness.objects.calls()[0],
                StorageCall::Fetch { bucket: BUCKET.to_string(), key: KEY.to_string() }
            );
        }
    }

    #[tokio::test]
    async fn missing_first_name_header_skips_store_but_still_relocates() {
        let harness = Harness::new(
            InMemoryObjectStore::default().with_object(BUCKET, KEY, "Given,Family\nAda,Lovelace\n"),
        );

        harness.handler().handle(direct(KEY), "corr-header").await.expect("ingestion succeeds");

        assert_eq!(harness.stores.opens(), 0);
        assert_eq!(harness.stores.closes(), 0);
        assert!(harness.objects.contains(BUCKET, "processed/incoming/customers.csv"));
        assert_eq!(harness.workflow.executions().len(), 1);
    }

    #[tokio::test]
    async fn reingesting_rows_overwrites_by_position() {
        let harness = Harness::new(
            InMemoryObjectStore::default()
                .with_object(BUCKET, "a.csv", CSV)
                .with_object(BUCKET, "b.csv", "First Name,Last Name\nGrace,Hopper\n"),
        );
        let handler = harness.handler();

        handler.handle(direct("a.csv"), "corr-a").await.expect("first file");
        handler.handle(direct("b.csv"), "corr-b").await.expect("second file");

        let repo = harness.stores.repository();
        assert_eq!(repo.count().await.expect("count"), 2);
        let first = repo.find_by_id(CustomerId(1)).await.expect("find").expect("row 1");
        assert_eq!(first.profile.first_name.as_deref(), Some("Grace"));
        assert_eq!(first.profile.last_name.as_deref(), Some("Hopper"));
        assert_eq!(harness.stores.opens(), 2);
        assert_eq!(harness.stores.closes(), 2);
    }

    #[tokio::test]
    async fn unsupported_trigger_fails_before_any_io() {
        let harness = Harness::new(InMemoryObjectStore::default());

        let failure = harness
            .handler()
            .handle(json!({ "detail": {} }), "corr-shape")
            .await
            .expect_err("unsupported shape");

        let payload = failure_json(&failure);
        assert_eq!(payload["message"], FAILURE_MESSAGE);
        assert!(payload["error"].as_str().unwrap_or_default().contains("unsupported event format"));
        assert!(harness.objects.calls().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_without_opening_store() {
        let harness = Harness::new(InMemoryObjectStore::default());

        let failure =
            harness.handler().handle(direct(KEY), "corr-fetch").await.expect_err("missing object");

        assert!(failure.error.contains("could not fetch"));
        assert_eq!(harness.stores.opens(), 0);
        assert_eq!(harness.objects.calls().len(), 1, "nothing after the failed fetch");
        assert!(harness.workflow.executions().is_empty());
    }

    #[tokio::test]
    async fn store_open_failure_is_fatal() {
        let harness = Harness::with(
            InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV),
            RecordingWorkflowStarter::default(),
            InMemoryStoreOpener::failing_open("mount unavailable"),
        );

        let failure =
            harness.handler().handle(direct(KEY), "corr-open").await.expect_err("open fails");

        assert!(failure.error.contains("mount unavailable"));
        assert_eq!(harness.stores.closes(), 0);
        assert!(harness.objects.contains(BUCKET, KEY), "object is not relocated");
    }

    #[tokio::test]
    async fn upsert_failure_closes_store_once_and_aborts() {
        let harness = Harness::with(
            InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV),
            RecordingWorkflowStarter::default(),
            InMemoryStoreOpener::failing_upsert(CustomerId(2)),
        );

        let failure =
            harness.handler().handle(direct(KEY), "corr-upsert").await.expect_err("upsert fails");

        assert!(failure.error.contains("persistence failure"));
        assert_eq!(harness.stores.opens(), 1);
        assert_eq!(harness.stores.closes(), 1);
        assert_eq!(harness.stores.repository().count().await.expect("count"), 1);
        assert!(harness.objects.contains(BUCKET, KEY));
        assert!(harness.workflow.executions().is_empty());
    }

    #[tokio::test]
    async fn copy_failure_closes_store_and_keeps_original() {
        let harness = Harness::new(
            InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV).failing_on("copy"),
        );

        let failure =
            harness.handler().handle(direct(KEY), "corr-copy").await.expect_err("copy fails");

        assert!(failure.error.contains("could not copy"));
        assert_eq!(harness.stores.closes(), 1);
        assert!(harness.objects.contains(BUCKET, KEY));
        assert!(!harness
            .objects
            .calls()
            .iter()
            .any(|call| matches!(call, StorageCall::Delete { .. })));
        assert!(harness.workflow.executions().is_empty());
    }

    #[tokio::test]
    async fn delete_failure_reports_duplicate_under_both_keys() {
        let harness = Harness::new(
            InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV).failing_on("delete"),
        );

        let failure =
            harness.handler().handle(direct(KEY), "corr-delete").await.expect_err("delete fails");

        assert!(failure.error.contains(KEY));
        assert!(failure.error.contains("processed/incoming/customers.csv"));
        assert!(harness.objects.contains(BUCKET, KEY));
        assert!(harness.objects.contains(BUCKET, "processed/incoming/customers.csv"));
        assert_eq!(harness.stores.closes(), 1);
        assert!(harness.workflow.executions().is_empty());
    }

    #[tokio::test]
    async fn workflow_failure_after_relocation_is_surfaced() {
        let harness = Harness::with(
            InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV),
            RecordingWorkflowStarter::failing("ExecutionLimitExceeded"),
            InMemoryStoreOpener::default(),
        );

        let failure =
            harness.handler().handle(direct(KEY), "corr-wf").await.expect_err("workflow fails");

        assert!(failure.error.contains("ExecutionLimitExceeded"));
        assert!(!harness.objects.contains(BUCKET, KEY), "relocation is not rolled back");
        assert!(harness.objects.contains(BUCKET, "processed/incoming/customers.csv"));
        assert_eq!(harness.stores.closes(), 1);
        assert_eq!(harness.stores.repository().count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn opener_is_reusable_after_a_failed_invocation() {
        let stores = InMemoryStoreOpener::default();
        let harness = Harness::with(
            InMemoryObjectStore::default().with_object(BUCKET, KEY, CSV).failing_on("copy"),
            RecordingWorkflowStarter::default(),
            stores.clone(),
        );

        let _ = harness.handler().handle(direct(KEY), "corr-retry").await;
        let store = stores.open().await.expect("open after failure");
        assert_eq!(store.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn sqlite_store_receives_rows_end_to_end() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("customer_data.db");
        let stores = SqliteStoreOpener::new(&DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 1,
            timeout_secs: 5,
        });
        let objects = InMemoryObjectStore::default().with_object(
            BUCKET,
            KEY,
            "First Name,Last Name,Company,City,Country,Phone 1,Phone 2,Email,Subscription Date,Website\n\
             Ada,Lovelace,Analytical Engines,London,United Kingdom,,,ada@example.com,2024-01-15,\n",
        );
        let handler = IngestionHandler::new(
            objects.clone(),
            RecordingWorkflowStarter::default(),
            stores.clone(),
            HandlerSettings {
                processed_prefix: "processed/".to_string(),
                state_machine_arn: ARN.to_string(),
            },
        );

        handler.handle(direct(KEY), "corr-sqlite").await.expect("ingestion succeeds");

        let store = stores.open().await.expect("reopen");
        let ada = store.find_by_id(CustomerId(1)).await.expect("find").expect("row 1");
        assert_eq!(ada.profile.company.as_deref(), Some("Analytical Engines"));
        assert_eq!(ada.profile.email.as_deref(), Some("ada@example.com"));
        assert_eq!(ada.profile.phone_1.as_deref(), Some(""));
        assert_eq!(store.count().await.expect("count"), 1);
        store.close().await;
    }
}
