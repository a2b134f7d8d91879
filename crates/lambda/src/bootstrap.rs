use intake_aws::{load_sdk_config, S3ObjectStore, StepFunctionsStarter};
use intake_core::config::{AppConfig, ConfigError, LoadOptions, LogFormat};
use intake_db::SqliteStoreOpener;
use thiserror::Error;
use tracing::{info, Level};

use crate::handler::{HandlerSettings, IngestionHandler};

pub type LambdaHandler = IngestionHandler<S3ObjectStore, StepFunctionsStarter, SqliteStoreOpener>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Loads configuration, installs the log subscriber it describes, then
/// builds the handler.
pub async fn bootstrap(options: LoadOptions) -> Result<LambdaHandler, BootstrapError> {
    let config = AppConfig::load(options)?;
    init_logging(&config);
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting ingestion handler bootstrap"
    );
    Ok(bootstrap_with_config(config).await)
}

// The runtime log stream already carries timestamps. A subscriber installed
// earlier in the process is left in place.
fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).without_time();

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Builds the service clients once per process. The customer store is not
/// opened here; each invocation opens and closes its own connection.
pub async fn bootstrap_with_config(config: AppConfig) -> LambdaHandler {
    let sdk_config = load_sdk_config(config.storage.region.as_deref()).await;
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        region = sdk_config.region().map(|region| region.as_ref()).unwrap_or("unset"),
        "object store and workflow clients initialized"
    );

    IngestionHandler::new(
        S3ObjectStore::from_conf(&sdk_config),
        StepFunctionsStarter::from_conf(&sdk_config),
        SqliteStoreOpener::new(&config.database),
        HandlerSettings::from_config(&config),
    )
}
