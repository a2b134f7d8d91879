use std::fs;
use std::path::Path;

use crate::commands::CommandResult;
use intake_core::config::{AppConfig, LoadOptions};
use intake_core::ingest::{decode_content, parse_customers};
use intake_db::{CustomerRepository, CustomerStore, SqliteStoreOpener, StoreOpener};

/// Upserts the rows of a local CSV file with the same parsing and identity
/// rules the event handler applies. The file is left where it is.
pub fn run(path: &Path) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "ingest",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            return CommandResult::failure(
                "ingest",
                "file_read",
                format!("could not read `{}`: {error}", path.display()),
                6,
            );
        }
    };

    let parsed = match parse_customers(&decode_content(&bytes)) {
        Ok(parsed) => parsed,
        Err(error) => return CommandResult::failure("ingest", "parse", error.to_string(), 7),
    };
    if !parsed.header_present {
        return CommandResult::success(
            "ingest",
            format!("`{}` has no `First Name` column; nothing was written", path.display()),
        );
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ingest",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let store = SqliteStoreOpener::new(&config.database)
            .open()
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let mut written = Ok(());
        for record in &parsed.records {
            if let Err(error) = store.upsert(record).await {
                written = Err(("store", format!("customer {}: {error}", record.id), 5u8));
                break;
            }
        }
        let total = match written {
            Ok(()) => store.count().await.map_err(|error| ("store", error.to_string(), 5u8)),
            Err(error) => Err(error),
        };
        store.close().await;
        total
    });

    match result {
        Ok(total) => CommandResult::success(
            "ingest",
            format!(
                "upserted {} customer rows from `{}` ({total} rows in store)",
                parsed.records.len(),
                path.display()
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ingest", error_class, message, exit_code)
        }
    }
}
