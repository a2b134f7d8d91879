use std::path::{Path, PathBuf};

use intake_core::config::{AppConfig, LoadOptions};
use intake_db::{connect_with_config, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Debug, PartialEq, Eq)]
enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        // The report holds only strings and unit enums, so serialization cannot fail.
        return serde_json::to_string_pretty(&report).unwrap_or_default();
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let mut checks = vec![DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            )];
            checks.push(check_database_location(&config.database.url));
            checks.extend(check_customer_store(&config));
            checks
        }
        Err(error) => vec![
            DoctorCheck::fail("config_validation", error.to_string()),
            DoctorCheck::skipped("database_location", "configuration did not load"),
            DoctorCheck::skipped("database_connectivity", "configuration did not load"),
            DoctorCheck::skipped("customer_schema", "configuration did not load"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let (overall_status, summary) = if all_pass {
        (CheckStatus::Pass, "doctor: customer store is ready for ingestion")
    } else {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn database_location(url: &str) -> DatabaseLocation {
    let url = url.trim();
    if url == ":memory:" || url.starts_with("sqlite::memory:") || url.contains("mode=memory") {
        return DatabaseLocation::InMemory;
    }

    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    DatabaseLocation::File(PathBuf::from(path))
}

/// The store file lives on a mounted file system; its directory has to
/// exist and accept new files before the first invocation can create it.
fn check_database_location(url: &str) -> DoctorCheck {
    const NAME: &str = "database_location";

    let path = match database_location(url) {
        DatabaseLocation::InMemory => {
            return DoctorCheck::pass(NAME, "in-memory database; rows are not persisted");
        }
        DatabaseLocation::File(path) => path,
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !directory.is_dir() {
        return DoctorCheck::fail(
            NAME,
            format!("directory `{}` does not exist (is the volume mounted?)", directory.display()),
        );
    }

    match writable(&directory) {
        Ok(()) => DoctorCheck::pass(
            NAME,
            format!("`{}` is in writable directory `{}`", path.display(), directory.display()),
        ),
        Err(error) => DoctorCheck::fail(
            NAME,
            format!("directory `{}` is not writable: {error}", directory.display()),
        ),
    }
}

fn writable(directory: &Path) -> std::io::Result<()> {
    tempfile::Builder::new().prefix(".intake-doctor").tempfile_in(directory).map(drop)
}

fn check_customer_store(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("customer_schema", "no async runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("customer_schema", "the database is unreachable"),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = match migrations::customers_table_present(&pool).await {
            Ok(true) => DoctorCheck::pass("customer_schema", "`customers` table is present"),
            Ok(false) => DoctorCheck::fail(
                "customer_schema",
                "`customers` table is missing; run `intake migrate`",
            ),
            Err(error) => DoctorCheck::fail(
                "customer_schema",
                format!("could not inspect schema: {error}"),
            ),
        };
        pool.close().await;

        vec![connectivity, schema]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
