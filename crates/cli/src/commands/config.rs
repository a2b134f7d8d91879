use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use intake_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct ConfigField {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    vec![
        ConfigField {
            key_path: "database.url",
            value: config.database.url.clone(),
            env_keys: &["INTAKE_DATABASE_URL"],
        },
        ConfigField {
            key_path: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["INTAKE_DATABASE_MAX_CONNECTIONS"],
        },
        ConfigField {
            key_path: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["INTAKE_DATABASE_TIMEOUT_SECS"],
        },
        ConfigField {
            key_path: "storage.processed_prefix",
            value: config.storage.processed_prefix.clone(),
            env_keys: &["INTAKE_STORAGE_PROCESSED_PREFIX"],
        },
        ConfigField {
            key_path: "storage.region",
            value: config.storage.region.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["INTAKE_STORAGE_REGION"],
        },
        ConfigField {
            key_path: "workflow.state_machine_arn",
            value: config.workflow.state_machine_arn.clone(),
            env_keys: &["INTAKE_WORKFLOW_STATE_MACHINE_ARN", "STATE_MACHINE_ARN"],
        },
        ConfigField {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["INTAKE_LOGGING_LEVEL", "INTAKE_LOG_LEVEL"],
        },
        ConfigField {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["INTAKE_LOGGING_FORMAT", "INTAKE_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("intake.toml"), PathBuf::from("config/intake.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    // First non-blank variable wins, matching how the loader reads fallbacks.
    let env_hit = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = env_hit {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
