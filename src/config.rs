//! Configuration types and `.env` loading.

use crate::error::ConfigError;
use crate::models::ColumnLayout;
use std::path::PathBuf;

pub const ENV_OUTPUT_DIR: &str = "POLICY_SPLITTER_OUTPUT_DIR";
pub const ENV_SHEET: &str = "POLICY_SPLITTER_SHEET";
pub const ENV_ID_COLUMN: &str = "POLICY_SPLITTER_ID_COLUMN";
pub const ENV_EMAIL_COLUMNS: &str = "POLICY_SPLITTER_EMAIL_COLUMNS";
pub const ENV_KEY_COLUMN: &str = "POLICY_SPLITTER_KEY_COLUMN";
pub const ENV_CLEAN_OUTPUT: &str = "POLICY_SPLITTER_CLEAN_OUTPUT";
pub const ENV_ENCRYPT: &str = "POLICY_SPLITTER_ENCRYPT";

/// Load `.env` from the working directory, then from the user config folder
/// (`<config_dir>/policy-splitter/.env`). Values already set win.
pub fn load_env_files() {
    let _ = dotenvy::dotenv();
    if let Some(dir) = dirs::config_dir() {
        let env_path = dir.join("policy-splitter").join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }
    }
}

/// Settings for a split run.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Root folder for the two routing folders and run reports.
    pub output_dir: PathBuf,
    /// Worksheet holding the policy list; first sheet when `None`.
    pub sheet: Option<String>,
    pub columns: ColumnLayout,
    /// Remove stale PDFs from the output folders before writing.
    pub clean_output: bool,
    /// Password-protect email-bound documents.
    pub encrypt: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            sheet: None,
            columns: ColumnLayout::default(),
            clean_output: true,
            encrypt: true,
        }
    }
}

impl SplitterConfig {
    /// Defaults overridden by process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(dir);
        }
        config.sheet = get(ENV_SHEET);
        if let Some(column) = get(ENV_ID_COLUMN) {
            config.columns.id_column = column;
        }
        if let Some(columns) = get(ENV_EMAIL_COLUMNS) {
            let parsed: Vec<String> = columns
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if parsed.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_EMAIL_COLUMNS.to_string(),
                    message: "expected a comma-separated list of column names".to_string(),
                });
            }
            config.columns.email_columns = parsed;
        }
        if let Some(column) = get(ENV_KEY_COLUMN) {
            config.columns.key_column = column;
        }
        if let Some(v) = get(ENV_CLEAN_OUTPUT) {
            config.clean_output = parse_bool(ENV_CLEAN_OUTPUT, &v)?;
        }
        if let Some(v) = get(ENV_ENCRYPT) {
            config.encrypt = parse_bool(ENV_ENCRYPT, &v)?;
        }
        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected true/false, got '{}'", value),
        }),
    }
}
