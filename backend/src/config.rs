use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_DETECTION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Memory,
    DynamoDb { table: String },
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub model_path: Option<PathBuf>,
    pub label_map_path: Option<PathBuf>,
    pub min_confidence: f32,
    pub timeout: Duration,
    pub max_upload_bytes: usize,
    pub input_size: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            label_map_path: None,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            timeout: Duration::from_secs(DEFAULT_DETECTION_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            input_size: DEFAULT_MODEL_INPUT_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub storage: StorageBackend,
    pub detection: DetectionConfig,
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| ConfigError::Missing("JWT_SECRET".to_string()))?
            .to_string();

        let storage = match get("STORAGE_BACKEND").unwrap_or("memory") {
            "memory" => StorageBackend::Memory,
            "dynamodb" => {
                let table = get("DYNAMODB_LISTS_TABLE")
                    .ok_or_else(|| ConfigError::Missing("DYNAMODB_LISTS_TABLE".to_string()))?;
                StorageBackend::DynamoDb {
                    table: table.to_string(),
                }
            }
            other => return Err(invalid("STORAGE_BACKEND", other)),
        };

        let min_confidence = parse_or(
            get("MIN_CONFIDENCE"),
            "MIN_CONFIDENCE",
            DEFAULT_MIN_CONFIDENCE,
        )?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(invalid("MIN_CONFIDENCE", &min_confidence.to_string()));
        }

        let timeout_secs = parse_or(
            get("DETECTION_TIMEOUT_SECS"),
            "DETECTION_TIMEOUT_SECS",
            DEFAULT_DETECTION_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(invalid("DETECTION_TIMEOUT_SECS", "0"));
        }

        let input_size = parse_or(
            get("MODEL_INPUT_SIZE"),
            "MODEL_INPUT_SIZE",
            DEFAULT_MODEL_INPUT_SIZE,
        )?;
        if input_size == 0 {
            return Err(invalid("MODEL_INPUT_SIZE", "0"));
        }

        Ok(Self {
            bind_host: get("BIND_HOST").unwrap_or("0.0.0.0").to_string(),
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            jwt_secret,
            storage,
            detection: DetectionConfig {
                model_path: get("MODEL_PATH").map(PathBuf::from),
                label_map_path: get("LABEL_MAP_PATH").map(PathBuf::from),
                min_confidence,
                timeout: Duration::from_secs(timeout_secs),
                max_upload_bytes: parse_or(
                    get("MAX_UPLOAD_BYTES"),
                    "MAX_UPLOAD_BYTES",
                    DEFAULT_MAX_UPLOAD_BYTES,
                )?,
                input_size,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<&str>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| invalid(key, value)),
        None => Ok(default),
    }
}
