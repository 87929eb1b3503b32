use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;

pub const DEFAULT_EXPERIMENT: &str = "Motorbike_Price_Prediction_App";
pub const DEFAULT_RUN_NAME: &str = "single_prediction";
pub const DEFAULT_SOURCE_TAG: &str = "web_app";
pub const DEFAULT_MODEL_PATH: &str = "../models/final_rf_pipeline.json";

/// Where and how prediction runs are recorded. Handed to the event logger at
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    pub tracking_uri: String,
    pub experiment_name: String,
    pub run_name: String,
    pub source_tag: String,
}

impl TrackingConfig {
    /// Defaults with the store rooted at `root`.
    pub fn local(root: &Path) -> Self {
        Self {
            tracking_uri: file_uri(root),
            experiment_name: DEFAULT_EXPERIMENT.to_string(),
            run_name: DEFAULT_RUN_NAME.to_string(),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    pub static_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub tracking: TrackingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "PORT", 8080u16);
        let workers = parse_or(&lookup, "WORKERS", 1usize).max(1);
        let model_path = lookup("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
        let static_dir = lookup("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./static"));
        let cors_origins = lookup("CORS_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:8080".to_string(),
                    "http://127.0.0.1:8080".to_string(),
                ]
            });

        let mut tracking = TrackingConfig::local(&default_tracking_root());
        if let Some(uri) = lookup("TRACKING_URI") {
            tracking.tracking_uri = uri;
        }
        if let Some(name) = lookup("EXPERIMENT_NAME").filter(|name| !name.trim().is_empty()) {
            tracking.experiment_name = name.trim().to_string();
        }

        Self {
            host,
            port,
            workers,
            model_path,
            static_dir,
            cors_origins,
            tracking,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {key}={raw:?}, using {default}");
            default
        }),
        None => default,
    }
}

fn default_tracking_root() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("mlruns")
}

/// `file://` URI for a local directory, with forward slashes on every platform.
pub fn file_uri(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if normalized.starts_with('/') {
        format!("file://{normalized}")
    } else {
        format!("file:///{normalized}")
    }
}
