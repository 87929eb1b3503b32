use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{InferenceError, LoadError};
use crate::forest::ForestPredictor;
use crate::onnx::OnnxPredictor;
use crate::types::PredictionRecord;

/// A loaded price model. Implementations are read-only after load and are
/// shared across requests.
pub trait PricePredictor: Send + Sync {
    /// Price estimate in LKR for one record.
    fn predict(&self, record: &PredictionRecord) -> Result<f64, InferenceError>;

    fn describe(&self) -> ModelInfo;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub format: String,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trees: Option<usize>,
}

/// Loads the artifact at `path`, choosing the runtime from its extension.
pub fn load_predictor(path: &Path) -> Result<Arc<dyn PricePredictor>, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let predictor: Arc<dyn PricePredictor> = match extension.as_str() {
        "onnx" => Arc::new(OnnxPredictor::load(path)?),
        "json" => Arc::new(ForestPredictor::load(path)?),
        _ => {
            return Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            })
        }
    };

    log::debug!("loaded {} model from {}", predictor.describe().format, path.display());
    Ok(predictor)
}
