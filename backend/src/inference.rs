use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use moto_inference::{load_predictor, InferenceError, LoadError, ModelInfo, PredictionRecord, PricePredictor};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Estimated price in LKR.
    pub price: f64,
}

/// Scores records against the model loaded at startup and enforces the
/// finite, non-negative output contract.
pub struct InferenceAdapter {
    predictor: Arc<dyn PricePredictor>,
    model_path: PathBuf,
}

impl InferenceAdapter {
    pub fn load(model_path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let model_path = model_path.into();
        let predictor = load_predictor(&model_path)?;
        Ok(Self::new(predictor, model_path))
    }

    pub fn new(predictor: Arc<dyn PricePredictor>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            predictor,
            model_path: model_path.into(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn model_info(&self) -> ModelInfo {
        self.predictor.describe()
    }

    pub fn predict(&self, record: &PredictionRecord) -> Result<Prediction, InferenceError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.predictor.predict(record)))
            .map_err(|payload| InferenceError::Panicked(panic_message(payload.as_ref())))?;
        let price = outcome?;

        if !price.is_finite() || price < 0.0 {
            return Err(InferenceError::InvalidOutput(price));
        }
        Ok(Prediction { price })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
