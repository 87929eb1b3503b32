use std::path::Path;

use tract_onnx::prelude::*;

use crate::encoding::FeatureEncoding;
use crate::error::{InferenceError, LoadError};
use crate::inference::{ModelInfo, PricePredictor};
use crate::types::{PredictionRecord, FEATURE_COUNT, FEATURE_NAMES};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX regressor taking a `f32[1, 7]` row, with the categorical vocabulary in a
/// `<stem>.encoding.json` sidecar.
pub struct OnnxPredictor {
    name: String,
    plan: OnnxPlan,
    encoding: FeatureEncoding,
}

impl OnnxPredictor {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let encoding = FeatureEncoding::load_sidecar(path)?;
        let plan = build_plan(path).map_err(|err| LoadError::Onnx {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            plan,
            encoding,
        })
    }
}

fn build_plan(path: &Path) -> TractResult<OnnxPlan> {
    tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, FEATURE_COUNT)),
        )?
        .into_optimized()?
        .into_runnable()
}

impl PricePredictor for OnnxPredictor {
    fn predict(&self, record: &PredictionRecord) -> Result<f64, InferenceError> {
        let row = self.encoding.encode(record)?;
        let input = Tensor::from_shape(&[1, FEATURE_COUNT], &row).map_err(InferenceError::runtime)?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(InferenceError::runtime)?;

        let first = outputs.first().ok_or(InferenceError::EmptyOutput)?;
        // regressors exported from float64 pipelines emit f64
        let values = first.cast_to::<f64>().map_err(InferenceError::runtime)?;
        let price = values
            .as_slice::<f64>()
            .map_err(InferenceError::runtime)?
            .first()
            .copied()
            .ok_or(InferenceError::EmptyOutput)?;

        Ok(price)
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            format: "onnx".to_string(),
            features: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            trees: None,
        }
    }
}
