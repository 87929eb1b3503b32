//! Model-side half of the motorbike price predictor: the prediction record, its
//! feature encoding, and the [`PricePredictor`] port with the supported artifact
//! formats behind it.

pub mod encoding;
pub mod error;
pub mod forest;
pub mod inference;
pub mod onnx;
pub mod types;

pub use error::{InferenceError, LoadError, RecordError};
pub use inference::{load_predictor, ModelInfo, PricePredictor};
pub use types::{
    BikeType, Capacity, Mileage, PredictionRecord, Seller, Text, Year, FEATURE_COUNT,
    FEATURE_NAMES,
};
