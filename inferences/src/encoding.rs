//! Turns a [`PredictionRecord`] into the numeric feature row model runtimes consume.
//!
//! Categorical columns are ordinal-encoded against the vocabulary shipped with the
//! artifact; numeric columns pass through unchanged.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, LoadError};
use crate::types::{BikeType, PredictionRecord, Seller, FEATURE_COUNT};

/// Code used for categories outside the vocabulary when the policy is `ignore`.
pub const UNKNOWN_CODE: f32 = -1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    #[default]
    Error,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    pub categories: Vec<String>,
    #[serde(default)]
    pub handle_unknown: UnknownPolicy,
}

impl CategoryVocabulary {
    pub fn new(categories: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            handle_unknown: UnknownPolicy::Error,
        }
    }

    pub fn ignoring_unknown(mut self) -> Self {
        self.handle_unknown = UnknownPolicy::Ignore;
        self
    }

    /// Matching is case-insensitive on trimmed values.
    pub fn encode(&self, field: &'static str, value: &str) -> Result<f32, InferenceError> {
        let needle = value.trim();
        let position = self
            .categories
            .iter()
            .position(|category| category.trim().eq_ignore_ascii_case(needle));

        match (position, self.handle_unknown) {
            (Some(idx), _) => Ok(idx as f32),
            (None, UnknownPolicy::Ignore) => Ok(UNKNOWN_CODE),
            (None, UnknownPolicy::Error) => Err(InferenceError::UnseenCategory {
                field,
                value: needle.to_string(),
            }),
        }
    }
}

fn default_bike_types() -> CategoryVocabulary {
    CategoryVocabulary::new(BikeType::ALL.iter().map(BikeType::as_str))
}

fn default_sellers() -> CategoryVocabulary {
    CategoryVocabulary::new(Seller::ALL.iter().map(Seller::as_str))
}

/// Vocabularies for the categorical columns of the record.
///
/// `Bike Type` and `Seller` default to the declaration order of their enums when
/// the artifact does not spell them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoding {
    #[serde(rename = "Brand")]
    pub brand: CategoryVocabulary,
    #[serde(rename = "Model")]
    pub model: CategoryVocabulary,
    #[serde(rename = "Bike Type", default = "default_bike_types")]
    pub bike_type: CategoryVocabulary,
    #[serde(rename = "Seller", default = "default_sellers")]
    pub seller: CategoryVocabulary,
}

impl FeatureEncoding {
    pub fn new(brand: CategoryVocabulary, model: CategoryVocabulary) -> Self {
        Self {
            brand,
            model,
            bike_type: default_bike_types(),
            seller: default_sellers(),
        }
    }

    pub fn encode(&self, record: &PredictionRecord) -> Result<[f32; FEATURE_COUNT], InferenceError> {
        Ok([
            self.brand.encode("Brand", record.brand().as_str())?,
            self.model.encode("Model", record.model().as_str())?,
            self.bike_type.encode("Bike Type", record.bike_type().as_str())?,
            record.capacity().get() as f32,
            record.mileage().get() as f32,
            record.year().get() as f32,
            self.seller.encode("Seller", record.seller().as_str())?,
        ])
    }

    /// Reads the vocabulary that sits next to a model file as `<stem>.encoding.json`.
    pub fn load_sidecar(model_path: &Path) -> Result<Self, LoadError> {
        let path = sidecar_path(model_path);
        let data = std::fs::read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| LoadError::Parse { path, source })
    }
}

pub fn sidecar_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("encoding.json")
}
