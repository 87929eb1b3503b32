//! Regression forests serialized as JSON.
//!
//! ```json
//! {
//!   "encoding": { "Brand": { "categories": ["Honda"] }, "Model": { "categories": ["CB125"] } },
//!   "trees": [ { "nodes": [ { "feature": 3, "threshold": 150.0, "left": 1, "right": 2 },
//!                           { "value": 250000.0 }, { "value": 420000.0 } ] } ]
//! }
//! ```
//!
//! A split sends the row left when `row[feature] <= threshold`. The prediction is the
//! mean of the tree outputs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::FeatureEncoding;
use crate::error::{InferenceError, LoadError};
use crate::inference::{ModelInfo, PricePredictor};
use crate::types::{PredictionRecord, FEATURE_COUNT, FEATURE_NAMES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForestNode {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<ForestNode>,
}

impl RegressionTree {
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                ForestNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(format!("node {idx}: feature index {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx}: threshold is not finite"));
                    }
                    // children after their parent rules out cycles
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx}: invalid child index {child}"));
                        }
                    }
                }
                ForestNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("node {idx}: leaf value is not finite"));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, row: &[f32; FEATURE_COUNT]) -> Option<f64> {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx)? {
                ForestNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if *row.get(*feature)? <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                ForestNode::Leaf { value } => return Some(*value),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub encoding: FeatureEncoding,
    pub trees: Vec<RegressionTree>,
}

impl ForestArtifact {
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|reason| format!("tree {idx}: {reason}"))?;
        }
        Ok(())
    }
}

pub struct ForestPredictor {
    name: String,
    artifact: ForestArtifact,
}

impl ForestPredictor {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let data = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ForestArtifact =
            serde_json::from_slice(&data).map_err(|source| LoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::from_artifact(name, artifact).map_err(|reason| LoadError::Invalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_artifact(name: impl Into<String>, artifact: ForestArtifact) -> Result<Self, String> {
        artifact.validate()?;
        Ok(Self {
            name: name.into(),
            artifact,
        })
    }
}

impl PricePredictor for ForestPredictor {
    fn predict(&self, record: &PredictionRecord) -> Result<f64, InferenceError> {
        let row = self.artifact.encoding.encode(record)?;
        let mut total = 0.0;
        for (idx, tree) in self.artifact.trees.iter().enumerate() {
            total += tree
                .evaluate(&row)
                .ok_or_else(|| InferenceError::Runtime(format!("tree {idx} is malformed")))?;
        }
        Ok(total / self.artifact.trees.len() as f64)
    }

    fn describe(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            format: "forest-json".to_string(),
            features: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            trees: Some(self.artifact.trees.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::CategoryVocabulary;

    fn sample_artifact() -> ForestArtifact {
        serde_json::from_value(serde_json::json!({
            "encoding": {
                "Brand": { "categories": ["Bajaj", "Honda", "Yamaha"] },
                "Model": { "categories": ["CB125", "FZ", "Pulsar"], "handle_unknown": "ignore" }
            },
            "trees": [
                { "nodes": [
                    { "feature": 3, "threshold": 150.0, "left": 1, "right": 2 },
                    { "value": 300000.0 },
                    { "value": 600000.0 }
                ] },
                { "nodes": [
                    { "feature": 5, "threshold": 2015.0, "left": 1, "right": 2 },
                    { "value": 200000.0 },
                    { "value": 400000.0 }
                ] }
            ]
        }))
        .unwrap()
    }

    fn record(capacity: u16, year: u16) -> PredictionRecord {
        serde_json::from_value(serde_json::json!({
            "Brand": "Honda",
            "Model": "CB125",
            "Bike Type": "Motorcycle",
            "Capacity": capacity,
            "Mileage": 15000,
            "Year": year,
            "Seller": "Individual",
        }))
        .unwrap()
    }

    #[test]
    fn averages_tree_outputs() {
        let predictor = ForestPredictor::from_artifact("forest.json", sample_artifact()).unwrap();
        assert_eq!(predictor.predict(&record(125, 2018)).unwrap(), 350000.0);
        assert_eq!(predictor.predict(&record(250, 2010)).unwrap(), 400000.0);
    }

    #[test]
    fn threshold_is_inclusive_on_the_left() {
        let predictor = ForestPredictor::from_artifact("forest.json", sample_artifact()).unwrap();
        assert_eq!(predictor.predict(&record(150, 2015)).unwrap(), 250000.0);
    }

    #[test]
    fn rejects_cyclic_trees() {
        let mut artifact = sample_artifact();
        artifact.trees[0].nodes[0] = ForestNode::Split {
            feature: 3,
            threshold: 1.0,
            left: 0,
            right: 2,
        };
        let err = ForestPredictor::from_artifact("forest.json", artifact).err().unwrap();
        assert!(err.contains("invalid child index 0"), "{err}");
    }

    #[test]
    fn rejects_out_of_range_features_and_empty_forests() {
        let mut artifact = sample_artifact();
        artifact.trees[1].nodes[0] = ForestNode::Split {
            feature: 7,
            threshold: 1.0,
            left: 1,
            right: 2,
        };
        assert!(ForestPredictor::from_artifact("forest.json", artifact).is_err());

        let empty = ForestArtifact {
            encoding: FeatureEncoding::new(
                CategoryVocabulary::new(["Honda"]),
                CategoryVocabulary::new(["CB125"]),
            ),
            trees: Vec::new(),
        };
        assert!(ForestPredictor::from_artifact("forest.json", empty).is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("final_rf_pipeline.json");
        std::fs::write(&path, serde_json::to_vec(&sample_artifact()).unwrap()).unwrap();

        let predictor = ForestPredictor::load(&path).unwrap();
        let info = predictor.describe();
        assert_eq!(info.name, "final_rf_pipeline.json");
        assert_eq!(info.trees, Some(2));
        assert_eq!(info.features.len(), FEATURE_COUNT);
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            ForestPredictor::load(&path),
            Err(LoadError::Parse { .. })
        ));
    }
}
