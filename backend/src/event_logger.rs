use std::path::{Path, PathBuf};

use log::{info, warn};
use moto_inference::PredictionRecord;

use crate::config::TrackingConfig;
use crate::tracking::{ActiveRun, ExperimentMeta, FileTrackingStore, RunStatus, TrackingError};

pub const PARAM_MODEL_NAME: &str = "model_name";
pub const METRIC_PREDICTED_PRICE: &str = "predicted_price";
pub const TAG_SOURCE: &str = "source";
pub const ARTIFACT_DIR: &str = "model";

/// Records one tracking run per successful prediction.
pub struct EventLogger {
    store: FileTrackingStore,
    experiment: ExperimentMeta,
    config: TrackingConfig,
    model_path: PathBuf,
}

impl EventLogger {
    /// Opens the store and resolves the experiment up front, so a broken
    /// tracking root is reported at startup rather than on the first request.
    pub fn new(config: TrackingConfig, model_path: impl Into<PathBuf>) -> Result<Self, TrackingError> {
        let store = FileTrackingStore::open(&config.tracking_uri)?;
        let experiment = store.get_or_create_experiment(&config.experiment_name)?;
        Ok(Self {
            store,
            experiment,
            config,
            model_path: model_path.into(),
        })
    }

    pub fn experiment(&self) -> &ExperimentMeta {
        &self.experiment
    }

    pub fn store(&self) -> &FileTrackingStore {
        &self.store
    }

    /// Writes the run for a prediction and returns its id. The run is closed as
    /// failed when any write after opening it fails.
    pub fn log_prediction(&self, record: &PredictionRecord, price: f64) -> Result<String, TrackingError> {
        let run = self
            .store
            .start_run(&self.experiment.experiment_id, &self.config.run_name)?;
        let run_id = run.run_id().to_string();

        match self.write_prediction(&run, record, price) {
            Ok(()) => {
                run.end(RunStatus::Finished)?;
                info!("Logged prediction run {run_id} (predicted_price={price})");
                Ok(run_id)
            }
            Err(err) => {
                if let Err(close_err) = run.end(RunStatus::Failed) {
                    warn!("Could not mark run {run_id} as failed: {close_err}");
                }
                Err(err)
            }
        }
    }

    fn write_prediction(
        &self,
        run: &ActiveRun<'_>,
        record: &PredictionRecord,
        price: f64,
    ) -> Result<(), TrackingError> {
        for (key, value) in record.fields() {
            run.log_param(key, &value)?;
        }
        run.log_param(PARAM_MODEL_NAME, &model_name(&self.model_path))?;
        run.log_artifact(&self.model_path, Some(ARTIFACT_DIR))?;
        run.log_metric(METRIC_PREDICTED_PRICE, price)?;
        run.set_tag(TAG_SOURCE, &self.config.source_tag)?;
        Ok(())
    }
}

pub fn model_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
