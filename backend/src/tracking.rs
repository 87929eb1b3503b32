//! Directory-backed experiment tracking store.
//!
//! The layout matches the MLflow file store so runs written here can be browsed
//! with the usual tooling:
//!
//! ```text
//! <root>/<experiment_id>/meta.yaml
//! <root>/<experiment_id>/<run_id>/meta.yaml
//! <root>/<experiment_id>/<run_id>/{params,metrics,tags}/<key>
//! <root>/<experiment_id>/<run_id>/artifacts/<path>
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::file_uri;

const META_FILE: &str = "meta.yaml";
const LIFECYCLE_ACTIVE: &str = "active";
/// MLflow `SourceType.LOCAL`.
const SOURCE_TYPE_LOCAL: i32 = 4;
pub const TAG_RUN_NAME: &str = "mlflow.runName";
pub const TAG_SOURCE_TYPE: &str = "mlflow.source.type";

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("unsupported tracking URI {0:?}: expected a file:// URI or a local path")]
    UnsupportedUri(String),

    #[error("invalid {kind} key {key:?}")]
    InvalidKey { kind: &'static str, key: String },

    #[error("experiment {0:?} not found")]
    ExperimentNotFound(String),

    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("tracking store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata at {}: {source}", .path.display())]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("malformed metric entry in {}: {line:?}", .path.display())]
    MetricLine { path: PathBuf, line: String },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> TrackingError + '_ {
    move |source| TrackingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn code(self) -> i32 {
        match self {
            RunStatus::Running => 1,
            RunStatus::Finished => 3,
            RunStatus::Failed => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(RunStatus::Running),
            3 => Some(RunStatus::Finished),
            4 => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMeta {
    pub artifact_location: String,
    pub creation_time: i64,
    pub experiment_id: String,
    pub last_update_time: i64,
    pub lifecycle_stage: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub artifact_uri: String,
    pub end_time: Option<i64>,
    pub entry_point_name: String,
    pub experiment_id: String,
    pub lifecycle_stage: String,
    pub run_id: String,
    pub run_name: String,
    pub run_uuid: String,
    pub source_name: String,
    pub source_type: i32,
    pub source_version: String,
    pub start_time: i64,
    pub status: i32,
    pub tags: Vec<String>,
    pub user_id: String,
}

impl RunMeta {
    pub fn status(&self) -> Option<RunStatus> {
        RunStatus::from_code(self.status)
    }
}

/// Everything recorded for one run, read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RunData {
    pub meta: RunMeta,
    pub params: BTreeMap<String, String>,
    /// Latest value per metric key.
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    /// Artifact paths relative to the run's artifact root.
    pub artifacts: Vec<String>,
}

pub struct FileTrackingStore {
    root: PathBuf,
}

impl FileTrackingStore {
    /// Opens (creating if needed) the store behind `tracking_uri`.
    pub fn open(tracking_uri: &str) -> Result<Self, TrackingError> {
        let root = root_from_uri(tracking_uri)?;
        fs::create_dir_all(&root).map_err(io_error(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find_experiment(&self, name: &str) -> Result<Option<ExperimentMeta>, TrackingError> {
        Ok(self
            .experiments()?
            .into_iter()
            .find(|meta| meta.name == name && meta.lifecycle_stage == LIFECYCLE_ACTIVE))
    }

    pub fn get_or_create_experiment(&self, name: &str) -> Result<ExperimentMeta, TrackingError> {
        if let Some(existing) = self.find_experiment(name)? {
            return Ok(existing);
        }

        // id 0 belongs to MLflow's default experiment
        let next_id = self
            .experiment_ids()?
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1;
        let experiment_id = next_id.to_string();
        let dir = self.root.join(&experiment_id);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let now = now_ms();
        let meta = ExperimentMeta {
            artifact_location: file_uri(&dir),
            creation_time: now,
            experiment_id,
            last_update_time: now,
            lifecycle_stage: LIFECYCLE_ACTIVE.to_string(),
            name: name.to_string(),
        };
        write_meta(&dir.join(META_FILE), &meta)?;
        log::info!("Created experiment {:?} with id {}", meta.name, meta.experiment_id);
        Ok(meta)
    }

    /// Opens a new run in `experiment_id`. The returned handle closes the run as
    /// failed if it is dropped without [`ActiveRun::end`].
    pub fn start_run(&self, experiment_id: &str, run_name: &str) -> Result<ActiveRun<'_>, TrackingError> {
        let experiment_dir = self.root.join(experiment_id);
        if !experiment_dir.join(META_FILE).is_file() {
            return Err(TrackingError::ExperimentNotFound(experiment_id.to_string()));
        }

        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = experiment_dir.join(&run_id);
        for sub in ["params", "metrics", "tags", "artifacts"] {
            let dir = run_dir.join(sub);
            fs::create_dir_all(&dir).map_err(io_error(&dir))?;
        }

        let meta = RunMeta {
            artifact_uri: file_uri(&run_dir.join("artifacts")),
            end_time: None,
            entry_point_name: String::new(),
            experiment_id: experiment_id.to_string(),
            lifecycle_stage: LIFECYCLE_ACTIVE.to_string(),
            run_id: run_id.clone(),
            run_name: run_name.to_string(),
            run_uuid: run_id,
            source_name: String::new(),
            source_type: SOURCE_TYPE_LOCAL,
            source_version: String::new(),
            start_time: now_ms(),
            status: RunStatus::Running.code(),
            tags: Vec::new(),
            user_id: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
        };
        write_meta(&run_dir.join(META_FILE), &meta)?;

        let run = ActiveRun {
            store: self,
            dir: run_dir,
            meta,
            ended: false,
        };
        run.set_tag(TAG_RUN_NAME, run_name)?;
        run.set_tag(TAG_SOURCE_TYPE, "LOCAL")?;
        Ok(run)
    }

    pub fn list_runs(&self, experiment_id: &str) -> Result<Vec<RunMeta>, TrackingError> {
        let experiment_dir = self.root.join(experiment_id);
        if !experiment_dir.join(META_FILE).is_file() {
            return Err(TrackingError::ExperimentNotFound(experiment_id.to_string()));
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&experiment_dir).map_err(io_error(&experiment_dir))? {
            let entry = entry.map_err(io_error(&experiment_dir))?;
            let meta_path = entry.path().join(META_FILE);
            if entry.path().is_dir() && meta_path.is_file() {
                runs.push(read_meta::<RunMeta>(&meta_path)?);
            }
        }
        runs.sort_by_key(|run| run.start_time);
        Ok(runs)
    }

    pub fn get_run(&self, experiment_id: &str, run_id: &str) -> Result<RunData, TrackingError> {
        validate_key("run id", run_id)?;
        let run_dir = self.root.join(experiment_id).join(run_id);
        let meta_path = run_dir.join(META_FILE);
        if !meta_path.is_file() {
            return Err(TrackingError::RunNotFound(run_id.to_string()));
        }

        let meta = read_meta::<RunMeta>(&meta_path)?;
        let params = read_values(&run_dir.join("params"))?;
        let tags = read_values(&run_dir.join("tags"))?;

        let mut metrics = BTreeMap::new();
        for (key, contents) in read_values(&run_dir.join("metrics"))? {
            let path = run_dir.join("metrics").join(&key);
            if let Some(line) = contents.lines().last() {
                metrics.insert(key, parse_metric_value(&path, line)?);
            }
        }

        let artifacts_dir = run_dir.join("artifacts");
        let mut artifacts = Vec::new();
        collect_files(&artifacts_dir, &artifacts_dir, &mut artifacts)?;
        artifacts.sort();

        Ok(RunData {
            meta,
            params,
            metrics,
            tags,
            artifacts,
        })
    }

    fn experiments(&self) -> Result<Vec<ExperimentMeta>, TrackingError> {
        let mut experiments = Vec::new();
        for id in self.experiment_ids()? {
            let meta_path = self.root.join(id.to_string()).join(META_FILE);
            if meta_path.is_file() {
                experiments.push(read_meta::<ExperimentMeta>(&meta_path)?);
            }
        }
        Ok(experiments)
    }

    fn experiment_ids(&self) -> Result<Vec<u64>, TrackingError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_error(&self.root))? {
            let entry = entry.map_err(io_error(&self.root))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|name| name.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

/// An open run. Writes go straight to disk.
pub struct ActiveRun<'a> {
    store: &'a FileTrackingStore,
    dir: PathBuf,
    meta: RunMeta,
    ended: bool,
}

impl ActiveRun<'_> {
    pub fn run_id(&self) -> &str {
        &self.meta.run_id
    }

    pub fn log_param(&self, key: &str, value: &str) -> Result<(), TrackingError> {
        validate_key("param", key)?;
        write_value(&self.dir.join("params").join(key), value)
    }

    pub fn set_tag(&self, key: &str, value: &str) -> Result<(), TrackingError> {
        validate_key("tag", key)?;
        write_value(&self.dir.join("tags").join(key), value)
    }

    pub fn log_metric(&self, key: &str, value: f64) -> Result<(), TrackingError> {
        self.log_metric_at(key, value, 0)
    }

    pub fn log_metric_at(&self, key: &str, value: f64, step: i64) -> Result<(), TrackingError> {
        validate_key("metric", key)?;
        let path = self.dir.join("metrics").join(key);
        ensure_parent(&path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        writeln!(file, "{} {:?} {}", now_ms(), value, step).map_err(io_error(&path))
    }

    /// Copies `local_path` into the run's artifacts, under `artifact_path` when given.
    pub fn log_artifact(&self, local_path: &Path, artifact_path: Option<&str>) -> Result<(), TrackingError> {
        let file_name = local_path.file_name().ok_or_else(|| TrackingError::Io {
            path: local_path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        })?;

        let mut target = self.dir.join("artifacts");
        if let Some(sub) = artifact_path {
            validate_key("artifact", sub)?;
            target = target.join(sub);
        }
        fs::create_dir_all(&target).map_err(io_error(&target))?;
        let target = target.join(file_name);
        fs::copy(local_path, &target).map_err(io_error(local_path))?;
        Ok(())
    }

    /// Closes the run with `status`.
    pub fn end(mut self, status: RunStatus) -> Result<(), TrackingError> {
        self.ended = true;
        self.close(status)
    }

    fn close(&mut self, status: RunStatus) -> Result<(), TrackingError> {
        self.meta.status = status.code();
        self.meta.end_time = Some(now_ms());
        write_meta(&self.dir.join(META_FILE), &self.meta)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if let Err(err) = self.close(RunStatus::Failed) {
            warn!(
                "Could not close run {} in {}: {}",
                self.meta.run_id,
                self.store.root.display(),
                err
            );
        }
    }
}

/// Accepts `file://` URIs and plain local paths.
pub fn root_from_uri(uri: &str) -> Result<PathBuf, TrackingError> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(TrackingError::UnsupportedUri(uri.to_string()));
    }

    if let Some(rest) = trimmed.strip_prefix("file://") {
        // file:///C:/x carries a leading slash before the drive letter
        let bytes = rest.as_bytes();
        let path = if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' {
            &rest[1..]
        } else {
            rest
        };
        if path.is_empty() {
            return Err(TrackingError::UnsupportedUri(uri.to_string()));
        }
        return Ok(PathBuf::from(path));
    }

    if trimmed.contains("://") {
        return Err(TrackingError::UnsupportedUri(uri.to_string()));
    }
    Ok(PathBuf::from(trimmed))
}

fn validate_key(kind: &'static str, key: &str) -> Result<(), TrackingError> {
    let allowed = |ch: char| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | ' ' | '/');
    let valid = !key.trim().is_empty()
        && !key.starts_with('/')
        && key.chars().all(allowed)
        && key.split('/').all(|segment| !segment.is_empty() && segment != "." && segment != "..");

    if valid {
        Ok(())
    } else {
        Err(TrackingError::InvalidKey {
            kind,
            key: key.to_string(),
        })
    }
}

fn ensure_parent(path: &Path) -> Result<(), TrackingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    Ok(())
}

fn write_value(path: &Path, value: &str) -> Result<(), TrackingError> {
    ensure_parent(path)?;
    fs::write(path, value).map_err(io_error(path))
}

fn write_meta<T: Serialize>(path: &Path, meta: &T) -> Result<(), TrackingError> {
    let yaml = serde_yaml::to_string(meta).map_err(|source| TrackingError::Meta {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, yaml).map_err(io_error(path))
}

fn read_meta<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, TrackingError> {
    let raw = fs::read_to_string(path).map_err(io_error(path))?;
    serde_yaml::from_str(&raw).map_err(|source| TrackingError::Meta {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads every file under `dir` into `relative/key -> contents`.
fn read_values(dir: &Path) -> Result<BTreeMap<String, String>, TrackingError> {
    let mut files = Vec::new();
    if dir.is_dir() {
        collect_files(dir, dir, &mut files)?;
    }

    let mut values = BTreeMap::new();
    for key in files {
        let path = dir.join(&key);
        let contents = fs::read_to_string(&path).map_err(io_error(&path))?;
        values.insert(key, contents);
    }
    Ok(values)
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), TrackingError> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

fn parse_metric_value(path: &Path, line: &str) -> Result<f64, TrackingError> {
    let malformed = || TrackingError::MetricLine {
        path: path.to_path_buf(),
        line: line.to_string(),
    };
    let mut parts = line.split_whitespace();
    let _timestamp = parts.next().ok_or_else(malformed)?;
    parts
        .next()
        .ok_or_else(malformed)?
        .parse()
        .map_err(|_| malformed())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
