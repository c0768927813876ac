//! Experiment tracking.
//!
//! An evaluation run records its parameters, aggregate metrics and result
//! files with a [`Tracker`]. [`MlflowTracker`] talks to an MLflow server;
//! [`NoopTracker`] keeps runs offline.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::MlflowSettings;

#[cfg(feature = "mlflow")]
mod mlflow;

#[cfg(feature = "mlflow")]
pub use mlflow::MlflowTracker;

/// Errors from the tracking backend.
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Tracking API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected tracking response: {0}")]
    Decode(String),

    #[error("No active run")]
    NoActiveRun,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for run parameters, metrics and artifacts.
///
/// One run is active at a time, between `start_run` and `end_run`.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Start a run in `experiment`, creating the experiment if needed.
    /// Returns the run id.
    async fn start_run(&self, experiment: &str, run_name: &str) -> Result<String, TrackingError>;

    async fn log_param(&self, key: &str, value: &str) -> Result<(), TrackingError>;

    async fn log_metric(&self, key: &str, value: f64) -> Result<(), TrackingError>;

    async fn log_metrics(&self, metrics: &[(String, f64)]) -> Result<(), TrackingError> {
        for (key, value) in metrics {
            self.log_metric(key, *value).await?;
        }
        Ok(())
    }

    /// Upload every file under `dir`, keeping relative paths, below
    /// `artifact_path` in the run's artifact store.
    async fn log_artifacts(&self, dir: &Path, artifact_path: &str) -> Result<(), TrackingError>;

    async fn end_run(&self, status: RunStatus) -> Result<(), TrackingError>;

    fn name(&self) -> &str;
}

/// Tracker that records nothing.
#[derive(Debug, Default)]
pub struct NoopTracker {
    run: Mutex<Option<String>>,
}

impl NoopTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Tracker for NoopTracker {
    async fn start_run(&self, experiment: &str, run_name: &str) -> Result<String, TrackingError> {
        tracing::debug!(experiment, run_name, "Tracking disabled, run not recorded");
        *self.run.lock() = Some(run_name.to_string());
        Ok(run_name.to_string())
    }

    async fn log_param(&self, _key: &str, _value: &str) -> Result<(), TrackingError> {
        Ok(())
    }

    async fn log_metric(&self, _key: &str, _value: f64) -> Result<(), TrackingError> {
        Ok(())
    }

    async fn log_artifacts(&self, _dir: &Path, _artifact_path: &str) -> Result<(), TrackingError> {
        Ok(())
    }

    async fn end_run(&self, status: RunStatus) -> Result<(), TrackingError> {
        let run = self.run.lock().take().ok_or(TrackingError::NoActiveRun)?;
        tracing::debug!(run = %run, %status, "Run ended");
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// The tracker for a run: MLflow when enabled, otherwise the no-op tracker.
#[cfg(feature = "mlflow")]
pub fn tracker_for(settings: &MlflowSettings, enabled: bool) -> Box<dyn Tracker> {
    if enabled {
        Box::new(MlflowTracker::new(&settings.tracking_uri))
    } else {
        Box::new(NoopTracker::new())
    }
}

/// Built without MLflow support: always the no-op tracker.
#[cfg(not(feature = "mlflow"))]
pub fn tracker_for(settings: &MlflowSettings, enabled: bool) -> Box<dyn Tracker> {
    if enabled {
        tracing::warn!(uri = %settings.tracking_uri, "Built without MLflow support, tracking disabled");
    }
    Box::new(NoopTracker::new())
}

/// Files under `dir`, recursively, paired with their `/`-joined path
/// relative to `dir`. Sorted for stable upload order.
#[cfg_attr(not(feature = "mlflow"), allow(dead_code))]
pub(crate) fn collect_files(dir: &Path) -> Result<Vec<(PathBuf, String)>, TrackingError> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, String)>) -> Result<(), TrackingError> {
        let io_err = |source| TrackingError::Io {
            path: dir.to_path_buf(),
            source,
        };
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_dir() {
                walk(root, &path, out)?;
            } else if let Ok(rel) = path.strip_prefix(root) {
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push((path.clone(), rel));
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_tracker_lifecycle() {
        let tracker = NoopTracker::new();
        assert!(matches!(
            tracker.end_run(RunStatus::Finished).await,
            Err(TrackingError::NoActiveRun)
        ));

        let run_id = tracker.start_run("lexic-evaluation", "qualification_20260101_120000").await.unwrap();
        assert_eq!(run_id, "qualification_20260101_120000");
        tracker.log_param("step", "qualification").await.unwrap();
        tracker
            .log_metrics(&[("mean_overall_score".to_string(), 3.5)])
            .await
            .unwrap();
        tracker.end_run(RunStatus::Failed).await.unwrap();
    }

    #[test]
    fn test_run_status_names() {
        assert_eq!(RunStatus::Finished.to_string(), "FINISHED");
        assert_eq!(RunStatus::Failed.as_str(), "FAILED");
    }

    #[test]
    fn test_collect_files_is_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("summary.md"), "s").unwrap();
        std::fs::write(dir.path().join("sub/case_001_pl_evaluation.md"), "e").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        assert_eq!(names, vec!["sub/case_001_pl_evaluation.md", "summary.md"]);
    }

    #[test]
    fn test_tracker_for_disabled_is_noop() {
        let tracker = tracker_for(&MlflowSettings::default(), false);
        assert_eq!(tracker.name(), "noop");
    }
}
