//! MLflow tracking over the REST API 2.0.
//!
//! Artifacts go through the tracking server's artifact proxy
//! (`mlflow-artifacts`), so the server must run with artifact serving
//! enabled (the default since MLflow 2.0).

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::path::Path;

use super::{collect_files, RunStatus, Tracker, TrackingError};

const API_PREFIX: &str = "api/2.0/mlflow";
const ARTIFACTS_PREFIX: &str = "api/2.0/mlflow-artifacts/artifacts";

#[derive(Debug, Clone)]
struct ActiveRun {
    experiment_id: String,
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Debug, Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: RunData,
}

#[derive(Debug, Deserialize)]
struct RunData {
    info: RunInfo,
}

#[derive(Debug, Deserialize)]
struct RunInfo {
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct MlflowErrorBody {
    #[serde(default)]
    error_code: String,
    message: String,
}

/// MLflow tracking server client.
pub struct MlflowTracker {
    base_url: String,
    client: reqwest::Client,
    active: Mutex<Option<ActiveRun>>,
}

impl std::fmt::Debug for MlflowTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlflowTracker")
            .field("base_url", &self.base_url)
            .field("active", &self.active.lock().as_ref().map(|r| r.run_id.clone()))
            .finish()
    }
}

impl MlflowTracker {
    pub fn new(tracking_uri: &str) -> Self {
        Self {
            base_url: tracking_uri.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            active: Mutex::new(None),
        }
    }

    /// Id of the run in progress, if any.
    pub fn active_run_id(&self) -> Option<String> {
        self.active.lock().as_ref().map(|run| run.run_id.clone())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }

    fn current(&self) -> Result<ActiveRun, TrackingError> {
        self.active.lock().clone().ok_or(TrackingError::NoActiveRun)
    }

    async fn post(&self, path: &str, body: JsonValue) -> Result<JsonValue, TrackingError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| TrackingError::Http(e.to_string()))?;
        read_json(response).await
    }

    async fn experiment_id(&self, name: &str) -> Result<String, TrackingError> {
        let response = self
            .client
            .get(self.endpoint("experiments/get-by-name"))
            .query(&[("experiment_name", name)])
            .send()
            .await
            .map_err(|e| TrackingError::Http(e.to_string()))?;

        if response.status() != reqwest::StatusCode::NOT_FOUND {
            let found: GetExperimentResponse = decode(read_json(response).await?)?;
            return Ok(found.experiment.experiment_id);
        }

        tracing::info!(experiment = name, "Creating MLflow experiment");
        let created: CreateExperimentResponse =
            decode(self.post("experiments/create", json!({ "name": name })).await?)?;
        Ok(created.experiment_id)
    }
}

async fn read_json(response: reqwest::Response) -> Result<JsonValue, TrackingError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| TrackingError::Http(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<MlflowErrorBody>(&text)
            .map(|e| {
                if e.error_code.is_empty() {
                    e.message
                } else {
                    format!("{}: {}", e.error_code, e.message)
                }
            })
            .unwrap_or_else(|_| text.trim().to_string());
        return Err(TrackingError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if text.trim().is_empty() {
        return Ok(JsonValue::Object(Default::default()));
    }
    serde_json::from_str(&text).map_err(|e| TrackingError::Decode(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(value: JsonValue) -> Result<T, TrackingError> {
    serde_json::from_value(value).map_err(|e| TrackingError::Decode(e.to_string()))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl Tracker for MlflowTracker {
    async fn start_run(&self, experiment: &str, run_name: &str) -> Result<String, TrackingError> {
        let experiment_id = self.experiment_id(experiment).await?;
        let created: CreateRunResponse = decode(
            self.post(
                "runs/create",
                json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": now_millis(),
                    "tags": [{ "key": "mlflow.runName", "value": run_name }],
                }),
            )
            .await?,
        )?;

        let run_id = created.run.info.run_id;
        tracing::info!(experiment, run_name, run_id = %run_id, "MLflow run started");
        *self.active.lock() = Some(ActiveRun {
            experiment_id,
            run_id: run_id.clone(),
        });
        Ok(run_id)
    }

    async fn log_param(&self, key: &str, value: &str) -> Result<(), TrackingError> {
        let run = self.current()?;
        self.post(
            "runs/log-parameter",
            json!({ "run_id": run.run_id, "key": key, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn log_metric(&self, key: &str, value: f64) -> Result<(), TrackingError> {
        let run = self.current()?;
        self.post(
            "runs/log-metric",
            json!({
                "run_id": run.run_id,
                "key": key,
                "value": value,
                "timestamp": now_millis(),
                "step": 0,
            }),
        )
        .await?;
        Ok(())
    }

    async fn log_artifacts(&self, dir: &Path, artifact_path: &str) -> Result<(), TrackingError> {
        let run = self.current()?;
        let prefix = artifact_path.trim_matches('/');

        let files = collect_files(dir)?;
        for (path, rel) in &files {
            let body = tokio::fs::read(path).await.map_err(|source| TrackingError::Io {
                path: path.clone(),
                source,
            })?;
            let target = if prefix.is_empty() {
                rel.clone()
            } else {
                format!("{}/{}", prefix, rel)
            };
            let url = format!(
                "{}/{}/{}/{}/artifacts/{}",
                self.base_url, ARTIFACTS_PREFIX, run.experiment_id, run.run_id, target
            );
            let response = self
                .client
                .put(url)
                .body(body)
                .send()
                .await
                .map_err(|e| TrackingError::Http(e.to_string()))?;
            read_json(response).await?;
            tracing::debug!(artifact = %target, "Uploaded artifact");
        }

        tracing::info!(run_id = %run.run_id, files = files.len(), artifact_path, "Artifacts logged");
        Ok(())
    }

    async fn end_run(&self, status: RunStatus) -> Result<(), TrackingError> {
        let run = self.current()?;
        self.post(
            "runs/update",
            json!({
                "run_id": run.run_id,
                "status": status.as_str(),
                "end_time": now_millis(),
            }),
        )
        .await?;
        *self.active.lock() = None;
        tracing::info!(run_id = %run.run_id, %status, "MLflow run ended");
        Ok(())
    }

    fn name(&self) -> &str {
        "mlflow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let tracker = MlflowTracker::new("http://localhost:5000/");
        assert_eq!(
            tracker.endpoint("runs/create"),
            "http://localhost:5000/api/2.0/mlflow/runs/create"
        );
    }

    #[tokio::test]
    async fn test_logging_without_run_fails() {
        let tracker = MlflowTracker::new("http://localhost:5000");
        assert!(tracker.active_run_id().is_none());
        assert!(matches!(
            tracker.log_metric("mean_overall_score", 3.0).await,
            Err(TrackingError::NoActiveRun)
        ));
        assert!(matches!(
            tracker.end_run(RunStatus::Finished).await,
            Err(TrackingError::NoActiveRun)
        ));
    }
}
