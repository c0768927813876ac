//! Integration tests for MlflowTracker against a mocked tracking server.
//!
//! Covers experiment lookup and creation, run lifecycle, parameter and
//! metric logging, artifact upload paths and API error mapping.

#![cfg(feature = "mlflow")]

use lexic_runtime::tracking::MlflowTracker;
use lexic_runtime::{RunStatus, Tracker, TrackingError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_run_create(server: &MockServer, experiment_id: &str, run_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/2.0/mlflow/runs/create"))
        .and(body_partial_json(json!({
            "experiment_id": experiment_id,
            "run_name": "qualification_20260101_120000"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "run": { "info": { "run_id": run_id, "experiment_id": experiment_id } }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_creates_missing_experiment() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/mlflow/experiments/get-by-name"))
        .and(query_param("experiment_name", "lexic-evaluation"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "RESOURCE_DOES_NOT_EXIST",
            "message": "Could not find experiment with name 'lexic-evaluation'"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/mlflow/experiments/create"))
        .and(body_partial_json(json!({ "name": "lexic-evaluation" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "experiment_id": "7" })))
        .expect(1)
        .mount(&server)
        .await;

    mount_run_create(&server, "7", "run-abc").await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/mlflow/runs/log-parameter"))
        .and(body_partial_json(json!({
            "run_id": "run-abc",
            "key": "step",
            "value": "qualification"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/mlflow/runs/log-metric"))
        .and(body_partial_json(json!({ "run_id": "run-abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(
            "/api/2.0/mlflow-artifacts/artifacts/7/run-abc/artifacts/evaluation_results/summary.md",
        ))
        .and(body_string("# Summary"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(
            "/api/2.0/mlflow-artifacts/artifacts/7/run-abc/artifacts/evaluation_results/case_001_pl/evaluation.md",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/mlflow/runs/update"))
        .and(body_partial_json(json!({ "run_id": "run-abc", "status": "FINISHED" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let results = tempfile::tempdir().unwrap();
    std::fs::write(results.path().join("summary.md"), "# Summary").unwrap();
    std::fs::create_dir_all(results.path().join("case_001_pl")).unwrap();
    std::fs::write(results.path().join("case_001_pl/evaluation.md"), "score").unwrap();

    let tracker = MlflowTracker::new(&server.uri());
    let run_id = tracker
        .start_run("lexic-evaluation", "qualification_20260101_120000")
        .await
        .expect("start_run failed");
    assert_eq!(run_id, "run-abc");
    assert_eq!(tracker.active_run_id().as_deref(), Some("run-abc"));

    tracker.log_param("step", "qualification").await.unwrap();
    tracker
        .log_metrics(&[
            ("mean_overall_score".to_string(), 3.5),
            ("total_errors".to_string(), 0.0),
        ])
        .await
        .unwrap();
    tracker
        .log_artifacts(results.path(), "evaluation_results")
        .await
        .unwrap();
    tracker.end_run(RunStatus::Finished).await.unwrap();

    assert!(tracker.active_run_id().is_none());
}

#[tokio::test]
async fn test_existing_experiment_is_reused() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/mlflow/experiments/get-by-name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "experiment": { "experiment_id": "3", "name": "lexic-evaluation" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/mlflow/experiments/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "experiment_id": "99" })))
        .expect(0)
        .mount(&server)
        .await;

    mount_run_create(&server, "3", "run-xyz").await;

    let tracker = MlflowTracker::new(&server.uri());
    let run_id = tracker
        .start_run("lexic-evaluation", "qualification_20260101_120000")
        .await
        .unwrap();
    assert_eq!(run_id, "run-xyz");
}

#[tokio::test]
async fn test_api_error_is_mapped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/mlflow/experiments/get-by-name"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error_code": "PERMISSION_DENIED",
            "message": "User cannot read experiment"
        })))
        .mount(&server)
        .await;

    let tracker = MlflowTracker::new(&server.uri());
    let err = tracker
        .start_run("lexic-evaluation", "qualification_20260101_120000")
        .await
        .unwrap_err();

    match err {
        TrackingError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "PERMISSION_DENIED: User cannot read experiment");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
    assert!(tracker.active_run_id().is_none());
}
