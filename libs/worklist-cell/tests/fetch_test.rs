use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use worklist_cell::services::WorklistService;
use worklist_cell::WorklistError;

fn test_config(engine_url: &str) -> AppConfig {
    AppConfig {
        engine_url: engine_url.to_string(),
        engine_api_key: "test-api-key".to_string(),
        request_timeout_seconds: 5,
    }
}

fn worklist_record(patient_id: Uuid, step_code: &str) -> serde_json::Value {
    json!({
        "patient_id": patient_id,
        "episode_id": Uuid::new_v4(),
        "patient_name": "Test Patient",
        "stage": "treatment",
        "next_step_label": "Control visit",
        "step_code": step_code,
        "step_sequence": 1,
        "pool": "control",
        "duration_minutes": 20,
        "window_start": "2025-03-01T08:00:00Z",
        "window_end": "2025-03-10T17:00:00Z",
        "blocking": null,
        "requires_precommit": false,
        "forecast": null,
        "booked_appointment": null
    })
}

#[tokio::test]
async fn fetch_computes_overdue_from_server_timestamp() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/v1/worklist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "server_time": "2025-03-13T09:00:00Z",
            "items": [worklist_record(patient_id, "C30")]
        })))
        .mount(&mock_server)
        .await;

    let service = WorklistService::new(&test_config(&mock_server.uri()));
    let items = service.fetch_worklist(None, "test-token").await.expect("fetch failed");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].overdue_by_days, 3);
}

#[tokio::test]
async fn fetch_scopes_to_one_patient() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/v1/worklist"))
        .and(query_param("patient_id", patient_id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "server_time": "2025-03-01T09:00:00Z",
            "items": [worklist_record(patient_id, "C30")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = WorklistService::new(&test_config(&mock_server.uri()));
    let items = service
        .fetch_worklist(Some(patient_id), "test-token")
        .await
        .expect("fetch failed");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].patient_id, patient_id);
}

#[tokio::test]
async fn malformed_fetch_response_is_a_contract_violation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/worklist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&mock_server)
        .await;

    let service = WorklistService::new(&test_config(&mock_server.uri()));
    let result = service.fetch_worklist(None, "test-token").await;

    assert_matches!(result, Err(WorklistError::MalformedResponse(_)));
}

#[tokio::test]
async fn assign_pathway_posts_to_the_engine() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let pathway_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path(format!("/api/v1/patients/{}/pathway", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "patient_id": patient_id,
            "episode_id": null,
            "pathway_id": pathway_id,
            "assigned_at": "2025-03-01T09:00:00Z"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = WorklistService::new(&test_config(&mock_server.uri()));
    let assignment = service
        .assign_pathway(patient_id, None, "test-token")
        .await
        .expect("assignment failed");

    assert_eq!(assignment.pathway_id, pathway_id);
    assert_eq!(assignment.patient_id, patient_id);
}
