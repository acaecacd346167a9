use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::services::{ForecastService, SlotSelectionService};
use scheduling_cell::{SchedulingError, SlotQuery};
use shared_config::AppConfig;
use worklist_cell::Pool;

fn test_config(engine_url: &str) -> AppConfig {
    AppConfig {
        engine_url: engine_url.to_string(),
        engine_api_key: "test-api-key".to_string(),
        request_timeout_seconds: 5,
    }
}

fn slot_json(start: &str) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "start_time": start,
        "duration_minutes": 20,
        "pool": "control",
        "provider_id": Uuid::new_v4(),
        "provider_name": "Dr. Vos"
    })
}

fn control_query() -> SlotQuery {
    SlotQuery {
        pool: Pool::Control,
        duration_minutes: 20,
        window_start: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).single().expect("valid"),
        window_end: Utc.with_ymd_and_hms(2025, 3, 21, 0, 0, 0).single().expect("valid"),
        provider_id: None,
    }
}

#[tokio::test]
async fn slots_group_by_day_ascending() {
    let mock_server = MockServer::start().await;

    // Days arrive interleaved; grouping must still come out day-ascending.
    Mock::given(method("GET"))
        .and(path("/api/v1/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "slots": [
                slot_json("2025-03-12T09:00:00Z"),
                slot_json("2025-03-11T10:00:00Z"),
                slot_json("2025-03-12T14:00:00Z"),
                slot_json("2025-03-11T08:30:00Z"),
            ]
        })))
        .mount(&mock_server)
        .await;

    let service = SlotSelectionService::new(&test_config(&mock_server.uri()));
    let days = service
        .query_slots(&control_query(), "test-token")
        .await
        .expect("query failed");

    assert_eq!(days.len(), 2);
    assert_eq!(days[0].day, NaiveDate::from_ymd_opt(2025, 3, 11).expect("valid date"));
    assert_eq!(days[1].day, NaiveDate::from_ymd_opt(2025, 3, 12).expect("valid date"));
}

#[tokio::test]
async fn within_day_order_is_taken_from_the_engine_as_is() {
    let mock_server = MockServer::start().await;

    // The 10:00 slot precedes the 08:30 slot on the wire. The engine's
    // in-day ordering is a trusted upstream contract, so it must survive
    // grouping untouched.
    Mock::given(method("GET"))
        .and(path("/api/v1/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "slots": [
                slot_json("2025-03-11T10:00:00Z"),
                slot_json("2025-03-11T08:30:00Z"),
            ]
        })))
        .mount(&mock_server)
        .await;

    let service = SlotSelectionService::new(&test_config(&mock_server.uri()));
    let days = service
        .query_slots(&control_query(), "test-token")
        .await
        .expect("query failed");

    assert_eq!(days.len(), 1);
    let starts: Vec<_> = days[0].slots.iter().map(|s| s.start_time).collect();
    assert!(starts[0] > starts[1], "engine order must be preserved");
}

#[tokio::test]
async fn consecutive_queries_over_unchanged_window_are_identical() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "slots": [
                slot_json("2025-03-11T08:30:00Z"),
                slot_json("2025-03-11T10:00:00Z"),
                slot_json("2025-03-13T09:00:00Z"),
            ]
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let service = SlotSelectionService::new(&test_config(&mock_server.uri()));
    let query = control_query();

    let first = service.query_slots(&query, "test-token").await.expect("query failed");
    let second = service.query_slots(&query, "test-token").await.expect("query failed");

    assert_eq!(first, second);
}

#[tokio::test]
async fn provider_filter_is_forwarded() {
    let mock_server = MockServer::start().await;
    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/v1/slots"))
        .and(query_param("provider_id", provider_id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "slots": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = SlotSelectionService::new(&test_config(&mock_server.uri()));
    let mut query = control_query();
    query.provider_id = Some(provider_id);

    let days = service.query_slots(&query, "test-token").await.expect("query failed");
    assert!(days.is_empty());
}

#[tokio::test]
async fn week_demand_uses_iso_week_keys() {
    let mock_server = MockServer::start().await;

    // 2025-03-13 falls in ISO week 11 of 2025.
    Mock::given(method("GET"))
        .and(path("/api/v1/slots/forecast"))
        .and(query_param("year", "2025"))
        .and(query_param("week", "11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "iso_year": 2025,
            "iso_week": 11,
            "expected_bookings": 42
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = ForecastService::new(&test_config(&mock_server.uri()));
    let demand = service
        .demand_for_week(
            NaiveDate::from_ymd_opt(2025, 3, 13).expect("valid date"),
            "test-token",
        )
        .await
        .expect("forecast failed");

    assert_eq!(demand.iso_week, 11);
    assert_eq!(demand.expected_bookings, 42);
}

#[tokio::test]
async fn engine_fault_surfaces_as_engine_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/slots"))
        .respond_with(ResponseTemplate::new(500).set_body_string("engine down"))
        .mount(&mock_server)
        .await;

    let service = SlotSelectionService::new(&test_config(&mock_server.uri()));
    let result = service.query_slots(&control_query(), "test-token").await;

    assert_matches!(result, Err(SchedulingError::EngineError(_)));
}
