//! API router configuration.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the service router.
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Ingestion
        .route("/channels/:channel/ingest", post(handlers::ingest_channel))
        .route("/evidence", post(handlers::ingest_direct))
        .route("/evidence", get(handlers::list_evidence))
        // Evidence lifecycle
        .route("/evidence/:id", get(handlers::get_evidence))
        .route("/evidence/:id", patch(handlers::update_evidence))
        .route("/evidence/:id/ingest", post(handlers::ingest_existing))
        .route("/evidence/:id/seal", post(handlers::seal_evidence))
        .route("/evidence/:id/reject", post(handlers::reject_evidence))
        .route("/evidence/:id/resume", post(handlers::resume_evidence))
        .route(
            "/evidence/:id/supersede",
            post(handlers::supersede_evidence),
        )
        // Audit and lineage
        .route("/evidence/:id/audit", get(handlers::evidence_audit))
        .route("/evidence/:id/lineage", get(handlers::evidence_lineage))
        .route(
            "/evidence/:id/decisions",
            get(handlers::evidence_decisions),
        )
        // Mapping gate
        .route("/gate/evaluate", post(handlers::evaluate))
        // Parity
        .route("/parity/verify", post(handlers::parity_verify));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use gate_rules::RuleSet;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::new(RuleSet::v1()).unwrap(), true)
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-tenant-id", "t-1")
            .header("x-actor-id", "tester")
            .header("content-type", "application/json");
        match body {
            Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn manual_input() -> Value {
        json!({
            "metadata": {
                "upstream_system": "internal manual",
                "dataset_type": "PARTNER_MASTER",
                "declared_scope": "WHOLE_ORGANIZATION",
                "primary_intent": "register a new supplier record",
                "purpose_tags": ["onboarding"],
                "contains_personal_data": false,
                "retention_policy": "STANDARD"
            },
            "payload": {"mode": "structured", "value": {"partner": "ACME"}},
            "entry_notes": "typed in from the signed supplier declaration"
        })
    }

    #[tokio::test]
    async fn health_reports_rule_version() {
        let app = app();
        let (status, body) = send(&app, request("GET", "/api/v1/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rule_version"], "gate-rules/v1");
    }

    #[tokio::test]
    async fn manual_ingest_then_seal_then_update_conflicts() {
        let app = app();

        let (status, receipt) = send(
            &app,
            request("POST", "/api/v1/channels/MANUAL/ingest", Some(manual_input())),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {receipt}");
        let id = receipt["evidence_id"].as_str().unwrap().to_string();
        assert_eq!(receipt["payload_hash"].as_str().unwrap().len(), 64);

        let (status, _) = send(
            &app,
            request("POST", &format!("/api/v1/evidence/{id}/seal"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, error) = send(
            &app,
            request(
                "PATCH",
                &format!("/api/v1/evidence/{id}"),
                Some(json!({"primary_intent": "changed after sealing"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error_code"], "IMMUTABLE_RECORD");
        assert!(error["request_id"].as_str().unwrap().starts_with("req-"));
    }

    #[tokio::test]
    async fn supersession_successor_is_ingestable_and_sealable_via_api() {
        let app = app();

        let (status, receipt) = send(
            &app,
            request("POST", "/api/v1/channels/MANUAL/ingest", Some(manual_input())),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {receipt}");
        let id = receipt["evidence_id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &app,
            request("POST", &format!("/api/v1/evidence/{id}/seal"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let successor_request = json!({
            "capture_channel": "MANUAL",
            "metadata": manual_input()["metadata"],
            "payload": {"mode": "structured", "value": {"partner": "ACME", "country": "DE"}}
        });
        let (status, body) = send(
            &app,
            request(
                "POST",
                &format!("/api/v1/evidence/{id}/supersede"),
                Some(json!({"successor": successor_request, "reason": "corrected figures"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        let successor_id = body["successor"]["evidence_id"].as_str().unwrap().to_string();
        assert_eq!(body["successor"]["state"], "DRAFT");

        let (status, ingested) = send(
            &app,
            request(
                "POST",
                &format!("/api/v1/evidence/{successor_id}/ingest"),
                Some(json!({
                    "payload": {"mode": "structured", "value": {"partner": "ACME", "country": "DE"}}
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {ingested}");
        assert_eq!(ingested["state"], "INGESTED");
        assert_eq!(ingested["payload_hash"].as_str().unwrap().len(), 64);

        let (status, sealed) = send(
            &app,
            request("POST", &format!("/api/v1/evidence/{successor_id}/seal"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sealed["state"], "SEALED");
    }

    #[tokio::test]
    async fn portal_ingest_without_token_is_held_not_dropped() {
        let app = app();
        let mut input = manual_input();
        input["entry_notes"] = Value::Null;

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/api/v1/channels/SUPPLIER_PORTAL/ingest",
                Some(input),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED, "body: {body}");
        assert_eq!(body["error_code"], "MISSING_PORTAL_CONTEXT");

        let id = body["evidence_id"].as_str().unwrap();
        let (status, held) = send(
            &app,
            request("GET", &format!("/api/v1/evidence/{id}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(held["state"], "QUARANTINED");
    }

    #[tokio::test]
    async fn missing_tenant_header_is_a_bad_request() {
        let app = app();
        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/evidence")
            .header("x-actor-id", "tester")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blocked_evaluation_is_returned_with_reasons() {
        let app = app();
        let (status, decision) = send(
            &app,
            request(
                "POST",
                "/api/v1/gate/evaluate",
                Some(json!({
                    "snapshot": {
                        "entity_id": "partner-9",
                        "entity_type": "BUSINESS_PARTNER",
                        "schema_version": "v1",
                        "attributes": {
                            "legal_name": "Acme Steel GmbH",
                            "primary_contact": "ops@acme.example"
                        }
                    },
                    "frameworks": ["CBAM"]
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body: {decision}");
        assert_eq!(decision["status"], "BLOCKED");
        assert!(decision["blocking_reasons"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["message"].as_str().unwrap().contains("country")));
    }
}
