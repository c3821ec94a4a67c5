// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process router tests.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use ratelane_api::{AppState, AuthConfig, HealthState, build_router};
use ratelane_config::RatelaneConfig;
use ratelane_core::Adapter;
use ratelane_pipeline::Pipeline;
use ratelane_test_utils::{MockGateway, TestStorage};
use tower::ServiceExt;

const BODY_LIMIT: usize = 1_048_576;

struct TestApp {
    env: TestStorage,
    pipeline: Pipeline,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        Self::with(|_| {}, None, None).await
    }

    async fn with(
        tweak: impl FnOnce(&mut RatelaneConfig),
        bearer_token: Option<&str>,
        prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    ) -> Self {
        let env = TestStorage::new().await.unwrap();
        let mut config = RatelaneConfig::default();
        tweak(&mut config);
        let gateway = Arc::new(MockGateway::new());
        let pipeline = Pipeline::build(
            &config,
            env.storage.clone(),
            env.storage.clone(),
            env.counters.clone(),
            gateway.clone(),
        )
        .unwrap();

        let components = vec![
            env.storage.clone() as Arc<dyn Adapter>,
            env.counters.clone() as Arc<dyn Adapter>,
            gateway as Arc<dyn Adapter>,
        ];
        let state = AppState {
            records: env.storage.clone(),
            dispatcher: pipeline.dispatcher.clone(),
            results: pipeline.results.clone(),
            auth: AuthConfig {
                bearer_token: bearer_token.map(str::to_string),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render,
                components,
            },
        };
        Self {
            env,
            pipeline,
            router: build_router(state),
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn drain(&self) {
        loop {
            let processed = self.pipeline.workers.process_next().await.unwrap();
            let aggregated = self.pipeline.workers.aggregate_next().await.unwrap();
            if !processed && !aggregated {
                break;
            }
        }
    }
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

async fn text_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn queue_registration_round_trip_redacts_keys() {
    let app = TestApp::new().await;
    let response = app
        .post_json(
            "/queue/create",
            serde_json::json!({
                "queue_id": "support",
                "providers": [{
                    "provider_name": "primary",
                    "provider_type": "azure",
                    "api_key": "sk-very-secret",
                    "config": {"model": "gpt-4o", "azure_api_version": "2024-05-01-preview"}
                }]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.get("/queue/support").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let provider = &body["data"]["providers"][0];
    assert_eq!(provider["provider_type"], "azure");
    assert_eq!(provider["limit"], 1000);
    assert_eq!(provider["config"]["api_version"], "2024-05-01-preview");
    assert!(!body.to_string().contains("sk-very-secret"));

    let duplicate = app
        .post_json(
            "/queue/create",
            serde_json::json!({
                "queue_id": "support",
                "providers": [{"provider_name": "p", "provider_type": "openai", "api_key": "k"}]
            }),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let no_providers = app
        .post_json(
            "/queue/create",
            serde_json::json!({"queue_id": "empty", "providers": []}),
        )
        .await;
    assert_eq!(no_providers.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unregistered_queue_requires_registration() {
    let app = TestApp::new().await;
    let response = app
        .post_json(
            "/message/create",
            serde_json::json!({"queue_id": "nope", "prompt": "hello"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["registration_required"], true);
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn single_message_flows_to_json_and_csv_results() {
    let app = TestApp::new().await;
    app.env.register_queue("q1", "openai").await.unwrap();

    let response = app
        .post_json(
            "/message/create",
            serde_json::json!({"queue_id": "q1", "prompt": "hello", "supportive_variable": {"row": 1}}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["success"], true);
    let batch_id = created["batch_id"].as_str().unwrap().to_string();
    let message_id = created["message_id"].as_str().unwrap().to_string();

    let pending = app.get(&format!("/batch/{batch_id}/results")).await;
    assert_eq!(pending.status(), StatusCode::NOT_FOUND);

    let message = json_body(app.get(&format!("/message/read/{message_id}")).await).await;
    assert_eq!(message["data"]["status"], "pending");
    assert_eq!(message["data"]["supportive_variable"]["row"], 1);

    app.drain().await;

    let first = json_body(app.get(&format!("/batch/{batch_id}/results")).await).await;
    let data = &first["data"];
    assert_eq!(data["request_count"], 1);
    assert_eq!(data["response_count"], 1);
    assert_eq!(data["status"], "completed");
    assert_eq!(data["results"].as_array().unwrap().len(), 1);
    assert_eq!(data["results"][0]["status"], "completed");

    let second = json_body(app.get(&format!("/batch/{batch_id}/results?format=json")).await).await;
    assert_eq!(first, second);

    let csv = app
        .get(&format!("/batch/{batch_id}/results?format=csv"))
        .await;
    assert_eq!(csv.status(), StatusCode::OK);
    assert_eq!(
        csv.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=batch_{batch_id}.csv").as_str()
    );
    let text = text_body(csv).await;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "message_id,status,prompt,result,error_message");
    assert_eq!(lines[1], format!("{message_id},completed,hello,mock response,"));
    assert_eq!(lines.len(), 2);

    let bad_format = app
        .get(&format!("/batch/{batch_id}/results?format=xml"))
        .await;
    assert_eq!(bad_format.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_submission_and_inspection() {
    let app = TestApp::new().await;
    app.env.register_queue("q1", "openai").await.unwrap();

    let response = app
        .post_json(
            "/message/create",
            serde_json::json!({
                "queue_id": "q1",
                "messages": [
                    {"prompt": "a"},
                    {"prompt": "b", "system_prompt": "terse"},
                    {"prompt": "c"}
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["message_count"], 3);
    assert_eq!(created["message_ids"].as_array().unwrap().len(), 3);
    let batch_id = created["batch_id"].as_str().unwrap().to_string();

    let batch = json_body(app.get(&format!("/batch/{batch_id}")).await).await;
    assert_eq!(batch["data"]["request_count"], 3);
    assert_eq!(batch["data"]["status"], "processing");
    assert_eq!(batch["data"]["counters"]["response_count"], 0);
    assert_eq!(batch["data"]["completion_percentage"], 0.0);

    let messages = json_body(app.get(&format!("/batch/{batch_id}/messages")).await).await;
    let prompts: Vec<&str> = messages["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["prompt"].as_str().unwrap())
        .collect();
    assert_eq!(prompts, vec!["a", "b", "c"]);

    app.drain().await;
    let batch = json_body(app.get(&format!("/batch/{batch_id}")).await).await;
    assert_eq!(batch["data"]["status"], "completed");
    assert_eq!(batch["data"]["completion_percentage"], 100.0);

    assert_eq!(
        app.get("/batch/unknown").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/message/read/unknown").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn invalid_submissions_are_bad_requests() {
    let app = TestApp::with(|c| c.dispatch.max_batch_size = 2, None, None).await;
    app.env.register_queue("q1", "openai").await.unwrap();

    let oversized = app
        .post_json(
            "/message/create",
            serde_json::json!({
                "queue_id": "q1",
                "messages": [{"prompt": "a"}, {"prompt": "b"}, {"prompt": "c"}]
            }),
        )
        .await;
    assert_eq!(oversized.status(), StatusCode::BAD_REQUEST);

    let empty_prompt = app
        .post_json(
            "/message/create",
            serde_json::json!({"queue_id": "q1", "prompt": ""}),
        )
        .await;
    assert_eq!(empty_prompt.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .send(
            Request::post("/message/create")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(malformed).await["success"], false);
}

#[tokio::test]
async fn bearer_token_guards_api_but_not_health() {
    let app = TestApp::with(|_| {}, Some("s3cret"), None).await;

    let health = app.get("/health").await;
    assert_eq!(health.status(), StatusCode::OK);
    let body = json_body(health).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"].as_object().unwrap().len(), 3);

    assert_eq!(
        app.get("/queue/anything").await.status(),
        StatusCode::UNAUTHORIZED
    );

    let authorized = app
        .send(
            Request::get("/queue/anything")
                .header(header::AUTHORIZATION, "Bearer s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(authorized.status(), StatusCode::NOT_FOUND);

    let wrong = app
        .send(
            Request::get("/queue/anything")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn metrics_endpoint_follows_configuration() {
    let disabled = TestApp::new().await;
    assert_eq!(disabled.get("/metrics").await.status(), StatusCode::NOT_FOUND);

    let render: Arc<dyn Fn() -> String + Send + Sync> =
        Arc::new(|| "ratelane_batches_dispatched_total 4\n".to_string());
    let enabled = TestApp::with(|_| {}, Some("token"), Some(render)).await;
    let response = enabled.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        text_body(response)
            .await
            .contains("ratelane_batches_dispatched_total")
    );
}
