use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use genoplan::agent::ResearchAgent;
use genoplan::config::{ArticlesConfig, Config};
use genoplan::models::{HealthMetrics, Marker, Scalar};
use genoplan::server::{router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn shipped_prompts() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("prompts")
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "resp",
        "output": [{
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "output_text", "text": text, "annotations": [] }]
        }]
    }))
}

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.llm.base_url = format!("{}/v1", server.uri());
    config.llm.api_key = Some("sk-test".to_string());
    config.auth.password = Some("letmein".to_string());
    config.prompts.dir = shipped_prompts();
    config.articles = ArticlesConfig {
        training: (1..=4)
            .map(|i| format!("{}/guide/{}", server.uri(), i))
            .collect(),
        recovery: vec![
            format!("{}/hrv/ok", server.uri()),
            format!("{}/hrv/missing", server.uri()),
        ],
    };
    config
}

/// Files listing with two adrb2 studies (one duplicated) and an unrelated one.
async fn mount_provider(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                { "id": "file-1", "filename": "ADRB2_sprint_trial.pdf", "purpose": "user_data" },
                { "id": "file-x", "filename": "actn3_power.pdf", "purpose": "user_data" },
                { "id": "file-2", "filename": "adrb2_endurance_cohort.pdf", "purpose": "user_data" },
                { "id": "file-3", "filename": "ADRB2_sprint_trial.pdf", "purpose": "user_data" }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_string_contains("\"file_id\":\"file-1\""))
        .respond_with(reply("Summary A"))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_string_contains("\"file_id\":\"file-2\""))
        .respond_with(reply("Summary B"))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(reply("FINAL TEXT"))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn mount_articles(server: &MockServer, expected_guides: u64) {
    for i in 1..=4 {
        Mock::given(method("GET"))
            .and(path(format!("/guide/{}", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body><p>Guide {}</p></body></html>", i)),
            )
            .expect(expected_guides)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/hrv/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Low HRV means rest</p>"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hrv/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

async fn final_prompt_body(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    let last = requests
        .iter()
        .filter(|r| r.url.path() == "/v1/responses")
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .filter(|body| !body.contains("input_file"))
        .last()
        .expect("a text-only model call");
    let json: Value = serde_json::from_str(&last).unwrap();
    json["input"][0]["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn plan_for_adrb2_runs_full_pipeline() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    mount_articles(&server, 1).await;

    let agent = ResearchAgent::from_config(&config_for(&server)).unwrap();
    let result = agent
        .build_training_plan("finish hyrox in under 90 minutes", Marker::Adrb2)
        .await
        .unwrap();

    assert_eq!(result.plan, "FINAL TEXT");
    assert_eq!(result.research_report, "Summary A\n\nSummary B");

    let model_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/v1/responses")
        .count();
    assert_eq!(model_calls, 3);

    let prompt = final_prompt_body(&server).await;
    assert!(prompt.contains("finish hyrox in under 90 minutes"));
    assert!(prompt.contains("Summary A\n\nSummary B"));
    assert!(prompt.contains("Guide 1\n\nGuide 2\n\nGuide 3\n\nGuide 4\n\n"));
    assert!(prompt.contains("adrb2"));
}

#[tokio::test]
async fn daily_workout_degrades_failed_articles() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    mount_articles(&server, 0).await;

    let agent = ResearchAgent::from_config(&config_for(&server)).unwrap();
    let metrics = HealthMetrics {
        hrv: Some(Scalar::from("41")),
        resting_heart_rate: None,
        hours_of_sleep: Some(serde_json::from_str("6").unwrap()),
    };
    let workout = agent
        .generate_daily_workout("Week 4: intervals", "4", "Friday", &metrics)
        .await
        .unwrap();
    assert_eq!(workout, "FINAL TEXT");

    let prompt = final_prompt_body(&server).await;
    assert!(prompt.contains("Low HRV means rest\n\n"));
    assert!(prompt.contains(&format!("EMPTY WEBPAGE FROM {}/hrv/missing", server.uri())));
    assert!(prompt.contains("## Current Health Metrics:\n- HRV: 41ms\n- Hours of Sleep: 6 hours\n"));
    assert!(!prompt.contains("Resting Heart Rate"));
}

#[tokio::test]
async fn http_plan_request_end_to_end() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    mount_articles(&server, 1).await;

    let config = config_for(&server);
    let agent = Arc::new(ResearchAgent::from_config(&config).unwrap());
    let app = router(AppState::new(&config, agent).unwrap());

    let request = Request::builder()
        .method("POST")
        .uri("/generate_plan")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("admin:letmein")),
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "gene": "adrb2", "goal": "finish hyrox in under 90 minutes" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!({
            "success": true,
            "training_plan": "FINAL TEXT",
            "gene": "adrb2",
            "goal": "finish hyrox in under 90 minutes",
            "research_report": "Summary A\n\nSummary B"
        })
    );
}

#[tokio::test]
async fn provider_error_surfaces_as_500() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let agent = Arc::new(ResearchAgent::from_config(&config).unwrap());
    let app = router(AppState::new(&config, agent).unwrap());

    let request = Request::builder()
        .method("POST")
        .uri("/generate_plan")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("admin:letmein")),
        )
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"gene":"nos3","goal":"marathon"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("bad key"));
}
