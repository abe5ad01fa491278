pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::sorting::handlers as sorting;
use crate::state::AppState;
use crate::tailoring::handlers as tailoring;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Tailoring API
        .route("/api/v1/experience/tailor", post(tailoring::handle_tailor))
        .route(
            "/api/v1/experience/tailor/stream",
            post(tailoring::handle_tailor_stream),
        )
        // Sorting API
        .route("/api/v1/skills/sort", post(sorting::handle_sort_skills))
        .route(
            "/api/v1/achievements/sort",
            post(sorting::handle_sort_achievements),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::agent::DEFAULT_CALL_TIMEOUT;
    use crate::config::Config;
    use crate::llm_client::testing::ScriptedBackend;
    use crate::llm_client::{LlmConfig, Provider, DEFAULT_MODEL};

    fn router(backend: ScriptedBackend) -> Router {
        shared_router(Arc::new(backend))
    }

    fn shared_router(backend: Arc<ScriptedBackend>) -> Router {
        let provider = Provider::default();
        build_router(AppState {
            backend,
            config: Config {
                llm: LlmConfig {
                    endpoint: provider.default_endpoint().to_string(),
                    api_key: "test-key".to_string(),
                    model: DEFAULT_MODEL.to_string(),
                    provider,
                },
                call_timeout: DEFAULT_CALL_TIMEOUT,
                port: 0,
                rust_log: "info".to_string(),
            },
        })
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(ScriptedBackend::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "tailor");
    }

    // Scenario A over HTTP.
    #[tokio::test]
    async fn test_sort_achievements_applies_valid_permutation() {
        let backend = ScriptedBackend::new().tool(
            "achievements_sorter",
            json!({"achievementOrder": ["Shipped v2", "Led team of 5", "Cut costs 20%"]}),
        );
        let (status, body) = post_json(
            router(backend),
            "/api/v1/achievements/sort",
            json!({
                "achievements": [
                    {"text": "Led team of 5"},
                    {"text": "Cut costs 20%", "highlight": true},
                    {"text": "Shipped v2"}
                ],
                "position": "Engineer",
                "organization": "Acme",
                "jobDescription": "Ship product"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["applied"], true);
        assert_eq!(body["achievements"][0]["text"], "Shipped v2");
        assert_eq!(body["achievements"][2]["text"], "Cut costs 20%");
        assert_eq!(body["achievements"][2]["highlight"], true);
    }

    // Scenario B over HTTP.
    #[tokio::test]
    async fn test_sort_achievements_rejection_keeps_order() {
        let backend = ScriptedBackend::new().tool("achievements_sorter", json!({"achievementOrder": ["X", "Z"]}));
        let (status, body) = post_json(
            router(backend),
            "/api/v1/achievements/sort",
            json!({
                "achievements": [{"text": "X"}, {"text": "Y"}],
                "jobDescription": "Anything"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["applied"], false);
        assert_eq!(body["achievements"], json!([{"text": "X", "highlight": false}, {"text": "Y", "highlight": false}]));
        assert!(body["sortResult"].is_null());
    }

    // Scenario C over HTTP.
    #[tokio::test]
    async fn test_sort_skills_adds_highlighted_skill() {
        let backend = ScriptedBackend::new().tool(
            "skills_sorter",
            json!({"groupOrder": ["Frontend"], "skillOrder": {"Frontend": ["React", "Vite"]}}),
        );
        let (status, body) = post_json(
            router(backend),
            "/api/v1/skills/sort",
            json!({
                "skillGroups": [{"title": "Frontend", "skills": [{"text": "React"}]}],
                "jobDescription": "React and Vite"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["applied"], true);
        let skills = &body["skillGroups"][0]["skills"];
        assert_eq!(skills[0]["text"], "React");
        assert_eq!(skills[1]["text"], "Vite");
        assert_eq!(skills[1]["highlight"], true);
    }

    #[tokio::test]
    async fn test_empty_job_description_is_rejected() {
        let (status, body) = post_json(
            router(ScriptedBackend::new()),
            "/api/v1/skills/sort",
            json!({"skillGroups": [], "jobDescription": "  "}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_sort_skills_rejects_repeated_group_titles() {
        let backend = Arc::new(ScriptedBackend::new().tool(
            "skills_sorter",
            json!({"groupOrder": ["Tools"], "skillOrder": {"Tools": ["Docker", "Git"]}}),
        ));
        let (status, body) = post_json(
            shared_router(backend.clone()),
            "/api/v1/skills/sort",
            json!({
                "skillGroups": [
                    {"title": "Tools", "skills": [{"text": "Git"}]},
                    {"title": "Tools", "skills": [{"text": "Docker"}]}
                ],
                "jobDescription": "DevOps"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tailor_transport_failure_is_bad_gateway() {
        let backend = ScriptedBackend::new().fail("analyst", 401, "invalid x-api-key sk-live-123");
        let (status, body) = post_json(
            router(backend),
            "/api/v1/experience/tailor",
            json!({"description": "Ran payments", "jobDescription": "Rust engineer"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("LLM_ERROR"));
        assert!(!body.contains("sk-live"));
    }

    #[tokio::test]
    async fn test_tailor_returns_reviews() {
        let backend = ScriptedBackend::new()
            .text("description_writer", "Built payment rails in Rust.")
            .text("fact_checker", "APPROVED")
            .text("relevance_reviewer", "APPROVED");
        let (status, body) = post_json(
            router(backend),
            "/api/v1/experience/tailor",
            json!({"description": "Ran payments", "jobDescription": "Rust engineer"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["description"], "Built payment rails in Rust.");
        assert_eq!(body["techStack"], json!([]));
        assert_eq!(body["reviews"][0], json!({"loop": "fact_check", "status": "approved", "iterations": 1}));
    }

    #[tokio::test]
    async fn test_tailor_stream_emits_progress_result_then_done() {
        let backend = ScriptedBackend::new()
            .text("fact_checker", "APPROVED")
            .text("relevance_reviewer", "APPROVED");
        let (status, body) = post_json(
            router(backend),
            "/api/v1/experience/tailor/stream",
            json!({"description": "Ran payments", "jobDescription": "Rust engineer"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let progress = body.find("event: progress").unwrap();
        let result = body.find("event: result").unwrap();
        let done = body.rfind(r#""done":true"#).unwrap();
        assert!(progress < result && result < done);
        assert!(!body.contains("event: error"));
    }

    #[tokio::test]
    async fn test_tailor_stream_reports_errors_as_events() {
        let backend = ScriptedBackend::new().fail("analyst", 529, "overloaded");
        let (status, body) = post_json(
            router(backend),
            "/api/v1/experience/tailor/stream",
            json!({"description": "Ran payments", "jobDescription": "Rust engineer"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("event: error"));
        assert!(body.contains("LLM_ERROR"));
        assert!(body.contains(r#""done":true"#));
    }
}
