pub mod chat;
pub mod health;
pub mod sessions;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::middleware::request_logger;
use crate::api::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.config.server.allowed_origins);
    let upload_limit = state.config.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_v1_routes(upload_limit))
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

fn api_v1_routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{id}/credential", put(sessions::set_credential))
        .route(
            "/sessions/{id}/document",
            post(sessions::upload_document)
                .delete(sessions::remove_document)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/sessions/{id}/messages", get(sessions::list_messages))
        .route("/sessions/{id}/chat", post(chat::chat_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::application::testing::{test_pipeline, TestPipeline};
    use crate::application::services::READY_MESSAGE;
    use crate::infrastructure::AppConfig;

    const FACTS: &str = "Apples grow in the orchard behind the farm.\n\
        A zorblax is a purple mineral found on Mars.\n\
        The train leaves the station at noon.";

    const BOUNDARY: &str = "doc-qa-test-boundary";

    fn app() -> (Router, AppState) {
        app_with(&test_pipeline(1))
    }

    fn app_with(fixture: &TestPipeline) -> (Router, AppState) {
        let state = AppState::new(fixture.pipeline.clone(), AppConfig::default());
        (create_router(state.clone()), state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn upload_request(uri: &str, filename: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn new_session(app: &Router) -> String {
        let (status, body) = send(app, empty_request("POST", "/api/v1/sessions")).await;
        assert_eq!(status, StatusCode::CREATED);
        let json: Value = serde_json::from_str(&body).unwrap();
        json["id"].as_str().unwrap().to_string()
    }

    async fn ready_session(app: &Router) -> String {
        let id = new_session(app).await;
        let (status, _) = send(
            app,
            json_request(
                "PUT",
                &format!("/api/v1/sessions/{id}/credential"),
                json!({ "api_key": "sk-test" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            app,
            upload_request(&format!("/api/v1/sessions/{id}/document"), "facts.txt", FACTS),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["message"], READY_MESSAGE);
        assert_eq!(json["session"]["state"], "document_ready");
        id
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = send(&app, empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healthy"));

        let (status, _) = send(&app, empty_request("GET", "/ready")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (app, state) = app();
        let id = new_session(&app).await;
        assert_eq!(state.sessions.len(), 1);

        let (status, body) = send(&app, empty_request("GET", &format!("/api/v1/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "no_document");
        assert_eq!(json["warning"], "An API key is required.");

        let (status, _) =
            send(&app, empty_request("DELETE", &format!("/api/v1/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, empty_request("GET", &format!("/api/v1/sessions/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_chat_streams_tokens_then_done() {
        let (app, _) = app();
        let id = ready_session(&app).await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/chat"),
                json!({ "message": "What is a zorblax?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let events = body.replace("event: ", "event:");
        assert!(events.contains("event:token"));
        assert!(events.contains("event:done"));
        assert!(!events.contains("event:error"));
        assert!(body.contains("A zorblax is a purple mineral found on Mars."));
        assert!(events.find("event:token").unwrap() < events.find("event:done").unwrap());

        let (status, body) = send(
            &app,
            empty_request("GET", &format!("/api/v1/sessions/{id}/messages")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let turns: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(turns.as_array().unwrap().len(), 2);
        assert_eq!(turns[0]["role"], "human");
        assert_eq!(turns[1]["role"], "ai");
    }

    #[tokio::test]
    async fn test_chat_failure_mid_stream_ends_with_error_event() {
        let fixture = test_pipeline(1);
        let (app, _) = app_with(&fixture);
        let id = ready_session(&app).await;
        fixture.chat.fail_after(1);

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/chat"),
                json!({ "message": "What is a zorblax?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let events = body.replace("event: ", "event:");
        assert!(events.contains("event:token"));
        assert!(events.contains("event:error"));
        assert!(!events.contains("event:done"));
        assert!(events.find("event:token").unwrap() < events.find("event:error").unwrap());

        let (_, body) = send(
            &app,
            empty_request("GET", &format!("/api/v1/sessions/{id}/messages")),
        )
        .await;
        let turns: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(turns.as_array().unwrap().len(), 1);
        assert_eq!(turns[0]["role"], "human");
        assert_eq!(turns[0]["text"], "What is a zorblax?");
    }

    #[tokio::test]
    async fn test_client_disconnect_returns_session_to_ready() {
        let fixture = test_pipeline(1);
        let (app, _) = app_with(&fixture);
        let id = ready_session(&app).await;
        fixture.chat.stall_after(1);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/chat"),
                json!({ "message": "What is a zorblax?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut frames = response.into_body().into_data_stream();
        let first = frames.next().await.unwrap().unwrap();
        assert!(String::from_utf8_lossy(&first).contains("token"));
        drop(frames);

        // Reads wait for the answering task to release the session.
        let (status, body) = tokio::time::timeout(
            Duration::from_secs(5),
            send(&app, empty_request("GET", &format!("/api/v1/sessions/{id}"))),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "document_ready");
        assert_eq!(json["turns"], 1);
    }

    #[tokio::test]
    async fn test_chat_before_upload_is_rejected() {
        let (app, _) = app();
        let id = new_session(&app).await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/chat"),
                json!({ "message": "hello?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Upload a document"));
    }

    #[tokio::test]
    async fn test_upload_without_key_is_unauthorized() {
        let (app, _) = app();
        let id = new_session(&app).await;

        let (status, body) = send(
            &app,
            upload_request(&format!("/api/v1/sessions/{id}/document"), "facts.txt", FACTS),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("API key"));
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_unprocessable() {
        let (app, _) = app();
        let id = new_session(&app).await;
        send(
            &app,
            json_request(
                "PUT",
                &format!("/api/v1/sessions/{id}/credential"),
                json!({ "api_key": "sk-test" }),
            ),
        )
        .await;

        let (status, _) = send(
            &app,
            upload_request(&format!("/api/v1/sessions/{id}/document"), "notes.exe", "x"),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_busy_session_rejects_second_question() {
        let (app, state) = app();
        let id = ready_session(&app).await;
        let session = state.sessions.get(id.parse().unwrap()).unwrap();
        let _answering = session.lock().await;

        let (status, _) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/v1/sessions/{id}/chat"),
                json!({ "message": "What is a zorblax?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_remove_document_resets_session() {
        let (app, _) = app();
        let id = ready_session(&app).await;

        let (status, body) = send(
            &app,
            empty_request("DELETE", &format!("/api/v1/sessions/{id}/document")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "no_document");
        assert!(json["document"].is_null());
    }
}
