use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::models::{ChatReply, ChatRequest};
use crate::query::QueryClient;
use crate::sources::format_response_with_sources;

const NO_STORE: &str =
    "no-store, no-cache, must-revalidate, post-check=0, pre-check=0, max-age=0";

#[derive(Clone)]
pub struct AppState {
    query: QueryClient,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            query: QueryClient::new(&config.query),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/translate", post(translate_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_STORE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("-1"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: AppConfig) -> Result<()> {
    let state = AppState::new(&config);
    let app = build_router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!(
        "listening on http://{} (query service {})",
        addr,
        config.query.base_url
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<ChatReply>) {
    let upstream = match state.query.query(&request.message).await {
        Ok(upstream) => upstream,
        Err(err) => {
            tracing::error!("query endpoint failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatReply::failed("Failed to get response from query endpoint")),
            );
        }
    };

    let Some(response) = upstream.response else {
        tracing::error!("query endpoint reply had no response field");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ChatReply::failed("Invalid response format from query endpoint")),
        );
    };

    let (text, docs) = format_response_with_sources(&response, &upstream.docs);
    tracing::info!(sources = docs.len(), "chat answered");
    (StatusCode::OK, Json(ChatReply::answered(text, docs)))
}

async fn translate_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (status, body) = state.query.translate(&body).await?;
    if !status.is_success() {
        tracing::warn!("translate endpoint returned {}", status);
    }
    Ok((status, Json(body)))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{value:#}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("request failed: {}", self.message);
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::QueryConfig;

    fn config(query_url: &str) -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            query: QueryConfig {
                base_url: query_url.to_string(),
                k: 10,
                rerank: true,
            },
        }
    }

    fn router(query_url: &str) -> Router {
        let config = config(query_url);
        build_router(AppState::new(&config))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_renumbers_upstream_references() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query/"))
            .and(body_json(json!({ "query": "permit?", "k": 10, "rerank": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "response": "Apply online [DOC:4].",
                "docs": { "DOC:4": { "content": "Søknad", "url": "https://udi.no/" } }
            })))
            .mount(&upstream)
            .await;

        let response = router(&upstream.uri())
            .oneshot(post_json("/api/chat", json!({ "message": "permit?" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            HeaderValue::from_static(NO_STORE)
        );
        assert_eq!(response.headers()[header::PRAGMA], "no-cache");
        assert_eq!(response.headers()[header::EXPIRES], "-1");
        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["response"], "Apply online [1] .");
        assert_eq!(body["docs"]["DOC:0"]["url"], "https://udi.no/");
    }

    #[tokio::test]
    async fn chat_upstream_failure_is_reported() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&upstream)
            .await;

        let response = router(&upstream.uri())
            .oneshot(post_json("/api/chat", json!({ "message": "permit?" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to get response from query endpoint");
    }

    #[tokio::test]
    async fn chat_without_response_field_is_invalid() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "docs": {} })))
            .mount(&upstream)
            .await;

        let response = router(&upstream.uri())
            .oneshot(post_json("/api/chat", json!({ "message": "permit?" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Invalid response format from query endpoint");
    }

    #[tokio::test]
    async fn translate_is_forwarded_verbatim() {
        let upstream = MockServer::start().await;
        let request = json!({ "question": "q", "documents": ["Hei"] });
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_json(request.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": [{ "translation": "Hi", "from_lang": "no", "to_lang": "en" }]
            })))
            .mount(&upstream)
            .await;

        let response = router(&upstream.uri())
            .oneshot(post_json("/api/translate", request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["translations"][0]["translation"], "Hi");
    }

    #[tokio::test]
    async fn translate_unreachable_upstream_is_500() {
        let response = router("http://127.0.0.1:1")
            .oneshot(post_json("/api/translate", json!({ "question": "q" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn root_serves_no_page() {
        let response = router("http://127.0.0.1:1")
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
