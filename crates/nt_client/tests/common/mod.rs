//! A fake news backend served by axum on a random local port.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, RawQuery, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use nt_core::ClientConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const ARTICLE_COUNT: u64 = 55;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub requests: Vec<Recorded>,
    /// Health checks answered with 503 before succeeding.
    pub health_failures: usize,
    pub chat_down: bool,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeBackend {
    pub url: String,
    pub state: Shared,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url: format!("http://{}/api", addr), state }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(5),
            retries: 0,
            ..ClientConfig::default().with_api_url(&self.url)
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests whose path (without query) is `path`.
    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.uri.split('?').next() == Some(path))
            .collect()
    }
}

/// A config pointing at a port nothing listens on.
pub async fn unreachable_config() -> ClientConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    ClientConfig {
        retries: 0,
        ..ClientConfig::default().with_api_url(format!("http://{}/api/", addr))
    }
}

fn record(state: &Shared, method: Method, uri: &Uri, body: Option<Value>) {
    state.lock().unwrap().requests.push(Recorded {
        method,
        uri: uri.to_string(),
        body,
    });
}

fn article(id: u64) -> Value {
    json!({
        "id": id,
        "title": format!("Story number {}", id),
        "url": format!("https://news.example.com/{}", id),
        "has_been_pretreat": id % 2 == 0,
        "rating": null,
        "time_spent": 30,
        "tags": ["world"],
        "source": "wire"
    })
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/length", get(length))
        .route("/api/titles", post(titles))
        .route("/api/article/:id", get(article_detail))
        .route("/api/unpretreat", get(unpretreat))
        .route("/api/articles/filter", get(filter))
        .route("/api/articles/:id/rating", put(rating))
        .route("/api/articles/:id/reading-time", post(reading_time))
        .route("/api/articles/:id/comments", put(comments))
        .route("/api/articles/:id/tags", put(tags_update))
        .route("/api/tags", get(tags))
        .route("/api/tags/categories", get(categories))
        .route("/api/articles/:id/chat/history", get(chat_history))
        .route("/api/articles/:id/chat", post(chat))
        .route("/api/articles/:id/chat/clear", delete(chat_clear))
        .route("/api/health", get(health))
        .with_state(state)
}

async fn length(State(state): State<Shared>, uri: Uri) -> Json<u64> {
    record(&state, Method::GET, &uri, None);
    Json(ARTICLE_COUNT)
}

async fn titles(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Json<Value> {
    record(&state, Method::POST, &uri, Some(body.clone()));
    let page = body["page"].as_u64().unwrap_or(1);
    let per_page = body["per_page"].as_u64().unwrap_or(20);
    let start = (page - 1) * per_page + 1;
    let end = (page * per_page).min(ARTICLE_COUNT);
    let titles: Vec<Value> = (start..=end).map(article).collect();
    Json(json!({
        "titles": titles,
        "pagination": {"page": page, "per_page": per_page, "total": ARTICLE_COUNT, "returned": titles.len()}
    }))
}

async fn article_detail(State(state): State<Shared>, uri: Uri, Path(id): Path<u64>) -> Response {
    record(&state, Method::GET, &uri, None);
    if id == 0 || id > ARTICLE_COUNT {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Article not found"}))).into_response();
    }
    let mut body = article(id);
    body["content"] = json!("# Title\n\nSome **markdown**.");
    Json(body).into_response()
}

async fn unpretreat(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    record(&state, Method::GET, &uri, None);
    let mut first = article(1);
    first["content"] = json!("raw text");
    Json(json!({"unpretreat_articles": [first], "count": 1}))
}

async fn filter(State(state): State<Shared>, uri: Uri, RawQuery(_query): RawQuery) -> Json<Value> {
    record(&state, Method::GET, &uri, None);
    Json(json!([article(3), article(8)]))
}

async fn rating(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Response {
    record(&state, Method::PUT, &uri, Some(body.clone()));
    match body["rating"].as_u64() {
        Some(r @ 1..=5) => Json(json!({"message": "ok", "rating": r})).into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "database is locked"}))).into_response(),
    }
}

async fn reading_time(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Json<Value> {
    record(&state, Method::POST, &uri, Some(body));
    Json(json!({"message": "Reading time updated"}))
}

async fn comments(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Json<Value> {
    record(&state, Method::PUT, &uri, Some(body.clone()));
    Json(json!({"message": "ok", "comments": body["comments"]}))
}

async fn tags_update(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Json<Value> {
    record(&state, Method::PUT, &uri, Some(body.clone()));
    let tags: Vec<String> = body["tags"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str())
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Json(json!({"message": "ok", "tags": tags}))
}

async fn tags(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    record(&state, Method::GET, &uri, None);
    Json(json!({"tags": ["ai", "climate", "economy", "world"]}))
}

async fn categories(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    record(&state, Method::GET, &uri, None);
    Json(json!({
        "categories": {"tech": {"main_tag": "tech", "sub_tags": ["ai"], "has_main": true}},
        "basic_tags": ["world"],
        "other_tags": ["misc"]
    }))
}

async fn chat_history(State(state): State<Shared>, uri: Uri) -> Json<Value> {
    record(&state, Method::GET, &uri, None);
    Json(json!({
        "success": true,
        "conversation": [
            {"id": "1", "type": "user", "content": "What happened?", "timestamp": 1717243200000.0},
            {"id": "2", "type": "ai", "content": "A summit.", "timestamp": "2024-06-01T12:00:05Z"}
        ]
    }))
}

async fn chat(State(state): State<Shared>, uri: Uri, Json(body): Json<Value>) -> Response {
    record(&state, Method::POST, &uri, Some(body.clone()));
    if state.lock().unwrap().chat_down {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "model offline"})),
        )
            .into_response();
    }
    Json(json!({
        "success": true,
        "answer": format!("You asked: {}", body["question"].as_str().unwrap_or_default()),
        "model_used": body["model"],
        "question": body["question"]
    }))
    .into_response()
}

async fn chat_clear(State(state): State<Shared>, uri: Uri) -> Response {
    record(&state, Method::DELETE, &uri, None);
    if state.lock().unwrap().chat_down {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false, "error": "model offline"})))
            .into_response();
    }
    Json(json!({"success": true})).into_response()
}

async fn health(State(state): State<Shared>, uri: Uri) -> Response {
    record(&state, Method::GET, &uri, None);
    let mut state = state.lock().unwrap();
    if state.health_failures > 0 {
        state.health_failures -= 1;
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "warming up"}))).into_response();
    }
    Json(json!({"status": "healthy", "service": "news-api"})).into_response()
}
