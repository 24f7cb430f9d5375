use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::{config::Settings, security, state::AppState};
use crate::repositories::memory::MemoryStore;
use crate::services::caller::CallerRole;

const TEST_SECRET_KEY: &str = "test-secret";

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("CLASSCHECK_ENV", "test");
    std::env::set_var("CLASSCHECK_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("ALGORITHM", "HS256");
    std::env::set_var("API_V1_STR", "/api/v1");
    std::env::set_var("STORE_BACKEND", "memory");
    std::env::set_var("OPENAI_API_KEY", "test-key");
    std::env::set_var("OPENAI_BASE_URL", "http://127.0.0.1:9");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("GRADING_POLL_INTERVAL_SECONDS");
    std::env::remove_var("GRADING_MAX_AI_ATTEMPTS");
}

pub(crate) fn memory_state(settings: Settings) -> AppState {
    AppState::new(settings, Arc::new(MemoryStore::new()))
}

pub(crate) fn bearer_token(user_ref: &str, role: CallerRole, settings: &Settings) -> String {
    security::create_access_token(user_ref, role, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
