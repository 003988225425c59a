//! In-process mock of the ERP API for client tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use erp_session::storage::{MemoryStore, SafeStorage, keys};
use erp_session::{ApiClient, ClientConfig, RefreshPolicy};

pub const PASSWORD: &str = "correct-horse";

/// Mutable server state shared by all handlers.
#[derive(Default)]
pub struct MockState {
    valid_access: Mutex<HashSet<String>>,
    valid_refresh: Mutex<HashSet<String>>,
    issued: AtomicU64,
    pub refresh_calls: AtomicUsize,
    pub protected_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub refresh_server_error: AtomicBool,
    pub refresh_empty_access_token: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
}

impl MockState {
    pub fn accept_access(&self, token: &str) {
        self.valid_access.lock().unwrap().insert(token.to_string());
    }

    pub fn accept_refresh(&self, token: &str) {
        self.valid_refresh.lock().unwrap().insert(token.to_string());
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn protected_calls(&self) -> usize {
        self.protected_calls.load(Ordering::SeqCst)
    }

    fn issue_pair(&self) -> (String, String) {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-token-{n}");
        let refresh = format!("refresh-token-{n}");
        self.accept_access(&access);
        self.accept_refresh(&refresh);
        (access, refresh)
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.valid_access.lock().unwrap().contains(token))
    }
}

pub struct MockServer {
    pub state: Arc<MockState>,
    pub base_url: String,
}

impl MockServer {
    pub async fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("erp_session=debug")
            .with_test_writer()
            .try_init();

        let state = Arc::new(MockState::default());
        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/ious", get(list_ious).post(create_iou))
            .route("/ious/{id}", get(get_iou))
            .route("/approvals/{id}/{decision}", post(decide_approval))
            .route("/always-unauthorized", get(always_unauthorized))
            .route("/malformed", get(malformed))
            .with_state(state.clone());
        let app = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            base_url: format!("http://{addr}/api"),
        }
    }

    pub fn client(&self, policy: RefreshPolicy) -> ApiClient<MemoryStore> {
        let config = ClientConfig::new(self.base_url.parse().unwrap())
            .with_refresh_policy(policy)
            .with_request_timeout(Duration::from_secs(10));
        ApiClient::new(config, SafeStorage::new(MemoryStore::new())).unwrap()
    }

    /// A client whose stored access token the server no longer accepts.
    pub async fn client_with_stale_token(
        &self,
        policy: RefreshPolicy,
        refresh_token: &str,
    ) -> ApiClient<MemoryStore> {
        let client = self.client(policy);
        client
            .storage()
            .set_item(keys::ACCESS_TOKEN, "stale-access-token")
            .await
            .unwrap();
        client
            .storage()
            .set_item(keys::REFRESH_TOKEN, refresh_token)
            .await
            .unwrap();
        client
            .storage()
            .set_item(keys::USER, &json!({"id": "u-1", "email": "ops@example.com"}))
            .await
            .unwrap();
        client
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "Token expired"})),
    )
        .into_response()
}

fn auth_response(state: &MockState, email: &str, name: Option<&str>) -> Response {
    let (access, refresh) = state.issue_pair();
    Json(json!({
        "success": true,
        "data": {
            "user": {"id": "u-1", "email": email, "name": name, "role": "dispatcher"},
            "tokens": {"accessToken": access, "refreshToken": refresh}
        }
    }))
    .into_response()
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid email or password"})),
        )
            .into_response();
    }
    auth_response(&state, body["email"].as_str().unwrap_or_default(), None)
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body["email"].as_str().is_none_or(str::is_empty) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "Email is required"})),
        )
            .into_response();
    }
    auth_response(
        &state,
        body["email"].as_str().unwrap_or_default(),
        body["name"].as_str(),
    )
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let presented = body["refreshToken"].as_str().unwrap_or_default();
    let known = state.valid_refresh.lock().unwrap().contains(presented);
    if state.refresh_fails.load(Ordering::SeqCst) || !known {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid refresh token"})),
        )
            .into_response();
    }

    if state.refresh_server_error.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Token service unavailable"})),
        )
            .into_response();
    }
    if state.refresh_empty_access_token.load(Ordering::SeqCst) {
        return Json(json!({"data": {"tokens": {"accessToken": "", "refreshToken": "r"}}}))
            .into_response();
    }

    let (access, refresh) = state.issue_pair();
    Json(json!({"data": {"tokens": {"accessToken": access, "refreshToken": refresh}}}))
        .into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"data": null})).into_response()
}

fn iou(id: &str) -> Value {
    json!({
        "id": id,
        "purpose": "Fuel advance",
        "amount": 250.0,
        "currency": "USD",
        "status": "approved",
        "requestedBy": "u-1",
        "createdAt": "2026-05-01T08:00:00Z"
    })
}

async fn list_ious(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"data": [iou("iou-1"), iou("iou-2")]})).into_response()
}

async fn get_iou(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    if id != "iou-1" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "IOU not found"})),
        )
            .into_response();
    }
    Json(json!({"data": iou(&id)})).into_response()
}

async fn create_iou(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "data": {
            "id": "iou-3",
            "purpose": body["purpose"],
            "amount": body["amount"],
            "status": "pending"
        }
    }))
    .into_response()
}

async fn decide_approval(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path((id, decision)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    let status = match decision.as_str() {
        "approve" => "approved",
        "reject" if body["reason"].is_string() => "rejected",
        "reject" => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "A reason is required to reject"})),
            )
                .into_response();
        }
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    Json(json!({
        "data": {"id": id, "kind": "iou", "referenceId": "iou-1", "status": status}
    }))
    .into_response()
}

async fn always_unauthorized(State(state): State<Arc<MockState>>) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);
    unauthorized()
}

async fn malformed(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.is_authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"items": []})).into_response()
}
