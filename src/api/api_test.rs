use super::*;
use crate::auth::MemoryTokenStore;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode as AxumStatus};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Mutex;

// =============================================================================
// FAKE BACKEND
// =============================================================================

#[derive(Clone, Default)]
struct Backend {
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Backend {
    fn record(&self, headers: &HeaderMap) -> Option<String> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        self.auth_headers.lock().unwrap().push(auth.clone());
        auth
    }
}

fn unauthorized() -> AxumResponse {
    (AxumStatus::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response()
}

async fn login(State(backend): State<Backend>, Json(body): Json<Value>) -> AxumResponse {
    backend.bodies.lock().unwrap().push(body.clone());
    if body["password"] == "secret" {
        Json(json!({ "token": "jwt-1", "user": { "id": "u1", "email": body["email"], "name": "Ada" } })).into_response()
    } else {
        (AxumStatus::UNAUTHORIZED, Json(json!({ "error": "Invalid credentials" }))).into_response()
    }
}

async fn logout() -> AxumResponse {
    (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({ "message": "session store down" }))).into_response()
}

async fn verify(State(backend): State<Backend>, headers: HeaderMap) -> AxumResponse {
    match backend.record(&headers).as_deref() {
        Some("Bearer jwt-1") => Json(json!({ "valid": true })).into_response(),
        _ => unauthorized(),
    }
}

async fn me(State(backend): State<Backend>, headers: HeaderMap) -> AxumResponse {
    match backend.record(&headers).as_deref() {
        Some("Bearer jwt-1") => Json(json!({ "id": "u1", "email": "ada@example.com", "role": "rep" })).into_response(),
        _ => unauthorized(),
    }
}

async fn list_leads(State(backend): State<Backend>, headers: HeaderMap) -> Json<Value> {
    backend.record(&headers);
    Json(json!([
        { "id": "l1", "name": "Ada", "status": "new", "extra": 1 },
        { "id": "l2", "name": "Grace", "company": "Navy" }
    ]))
}

async fn create_lead(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    backend.bodies.lock().unwrap().push(body.clone());
    let mut lead = body;
    lead["id"] = json!("l-new");
    Json(lead)
}

async fn get_lead(Path(id): Path<String>) -> AxumResponse {
    if id == "missing" {
        return (AxumStatus::NOT_FOUND, Json(json!({ "message": "Lead not found" }))).into_response();
    }
    Json(json!({ "id": id, "name": "Ada" })).into_response()
}

async fn update_lead(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "id": id, "name": "Ada", "status": body["status"] }))
}

async fn delete_lead(Path(_id): Path<String>) -> AxumStatus {
    AxumStatus::NO_CONTENT
}

async fn calls_for_lead(Path(lead_id): Path<String>) -> Json<Value> {
    Json(json!([{ "id": "c1", "leadId": lead_id, "duration": 95, "outcome": "interested" }]))
}

async fn dashboard() -> Json<Value> {
    Json(json!({ "totalLeads": 12, "totalCalls": 30, "callsToday": 4, "activeCalls": 1, "conversionRate": 0.25 }))
}

async fn performance(Path(user_id): Path<String>) -> Json<Value> {
    Json(json!({ "userId": user_id, "totalCalls": 10, "successfulCalls": 4, "conversionRate": 0.4 }))
}

async fn log_activity(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "id": "a1", "type": body["type"], "description": body["description"] }))
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let routes = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/verify", get(verify))
        .route("/auth/me", get(me))
        .route("/leads", get(list_leads).post(create_lead))
        .route("/leads/{id}", get(get_lead).put(update_lead).delete(delete_lead))
        .route("/calls/lead/{lead_id}", get(calls_for_lead))
        .route("/dashboard/stats", get(dashboard))
        .route("/performance/{user_id}", get(performance))
        .route("/activity", post(log_activity))
        .with_state(backend.clone());
    let app = Router::new().nest("/api", routes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}/api/"), backend)
}

fn client(base_url: &str, token: Option<&str>) -> (ApiClient, Arc<MemoryTokenStore>) {
    let tokens = Arc::new(MemoryTokenStore::new(token.map(ToOwned::to_owned)));
    let client = ApiClient::with_client(reqwest::Client::new(), base_url, Arc::clone(&tokens) as Arc<dyn TokenStore>);
    (client, tokens)
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn login_stores_token_and_authenticates_later_requests() {
    let (url, backend) = spawn_backend().await;
    let (api, tokens) = client(&url, None);

    let response = api.login("ada@example.com", "secret").await.expect("login");
    assert_eq!(response.token, "jwt-1");
    assert_eq!(response.user.name.as_deref(), Some("Ada"));
    assert_eq!(tokens.load_token().await.as_deref(), Some("jwt-1"));
    assert_eq!(backend.bodies.lock().unwrap()[0], json!({ "email": "ada@example.com", "password": "secret" }));

    let me = api.me().await.expect("me");
    assert_eq!(me.email, "ada@example.com");
    assert_eq!(me.role.as_deref(), Some("rep"));
}

#[tokio::test]
async fn rejected_login_carries_backend_message() {
    let (url, _) = spawn_backend().await;
    let (api, tokens) = client(&url, None);

    let err = api.login("ada@example.com", "wrong").await.expect_err("should fail");
    match err {
        ApiError::Server { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(tokens.load_token().await, None);
}

#[tokio::test]
async fn logout_clears_token_even_when_server_fails() {
    let (url, _) = spawn_backend().await;
    let (api, tokens) = client(&url, Some("jwt-1"));

    api.logout().await.expect("logout");
    assert_eq!(tokens.load_token().await, None);
}

#[tokio::test]
async fn verify_reflects_token_validity() {
    let (url, backend) = spawn_backend().await;
    let (valid, _) = client(&url, Some("jwt-1"));
    let (stale, _) = client(&url, Some("old"));
    let (anonymous, _) = client(&url, None);

    assert!(valid.verify().await);
    assert!(!stale.verify().await);
    assert!(!anonymous.verify().await);
    assert_eq!(
        *backend.auth_headers.lock().unwrap(),
        vec![Some("Bearer jwt-1".to_owned()), Some("Bearer old".to_owned()), None]
    );
}

#[tokio::test]
async fn lead_crud_round_trip() {
    let (url, backend) = spawn_backend().await;
    let (api, _) = client(&url, Some("jwt-1"));

    let leads = api.list_leads().await.expect("list");
    assert_eq!(leads.len(), 2);
    assert_eq!(leads[1].company.as_deref(), Some("Navy"));

    let input = LeadInput { name: Some("Linus".into()), status: Some("new".into()), ..LeadInput::default() };
    let created = api.create_lead(&input).await.expect("create");
    assert_eq!(created.id, "l-new");
    assert_eq!(created.name, "Linus");
    assert_eq!(backend.bodies.lock().unwrap()[0], json!({ "name": "Linus", "status": "new" }));

    let updated = api
        .update_lead("l1", &LeadInput { status: Some("qualified".into()), ..LeadInput::default() })
        .await
        .expect("update");
    assert_eq!(updated.status.as_deref(), Some("qualified"));

    api.delete_lead("l1").await.expect("delete");
    assert_eq!(api.get_lead("l1").await.expect("get").name, "Ada");
}

#[tokio::test]
async fn not_found_uses_message_field() {
    let (url, _) = spawn_backend().await;
    let (api, _) = client(&url, Some("jwt-1"));

    let err = api.get_lead("missing").await.expect_err("404");
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "server returned 404: Lead not found");
}

#[tokio::test]
async fn unknown_route_falls_back_to_status_text() {
    let (url, _) = spawn_backend().await;
    let (api, _) = client(&url, Some("jwt-1"));

    let err = api.list_users().await.expect_err("no such route");
    match err {
        ApiError::Server { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn calls_stats_and_activity_decode() {
    let (url, _) = spawn_backend().await;
    let (api, _) = client(&url, Some("jwt-1"));

    let calls = api.list_calls_for_lead("l7").await.expect("calls");
    assert_eq!(calls[0].lead_id, "l7");
    assert_eq!(calls[0].duration, Some(95));

    let stats = api.dashboard_stats().await.expect("stats");
    assert_eq!(stats.total_leads, 12);
    assert!((stats.conversion_rate - 0.25).abs() < f64::EPSILON);

    let metrics = api.performance_metrics("u1").await.expect("metrics");
    assert_eq!(metrics.user_id, "u1");
    assert_eq!(metrics.successful_calls, 4);
    assert_eq!(metrics.leads_converted, 0);

    let activity = api
        .log_activity(&ActivityInput { kind: "call".into(), description: "Called Ada".into(), metadata: None })
        .await
        .expect("activity");
    assert_eq!(activity.kind, "call");
    assert_eq!(activity.description.as_deref(), Some("Called Ada"));
}

#[tokio::test]
async fn unreachable_backend_is_http_error() {
    let (api, _) = client("http://127.0.0.1:1/api", None);
    let err = api.dashboard_stats().await.expect_err("connection refused");
    assert!(matches!(err, ApiError::Http(_)));
}

#[test]
fn error_message_prefers_error_then_message_then_body() {
    let status = StatusCode::BAD_REQUEST;
    assert_eq!(error_message(status, r#"{"error":"e","message":"m"}"#), "e");
    assert_eq!(error_message(status, r#"{"message":"m"}"#), "m");
    assert_eq!(error_message(status, "plain failure"), "plain failure");
    assert_eq!(error_message(status, r#"{"other":1}"#), "Bad Request");
    assert_eq!(error_message(status, ""), "Bad Request");
}

#[test]
fn base_url_trailing_slash_is_trimmed() {
    let (api, _) = client("http://example.test/api///", None);
    assert_eq!(api.base_url(), "http://example.test/api");
}
