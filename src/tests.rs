//! Integration tests for the admin client against a mock backend.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::auth::{decode_claims, encode_test_token};
use crate::commission::Tier;
use crate::config::Config;
use crate::models::{
    CreateSaleRequest, InvoiceStatus, NewInvoice, NewProduct, PaymentStatus, ProfileUpdate, RegisterRequest,
    Role, SaleStatus, TicketStatus, UserStatus,
};
use crate::router::{Navigation, ADMIN_HOME};
use crate::session::LoginOutcome;
use crate::App;

const CREATED_AT: &str = "2024-03-01T10:00:00Z";

// ==================== MOCK BACKEND ====================

#[derive(Default)]
struct BackendState {
    /// Every token is rejected with 401 while set
    revoked: bool,
    /// Queued answers for GET /sales; the seeded ledger once drained
    sales_responses: VecDeque<Vec<Value>>,
    /// PUT /profile answers with the changed fields only
    partial_profile: bool,
    /// Tokens answered with a slow 401
    stale_tokens: Vec<String>,
    hits: Vec<String>,
}

#[derive(Clone, Default)]
struct Backend {
    state: Arc<Mutex<BackendState>>,
}

impl Backend {
    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    fn hits(&self) -> Vec<String> {
        self.state().hits.clone()
    }

    fn hit(&self, entry: &str) -> bool {
        self.state().hits.iter().any(|h| h == entry)
    }
}

static TOKEN_SERIAL: AtomicU64 = AtomicU64::new(1);

fn token_for(username: &str, role: &str, valid_for: Duration) -> String {
    encode_test_token(&json!({
        "username": username,
        "role": role,
        "exp": (Utc::now() + valid_for).timestamp(),
        "jti": TOKEN_SERIAL.fetch_add(1, Ordering::Relaxed)
    }))
}

fn error(status: StatusCode, message: &str, code: &str) -> Response {
    (status, Json(json!({ "message": message, "code": code }))).into_response()
}

fn bearer_username(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .and_then(|t| decode_claims(t).ok())
        .map(|c| c.username)
        .unwrap_or_default()
}

async fn record_hit(State(backend): State<Backend>, request: Request, next: Next) -> Response {
    let entry = format!("{} {}", request.method(), request.uri().path());
    backend.state().hits.push(entry);
    next.run(request).await
}

async fn require_bearer(State(backend): State<Backend>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::to_string);

    let Some(token) = token else {
        return error(StatusCode::UNAUTHORIZED, "Token expired", "TOKEN_EXPIRED");
    };
    let stale = backend.state().stale_tokens.contains(&token);
    if stale {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        return error(StatusCode::UNAUTHORIZED, "Token expired", "TOKEN_EXPIRED");
    }
    if backend.state().revoked {
        return error(StatusCode::UNAUTHORIZED, "Token expired", "TOKEN_EXPIRED");
    }
    next.run(request).await
}

async fn login(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    match (username, password) {
        ("admin", "admin") => {
            Json(json!({ "token": token_for("admin", "admin", Duration::hours(1)) }))
                .into_response()
        }
        ("shop", "shop") => {
            Json(json!({ "token": token_for("shop", "client", Duration::hours(1)) }))
                .into_response()
        }
        ("stale", "stale") => {
            Json(json!({ "token": token_for("stale", "client", Duration::hours(-1)) }))
                .into_response()
        }
        ("pending", "pending") => error(StatusCode::FORBIDDEN, "Account pending", "INACTIVE"),
        _ => error(StatusCode::UNAUTHORIZED, "Bad credentials", "INVALID"),
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"].as_str().unwrap_or_default().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Email is required", "EMAIL_REQUIRED");
    }
    StatusCode::CREATED.into_response()
}

fn profile_json(username: &str, email: &str) -> Value {
    json!({
        "id": format!("u-{}", username),
        "username": username,
        // The client must ignore role changes coming from the profile payload.
        "role": "client",
        "status": "active",
        "sandboxMode": false,
        "email": email,
        "phone": "600123123",
        "businessName": "Cafe Central SL",
        "iban": "ES9121000418450200051332",
        "createdAt": CREATED_AT,
        "updatedAt": CREATED_AT
    })
}

async fn get_profile(headers: HeaderMap) -> Json<Value> {
    let username = bearer_username(&headers);
    Json(json!({ "user": profile_json(&username, &format!("{}@example.com", username)) }))
}

async fn put_profile(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let username = bearer_username(&headers);
    if backend.state().partial_profile {
        let mut user = body.clone();
        user["username"] = json!(username);
        user["role"] = json!("client");
        return Json(json!({ "user": user }));
    }
    let email = body["email"].as_str().unwrap_or("unchanged@example.com");
    Json(json!({ "user": profile_json(&username, email) }))
}

fn sale_json(id: u64, user_id: &str, amount: f64, status: &str) -> Value {
    json!({
        "id": id,
        "userId": user_id,
        "amount": amount,
        "description": "Counter sale",
        "reference": format!("REF-{}", id),
        "status": status,
        "paymentMethod": "card",
        "createdAt": CREATED_AT,
        "commission": { "percentage": 2.9, "amount": 2.9, "total": 97.1 }
    })
}

async fn list_sales(State(backend): State<Backend>) -> Json<Value> {
    let queued = backend.state().sales_responses.pop_front();
    let sales = queued.unwrap_or_else(|| {
        vec![
            sale_json(1, "shop", 100.0, "pending"),
            sale_json(2, "shop", 100.0, "paid"),
            sale_json(3, "other", 40.0, "paid"),
        ]
    });
    Json(json!({ "sales": sales }))
}

async fn create_sale(Json(body): Json<Value>) -> Json<Value> {
    if body.get("items").is_some() {
        return Json(json!({
            "sale": {
                "id": 500,
                "items": body["items"],
                "total": body["total"],
                "status": "pending",
                "createdAt": CREATED_AT,
                "paymentMethod": body["paymentMethod"],
                "reference": body["reference"]
            }
        }));
    }
    let mut sale = sale_json(77, "shop", body["amount"].as_f64().unwrap_or_default(), "pending");
    sale["commission"] = body["commission"].clone();
    sale["reference"] = body["reference"].clone();
    Json(json!({ "sale": sale }))
}

async fn ok() -> Json<Value> {
    Json(json!({ "success": true }))
}

async fn list_invoices() -> Json<Value> {
    Json(json!({
        "beplyData": [
            {
                "idfactura": 10, "codigo": "FAC2024A10", "codcliente": "000041",
                "fecha": "01-03-2024", "total": 121.0, "pagada": true, "vencida": false
            },
            {
                "idfactura": 11, "codigo": "FAC2024A11", "codcliente": "000041",
                "fecha": "02-03-2024", "total": 60.5, "pagada": false, "vencida": true
            }
        ]
    }))
}

async fn create_invoice(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "beplyData": {
            "idfactura": 12, "codigo": "FAC2024A12", "codcliente": body["codcliente"],
            "fecha": body["fecha"], "total": body["total"], "pagada": false, "vencida": false
        }
    }))
}

async fn invoice_pdf(Path(id): Path<u64>, headers: HeaderMap) -> Response {
    if headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) != Some("application/pdf") {
        return error(StatusCode::NOT_ACCEPTABLE, "PDF only", "NOT_ACCEPTABLE");
    }
    if id != 10 {
        return error(StatusCode::NOT_FOUND, "Invoice not found", "NOT_FOUND");
    }
    ([(header::CONTENT_TYPE, "application/pdf")], b"%PDF-1.4 invoice".to_vec()).into_response()
}

async fn list_tickets() -> Json<Value> {
    Json(json!({
        "tickets": [{
            "id": 1, "userId": "shop", "title": "Card reader offline",
            "description": "Terminal 2 does not connect", "status": "open",
            "createdAt": CREATED_AT, "responses": []
        }]
    }))
}

async fn create_ticket(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "ticket": {
            "id": 2, "userId": bearer_username(&headers), "title": body["title"],
            "description": body["description"], "status": "open",
            "createdAt": CREATED_AT, "responses": []
        }
    }))
}

async fn add_ticket_response(
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    Json(json!({
        "response": {
            "id": 1, "ticketId": id, "userId": bearer_username(&headers),
            "message": body["message"], "createdAt": CREATED_AT
        }
    }))
}

async fn list_api_keys() -> Json<Value> {
    Json(json!({
        "apiKeys": [
            { "id": 1, "name": "web", "key": "gs_live_1", "createdAt": CREATED_AT, "lastUsed": null },
            { "id": 2, "name": "pos", "key": "gs_live_2", "createdAt": CREATED_AT, "lastUsed": CREATED_AT }
        ]
    }))
}

async fn create_api_key(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "apiKey": { "id": 3, "name": body["name"], "key": "gs_live_3", "createdAt": CREATED_AT }
    }))
}

async fn list_users() -> Json<Value> {
    let mut pending = profile_json("newshop", "new@example.com");
    pending["status"] = json!("pending");
    Json(json!({ "users": [profile_json("shop", "shop@example.com"), pending] }))
}

fn payment_json(id: u64, amount: f64, status: &str, method: &str) -> Value {
    json!({
        "id": id, "amount": amount, "currency": "EUR", "status": status,
        "method": method, "reference": format!("PAY-{}", id), "createdAt": CREATED_AT
    })
}

async fn create_intent(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "paymentIntent": {
            "id": "pi_1", "clientSecret": "pi_1_secret", "amount": body["amount"],
            "currency": body["currency"], "status": "pending"
        }
    }))
}

async fn confirm_intent(Path(_id): Path<String>) -> Json<Value> {
    Json(json!({ "payment": payment_json(9, 25.0, "completed", "card") }))
}

async fn cash_payment(Json(body): Json<Value>) -> Json<Value> {
    let amount = body["amount"].as_f64().unwrap_or_default();
    Json(json!({ "payment": payment_json(10, amount, "completed", "cash") }))
}

async fn bizum_payment(Json(body): Json<Value>) -> Json<Value> {
    let amount = body["amount"].as_f64().unwrap_or_default();
    Json(json!({ "payment": payment_json(11, amount, "processing", "bizum") }))
}

async fn refund_payment(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({ "payment": payment_json(id, 25.0, "refunded", "card") }))
}

async fn get_payment(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({ "payment": payment_json(id, 25.0, "completed", "card") }))
}

async fn get_stats() -> Json<Value> {
    Json(json!({
        "stats": {
            "clientesTotales": 12, "ticketsActivos": 3, "ingresosNetos": 15230.5,
            "comisionesTotales": 441.68, "comisionesPorcentaje": "2.9%"
        }
    }))
}

fn product_json(id: u64, name: &str, price: f64) -> Value {
    json!({ "id": id, "name": name, "price": price, "category": "coffee", "stock": 50 })
}

async fn list_products() -> Json<Value> {
    Json(json!({
        "products": [product_json(1, "Espresso", 1.2), product_json(2, "Croissant", 1.5)]
    }))
}

async fn create_product(Json(body): Json<Value>) -> Json<Value> {
    let mut product = product_json(3, "", 0.0);
    product["name"] = body["name"].clone();
    product["price"] = body["price"].clone();
    Json(json!({ "product": product }))
}

async fn update_product(Path(id): Path<u64>, Json(body): Json<Value>) -> Json<Value> {
    let price = body["price"].as_f64().unwrap_or(1.2);
    Json(json!({ "product": product_json(id, "Espresso", price) }))
}

fn mock_router(backend: Backend) -> Router {
    let protected = Router::new()
        .route("/profile", get(get_profile).put(put_profile))
        .route("/sales", get(list_sales).post(create_sale))
        .route("/sales/{id}", put(ok))
        .route("/sales/{id}/complete", put(ok))
        .route("/sales/{id}/cancel", put(ok))
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/{id}", get(invoice_pdf))
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/{id}", put(ok))
        .route("/tickets/{id}/responses", post(add_ticket_response))
        .route("/apikeys", get(list_api_keys).post(create_api_key))
        .route("/apikeys/{id}", delete(ok))
        .route("/users", get(list_users))
        .route("/users/{username}/status", put(ok))
        .route("/payments/intent", post(create_intent))
        .route("/payments/intent/{id}/confirm", post(confirm_intent))
        .route("/payments/cash", post(cash_payment))
        .route("/payments/bizum", post(bizum_payment))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/refund", post(refund_payment))
        .route("/stats", get(get_stats))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", put(update_product))
        .layer(middleware::from_fn_with_state(backend.clone(), require_bearer));

    let public = Router::new()
        .route("/login", post(login))
        .route("/register", post(register));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(middleware::from_fn_with_state(backend.clone(), record_hit))
        .with_state(backend)
}

// ==================== FIXTURE ====================

/// Test fixture for integration tests.
struct TestFixture {
    app: App,
    backend: Backend,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::with_dir(temp_dir, "localhost").await
    }

    async fn with_dir(temp_dir: TempDir, app_host: &str) -> Self {
        let backend = Backend::default();
        let app = mock_router(backend.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = Config::new(
            base_url,
            temp_dir.path().join("auth_token"),
            app_host,
            "warn",
        )
        .expect("Invalid config");

        TestFixture {
            app: App::new(config).expect("Failed to build app"),
            backend,
            temp_dir,
        }
    }

    async fn signed_in(username: &str) -> Self {
        let fixture = Self::new().await;
        let outcome = fixture.app.session.login(username, username).await;
        assert_eq!(outcome, LoginOutcome::Success);
        fixture
    }

    fn token_path(&self) -> PathBuf {
        self.temp_dir.path().join("auth_token")
    }

    /// Sign in again after a forced logout.
    async fn relogin(&self, username: &str) {
        self.backend.state().revoked = false;
        let outcome = self.app.session.login(username, username).await;
        assert_eq!(outcome, LoginOutcome::Success);
    }
}

fn error_code(error: Option<crate::errors::StoreError>) -> Option<&'static str> {
    error.map(|e| e.error_code())
}

// ==================== SESSION ====================

#[tokio::test]
async fn test_login_admin_success() {
    let fixture = TestFixture::new().await;

    let outcome = fixture.app.session.login("admin", "admin").await;

    assert_eq!(outcome, LoginOutcome::Success);
    let flags = fixture.app.session.flags().await;
    assert!(flags.is_authenticated);
    assert!(flags.is_admin);
    assert!(!flags.is_sandbox_mode);
    assert!(fixture.app.session.last_error().await.is_none());
    assert!(!fixture.app.session.is_loading().await);

    let user = fixture.app.session.user().await.unwrap();
    assert_eq!(user.username, "admin");
    assert_eq!(user.role, Role::Admin);
    assert_eq!(user.id.as_deref(), Some("u-admin"));
    assert_eq!(user.profile.email, "admin@example.com");

    assert!(fixture.token_path().exists());
    assert!(fixture.backend.hit("GET /profile"));
}

#[tokio::test]
async fn test_login_inactive_account() {
    let fixture = TestFixture::new().await;

    let outcome = fixture.app.session.login("pending", "pending").await;

    assert_eq!(outcome, LoginOutcome::Inactive);
    assert!(!fixture.app.session.is_authenticated().await);
    assert_eq!(
        error_code(fixture.app.session.last_error().await),
        Some("ACCOUNT_INACTIVE")
    );
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let fixture = TestFixture::new().await;

    let outcome = fixture.app.session.login("admin", "wrong").await;

    assert_eq!(outcome, LoginOutcome::Error);
    assert!(!fixture.app.session.is_authenticated().await);
    assert_eq!(
        error_code(fixture.app.session.last_error().await),
        Some("INVALID_CREDENTIALS")
    );
}

#[tokio::test]
async fn test_login_with_expired_token_is_refused() {
    let fixture = TestFixture::new().await;

    let outcome = fixture.app.session.login("stale", "stale").await;

    assert_eq!(outcome, LoginOutcome::Error);
    assert!(!fixture.app.session.is_authenticated().await);
    assert_eq!(
        error_code(fixture.app.session.last_error().await),
        Some("SERVER_ERROR")
    );
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn test_login_clears_previous_error() {
    let fixture = TestFixture::new().await;
    fixture.app.session.login("admin", "wrong").await;
    assert!(fixture.app.session.last_error().await.is_some());

    fixture.app.session.login("admin", "admin").await;
    assert!(fixture.app.session.last_error().await.is_none());
}

#[tokio::test]
async fn test_restore_persisted_session() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("auth_token"),
        token_for("shop", "client", Duration::hours(2)),
    )
    .unwrap();
    let fixture = TestFixture::with_dir(temp_dir, "sandbox.green-sys.es").await;

    let flags = fixture.app.start().await;

    assert!(flags.is_authenticated);
    assert!(!flags.is_admin);
    assert!(flags.is_client);
    assert!(flags.is_sandbox_mode);
    let user = fixture.app.session.user().await.unwrap();
    assert_eq!(user.profile.email, "shop@example.com");
    assert_eq!(user.status, UserStatus::Active);
}

#[tokio::test]
async fn test_restore_expired_session() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("auth_token"),
        token_for("shop", "client", Duration::seconds(-30)),
    )
    .unwrap();
    let fixture = TestFixture::with_dir(temp_dir, "localhost").await;

    let flags = fixture.app.start().await;

    assert!(!flags.is_authenticated);
    assert!(fixture.app.session.token().await.is_none());
    assert!(!fixture.token_path().exists());
    // No request is made for an expired token.
    assert!(fixture.backend.hits().is_empty());
}

#[tokio::test]
async fn test_restore_rejected_token_logs_out() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("auth_token"),
        token_for("shop", "client", Duration::hours(2)),
    )
    .unwrap();
    let fixture = TestFixture::with_dir(temp_dir, "localhost").await;
    fixture.backend.state().revoked = true;

    let flags = fixture.app.start().await;

    assert!(!flags.is_authenticated);
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let fixture = TestFixture::signed_in("shop").await;

    fixture.app.session.logout().await;
    fixture.app.session.logout().await;

    assert!(!fixture.app.session.is_authenticated().await);
    assert!(fixture.app.session.token().await.is_none());
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn test_register() {
    let fixture = TestFixture::new().await;

    let mut request = RegisterRequest {
        username: "newshop".into(),
        password: "secret".into(),
        business_name: "New Shop".into(),
        ..Default::default()
    };
    assert!(!fixture.app.session.register(&request).await);
    let error = fixture.app.session.last_error().await.unwrap();
    assert_eq!(error.error_code(), "VALIDATION_ERROR");
    assert_eq!(error.message(), "Email is required");

    request.email = "new@example.com".into();
    assert!(fixture.app.session.register(&request).await);
    assert!(fixture.app.session.last_error().await.is_none());
    assert!(!fixture.app.session.is_authenticated().await);
}

#[tokio::test]
async fn test_update_profile_merges_whitelisted_fields() {
    let fixture = TestFixture::signed_in("admin").await;

    let update = ProfileUpdate {
        email: Some("billing@example.com".into()),
        ..Default::default()
    };
    assert!(fixture.app.session.update_profile(&update).await);

    let user = fixture.app.session.user().await.unwrap();
    assert_eq!(user.profile.email, "billing@example.com");
    assert_eq!(user.profile.business_name, "Cafe Central SL");
    // Role stays as carried by the token.
    assert_eq!(user.role, Role::Admin);
    assert!(fixture.app.session.is_admin().await);
}

#[tokio::test]
async fn test_partial_profile_answer_keeps_stored_details() {
    let fixture = TestFixture::signed_in("shop").await;
    fixture.backend.state().partial_profile = true;

    let update = ProfileUpdate {
        email: Some("billing@example.com".into()),
        ..Default::default()
    };
    assert!(fixture.app.session.update_profile(&update).await);

    let user = fixture.app.session.user().await.unwrap();
    assert_eq!(user.profile.email, "billing@example.com");
    assert_eq!(user.profile.phone, "600123123");
    assert_eq!(user.profile.business_name, "Cafe Central SL");
    assert_eq!(user.profile.iban, "ES9121000418450200051332");
    assert_eq!(user.id.as_deref(), Some("u-shop"));
    assert_eq!(user.status, UserStatus::Active);
    assert!(fixture.app.session.is_authenticated().await);
}

// ==================== NAVIGATION ====================

#[tokio::test]
async fn test_guard_redirects_then_proceeds_after_login() {
    let fixture = TestFixture::new().await;

    let decision = fixture.app.navigate("/sales").await;
    assert_eq!(
        decision,
        Navigation::RedirectToLogin {
            return_to: "/sales".to_string()
        }
    );

    fixture.app.session.login("shop", "shop").await;
    assert_eq!(fixture.app.navigate("/sales").await, Navigation::Proceed);
    assert_eq!(fixture.app.navigate("/admin/users").await, Navigation::NotFound);
    assert_eq!(
        fixture.app.navigate("/login").await,
        Navigation::RedirectToHome { path: "/dashboard" }
    );
}

#[tokio::test]
async fn test_guard_admin_areas() {
    let fixture = TestFixture::signed_in("admin").await;

    assert_eq!(fixture.app.navigate("/admin/users").await, Navigation::Proceed);
    assert_eq!(fixture.app.navigate("/tpv").await, Navigation::NotFound);
    assert_eq!(
        fixture.app.navigate("/register").await,
        Navigation::RedirectToHome { path: ADMIN_HOME }
    );
    // Guarding never touches the session.
    assert!(fixture.app.session.is_authenticated().await);
}

// ==================== SESSION EXPIRY ====================

#[tokio::test]
async fn test_unauthorized_from_any_store_logs_out() {
    let fixture = TestFixture::signed_in("shop").await;
    let app = &fixture.app;

    fixture.backend.state().revoked = true;
    assert!(!app.sales.fetch_sales().await);
    assert!(!app.session.is_authenticated().await);
    assert!(!fixture.token_path().exists());
    assert_eq!(error_code(app.sales.last_error().await), Some("INVALID_CREDENTIALS"));

    fixture.relogin("shop").await;
    fixture.backend.state().revoked = true;
    assert!(!app.invoices.fetch_invoices().await);
    assert!(!app.session.is_authenticated().await);
    assert!(!fixture.token_path().exists());

    fixture.relogin("shop").await;
    fixture.backend.state().revoked = true;
    assert!(app.api_keys.create_api_key("web").await.is_none());
    assert!(!app.session.is_authenticated().await);

    fixture.relogin("shop").await;
    fixture.backend.state().revoked = true;
    assert!(app.payments.process_cash_payment(12.0).await.is_none());
    assert!(!app.session.is_authenticated().await);
    assert_eq!(
        error_code(app.payments.last_error().await),
        Some("INVALID_CREDENTIALS")
    );

    fixture.relogin("shop").await;
    fixture.backend.state().revoked = true;
    assert!(!app.tpv.fetch_products().await);
    assert!(!app.session.is_authenticated().await);
    assert!(!fixture.token_path().exists());
}

#[tokio::test]
async fn test_late_rejection_of_old_token_keeps_new_session() {
    let fixture = TestFixture::signed_in("shop").await;
    let app = &fixture.app;
    let old_token = app.session.token().await.unwrap();
    fixture.backend.state().stale_tokens.push(old_token.clone());

    let (fetched, _) = tokio::join!(app.stats.fetch_stats(), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        app.session.logout().await;
        fixture.relogin("shop").await;
    });

    assert!(!fetched);
    assert_eq!(error_code(app.stats.last_error().await), Some("INVALID_CREDENTIALS"));
    let new_token = app.session.token().await.unwrap();
    assert_ne!(new_token, old_token);
    assert!(app.session.is_authenticated().await);
    assert_eq!(std::fs::read_to_string(fixture.token_path()).unwrap(), new_token);
}

#[tokio::test]
async fn test_store_without_session_sends_nothing() {
    let fixture = TestFixture::new().await;

    assert!(!fixture.app.tickets.fetch_tickets().await);

    assert_eq!(
        error_code(fixture.app.tickets.last_error().await),
        Some("INVALID_CREDENTIALS")
    );
    assert!(!fixture.app.tickets.is_loading().await);
    assert!(fixture.backend.hits().is_empty());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let fixture = TestFixture::signed_in("shop").await;
    let config = Config::new(
        "http://127.0.0.1:9",
        fixture.temp_dir.path().join("auth_token"),
        "localhost",
        "warn",
    )
    .unwrap();
    let offline = App::new(config).unwrap();
    offline.start().await;
    assert!(offline.session.is_authenticated().await);

    assert!(!offline.stats.fetch_stats().await);

    assert_eq!(error_code(offline.stats.last_error().await), Some("NETWORK_ERROR"));
    // Transport failures do not end the session.
    assert!(offline.session.is_authenticated().await);
}

// ==================== SALES ====================

#[tokio::test]
async fn test_fetch_replaces_collection_wholesale() {
    let fixture = TestFixture::signed_in("shop").await;
    fixture.backend.state().sales_responses = VecDeque::from(vec![
        vec![sale_json(1, "shop", 10.0, "paid"), sale_json(2, "shop", 20.0, "paid")],
        vec![],
    ]);

    assert!(fixture.app.sales.fetch_sales().await);
    assert_eq!(fixture.app.sales.sales().await.len(), 2);

    assert!(fixture.app.sales.fetch_sales().await);
    assert!(fixture.app.sales.sales().await.is_empty());
}

#[tokio::test]
async fn test_refund_paid_sale() {
    let fixture = TestFixture::signed_in("shop").await;
    let sales = &fixture.app.sales;
    assert!(sales.fetch_sales().await);
    assert_eq!(sales.sales_by_user("shop").await.len(), 2);

    assert!(sales.refund_sale(2).await);

    assert!(fixture.backend.hit("PUT /sales/2"));
    let refunded = sales.sales().await.into_iter().find(|s| s.id == 2).unwrap();
    assert_eq!(refunded.status, SaleStatus::Refunded);
    assert!(sales.last_error().await.is_none());
}

#[tokio::test]
async fn test_forbidden_transition_never_reaches_backend() {
    let fixture = TestFixture::signed_in("shop").await;
    let sales = &fixture.app.sales;
    assert!(sales.fetch_sales().await);

    // Sale 1 is still pending.
    assert!(!sales.refund_sale(1).await);

    assert_eq!(error_code(sales.last_error().await), Some("VALIDATION_ERROR"));
    assert!(!fixture.backend.hit("PUT /sales/1"));
    let sale = sales.sales().await.into_iter().find(|s| s.id == 1).unwrap();
    assert_eq!(sale.status, SaleStatus::Pending);

    assert!(sales.update_sale_status(1, SaleStatus::Paid).await);
    assert!(sales.last_error().await.is_none());
}

#[tokio::test]
async fn test_create_sale_carries_commission() {
    let fixture = TestFixture::signed_in("shop").await;

    let sale = fixture
        .app
        .sales
        .create_sale(&CreateSaleRequest {
            amount: 100.0,
            description: "Online order".into(),
            reference: "WEB-1".into(),
            payment_method: "card".into(),
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(sale.commission.percentage, 2.9);
    assert_eq!(sale.commission.amount, 2.9);
    assert_eq!(sale.commission.total, 97.1);
    assert_eq!(sale.reference, "WEB-1");
    assert_eq!(fixture.app.sales.sales().await.len(), 1);
}

#[tokio::test]
async fn test_create_sale_for_premium_tier() {
    let fixture = TestFixture::signed_in("shop").await;

    let sale = fixture
        .app
        .sales
        .create_sale_for_tier(
            &CreateSaleRequest {
                amount: 100.0,
                description: "Wholesale order".into(),
                reference: "WEB-2".into(),
                payment_method: "card".into(),
                metadata: None,
            },
            Tier::Premium,
        )
        .await
        .unwrap();

    assert_eq!(sale.commission.percentage, 1.9);
    assert_eq!(sale.commission.amount, 1.9);
    assert_eq!(sale.commission.total, 98.1);
}

// ==================== INVOICES ====================

#[tokio::test]
async fn test_invoices_and_pdf_download() {
    let fixture = TestFixture::signed_in("shop").await;
    let invoices = &fixture.app.invoices;

    assert!(invoices.fetch_invoices().await);
    assert_eq!(invoices.invoices().await.len(), 2);
    assert_eq!(invoices.invoices_by_status(InvoiceStatus::Overdue).await.len(), 1);

    let pdf = invoices.download_invoice_pdf(10).await.unwrap();
    assert_eq!(pdf.file_name, "invoice-10.pdf");
    assert_eq!(pdf.bytes, b"%PDF-1.4 invoice");
    let path = pdf.write_to(fixture.temp_dir.path()).await.unwrap();
    assert!(path.exists());

    assert!(invoices.download_invoice_pdf(99).await.is_none());
    let error = invoices.last_error().await.unwrap();
    assert_eq!(error.error_code(), "SERVER_ERROR");
    assert_eq!(error.message(), "Invoice not found");
    // A 404 on a document does not end the session.
    assert!(fixture.app.session.is_authenticated().await);
}

#[tokio::test]
async fn test_create_invoice() {
    let fixture = TestFixture::signed_in("shop").await;
    let invoices = &fixture.app.invoices;
    assert!(invoices.fetch_invoices().await);

    let draft = NewInvoice {
        customer_code: "000041".into(),
        fecha: "03-03-2024".into(),
        total: 48.4,
        ..Default::default()
    };
    let created = invoices.create_invoice(&draft).await.unwrap();

    assert_eq!(created.codigo, "FAC2024A12");
    assert_eq!(created.status(), InvoiceStatus::Pending);
    assert_eq!(invoices.invoices().await.len(), 3);

    let hits_before = fixture.backend.hits().len();
    assert!(invoices.create_invoice(&NewInvoice::default()).await.is_none());
    assert_eq!(error_code(invoices.last_error().await), Some("VALIDATION_ERROR"));
    assert_eq!(fixture.backend.hits().len(), hits_before);
}

// ==================== TICKETS ====================

#[tokio::test]
async fn test_ticket_lifecycle() {
    let fixture = TestFixture::signed_in("shop").await;
    let tickets = &fixture.app.tickets;

    assert!(tickets.fetch_tickets().await);
    let ticket = tickets
        .create_ticket("Refund request", "Customer wants a refund")
        .await
        .unwrap();
    assert_eq!(ticket.user_id, "shop");
    assert_eq!(tickets.tickets_by_user("shop").await.len(), 2);

    assert!(tickets.add_response(ticket.id, "Looking into it").await);
    let stored = tickets
        .tickets()
        .await
        .into_iter()
        .find(|t| t.id == ticket.id)
        .unwrap();
    assert_eq!(stored.responses.len(), 1);
    assert_eq!(stored.responses[0].message, "Looking into it");

    assert!(tickets.update_ticket_status(1, TicketStatus::Resolved).await);
    assert!(!tickets.update_ticket_status(1, TicketStatus::Open).await);
    assert_eq!(error_code(tickets.last_error().await), Some("VALIDATION_ERROR"));

    assert!(tickets.create_ticket("  ", "no title").await.is_none());
    assert!(fixture.backend.hit("PUT /tickets/1"));
}

// ==================== API KEYS ====================

#[tokio::test]
async fn test_api_key_create_and_revoke() {
    let fixture = TestFixture::signed_in("shop").await;
    let keys = &fixture.app.api_keys;

    assert!(keys.fetch_api_keys().await);
    assert_eq!(keys.api_keys().await.len(), 2);

    let created = keys.create_api_key("shopify").await.unwrap();
    assert_eq!(created.name, "shopify");
    assert_eq!(keys.api_keys().await.len(), 3);

    assert!(keys.revoke_api_key(1).await);
    assert!(fixture.backend.hit("DELETE /apikeys/1"));
    let remaining: Vec<u64> = keys.api_keys().await.iter().map(|k| k.id).collect();
    assert_eq!(remaining, vec![2, 3]);
}

// ==================== USERS ====================

#[tokio::test]
async fn test_user_status_update() {
    let fixture = TestFixture::signed_in("admin").await;
    let users = &fixture.app.users;

    assert!(users.fetch_users().await);
    assert_eq!(users.users_by_status(UserStatus::Pending).await.len(), 1);

    assert!(users.update_user_status("newshop", UserStatus::Active).await);
    assert!(fixture.backend.hit("PUT /users/newshop/status"));
    assert!(users.users_by_status(UserStatus::Pending).await.is_empty());

    assert!(!users.update_user_status("newshop", UserStatus::Pending).await);
    assert_eq!(error_code(users.last_error().await), Some("VALIDATION_ERROR"));
}

// ==================== PAYMENTS ====================

#[tokio::test]
async fn test_card_payment_flow() {
    let fixture = TestFixture::signed_in("shop").await;
    let payments = &fixture.app.payments;

    let intent = payments
        .create_payment_intent(25.0, crate::stores::DEFAULT_CURRENCY)
        .await
        .unwrap();
    assert_eq!(intent.id, "pi_1");
    assert_eq!(payments.payment_intent().await.unwrap().currency, "EUR");

    let payment = payments.confirm_card_payment("pi_1", "pm_card").await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payments.payment_intent().await.is_none());

    let refunded = payments.refund_payment(payment.id, None).await.unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(
        payments.current_payment().await.unwrap().status,
        PaymentStatus::Refunded
    );

    // A refunded payment cannot be refunded again.
    assert!(payments.refund_payment(payment.id, None).await.is_none());
    assert_eq!(error_code(payments.last_error().await), Some("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_cash_and_bizum_payments() {
    let fixture = TestFixture::signed_in("shop").await;
    let payments = &fixture.app.payments;

    let cash = payments.process_cash_payment(12.5).await.unwrap();
    assert_eq!(cash.amount, 12.5);

    assert!(payments.process_bizum_payment(8.0, "").await.is_none());
    assert!(!fixture.backend.hit("POST /payments/bizum"));

    let bizum = payments.process_bizum_payment(8.0, "600123123").await.unwrap();
    assert_eq!(bizum.status, PaymentStatus::Processing);
    assert_eq!(payments.current_payment().await.unwrap().id, bizum.id);

    let polled = payments.get_payment_status(bizum.id).await.unwrap();
    assert_eq!(polled.status, PaymentStatus::Completed);
    assert_eq!(
        payments.current_payment().await.unwrap().status,
        PaymentStatus::Completed
    );

    assert!(payments.process_cash_payment(0.0).await.is_none());
    assert_eq!(error_code(payments.last_error().await), Some("VALIDATION_ERROR"));
}

// ==================== STATS ====================

#[tokio::test]
async fn test_stats() {
    let fixture = TestFixture::signed_in("admin").await;

    assert!(fixture.app.stats.fetch_stats().await);

    let stats = fixture.app.stats.stats().await.unwrap();
    assert_eq!(stats.total_clients, 12);
    assert_eq!(stats.commission_percentage, "2.9%");
}

// ==================== TPV ====================

#[tokio::test]
async fn test_checkout_flow() {
    let fixture = TestFixture::signed_in("shop").await;
    let tpv = &fixture.app.tpv;

    assert!(tpv.fetch_products().await);
    let products = tpv.products().await;
    let espresso = products[0].clone();
    let croissant = products[1].clone();

    tpv.add_to_cart(espresso.clone(), 1).await;
    tpv.add_to_cart(espresso.clone(), 2).await;
    let cart = tpv.cart().await;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 3);
    assert_eq!(tpv.cart_total().await, 3.6);

    tpv.add_to_cart(croissant, 2).await;
    tpv.update_quantity(2, 1).await;
    assert_eq!(tpv.cart_total().await, 5.1);

    let sale = tpv.create_sale("cash").await.unwrap();
    assert_eq!(sale.total, 5.1);
    assert_eq!(sale.items.len(), 2);
    assert!(sale.reference.starts_with("SALE-"));
    assert_eq!(tpv.current_sale().await.unwrap().id, sale.id);

    assert!(tpv.complete_sale(sale.id).await);
    assert!(fixture.backend.hit("PUT /sales/500/complete"));
    assert!(tpv.cart().await.is_empty());
    assert!(tpv.current_sale().await.is_none());
}

#[tokio::test]
async fn test_checkout_cancel_and_empty_cart() {
    let fixture = TestFixture::signed_in("shop").await;
    let tpv = &fixture.app.tpv;

    assert!(tpv.create_sale("card").await.is_none());
    assert_eq!(error_code(tpv.last_error().await), Some("VALIDATION_ERROR"));
    assert!(!fixture.backend.hit("POST /sales"));

    assert!(tpv.fetch_products().await);
    let espresso = tpv.products().await[0].clone();
    tpv.add_to_cart(espresso, 1).await;
    let sale = tpv.create_sale("card").await.unwrap();

    assert!(tpv.cancel_sale(sale.id).await);
    assert!(fixture.backend.hit("PUT /sales/500/cancel"));
    assert!(tpv.cart().await.is_empty());

    let products = tpv.products().await;
    tpv.add_to_cart(products[0].clone(), 2).await;
    tpv.add_to_cart(products[1].clone(), 1).await;
    tpv.remove_from_cart(products[0].id).await;
    assert_eq!(tpv.cart_total().await, 1.5);
    tpv.create_sale("cash").await.unwrap();

    tpv.clear_cart().await;
    assert!(tpv.cart().await.is_empty());
    assert!(tpv.current_sale().await.is_none());
}

#[tokio::test]
async fn test_product_catalogue() {
    let fixture = TestFixture::signed_in("shop").await;
    let tpv = &fixture.app.tpv;
    assert!(tpv.fetch_products().await);

    let added = tpv
        .add_product(&NewProduct {
            name: "Tea".into(),
            price: 1.1,
            category: "drinks".into(),
            stock: 20,
            image: None,
        })
        .await;
    assert!(added);
    assert_eq!(tpv.products().await.len(), 3);

    let update = crate::models::ProductUpdate {
        price: Some(1.3),
        ..Default::default()
    };
    assert!(tpv.update_product(1, &update).await);
    let espresso = tpv.products().await.into_iter().find(|p| p.id == 1).unwrap();
    assert_eq!(espresso.price, 1.3);
}

// ==================== APP CONTEXT ====================

#[tokio::test]
async fn test_shutdown_drops_cached_state_but_keeps_token() {
    let fixture = TestFixture::signed_in("shop").await;
    assert!(fixture.app.sales.fetch_sales().await);

    fixture.app.shutdown().await;

    assert!(fixture.app.sales.sales().await.is_empty());
    assert!(!fixture.app.session.is_authenticated().await);
    assert!(fixture.token_path().exists());

    // A fresh start picks the session back up.
    let flags = fixture.app.start().await;
    assert!(flags.is_authenticated);
}
