use chrono::{Duration as ChronoDuration, Utc};
use finken_api::config::ApiConfig;
use finken_auth::{JwtClaims, Role};
use finken_core::ActorId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = finken_api::app::build_app(ApiConfig::with_secret(SECRET))
            .await
            .expect("failed to open the in-memory store");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn send(&self, method: reqwest::Method, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, token, path, body).await
    }

    async fn open_account(&self, token: &str, number: &str, name: &str, category: &str, initial: &str) -> i64 {
        let (status, body) = self
            .post(token, "/accounts", json!({
                "number": number,
                "name": name,
                "category": category,
                "normal_side": null,
                "initial_balance": initial,
            }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "open {name}: {body}");
        body["id"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: ActorId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn token(role: Role) -> String {
    mint_jwt(ActorId::new(), vec![role])
}

fn sale(cash: i64, revenue: i64, amount: &str) -> Value {
    json!({
        "date": "2024-01-15",
        "description": "cash sale",
        "lines": [
            { "account_id": cash, "type": "Debit", "amount": amount },
            { "account_id": revenue, "type": "Credit", "amount": amount },
        ],
    })
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(format!("{}/whoami", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(format!("{}/accounts", srv.base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let srv = TestServer::spawn().await;

    let now = Utc::now();
    let claims = JwtClaims {
        sub: ActorId::new(),
        roles: vec![Role::ADMINISTRATOR],
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();

    let (status, _) = srv.get(&forged, "/whoami").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_token_identity_and_permissions() {
    let srv = TestServer::spawn().await;

    let actor = ActorId::new();
    let (status, body) = srv.get(&mint_jwt(actor, vec![Role::ACCOUNTANT]), "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["actor"].as_str().unwrap(), actor.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "accountant"));
    let perms = body["permissions"].as_array().unwrap();
    assert!(perms.iter().any(|p| p == "journal.create"));
    assert!(!perms.iter().any(|p| p == "journal.approve"));
}

#[tokio::test]
async fn sale_flows_from_pending_to_posted() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);
    let accountant = token(Role::ACCOUNTANT);
    let manager = token(Role::MANAGER);

    let cash = srv.open_account(&admin, "1000", "Cash", "Asset", "0").await;
    let revenue = srv.open_account(&admin, "4000", "Sales", "Revenue", "0").await;

    let (status, created) = srv.post(&accountant, "/journal-entries", sale(cash, revenue, "500.00")).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["status"], "Pending");
    let entry = created["id"].as_i64().unwrap();

    // Nothing moves while pending.
    let (_, balance) = srv.get(&accountant, &format!("/accounts/{cash}/balance")).await;
    assert_eq!(balance["balance"], "0.00");

    // Accountants may prepare but not approve.
    let (status, body) = srv.post(&accountant, &format!("/journal-entries/{entry}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, approved) = srv.post(&manager, &format!("/journal-entries/{entry}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["status"], "Approved");

    let (_, balance) = srv.get(&accountant, &format!("/accounts/{cash}/balance")).await;
    assert_eq!(balance["balance"], "500.00");

    let (status, ledger) = srv.get(&accountant, &format!("/accounts/{revenue}/ledger")).await;
    assert_eq!(status, StatusCode::OK);
    let items = ledger["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["balance"], "500.00");

    // A second approval is an illegal transition.
    let (status, body) = srv.post(&manager, &format!("/journal-entries/{entry}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");

    let (status, tb) = srv.get(&accountant, "/reports/trial-balance?as_of=2024-01-31").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tb["total_debit"], "500.00");
    assert_eq!(tb["total_credit"], "500.00");

    let (status, is) = srv
        .get(&accountant, "/reports/income-statement?start=2024-01-01&end=2024-01-31")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(is["net_income"], "500.00");
}

#[tokio::test]
async fn unbalanced_and_malformed_entries_are_rejected() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);

    let cash = srv.open_account(&admin, "1000", "Cash", "Asset", "0").await;
    let revenue = srv.open_account(&admin, "4000", "Sales", "Revenue", "0").await;

    let unbalanced = json!({
        "date": "2024-01-15",
        "lines": [
            { "account_id": cash, "type": "Debit", "amount": "100.00" },
            { "account_id": revenue, "type": "Credit", "amount": "99.99" },
        ],
    });
    let (status, body) = srv.post(&admin, "/journal-entries", unbalanced).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv.post(&admin, "/journal-entries", sale(cash, revenue, "10.005")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = srv.post(&admin, "/journal-entries", sale(cash, 999, "10.00")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = srv.get(&admin, "/journal-entries").await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejection_requires_a_reason_and_is_final() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);
    let manager = token(Role::MANAGER);

    let cash = srv.open_account(&admin, "1000", "Cash", "Asset", "0").await;
    let revenue = srv.open_account(&admin, "4000", "Sales", "Revenue", "0").await;
    let (_, created) = srv.post(&admin, "/journal-entries", sale(cash, revenue, "75.00")).await;
    let entry = created["id"].as_i64().unwrap();

    let (status, _) = srv
        .post(&manager, &format!("/journal-entries/{entry}/reject"), json!({ "reason": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, rejected) = srv
        .post(&manager, &format!("/journal-entries/{entry}/reject"), json!({ "reason": "wrong period" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "Rejected");
    assert_eq!(rejected["rejection_reason"], "wrong period");

    let (status, _) = srv.post(&manager, &format!("/journal-entries/{entry}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listed) = srv.get(&manager, "/journal-entries?status=rejected").await;
    assert_eq!(listed["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn account_management_is_restricted_and_guarded() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);
    let manager = token(Role::MANAGER);

    let (status, _) = srv
        .post(&manager, "/accounts", json!({ "number": "1000", "name": "Cash", "category": "Asset" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let cash = srv.open_account(&admin, "1000", "Cash", "Asset", "250.00").await;
    let equity = srv.open_account(&admin, "3000", "Owner Capital", "Equity", "250.00").await;

    let (status, body) = srv
        .post(&admin, "/accounts", json!({ "number": "1000", "name": "Petty Cash", "category": "Asset" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // Non-zero balance blocks deactivation.
    let (status, body) = srv.post(&admin, &format!("/accounts/{cash}/deactivate"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, updated) = srv
        .send(
            reqwest::Method::PATCH,
            &admin,
            &format!("/accounts/{equity}"),
            json!({ "description": "contributed capital", "display_order": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["description"], "contributed capital");

    let (status, _) = srv.get(&manager, "/accounts/424242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, bs) = srv.get(&manager, "/reports/balance-sheet?as_of=2024-12-31").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bs["total_assets"], "250.00");
}

#[tokio::test]
async fn reversal_round_trip_restores_balances() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);

    let cash = srv.open_account(&admin, "1000", "Cash", "Asset", "0").await;
    let revenue = srv.open_account(&admin, "4000", "Sales", "Revenue", "0").await;
    let (_, created) = srv.post(&admin, "/journal-entries", sale(cash, revenue, "40.00")).await;
    let entry = created["id"].as_i64().unwrap();
    srv.post(&admin, &format!("/journal-entries/{entry}/approve"), json!({})).await;

    let (status, reversal) = srv
        .post(&admin, &format!("/journal-entries/{entry}/reverse"), json!({ "date": "2024-01-20" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{reversal}");
    assert_eq!(reversal["reverses"], entry);
    assert_eq!(reversal["lines"][0]["type"], "Credit");

    let (status, _) = srv
        .post(&admin, &format!("/journal-entries/{entry}/reverse"), json!({ "date": "2024-01-21" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let reversal_id = reversal["id"].as_i64().unwrap();
    let (status, _) = srv.post(&admin, &format!("/journal-entries/{reversal_id}/approve"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, balance) = srv.get(&admin, &format!("/accounts/{cash}/balance")).await;
    assert_eq!(balance["balance"], "0.00");
    let (_, balance) = srv
        .get(&admin, &format!("/accounts/{cash}/balance?as_of=2024-01-15"))
        .await;
    assert_eq!(balance["balance"], "40.00");
}

#[tokio::test]
async fn audit_trail_is_readable_by_managers_only() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);
    let manager = token(Role::MANAGER);
    let accountant = token(Role::ACCOUNTANT);

    let cash = srv.open_account(&admin, "1000", "Cash", "Asset", "0").await;
    let revenue = srv.open_account(&admin, "4000", "Sales", "Revenue", "0").await;
    let (_, created) = srv.post(&accountant, "/journal-entries", sale(cash, revenue, "12.00")).await;
    let entry = created["id"].as_i64().unwrap();
    srv.post(&manager, &format!("/journal-entries/{entry}/approve"), json!({})).await;

    let (status, _) = srv.get(&accountant, "/event-logs").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) = srv.get(&manager, "/event-logs/journal-events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["records"][0]["action"], "Approve");

    let (status, page) = srv.get(&manager, "/event-logs?entity=account&action=create&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["records"].as_array().unwrap().len(), 1);
    assert_eq!(page["has_more"], true);

    let (status, body) = srv.get(&manager, "/event-logs?entity=invoices").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn malformed_path_and_query_parameters_use_the_error_shape() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);

    for path in [
        "/accounts/abc",
        "/accounts/1/balance?as_of=notadate",
        "/journal-entries/first",
        "/journal-entries?start_date=yesterday",
        "/reports/trial-balance?as_of=notadate",
        "/reports/income-statement?start=2024-13-01",
        "/event-logs?limit=-1",
    ] {
        let (status, body) = srv.get(&admin, path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}: {body}");
        assert_eq!(body["error"], "validation_error", "{path}");
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()), "{path}");
    }

    let (status, body) = srv.post(&admin, "/journal-entries/x/approve", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn amounts_beyond_the_supported_range_are_rejected() {
    let srv = TestServer::spawn().await;
    let admin = token(Role::ADMINISTRATOR);

    let cash = srv.open_account(&admin, "1000", "Cash", "Asset", "0").await;
    let revenue = srv.open_account(&admin, "4000", "Sales", "Revenue", "0").await;

    let (status, body) = srv
        .post(&admin, "/journal-entries", sale(cash, revenue, "79228162514264337593543950335"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    let near_limit = "99999999999999999.99";
    let lines = json!({
        "date": "2024-01-15",
        "lines": [
            { "account_id": cash, "type": "Debit", "amount": near_limit },
            { "account_id": cash, "type": "Debit", "amount": near_limit },
            { "account_id": revenue, "type": "Credit", "amount": near_limit },
        ],
    });
    let (status, body) = srv.post(&admin, "/journal-entries", lines).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv
        .post(&admin, "/accounts", json!({
            "number": "1999",
            "name": "Suspense",
            "category": "Asset",
            "initial_balance": "100000000000000000",
        }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = srv.get(&admin, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
}
