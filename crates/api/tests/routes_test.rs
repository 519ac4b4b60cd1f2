//! Router tests against the in-memory ledger store.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use clubledger_api::{AppState, create_router};
use clubledger_core::service::LedgerService;
use clubledger_core::store::{InMemoryDirectory, InMemoryLedgerStore};
use clubledger_shared::LedgerSettings;
use clubledger_shared::types::{Currency, OrganizationId, PayerId, UserId};

struct TestApp {
    router: Router,
    org: OrganizationId,
    guardian: PayerId,
    alice: PayerId,
    bob: PayerId,
}

fn app() -> TestApp {
    let org = OrganizationId::new();
    let guardian = PayerId::new();
    let alice = PayerId::new();
    let bob = PayerId::new();
    let directory = Arc::new(
        InMemoryDirectory::new()
            .with_organization(org, Currency::Usd)
            .with_payer(org, guardian, "Guardian")
            .with_payer(org, alice, "Alice")
            .with_payer(org, bob, "Bob")
            .with_guardian_link(org, guardian, alice)
            .with_guardian_link(org, guardian, bob),
    );
    let service = LedgerService::new(
        Arc::new(InMemoryLedgerStore::new()),
        directory.clone(),
        directory.clone(),
        directory,
        LedgerSettings::default(),
    );
    TestApp {
        router: create_router(AppState::new(service)),
        org,
        guardian,
        alice,
        bob,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn debit(app: &TestApp, payer: PayerId, amount: &str) -> Value {
    let (status, body) = send(
        app,
        post(
            &format!("/api/v1/organizations/{}/payers/{payer}/debits", app.org),
            &json!({ "amount": amount, "product": { "name": "Season fee" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn balance(app: &TestApp, payer: PayerId) -> Value {
    let (status, body) = send(
        app,
        get(&format!("/api/v1/organizations/{}/payers/{payer}/balance", app.org)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_debit_then_income_settles_balance() {
    let app = app();
    let created = debit(&app, app.alice, "100.00").await;
    assert_eq!(created["receipt"]["amount"], "100.00");
    assert_eq!(created["receipt"]["product"], "Season fee");
    assert_eq!(created["transaction"]["kind"], "invoice");
    assert_eq!(created["credit_application"]["status"], "nothing_to_apply");

    let (status, paid) = send(
        &app,
        post(
            &format!("/api/v1/organizations/{}/transactions/income", app.org),
            &json!({ "payer_id": app.alice, "amount": "120", "method": "cash" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{paid}");
    assert_eq!(paid["settlements"][0]["applied_to_debits"], "100.00");
    assert_eq!(paid["excess_amount"], "20.00");

    let body = balance(&app, app.alice).await;
    assert_eq!(body["outstanding_debits"], "0.00");
    assert_eq!(body["available_credits"], "20.00");
    assert_eq!(body["net_balance"], "0.00");
    assert_eq!(body["currency"], "USD");
    assert_eq!(body["cached"]["available_credit"], "20.00");
}

#[tokio::test]
async fn test_guardian_payment_prefers_largest_balance() {
    let app = app();
    debit(&app, app.alice, "30").await;
    debit(&app, app.bob, "70").await;

    let (status, body) = send(
        &app,
        post(
            &format!("/api/v1/organizations/{}/transactions/guardian", app.org),
            &json!({ "guardian_id": app.guardian, "amount": "80" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["distributions"][0]["payee_id"], json!(app.bob));
    assert_eq!(body["distributions"][0]["amount_paid"], "70.00");
    assert_eq!(body["distributions"][1]["amount_paid"], "10.00");
    assert_eq!(body["excess_amount"], "0.00");
    assert_eq!(body["players_fully_paid"], 1);
}

#[tokio::test]
async fn test_multi_payee_ignores_zero_shares() {
    let app = app();
    debit(&app, app.bob, "25").await;

    let (status, body) = send(
        &app,
        post(
            &format!("/api/v1/organizations/{}/transactions/multi-payee", app.org),
            &json!({
                "payer_id": app.guardian,
                "payee_payments": [
                    { "payee_id": app.alice, "amount": "0" },
                    { "payee_id": app.bob, "amount": "25.00" }
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["settlements"].as_array().unwrap().len(), 1);
    assert_eq!(body["total_amount"], "25.00");
}

#[tokio::test]
async fn test_soft_delete_and_restore() {
    let app = app();
    debit(&app, app.alice, "50").await;
    let (_, paid) = send(
        &app,
        post(
            &format!("/api/v1/organizations/{}/transactions/income", app.org),
            &json!({ "payer_id": app.alice, "amount": "50" }),
        ),
    )
    .await;
    let txn = paid["transaction_id"].as_str().unwrap().to_string();
    let actor = UserId::new();

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/organizations/{}/transactions/{txn}", app.org))
        .header("x-actor-id", actor.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["receipts"], 1);
    assert_eq!(balance(&app, app.alice).await["net_balance"], "50.00");

    let (status, fetched) = send(
        &app,
        get(&format!("/api/v1/organizations/{}/transactions/{txn}", app.org)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["is_deleted"], true);

    let restore = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/organizations/{}/transactions/{txn}/restore", app.org))
        .header("x-actor-id", actor.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, restore).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(balance(&app, app.alice).await["net_balance"], "0.00");

    let (_, receipts) = send(
        &app,
        get(&format!(
            "/api/v1/organizations/{}/payers/{}/receipts?include_deleted=true",
            app.org, app.alice
        )),
    )
    .await;
    assert_eq!(receipts["receipts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_requires_actor() {
    let app = app();
    let created = debit(&app, app.alice, "10").await;
    let txn = created["transaction"]["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/organizations/{}/transactions/{txn}", app.org))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_actor");
}

#[tokio::test]
async fn test_restore_active_transaction_is_rejected() {
    let app = app();
    let created = debit(&app, app.alice, "10").await;
    let txn = created["transaction"]["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/organizations/{}/transactions/{txn}/restore", app.org))
        .header("x-actor-id", UserId::new().to_string())
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn test_invalid_amounts_are_rejected() {
    let app = app();
    for (amount, code) in [("0", "ZERO_AMOUNT"), ("-5", "NEGATIVE_AMOUNT"), ("1.234", "INVALID_AMOUNT")] {
        let (status, body) = send(
            &app,
            post(
                &format!("/api/v1/organizations/{}/payers/{}/debits", app.org, app.alice),
                &json!({ "amount": amount }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{amount}");
        assert_eq!(body["error"], code);
    }
}

#[tokio::test]
async fn test_unknown_payer_is_not_found() {
    let app = app();
    let (status, body) = send(
        &app,
        get(&format!(
            "/api/v1/organizations/{}/payers/{}/balance",
            app.org,
            PayerId::new()
        )),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "PAYER_NOT_FOUND");
}

#[tokio::test]
async fn test_idempotency_key_replay_conflicts() {
    let app = app();
    let request = || {
        Request::builder()
            .method("POST")
            .uri(format!("/api/v1/organizations/{}/transactions/income", app.org))
            .header("content-type", "application/json")
            .header("idempotency-key", "till-42")
            .body(Body::from(
                json!({ "payer_id": app.alice, "amount": "5" }).to_string(),
            ))
            .unwrap()
    };

    let (status, _) = send(&app, request()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DUPLICATE_REQUEST");
}

#[tokio::test]
async fn test_list_transactions_paginates() {
    let app = app();
    for _ in 0..3 {
        debit(&app, app.alice, "1").await;
    }
    let (status, body) = send(
        &app,
        get(&format!(
            "/api/v1/organizations/{}/transactions?page=2&per_page=2",
            app.org
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["meta"]["total_pages"], 2);
}

#[tokio::test]
async fn test_expense_charged_to_payer_issues_debit() {
    let app = app();
    let (status, body) = send(
        &app,
        post(
            &format!("/api/v1/organizations/{}/transactions/expense", app.org),
            &json!({ "amount": "15", "charged_to": app.bob, "description": "Kit" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["transaction"]["kind"], "expense");
    assert_eq!(body["charge_receipt"]["kind"], "debit");
    assert_eq!(balance(&app, app.bob).await["net_balance"], "15.00");
}
