//! Admin HTTP API integration tests.

mod common;

use axum::http::StatusCode;
use common::{date, TestHarness, OPERATOR};
use renewal_core::NotificationKind;
use renewal_service::scheduler::run_job;
use renewal_service::JobKind;
use serde_json::{json, Value};

async fn create_account(harness: &TestHarness, body: Value) -> Value {
    let response = harness.post("/v1/accounts").json(&body).await;
    response.assert_status_ok();
    response.json()
}

// ============================================================================
// Health and Auth
// ============================================================================

#[tokio::test]
async fn health_check_is_public() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "renewal");
}

#[tokio::test]
async fn admin_routes_require_the_admin_key() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/debtors").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "unauthorized");
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn create_and_fetch_account() {
    let harness = TestHarness::new();

    let created = create_account(
        &harness,
        json!({
            "name": "alice",
            "start_date": "2024-01-31",
            "messaging_address": "chat-alice",
            "initial_balance_cents": 12_345
        }),
    )
    .await;

    assert_eq!(created["balance_cents"], 12_345);
    assert_eq!(created["balance_formatted"], "123.45");
    assert_eq!(created["next_billing_date"], "2024-01-31");
    assert_eq!(created["status"], "active");

    let id = created["id"].as_str().unwrap();
    let response = harness.get(&format!("/v1/accounts/{id}")).await;
    response.assert_status_ok();
    let fetched: Value = response.json();
    assert_eq!(fetched["name"], "alice");

    // The opening balance is a ledger deposit.
    let response = harness
        .get(&format!("/v1/accounts/{id}/transactions"))
        .await;
    response.assert_status_ok();
    let transactions: Value = response.json();
    assert_eq!(transactions.as_array().unwrap().len(), 1);
    assert_eq!(transactions[0]["kind"], "deposit");
}

#[tokio::test]
async fn malformed_and_unknown_ids() {
    let harness = TestHarness::new();

    harness
        .get("/v1/accounts/not-a-uuid")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = harness
        .get("/v1/accounts/7f0c2d8e-7a4b-4a59-9a3e-2f3f6c1d9b10")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn balance_changes_go_through_the_ledger() {
    let harness = TestHarness::new();
    let created = create_account(&harness, json!({ "name": "bob", "start_date": "2024-03-01" })).await;
    let id = created["id"].as_str().unwrap();

    let response = harness
        .post(&format!("/v1/accounts/{id}/balance"))
        .json(&json!({ "amount_cents": 5_000, "kind": "deposit" }))
        .await;
    response.assert_status_ok();

    let response = harness
        .post(&format!("/v1/accounts/{id}/balance"))
        .json(&json!({ "amount_cents": -7_000, "kind": "adjustment", "memo": "refund" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["account"]["balance_cents"], -2_000);
    assert_eq!(body["transaction"]["balance_after_cents"], -2_000);
    assert_eq!(body["transaction"]["memo"], "refund");

    // Withdrawals are reserved for subscription charges.
    harness
        .post(&format!("/v1/accounts/{id}/balance"))
        .json(&json!({ "amount_cents": -100, "kind": "withdrawal" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let transactions: Value = harness
        .get(&format!("/v1/accounts/{id}/transactions"))
        .await
        .json();
    let transactions = transactions.as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["memo"], "refund");
}

#[tokio::test]
async fn preferences_are_validated() {
    let harness = TestHarness::new();
    let created = create_account(&harness, json!({ "name": "carol", "start_date": "2024-03-01" })).await;
    let id = created["id"].as_str().unwrap();

    let response = harness
        .put(&format!("/v1/accounts/{id}/preferences"))
        .json(&json!({
            "billing_notifications_enabled": true,
            "notify_before_days": 31,
            "negative_balance_notifications_enabled": true
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = harness
        .put(&format!("/v1/accounts/{id}/preferences"))
        .json(&json!({
            "billing_notifications_enabled": false,
            "notify_before_days": 0,
            "negative_balance_notifications_enabled": false
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["preferences"]["notify_before_days"], 0);
    assert_eq!(body["preferences"]["billing_notifications_enabled"], false);
}

#[tokio::test]
async fn linking_delivers_waiting_notifications_and_rejects_taken_addresses() {
    let harness = TestHarness::new();
    let taken = create_account(
        &harness,
        json!({ "name": "dave", "start_date": "2024-03-01", "messaging_address": "chat-dave" }),
    )
    .await;
    let ghost = create_account(&harness, json!({ "name": "ghost", "start_date": "2024-03-01" })).await;
    let ghost_id = ghost["id"].as_str().unwrap();
    assert!(ghost["messaging_address"].is_null());

    harness
        .post(&format!("/v1/accounts/{ghost_id}/notifications"))
        .json(&json!({ "message": "welcome", "kind": "key-update" }))
        .await
        .assert_status_ok();

    harness
        .post(&format!("/v1/accounts/{ghost_id}/link"))
        .json(&json!({ "messaging_address": taken["messaging_address"] }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let response = harness
        .post(&format!("/v1/accounts/{ghost_id}/link"))
        .json(&json!({ "messaging_address": "chat-ghost" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["account"]["messaging_address"], "chat-ghost");
    assert_eq!(body["delivery"]["delivered"].as_array().unwrap().len(), 1);
    assert_eq!(harness.engine.channel.sent_to("chat-ghost"), vec!["welcome"]);
}

#[tokio::test]
async fn admin_message_is_delivered_immediately() {
    let harness = TestHarness::new();
    let created = create_account(
        &harness,
        json!({ "name": "erin", "start_date": "2024-03-01", "messaging_address": "chat-erin" }),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = harness
        .post(&format!("/v1/accounts/{id}/notifications"))
        .json(&json!({ "message": "maintenance tonight" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["delivered"], true);

    let response = harness
        .post(&format!("/v1/accounts/{id}/notifications"))
        .json(&json!({ "message": "queued only", "deliver_now": false }))
        .await;
    let body: Value = response.json();
    assert_eq!(body["delivered"], false);
    assert_eq!(harness.engine.pending(None).len(), 1);
}

// ============================================================================
// Runs, Debtors and Settings
// ============================================================================

#[tokio::test]
async fn billing_run_endpoint_charges_and_records_the_job() {
    let harness = TestHarness::new();
    let rich = harness
        .engine
        .account("rich", Some("chat-rich"), date(2024, 3, 15), 30_000);
    let poor = harness
        .engine
        .account("poor", Some("chat-poor"), date(2024, 3, 15), 1_000);

    let response = harness
        .post("/v1/runs/billing")
        .add_query_param("date", "2024-03-15")
        .await;
    response.assert_status_ok();
    let report: Value = response.json();
    assert_eq!(report["date"], "2024-03-15");
    assert_eq!(report["charged"], json!([rich.id.to_string()]));
    assert_eq!(report["insufficient"], json!([poor.id.to_string()]));

    assert_eq!(harness.engine.channel.sent_to(OPERATOR).len(), 1);

    let jobs: Value = harness.get("/v1/jobs").await.json();
    assert_eq!(jobs["daily_billing"]["runs"], 1);
    assert_eq!(jobs["daily_billing"]["failures"], 0);
    assert_eq!(jobs["outbox_sweep"]["runs"], 0);
}

#[tokio::test]
async fn manual_and_scheduled_sweeps_record_the_same_summary() {
    let harness = TestHarness::new();
    let ghost = harness.engine.account("ghost", None, date(2024, 3, 15), 0);
    harness
        .engine
        .engine
        .outbox()
        .enqueue(ghost.id, "waiting", NotificationKind::AdminMessage)
        .unwrap();

    harness.post("/v1/runs/outbox").await.assert_status_ok();
    let manual = harness.jobs.status(JobKind::OutboxSweep);

    let scheduled = run_job(
        &harness.engine.engine,
        &harness.jobs,
        JobKind::OutboxSweep,
        date(2024, 3, 15),
        None,
    )
    .await
    .unwrap();

    assert_eq!(scheduled, "0 delivered, 0 failed, 1 awaiting address");
    assert_eq!(manual.last_summary.as_deref(), Some(scheduled.as_str()));

    let jobs: Value = harness.get("/v1/jobs").await.json();
    assert_eq!(jobs["outbox_sweep"]["runs"], 2);
    assert_eq!(jobs["outbox_sweep"]["last_summary"], scheduled);
}

#[tokio::test]
async fn blocked_status_is_an_admin_override() {
    let harness = TestHarness::new();
    let account = harness
        .engine
        .account("frank", None, date(2024, 3, 15), 30_000);
    let id = account.id;

    harness
        .put(&format!("/v1/accounts/{id}/status"))
        .json(&json!({ "status": "blocked" }))
        .await
        .assert_status_ok();

    let report: Value = harness
        .post("/v1/runs/billing")
        .add_query_param("date", "2024-03-15")
        .await
        .json();
    assert_eq!(report["due"], 0);

    let body: Value = harness
        .put(&format!("/v1/accounts/{id}/status"))
        .json(&json!({ "status": "active" }))
        .await
        .json();
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn debtors_are_sorted_and_ghosts_optional() {
    let harness = TestHarness::new();
    let linked = harness
        .engine
        .account("linked", Some("chat-linked"), date(2024, 3, 15), 5_000);
    let ghost = harness.engine.account("ghost", None, date(2024, 3, 15), -2_000);
    harness
        .engine
        .account("paid", Some("chat-paid"), date(2024, 3, 15), 10_000);

    let debtors: Value = harness.get("/v1/debtors").await.json();
    assert_eq!(debtors.as_array().unwrap().len(), 1);
    assert_eq!(debtors[0]["id"], linked.id.to_string());

    let debtors: Value = harness
        .get("/v1/debtors")
        .add_query_param("include_ghosts", "true")
        .await
        .json();
    let ids: Vec<_> = debtors
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![ghost.id.to_string(), linked.id.to_string()]);
}

#[tokio::test]
async fn settings_fall_back_to_default_and_reject_negative_price() {
    let harness = TestHarness::new();

    let settings: Value = harness.get("/v1/settings").await.json();
    assert_eq!(settings["subscription_price_cents"], 10_000);

    let response = harness
        .put("/v1/settings")
        .json(&json!({ "subscription_price_cents": -1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = harness
        .put("/v1/settings")
        .json(&json!({
            "subscription_price_cents": 7_500,
            "payment_details": { "phone": "+100200300" }
        }))
        .await;
    response.assert_status_ok();

    let settings: Value = harness.get("/v1/settings").await.json();
    assert_eq!(settings["subscription_price_cents"], 7_500);
    assert_eq!(settings["payment_details"]["phone"], "+100200300");
}
