//! Common test utilities for renewal integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use chrono::{DateTime, NaiveDate, Utc};

use renewal_core::{
    Account, AccountId, BillingSettings, Notification, NotificationId, Transaction, TransactionId,
};
use renewal_service::{
    create_router, AppState, BillingEngine, DeliveryChannel, DeliveryError, EngineConfig,
    JobBoard, ServiceConfig,
};
use renewal_store::{MemoryStore, Store, StoreError};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const OPERATOR: &str = "operator-1";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

// ============================================================================
// Recording Channel
// ============================================================================

/// Delivery channel that records messages and can be told to fail.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `address` fail.
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    /// Let sends to every address succeed again.
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Sleep this long before each send.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| to == address)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, address: &str, text: &str) -> Result<(), DeliveryError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(address) {
            return Err(DeliveryError::Api {
                status: 403,
                description: format!("blocked by {address}"),
            });
        }

        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), text.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ============================================================================
// Faulty Store
// ============================================================================

/// In-memory store that can simulate an outage or a concurrent writer.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    down: AtomicBool,
    conflict_on: Mutex<Option<AccountId>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation from now on.
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    /// Reject commits of this account with a version conflict.
    pub fn conflict_on(&self, account_id: AccountId) {
        *self.conflict_on.lock().unwrap() = Some(account_id);
    }

    fn check(&self) -> renewal_store::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Database("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

impl Store for FaultyStore {
    fn insert_account(
        &self,
        account: &Account,
        transaction: Option<&Transaction>,
    ) -> renewal_store::Result<()> {
        self.check()?;
        self.inner.insert_account(account, transaction)
    }

    fn get_account(&self, account_id: &AccountId) -> renewal_store::Result<Option<Account>> {
        self.check()?;
        self.inner.get_account(account_id)
    }

    fn list_accounts(&self) -> renewal_store::Result<Vec<Account>> {
        self.check()?;
        self.inner.list_accounts()
    }

    fn list_accounts_due_on(&self, date: NaiveDate) -> renewal_store::Result<Vec<Account>> {
        self.check()?;
        self.inner.list_accounts_due_on(date)
    }

    fn find_account_by_address(&self, address: &str) -> renewal_store::Result<Option<Account>> {
        self.check()?;
        self.inner.find_account_by_address(address)
    }

    fn commit_account(
        &self,
        account: &Account,
        transaction: Option<&Transaction>,
    ) -> renewal_store::Result<Account> {
        self.check()?;
        if *self.conflict_on.lock().unwrap() == Some(account.id) {
            return Err(StoreError::VersionConflict {
                account_id: account.id,
                expected: account.version,
                found: account.version + 1,
            });
        }
        self.inner.commit_account(account, transaction)
    }

    fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> renewal_store::Result<Option<Transaction>> {
        self.check()?;
        self.inner.get_transaction(transaction_id)
    }

    fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> renewal_store::Result<Vec<Transaction>> {
        self.check()?;
        self.inner
            .list_transactions_by_account(account_id, limit, offset)
    }

    fn insert_notification(&self, notification: &Notification) -> renewal_store::Result<()> {
        self.check()?;
        self.inner.insert_notification(notification)
    }

    fn get_notification(
        &self,
        notification_id: &NotificationId,
    ) -> renewal_store::Result<Option<Notification>> {
        self.check()?;
        self.inner.get_notification(notification_id)
    }

    fn list_pending_notifications(
        &self,
        account_id: Option<&AccountId>,
    ) -> renewal_store::Result<Vec<Notification>> {
        self.check()?;
        self.inner.list_pending_notifications(account_id)
    }

    fn mark_notification_sent(
        &self,
        notification_id: &NotificationId,
        sent_at: DateTime<Utc>,
    ) -> renewal_store::Result<bool> {
        self.check()?;
        self.inner.mark_notification_sent(notification_id, sent_at)
    }

    fn get_settings(&self) -> renewal_store::Result<Option<BillingSettings>> {
        self.check()?;
        self.inner.get_settings()
    }

    fn put_settings(&self, settings: &BillingSettings) -> renewal_store::Result<()> {
        self.check()?;
        self.inner.put_settings(settings)
    }
}

// ============================================================================
// Engine Harness
// ============================================================================

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        operator_addresses: vec![OPERATOR.to_string()],
        delivery_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    }
}

/// Engine over a faulty store and a recording channel.
pub struct EngineHarness {
    pub engine: Arc<BillingEngine>,
    pub store: Arc<FaultyStore>,
    pub channel: Arc<RecordingChannel>,
}

impl EngineHarness {
    pub fn new() -> Self {
        Self::with_config(engine_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(FaultyStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let engine = Arc::new(BillingEngine::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&channel) as Arc<dyn DeliveryChannel>,
            config,
        ));
        Self {
            engine,
            store,
            channel,
        }
    }

    /// Insert an account directly, bypassing the ledger.
    pub fn account(
        &self,
        name: &str,
        address: Option<&str>,
        start_date: NaiveDate,
        balance_cents: i64,
    ) -> Account {
        let mut account = Account::new(name, start_date);
        account.messaging_address = address.map(str::to_string);
        account.balance_cents = balance_cents;
        self.store.insert_account(&account, None).unwrap();
        account
    }

    pub fn reload(&self, account_id: AccountId) -> Account {
        self.store.get_account(&account_id).unwrap().unwrap()
    }

    pub fn transactions(&self, account_id: AccountId) -> Vec<Transaction> {
        self.store
            .list_transactions_by_account(&account_id, 100, 0)
            .unwrap()
    }

    pub fn pending(&self, account_id: Option<&AccountId>) -> Vec<Notification> {
        self.store.list_pending_notifications(account_id).unwrap()
    }
}

impl Default for EngineHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HTTP Harness
// ============================================================================

/// Test harness containing everything needed for HTTP integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Engine, store and channel behind the server.
    pub engine: EngineHarness,
    /// Scheduler run history shared with the server.
    pub jobs: Arc<JobBoard>,
}

impl TestHarness {
    /// Create a new test harness with a fresh store.
    pub fn new() -> Self {
        let engine = EngineHarness::new();
        let jobs = Arc::new(JobBoard::new());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            admin_api_key: Some(ADMIN_KEY.to_string()),
            operator_addresses: vec![OPERATOR.to_string()],
            ..ServiceConfig::default()
        };

        let state = AppState::new(Arc::clone(&engine.engine), Arc::clone(&jobs), config);
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            engine,
            jobs,
        }
    }

    fn admin(request: TestRequest) -> TestRequest {
        request.add_header(
            HeaderName::from_static("x-admin-key"),
            HeaderValue::from_static(ADMIN_KEY),
        )
    }

    pub fn get(&self, path: &str) -> TestRequest {
        Self::admin(self.server.get(path))
    }

    pub fn post(&self, path: &str) -> TestRequest {
        Self::admin(self.server.post(path))
    }

    pub fn put(&self, path: &str) -> TestRequest {
        Self::admin(self.server.put(path))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
