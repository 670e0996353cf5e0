//! Account administration handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use renewal_core::{
    format_cents, Account, AccountStatus, NotificationKind, NotificationPreferences, Transaction,
    TransactionKind,
};

use super::parse_account_id;
use crate::auth::AdminAuth;
use crate::engine::{DeliveryReport, NewAccount, PreferencesInput};
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for transaction history.
const DEFAULT_TRANSACTION_LIMIT: usize = 50;

/// Largest page size for transaction history.
const MAX_TRANSACTION_LIMIT: usize = 500;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Messaging address; absent for ghost accounts.
    pub messaging_address: Option<String>,
    /// Current balance in cents.
    pub balance_cents: i64,
    /// Balance formatted for display.
    pub balance_formatted: String,
    /// First billing date.
    pub start_date: NaiveDate,
    /// Date of the next charge.
    pub next_billing_date: NaiveDate,
    /// Account status.
    pub status: AccountStatus,
    /// Notification preferences.
    pub preferences: NotificationPreferences,
    /// Optimistic concurrency version.
    pub version: u64,
    /// Created timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.clone(),
            messaging_address: account.messaging_address.clone(),
            balance_cents: account.balance_cents,
            balance_formatted: format_cents(account.balance_cents),
            start_date: account.start_date,
            next_billing_date: account.next_billing_date,
            status: account.status,
            preferences: account.preferences.clone(),
            version: account.version,
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

/// `POST /v1/accounts`
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<NewAccount>,
) -> Result<Json<AccountResponse>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }

    let account = state.engine.create_account(body).await?;
    tracing::info!(admin_id = %admin.admin_id, account_id = %account.id, "Account created via API");

    Ok(Json(AccountResponse::from(&account)))
}

/// `GET /v1/accounts/{id}`
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.engine.account(parse_account_id(&id)?)?;
    Ok(Json(AccountResponse::from(&account)))
}

/// Pagination for transaction history.
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    /// Page size (default 50, max 500).
    pub limit: Option<usize>,
    /// Entries to skip.
    pub offset: Option<usize>,
}

/// `GET /v1/accounts/{id}/transactions`
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
        .min(MAX_TRANSACTION_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let transactions = state
        .engine
        .transactions(parse_account_id(&id)?, limit, offset)?;
    Ok(Json(transactions))
}

/// Balance change request.
#[derive(Debug, Deserialize)]
pub struct AdjustBalanceRequest {
    /// Signed amount in cents.
    pub amount_cents: i64,
    /// `deposit` (positive) or `adjustment` (either sign).
    pub kind: TransactionKind,
    /// Ledger memo.
    #[serde(default)]
    pub memo: Option<String>,
}

/// Balance change response.
#[derive(Debug, Serialize)]
pub struct AdjustBalanceResponse {
    /// Account after the change.
    pub account: AccountResponse,
    /// The recorded ledger entry.
    pub transaction: Transaction,
}

/// `POST /v1/accounts/{id}/balance`
pub async fn adjust_balance(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<AdjustBalanceRequest>,
) -> Result<Json<AdjustBalanceResponse>, ApiError> {
    let account_id = parse_account_id(&id)?;
    let memo = body
        .memo
        .unwrap_or_else(|| format!("Manual {} by {}", body.kind.as_str(), admin.admin_id));

    let (account, transaction) = state
        .engine
        .adjust_balance(account_id, body.amount_cents, body.kind, memo)
        .await?;

    Ok(Json(AdjustBalanceResponse {
        account: AccountResponse::from(&account),
        transaction,
    }))
}

/// `PUT /v1/accounts/{id}/preferences`
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<PreferencesInput>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .engine
        .update_preferences(parse_account_id(&id)?, body)
        .await?;
    Ok(Json(AccountResponse::from(&account)))
}

/// Status override request.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// New status.
    pub status: AccountStatus,
}

/// `PUT /v1/accounts/{id}/status`
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .engine
        .set_status(parse_account_id(&id)?, body.status)
        .await?;
    tracing::info!(admin_id = %admin.admin_id, account_id = %account.id, "Status set via API");
    Ok(Json(AccountResponse::from(&account)))
}

/// Link request.
#[derive(Debug, Deserialize)]
pub struct LinkAddressRequest {
    /// Messaging address to link.
    pub messaging_address: String,
}

/// Link response.
#[derive(Debug, Serialize)]
pub struct LinkAddressResponse {
    /// Account after linking.
    pub account: AccountResponse,
    /// Delivery of notifications that were waiting for an address.
    pub delivery: DeliveryReport,
}

/// `POST /v1/accounts/{id}/link`
///
/// Notifications queued while the account was a ghost are delivered right
/// after linking; failures stay pending for the sweep.
pub async fn link_address(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<LinkAddressRequest>,
) -> Result<Json<LinkAddressResponse>, ApiError> {
    let address = body.messaging_address.trim().to_string();
    if address.is_empty() {
        return Err(ApiError::BadRequest("messaging_address must not be empty".into()));
    }

    let account_id = parse_account_id(&id)?;
    let account = state.engine.link_address(account_id, address).await?;
    let delivery = state.engine.deliver_pending_for(&account_id).await?;

    Ok(Json(LinkAddressResponse {
        account: AccountResponse::from(&account),
        delivery,
    }))
}

fn default_deliver_now() -> bool {
    true
}

/// Admin notification request.
#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    /// Message text.
    pub message: String,
    /// Notification kind (default `admin-message`).
    #[serde(default)]
    pub kind: Option<NotificationKind>,
    /// Attempt delivery immediately (default true); otherwise only enqueue.
    #[serde(default = "default_deliver_now")]
    pub deliver_now: bool,
}

/// Admin notification response.
#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    /// Outbox entry ID.
    pub notification_id: String,
    /// Whether it was delivered already.
    pub delivered: bool,
}

/// `POST /v1/accounts/{id}/notifications`
pub async fn send_notification(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let account_id = parse_account_id(&id)?;
    let kind = body.kind.unwrap_or(NotificationKind::AdminMessage);
    if kind == NotificationKind::OperatorAlert {
        return Err(ApiError::BadRequest(
            "operator alerts cannot target an account".into(),
        ));
    }

    let (notification, delivered) = if body.deliver_now {
        state.engine.notify(account_id, body.message, kind).await?
    } else {
        (state.engine.outbox().enqueue(account_id, body.message, kind)?, false)
    };

    Ok(Json(SendNotificationResponse {
        notification_id: notification.id.to_string(),
        delivered,
    }))
}
