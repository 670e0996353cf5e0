//! Outbox entry types.
//!
//! A notification is either unsent (eligible for delivery) or sent (terminal).
//! The `sent` flag flips exactly once and is never cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, NotificationId};

/// A message waiting in, or delivered from, the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification ID (ULID for time-ordering).
    pub id: NotificationId,

    /// Who the message is for.
    pub recipient: Recipient,

    /// Message body.
    pub message: String,

    /// Kind of event the message reports.
    pub kind: NotificationKind,

    /// Whether delivery has been confirmed.
    pub sent: bool,

    /// When the notification was created.
    pub created_at: DateTime<Utc>,

    /// When delivery was confirmed.
    pub sent_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Create an unsent notification for an account.
    #[must_use]
    pub fn for_account(
        account_id: AccountId,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self::new(Recipient::Account(account_id), message.into(), kind)
    }

    /// Create an unsent alert for an operator address.
    #[must_use]
    pub fn for_operator(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            Recipient::Operator(address.into()),
            message.into(),
            NotificationKind::OperatorAlert,
        )
    }

    fn new(recipient: Recipient, message: String, kind: NotificationKind) -> Self {
        Self {
            id: NotificationId::generate(),
            recipient,
            message,
            kind,
            sent: false,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    /// The account this notification belongs to, if any.
    #[must_use]
    pub fn account_id(&self) -> Option<AccountId> {
        match &self.recipient {
            Recipient::Account(id) => Some(*id),
            Recipient::Operator(_) => None,
        }
    }

    /// Mark as delivered. Returns `false` if it was already sent.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) -> bool {
        if self.sent {
            return false;
        }
        self.sent = true;
        self.sent_at = Some(at);
        true
    }
}

/// Target of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Recipient {
    /// A subscriber; the address is resolved from the account at delivery
    /// time, so ghost accounts become deliverable once linked.
    Account(AccountId),

    /// An operator, addressed directly.
    Operator(String),
}

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    /// A charge succeeded.
    BillingSuccess,
    /// A charge failed for insufficient funds.
    BillingFailure,
    /// An upcoming charge the balance cannot cover.
    Reminder,
    /// Balance is negative or below the price after a failed charge.
    BalanceWarning,
    /// A new access key was issued.
    KeyUpdate,
    /// Free-form message from an administrator.
    AdminMessage,
    /// Alert addressed to an operator.
    OperatorAlert,
}

impl NotificationKind {
    /// Get the kind name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BillingSuccess => "billing-success",
            Self::BillingFailure => "billing-failure",
            Self::Reminder => "reminder",
            Self::BalanceWarning => "balance-warning",
            Self::KeyUpdate => "key-update",
            Self::AdminMessage => "admin-message",
            Self::OperatorAlert => "operator-alert",
        }
    }
}
