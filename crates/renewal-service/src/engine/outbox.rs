//! Durable notification outbox.
//!
//! Notifications are persisted unsent and delivered later. A notification is
//! marked sent only after the channel confirms delivery, so a crash between
//! send and mark may repeat one message but never loses one.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use renewal_core::{AccountId, Notification, NotificationId, NotificationKind, Recipient};
use renewal_store::{Store, StoreError};
use serde::Serialize;
use tokio::sync::watch;

use super::{EngineError, Result};
use crate::channel::{DeliveryChannel, DeliveryError};

/// A delivery attempt that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    /// The notification that stays unsent.
    pub notification_id: NotificationId,
    /// Why delivery failed.
    pub error: String,
}

/// Summary of a delivery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Delivered and marked sent.
    pub delivered: Vec<NotificationId>,
    /// Attempted but failed; left unsent.
    pub failed: Vec<DeliveryFailure>,
    /// Notifications still waiting for their recipient to get a messaging
    /// address. A standing count, not activity: they are seen on every pass.
    pub awaiting_address: usize,
    /// The pass stopped early because of a shutdown request.
    pub interrupted: bool,
}

impl DeliveryReport {
    /// Whether the pass delivered nothing and had no failures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }

    fn record(&mut self, id: NotificationId, attempt: Attempt) {
        match attempt {
            Attempt::Delivered => self.delivered.push(id),
            Attempt::Failed(error) => self.failed.push(DeliveryFailure {
                notification_id: id,
                error,
            }),
            Attempt::NoAddress => self.awaiting_address += 1,
            Attempt::AlreadyHandled => {}
        }
    }
}

enum Attempt {
    Delivered,
    Failed(String),
    NoAddress,
    /// Sent already, missing, or claimed by a concurrent attempt.
    AlreadyHandled,
}

/// Releases an in-flight claim when dropped.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<NotificationId>>,
    id: NotificationId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Persists notifications and delivers them through a channel.
pub struct Outbox {
    store: Arc<dyn Store>,
    timeout: Duration,
    in_flight: Mutex<HashSet<NotificationId>>,
}

impl Outbox {
    /// Create an outbox; each delivery attempt is bounded by `timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Persist an unsent notification for an account.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::AccountNotFound` for an unknown account.
    pub fn enqueue(
        &self,
        account_id: AccountId,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Result<Notification> {
        if self.store.get_account(&account_id)?.is_none() {
            return Err(EngineError::account_not_found(account_id));
        }

        let notification = Notification::for_account(account_id, message, kind);
        self.store.insert_notification(&notification)?;

        tracing::debug!(
            notification_id = %notification.id,
            account_id = %account_id,
            kind = kind.as_str(),
            "Notification enqueued"
        );

        Ok(notification)
    }

    /// Persist an unsent alert for an operator address.
    pub fn enqueue_operator(
        &self,
        address: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Notification> {
        let notification = Notification::for_operator(address, message);
        self.store.insert_notification(&notification)?;

        tracing::debug!(notification_id = %notification.id, "Operator alert enqueued");

        Ok(notification)
    }

    /// Unsent notifications, oldest first, optionally for one account.
    pub fn pending(&self, account_id: Option<&AccountId>) -> Result<Vec<Notification>> {
        Ok(self.store.list_pending_notifications(account_id)?)
    }

    /// Deliver every unsent notification, oldest first.
    ///
    /// Delivery failures are recorded in the report and never stop the sweep.
    /// When `shutdown` turns true the sweep stops at the next notification
    /// boundary and reports `interrupted`.
    ///
    /// # Errors
    ///
    /// Store failures abort the sweep.
    pub async fn deliver_pending(
        &self,
        channel: &dyn DeliveryChannel,
        account_id: Option<&AccountId>,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<DeliveryReport> {
        let pending = self.store.list_pending_notifications(account_id)?;
        let mut report = DeliveryReport::default();

        for notification in pending {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                tracing::info!("Outbox sweep interrupted by shutdown");
                report.interrupted = true;
                break;
            }

            let attempt = self.attempt(channel, notification.id).await?;
            report.record(notification.id, attempt);
        }

        if !report.is_empty() {
            tracing::info!(
                delivered = report.delivered.len(),
                failed = report.failed.len(),
                awaiting_address = report.awaiting_address,
                "Outbox sweep finished"
            );
        }

        Ok(report)
    }

    /// Deliver specific notifications concurrently, at most `concurrency` at
    /// a time.
    ///
    /// Anything not delivered stays unsent for the next sweep. Store errors
    /// are recorded as failures of the affected notification.
    pub async fn dispatch(
        &self,
        channel: &dyn DeliveryChannel,
        ids: Vec<NotificationId>,
        concurrency: usize,
    ) -> DeliveryReport {
        let attempts: Vec<_> = stream::iter(ids)
            .map(|id| async move { (id, self.attempt(channel, id).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = DeliveryReport::default();
        for (id, attempt) in attempts {
            match attempt {
                Ok(attempt) => report.record(id, attempt),
                Err(e) => {
                    tracing::warn!(notification_id = %id, error = %e, "Dispatch hit a store error");
                    report.record(id, Attempt::Failed(e.to_string()));
                }
            }
        }
        report
    }

    fn claim(&self, id: NotificationId) -> Option<Claim<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.insert(id).then(|| Claim {
            in_flight: &self.in_flight,
            id,
        })
    }

    async fn attempt(
        &self,
        channel: &dyn DeliveryChannel,
        id: NotificationId,
    ) -> std::result::Result<Attempt, StoreError> {
        let Some(_claim) = self.claim(id) else {
            tracing::debug!(notification_id = %id, "Notification already in flight");
            return Ok(Attempt::AlreadyHandled);
        };

        // Re-read under the claim: a concurrent pass may have marked it sent.
        let notification = match self.store.get_notification(&id)? {
            Some(n) if !n.sent => n,
            _ => return Ok(Attempt::AlreadyHandled),
        };

        let Some(address) = self.resolve_address(&notification.recipient)? else {
            tracing::debug!(notification_id = %id, "Recipient has no messaging address");
            return Ok(Attempt::NoAddress);
        };

        let sent = tokio::time::timeout(self.timeout, channel.send(&address, &notification.message))
            .await
            .unwrap_or(Err(DeliveryError::Timeout(self.timeout)));

        match sent {
            Ok(()) => {
                self.store.mark_notification_sent(&id, Utc::now())?;
                tracing::debug!(
                    notification_id = %id,
                    channel = channel.name(),
                    kind = notification.kind.as_str(),
                    "Notification delivered"
                );
                Ok(Attempt::Delivered)
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = %id,
                    channel = channel.name(),
                    error = %e,
                    "Notification delivery failed"
                );
                Ok(Attempt::Failed(e.to_string()))
            }
        }
    }

    fn resolve_address(&self, recipient: &Recipient) -> std::result::Result<Option<String>, StoreError> {
        match recipient {
            Recipient::Account(account_id) => Ok(self
                .store
                .get_account(account_id)?
                .and_then(|account| account.messaging_address)),
            Recipient::Operator(address) => Ok(Some(address.clone())),
        }
    }
}
