//! Notification channels.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::core::{AppResult, Notification, Notifier};
use crate::util::clock::now_ms;
use crate::util::serde::EmployeeId;

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Recipient.
    pub employee_id: EmployeeId,
    /// Message.
    pub notification: Notification,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Records deliveries in memory for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl InMemoryNotifier {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every delivery in order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Deliveries addressed to one employee.
    pub fn delivered_to(&self, employee_id: EmployeeId) -> Vec<Notification> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.employee_id == employee_id)
            .map(|d| d.notification.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, employee_id: EmployeeId, notification: &Notification) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("notification channel down");
        }
        self.deliveries.lock().push(Delivery {
            employee_id,
            notification: notification.clone(),
            created_at_ms: now_ms(),
        });
        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, employee_id: EmployeeId, notification: &Notification) -> AppResult<()> {
        info!(employee_id, ?notification, "notification");
        Ok(())
    }
}
