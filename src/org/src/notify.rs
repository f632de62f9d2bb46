//! Post-commit notifications
//!
//! Notifiers run after a unit of work has committed. Their failures are
//! logged and never affect the outcome of the operation that triggered them.

use crate::models::{DepartmentId, EmployeeId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hrms_authz::Role;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentEventKind {
    Created,
    Updated,
    Deleted,
    Reverted,
}

impl DepartmentEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepartmentEventKind::Created => "created",
            DepartmentEventKind::Updated => "updated",
            DepartmentEventKind::Deleted => "deleted",
            DepartmentEventKind::Reverted => "reverted",
        }
    }
}

/// A role change applied by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    pub user_id: UserId,
    pub employee_id: EmployeeId,
    pub from: Role,
    pub to: Role,
}

impl RoleChange {
    pub fn is_promotion(&self) -> bool {
        self.to == Role::Manager
    }
}

/// A committed department change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentEvent {
    pub kind: DepartmentEventKind,
    pub department_id: DepartmentId,
    pub department_name: String,
    pub role_changes: Vec<RoleChange>,
    pub occurred_at: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &DepartmentEvent) -> Result<(), NotifyError>;
}

/// Writes events to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &DepartmentEvent) -> Result<(), NotifyError> {
        info!(
            kind = event.kind.as_str(),
            department = %event.department_id,
            name = %event.department_name,
            role_changes = event.role_changes.len(),
            "Department changed"
        );
        Ok(())
    }
}

/// Hands events to a consumer task, such as a mail worker
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<DepartmentEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DepartmentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, event: &DepartmentEvent) -> Result<(), NotifyError> {
        self.tx
            .send(event.clone())
            .map_err(|_| NotifyError("event consumer has shut down".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> DepartmentEvent {
        DepartmentEvent {
            kind: DepartmentEventKind::Created,
            department_id: DepartmentId::new(),
            department_name: "Engineering".to_string(),
            role_changes: vec![],
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let event = event();

        notifier.notify(&event).await.unwrap();
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_channel_notifier_fails_after_consumer_drop() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);

        assert!(notifier.notify(&event()).await.is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let value = serde_json::to_value(event()).unwrap();
        assert_eq!(value["kind"], "created");
        assert!(value.get("departmentId").is_some());
    }
}
