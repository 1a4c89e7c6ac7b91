//! Status change requests, audit entries and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::battery::{BatteryId, BatteryStatus};

/// Unique identifier of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusChangeId(pub Uuid);

impl StatusChangeId {
    pub fn new() -> Self {
        StatusChangeId(Uuid::new_v4())
    }
}

impl Default for StatusChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StatusChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for StatusChangeId {
    fn from(uuid: Uuid) -> Self {
        StatusChangeId(uuid)
    }
}

/// A caller's request to move a battery to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub new_status: BatteryStatus,
    /// Free-text justification (e.g. "Module M3 défaillant - résistance interne trop élevée")
    pub reason: Option<String>,
    pub requested_by: Option<String>,
}

impl StatusChangeRequest {
    pub fn new(new_status: BatteryStatus) -> Self {
        StatusChangeRequest {
            new_status,
            reason: None,
            requested_by: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn requested_by(mut self, requester: impl Into<String>) -> Self {
        self.requested_by = Some(requester.into());
        self
    }
}

/// An installer's report that a battery is out of service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteReport {
    pub reason: String,
    pub reported_by: Option<String>,
}

/// A status write as handed to the store, stamped before the store applies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeDraft {
    pub change_id: StatusChangeId,
    pub new_status: BatteryStatus,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub requested_by: Option<String>,
}

impl StatusChangeDraft {
    pub fn from_request(request: StatusChangeRequest) -> Self {
        StatusChangeDraft {
            change_id: StatusChangeId::new(),
            new_status: request.new_status,
            changed_at: Utc::now(),
            reason: request.reason,
            requested_by: request.requested_by,
        }
    }

    /// Complete the draft into an audit entry once the prior status is known.
    pub fn into_change(self, battery_id: BatteryId, previous_status: BatteryStatus) -> StatusChange {
        StatusChange {
            change_id: self.change_id,
            battery_id,
            previous_status,
            new_status: self.new_status,
            changed_at: self.changed_at,
            reason: self.reason,
            requested_by: self.requested_by,
        }
    }
}

/// One entry of a battery's status audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub change_id: StatusChangeId,
    pub battery_id: BatteryId,
    pub previous_status: BatteryStatus,
    pub new_status: BatteryStatus,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub requested_by: Option<String>,
}

/// Outcome of a successful transition, as returned to the workflow layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeResult {
    pub battery_id: BatteryId,
    pub previous_status: BatteryStatus,
    pub new_status: BatteryStatus,
    pub changed_at: DateTime<Utc>,
    pub success: bool,
}

impl From<&StatusChange> for StatusChangeResult {
    fn from(change: &StatusChange) -> Self {
        StatusChangeResult {
            battery_id: change.battery_id.clone(),
            previous_status: change.previous_status,
            new_status: change.new_status,
            changed_at: change.changed_at,
            success: true,
        }
    }
}

/// Unique identifier of a reception event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceptionId(pub Uuid);

impl ReceptionId {
    pub fn new() -> Self {
        ReceptionId(Uuid::new_v4())
    }
}

impl Default for ReceptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReceptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A sorting-centre reception as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceptionDraft {
    pub event_id: ReceptionId,
    pub center_name: String,
    pub received_at: DateTime<Utc>,
}

impl ReceptionDraft {
    pub fn new(center_name: impl Into<String>) -> Self {
        ReceptionDraft {
            event_id: ReceptionId::new(),
            center_name: center_name.into(),
            received_at: Utc::now(),
        }
    }

    pub fn into_event(self, battery_id: BatteryId, battery_status: BatteryStatus) -> ReceptionEvent {
        ReceptionEvent {
            event_id: self.event_id,
            battery_id,
            center_name: self.center_name,
            battery_status,
            received_at: self.received_at,
        }
    }
}

/// A battery physically received by a sorting centre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionEvent {
    pub event_id: ReceptionId,
    pub battery_id: BatteryId,
    pub center_name: String,
    /// Status at the time of reception, always `Waste`
    pub battery_status: BatteryStatus,
    pub received_at: DateTime<Utc>,
}
