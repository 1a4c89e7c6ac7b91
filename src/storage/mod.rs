//! Storage collaborator interface.
//!
//! The engines never own battery data. They consume it through [`BatteryStorage`],
//! which any persistence backend implements. The contract that matters most is
//! [`BatteryStorage::apply_status`]: the policy check, status write and audit entry
//! for one battery happen as a single atomic read-modify-write, so a transition is
//! never partially visible and two transitions on the same battery never interleave.
//! Different batteries carry no ordering constraint.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::battery::{
    Battery, BatteryFilter, BatteryId, BatteryStatus, BatterySummary, ModuleAlert,
};
use crate::domain::module::{DefectAlert, ModuleReading};
use crate::domain::status::{
    ReceptionDraft, ReceptionEvent, StatusChange, StatusChangeDraft, TransitionPolicy,
};
use crate::error::Result;

pub mod memory;

pub use memory::InMemoryStorage;

/// Result of overwriting module telemetry on a battery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryUpdate {
    pub battery_id: BatteryId,
    pub modules_updated: usize,
    pub alerts: Vec<DefectAlert>,
}

#[async_trait]
pub trait BatteryStorage: Send + Sync {
    /// Fetch a battery with its modules, `None` when the id is unknown.
    async fn find_battery(&self, battery_id: &BatteryId) -> Result<Option<Battery>>;

    /// Atomically check `policy` against the current status, write the new status
    /// and append the audit entry.
    ///
    /// # Errors
    /// - `BatteryNotFound` when the id is unknown
    /// - `TransitionRejected` when `policy` forbids the move (nothing is written)
    /// - `Persistence` when the write cannot complete (nothing is written)
    async fn apply_status(
        &self,
        battery_id: &BatteryId,
        draft: StatusChangeDraft,
        policy: &TransitionPolicy,
    ) -> Result<StatusChange>;

    /// Audit trail for a battery, oldest first.
    async fn status_history(&self, battery_id: &BatteryId) -> Result<Vec<StatusChange>>;

    /// List batteries matching the filter, ordered by battery id.
    async fn list_batteries(&self, filter: BatteryFilter) -> Result<Vec<BatterySummary>>;

    /// Atomically check that the battery is in `expected_status` and append a
    /// reception event. The status itself is left unchanged.
    ///
    /// # Errors
    /// - `BatteryNotFound` when the id is unknown
    /// - `UnexpectedStatus` when the current status differs (nothing is written)
    async fn record_reception(
        &self,
        battery_id: &BatteryId,
        draft: ReceptionDraft,
        expected_status: BatteryStatus,
    ) -> Result<ReceptionEvent>;

    /// Reception log for a battery, oldest first.
    async fn receptions(&self, battery_id: &BatteryId) -> Result<Vec<ReceptionEvent>>;

    /// Every defective module across all batteries, highest overload first.
    async fn list_alerts(&self) -> Result<Vec<ModuleAlert>>;

    /// Overwrite measured values on existing modules.
    ///
    /// Readings are validated first; an invalid reading, an unknown module id or a
    /// module named twice rejects the whole update.
    async fn update_telemetry(
        &self,
        battery_id: &BatteryId,
        readings: Vec<ModuleReading>,
    ) -> Result<TelemetryUpdate>;

    /// Register a new battery. Fails with `InvalidInput` if the id already exists.
    async fn insert_battery(&self, battery: Battery) -> Result<()>;
}
