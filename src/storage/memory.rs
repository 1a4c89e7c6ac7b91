//! In-process battery store backed by a `DashMap`.
//!
//! Each battery lives in its own map entry together with its audit trail. Mutations
//! go through `get_mut`, which holds the entry's shard lock for the whole
//! read-modify-write, so operations on one battery are serialized while other
//! batteries proceed in parallel.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{BatteryStorage, TelemetryUpdate};
use crate::domain::battery::{
    Battery, BatteryFilter, BatteryId, BatteryStatus, BatterySummary, ModuleAlert,
};
use crate::domain::module::ModuleReading;
use crate::domain::status::{
    ReceptionDraft, ReceptionEvent, StatusChange, StatusChangeDraft, TransitionPolicy,
};
use crate::error::{PassportError, Result};

#[derive(Debug, Clone)]
struct BatteryRecord {
    battery: Battery,
    history: Vec<StatusChange>,
    receptions: Vec<ReceptionEvent>,
}

impl BatteryRecord {
    fn new(battery: Battery) -> Self {
        BatteryRecord {
            battery,
            history: Vec::new(),
            receptions: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: DashMap<BatteryId, BatteryRecord>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with batteries. Later duplicates replace earlier ones.
    pub fn with_batteries(batteries: impl IntoIterator<Item = Battery>) -> Self {
        let records = batteries
            .into_iter()
            .map(|battery| (battery.battery_id.clone(), BatteryRecord::new(battery)))
            .collect();
        InMemoryStorage { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl BatteryStorage for InMemoryStorage {
    async fn find_battery(&self, battery_id: &BatteryId) -> Result<Option<Battery>> {
        Ok(self
            .records
            .get(battery_id)
            .map(|record| record.battery.clone()))
    }

    #[tracing::instrument(skip(self, draft, policy), fields(battery_id = %battery_id, to = %draft.new_status))]
    async fn apply_status(
        &self,
        battery_id: &BatteryId,
        draft: StatusChangeDraft,
        policy: &TransitionPolicy,
    ) -> Result<StatusChange> {
        let mut record = self
            .records
            .get_mut(battery_id)
            .ok_or_else(|| PassportError::BatteryNotFound(battery_id.clone()))?;

        let previous_status = record.battery.status();
        policy.check(battery_id, previous_status, draft.new_status)?;

        let change = draft.into_change(battery_id.clone(), previous_status);
        record.battery.set_status(change.new_status);
        record.history.push(change.clone());

        tracing::trace!(
            change_id = %change.change_id,
            history_len = record.history.len(),
            "Status written"
        );

        Ok(change)
    }

    async fn status_history(&self, battery_id: &BatteryId) -> Result<Vec<StatusChange>> {
        self.records
            .get(battery_id)
            .map(|record| record.history.clone())
            .ok_or_else(|| PassportError::BatteryNotFound(battery_id.clone()))
    }

    #[tracing::instrument(skip(self, draft), fields(battery_id = %battery_id, center = %draft.center_name))]
    async fn record_reception(
        &self,
        battery_id: &BatteryId,
        draft: ReceptionDraft,
        expected_status: BatteryStatus,
    ) -> Result<ReceptionEvent> {
        let mut record = self
            .records
            .get_mut(battery_id)
            .ok_or_else(|| PassportError::BatteryNotFound(battery_id.clone()))?;

        let actual = record.battery.status();
        if actual != expected_status {
            return Err(PassportError::UnexpectedStatus {
                battery_id: battery_id.clone(),
                actual,
                expected: expected_status,
            });
        }

        let event = draft.into_event(battery_id.clone(), actual);
        record.receptions.push(event.clone());
        Ok(event)
    }

    async fn receptions(&self, battery_id: &BatteryId) -> Result<Vec<ReceptionEvent>> {
        self.records
            .get(battery_id)
            .map(|record| record.receptions.clone())
            .ok_or_else(|| PassportError::BatteryNotFound(battery_id.clone()))
    }

    async fn list_alerts(&self) -> Result<Vec<ModuleAlert>> {
        let mut alerts: Vec<ModuleAlert> = self
            .records
            .iter()
            .flat_map(|record| record.battery.module_alerts())
            .collect();
        alerts.sort_by(|a, b| {
            b.overload_percent
                .cmp(&a.overload_percent)
                .then_with(|| a.battery_id.cmp(&b.battery_id))
                .then_with(|| a.module_id.cmp(&b.module_id))
        });
        Ok(alerts)
    }

    async fn list_batteries(&self, filter: BatteryFilter) -> Result<Vec<BatterySummary>> {
        let mut summaries: Vec<BatterySummary> = self
            .records
            .iter()
            .filter(|record| filter.matches(&record.battery))
            .map(|record| record.battery.summary())
            .collect();
        summaries.sort_by(|a, b| a.battery_id.cmp(&b.battery_id));
        Ok(summaries)
    }

    #[tracing::instrument(skip(self, readings), fields(battery_id = %battery_id, count = readings.len()))]
    async fn update_telemetry(
        &self,
        battery_id: &BatteryId,
        readings: Vec<ModuleReading>,
    ) -> Result<TelemetryUpdate> {
        let mut seen = HashSet::with_capacity(readings.len());
        for reading in &readings {
            reading.validate()?;
            if !seen.insert(&reading.module_id) {
                return Err(PassportError::InvalidInput(format!(
                    "battery {}: module {} appears twice in one update",
                    battery_id, reading.module_id
                )));
            }
        }

        let mut record = self
            .records
            .get_mut(battery_id)
            .ok_or_else(|| PassportError::BatteryNotFound(battery_id.clone()))?;

        if let Some(unknown) = readings
            .iter()
            .find(|reading| record.battery.module(&reading.module_id).is_none())
        {
            return Err(PassportError::ModuleNotFound(
                battery_id.clone(),
                unknown.module_id.clone(),
            ));
        }

        let mut alerts = Vec::new();
        for reading in &readings {
            if let Some(module) = record.battery.module_mut(&reading.module_id)
                && let Some(alert) = module.apply_reading(reading)
            {
                tracing::warn!(
                    module_id = %alert.module_id,
                    resistance = alert.resistance,
                    max_resistance = alert.max_resistance,
                    "Defective module detected"
                );
                alerts.push(alert);
            }
        }

        Ok(TelemetryUpdate {
            battery_id: battery_id.clone(),
            modules_updated: readings.len(),
            alerts,
        })
    }

    async fn insert_battery(&self, battery: Battery) -> Result<()> {
        match self.records.entry(battery.battery_id.clone()) {
            Entry::Occupied(_) => Err(PassportError::InvalidInput(format!(
                "battery {} already exists",
                battery.battery_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(BatteryRecord::new(battery));
                Ok(())
            }
        }
    }
}
