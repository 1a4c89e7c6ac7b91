//! Battery passport aggregate.
//!
//! A [`Battery`] is the passport root: identity, metadata, lifecycle status and the
//! ordered set of modules it owns. The status field is private; it changes only
//! through the status engine and the storage layer that engine drives.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::module::{Module, ModuleId};
use crate::error::{PassportError, Result};

/// Unique identifier of a battery (e.g. "BP-2024-LG-002").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatteryId(pub String);

impl From<&str> for BatteryId {
    fn from(id: &str) -> Self {
        BatteryId(id.to_string())
    }
}

impl From<String> for BatteryId {
    fn from(id: String) -> Self {
        BatteryId(id)
    }
}

impl std::ops::Deref for BatteryId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for BatteryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a battery.
///
/// `SignaledAsWaste` is a sub-state of `Waste`: an installer has reported the
/// battery but the passport owner has not confirmed it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BatteryStatus {
    #[default]
    Original,
    Waste,
    #[serde(rename = "Signaled As Waste")]
    SignaledAsWaste,
    Reused,
    Repurposed,
}

impl BatteryStatus {
    pub const ALL: [BatteryStatus; 5] = [
        BatteryStatus::Original,
        BatteryStatus::Waste,
        BatteryStatus::SignaledAsWaste,
        BatteryStatus::Reused,
        BatteryStatus::Repurposed,
    ];

    /// States a caller may request through a direct transition.
    pub const REQUESTABLE: [BatteryStatus; 4] = [
        BatteryStatus::Original,
        BatteryStatus::Waste,
        BatteryStatus::Reused,
        BatteryStatus::Repurposed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryStatus::Original => "Original",
            BatteryStatus::Waste => "Waste",
            BatteryStatus::SignaledAsWaste => "Signaled As Waste",
            BatteryStatus::Reused => "Reused",
            BatteryStatus::Repurposed => "Repurposed",
        }
    }

    /// True for `Waste` and its reported-but-unconfirmed sub-state.
    pub fn is_waste(&self) -> bool {
        matches!(self, BatteryStatus::Waste | BatteryStatus::SignaledAsWaste)
    }

    pub fn is_requestable(&self) -> bool {
        !matches!(self, BatteryStatus::SignaledAsWaste)
    }
}

impl std::fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatteryStatus {
    type Err = PassportError;

    fn from_str(s: &str) -> Result<Self> {
        BatteryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .or_else(|| (s == "SignaledAsWaste").then_some(BatteryStatus::SignaledAsWaste))
            .ok_or_else(|| PassportError::InvalidInput(format!("unknown battery status '{}'", s)))
    }
}

/// Cell chemistry of a battery.
///
/// Labels outside the known set are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Chemistry {
    #[default]
    Nmc,
    Nmc811,
    Lfp,
    Nca,
    Other(String),
}

impl Chemistry {
    pub fn label(&self) -> &str {
        match self {
            Chemistry::Nmc => "NMC",
            Chemistry::Nmc811 => "NMC811",
            Chemistry::Lfp => "LFP",
            Chemistry::Nca => "NCA",
            Chemistry::Other(label) => label,
        }
    }
}

impl From<&str> for Chemistry {
    /// Known labels match exactly, after trimming; `"lfp"` stays `Other`.
    fn from(label: &str) -> Self {
        match label.trim() {
            "NMC" => Chemistry::Nmc,
            "NMC811" => Chemistry::Nmc811,
            "LFP" => Chemistry::Lfp,
            "NCA" => Chemistry::Nca,
            _ => Chemistry::Other(label.to_string()),
        }
    }
}

impl From<String> for Chemistry {
    fn from(label: String) -> Self {
        Chemistry::from(label.as_str())
    }
}

impl From<Chemistry> for String {
    fn from(chemistry: Chemistry) -> Self {
        chemistry.label().to_string()
    }
}

impl std::fmt::Display for Chemistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Battery passport: identity, metadata, status and owned modules.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Battery {
    pub battery_id: BatteryId,
    /// Regulatory passport identifier (e.g. "EU-BP-DE-2024-00002")
    pub passport_id: String,
    pub serial_number: Option<String>,
    pub model_name: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    pub chemistry: Option<Chemistry>,
    pub warranty_years: Option<u32>,
    pub mass_kg: Option<f64>,
    pub carbon_footprint_kg: Option<f64>,
    status: BatteryStatus,
    /// Sorted by module id, ids unique
    modules: Vec<Module>,
}

impl Battery {
    /// Create a battery in the `Original` status.
    ///
    /// Modules are sorted by id; duplicate ids are rejected.
    pub fn new(
        battery_id: impl Into<BatteryId>,
        passport_id: impl Into<String>,
        mut modules: Vec<Module>,
    ) -> Result<Self> {
        let battery_id = battery_id.into();
        let mut seen = HashSet::with_capacity(modules.len());
        for module in &modules {
            if !seen.insert(&module.module_id) {
                return Err(PassportError::InvalidInput(format!(
                    "battery {}: duplicate module id {}",
                    battery_id, module.module_id
                )));
            }
        }
        modules.sort_by(|a, b| a.module_id.cmp(&b.module_id));

        Ok(Battery {
            battery_id,
            passport_id: passport_id.into(),
            serial_number: None,
            model_name: None,
            manufacturer: None,
            manufacturing_date: None,
            chemistry: None,
            warranty_years: None,
            mass_kg: None,
            carbon_footprint_kg: None,
            status: BatteryStatus::Original,
            modules,
        })
    }

    /// Rehydrate the status of a record loaded from a store.
    ///
    /// This is not a lifecycle transition and leaves no audit entry.
    pub fn rehydrate_status(mut self, status: BatteryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_chemistry(mut self, chemistry: impl Into<Chemistry>) -> Self {
        self.chemistry = Some(chemistry.into());
        self
    }

    pub fn with_manufacturing_date(mut self, date: NaiveDate) -> Self {
        self.manufacturing_date = Some(date);
        self
    }

    pub fn status(&self) -> BatteryStatus {
        self.status
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, module_id: &ModuleId) -> Option<&Module> {
        self.modules
            .binary_search_by(|m| m.module_id.cmp(module_id))
            .ok()
            .map(|idx| &self.modules[idx])
    }

    pub(crate) fn module_mut(&mut self, module_id: &ModuleId) -> Option<&mut Module> {
        self.modules
            .binary_search_by(|m| m.module_id.cmp(module_id))
            .ok()
            .map(|idx| &mut self.modules[idx])
    }

    pub fn defective_modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(|m| m.is_defective())
    }

    pub fn has_defective_module(&self) -> bool {
        self.defective_modules().next().is_some()
    }

    /// One alert per defective module, in module id order.
    pub fn module_alerts(&self) -> Vec<ModuleAlert> {
        self.defective_modules()
            .map(|m| ModuleAlert {
                battery_id: self.battery_id.clone(),
                battery_status: self.status,
                module_id: m.module_id.clone(),
                resistance: m.internal_resistance,
                max_resistance: m.max_resistance,
                temperature: m.temperature,
                state_of_health: m.state_of_health,
                overload_percent: (m.resistance_ratio() * 100.0).round() as u32,
            })
            .collect()
    }

    pub(crate) fn set_status(&mut self, status: BatteryStatus) {
        self.status = status;
    }

    pub fn summary(&self) -> BatterySummary {
        BatterySummary {
            battery_id: self.battery_id.clone(),
            passport_id: self.passport_id.clone(),
            status: self.status,
            model_name: self.model_name.clone(),
            manufacturer: self.manufacturer.clone(),
        }
    }
}

/// Listing view of a battery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterySummary {
    pub battery_id: BatteryId,
    pub passport_id: String,
    pub status: BatteryStatus,
    pub model_name: Option<String>,
    pub manufacturer: Option<String>,
}

/// A defective module in the fleet-wide alert overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAlert {
    pub battery_id: BatteryId,
    pub battery_status: BatteryStatus,
    pub module_id: ModuleId,
    pub resistance: f64,
    pub max_resistance: f64,
    pub temperature: f64,
    pub state_of_health: f64,
    /// Measured resistance as a percentage of the rated maximum, rounded
    pub overload_percent: u32,
}

/// Filter for listing batteries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryFilter {
    /// Only batteries currently in this status
    pub status: Option<BatteryStatus>,
    /// Only batteries with at least one defective module
    #[serde(default)]
    pub defective_only: bool,
}

impl BatteryFilter {
    pub fn matches(&self, battery: &Battery) -> bool {
        if let Some(status) = self.status
            && battery.status() != status
        {
            return false;
        }
        !self.defective_only || battery.has_defective_module()
    }
}
