//! Installer-facing health check of a battery.

use serde::Serialize;

use crate::decision::criteria::ModuleStats;
use crate::domain::battery::{Battery, BatteryId, BatteryStatus};
use crate::domain::module::ModuleId;
use crate::error::Result;

/// Overall health level, serialized in upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// At least one module is defective
    Critical,
    /// Average state of health below 70
    Warning,
    /// Average state of health below 80
    Fair,
    Good,
}

impl HealthStatus {
    /// Advice shown to the installer for this level.
    pub fn advice(&self) -> &'static str {
        match self {
            HealthStatus::Critical => "Batterie hors d'usage - Signaler au Propriétaire BP",
            HealthStatus::Warning => "SOH faible - Surveillance recommandée",
            HealthStatus::Fair => "État acceptable - Contrôle dans 6 mois",
            HealthStatus::Good => "Batterie en bon état",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub battery_id: BatteryId,
    pub status: BatteryStatus,
    pub health_status: HealthStatus,
    /// Rounded to 2 decimals
    pub avg_state_of_health: f64,
    /// Rounded to 3 decimals
    pub avg_resistance_ratio: f64,
    /// Rounded to 1 decimal
    pub avg_temperature: f64,
    /// Rounded to 2 decimals
    pub avg_voltage: f64,
    pub total_modules: usize,
    pub defective_modules: usize,
    pub defective_module_ids: Vec<ModuleId>,
    pub advice: String,
}

/// Summarize module health for a battery.
///
/// # Errors
/// `NoModules` when the battery has no modules.
pub fn diagnose(battery: &Battery) -> Result<Diagnostic> {
    let stats = ModuleStats::of(battery)?;

    let health_status = if !stats.defective.is_empty() {
        HealthStatus::Critical
    } else if stats.avg_state_of_health < 70.0 {
        HealthStatus::Warning
    } else if stats.avg_state_of_health < 80.0 {
        HealthStatus::Fair
    } else {
        HealthStatus::Good
    };

    tracing::debug!(
        battery_id = %battery.battery_id,
        health = ?health_status,
        defective = stats.defective.len(),
        "Battery diagnosed"
    );

    Ok(Diagnostic {
        battery_id: battery.battery_id.clone(),
        status: battery.status(),
        health_status,
        avg_state_of_health: round_to(stats.avg_state_of_health, 2),
        avg_resistance_ratio: round_to(stats.avg_resistance_ratio, 3),
        avg_temperature: round_to(stats.avg_temperature, 1),
        avg_voltage: round_to(stats.avg_voltage, 2),
        total_modules: stats.total,
        defective_modules: stats.defective.len(),
        defective_module_ids: stats.defective,
        advice: health_status.advice().to_string(),
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
