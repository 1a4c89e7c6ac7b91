//! Building [`DecisionCriteria`] from a battery snapshot.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{DecisionCriteria, MarketDemand};
use crate::domain::battery::{Battery, Chemistry};
use crate::domain::module::{Module, ModuleId};
use crate::error::{PassportError, Result};

/// Fallbacks used when a battery record lacks metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaConfig {
    /// Age assumed when the manufacturing date is unknown
    pub default_age_months: u32,
    /// Chemistry assumed when the composition is unknown
    pub default_chemistry: Chemistry,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            default_age_months: 24,
            default_chemistry: Chemistry::Nmc,
        }
    }
}

/// Whole calendar months between `manufactured` and `today`, clamped at zero.
///
/// Only year and month count: 2024-01-31 to 2024-02-01 is one month.
pub fn age_in_months(manufactured: NaiveDate, today: NaiveDate) -> u32 {
    let months = (today.year() - manufactured.year()) * 12
        + (today.month() as i32 - manufactured.month() as i32);
    months.max(0) as u32
}

/// Per-battery module aggregates shared by criteria derivation and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModuleStats {
    pub total: usize,
    pub avg_state_of_health: f64,
    pub avg_resistance_ratio: f64,
    pub avg_temperature: f64,
    pub avg_voltage: f64,
    pub defective: Vec<ModuleId>,
}

impl ModuleStats {
    pub fn of(battery: &Battery) -> Result<Self> {
        let modules = battery.modules();
        if modules.is_empty() {
            return Err(PassportError::NoModules(battery.battery_id.clone()));
        }

        let n = modules.len() as f64;
        let mean = |f: fn(&Module) -> f64| {
            modules.iter().map(f).sum::<f64>() / n
        };

        Ok(ModuleStats {
            total: modules.len(),
            avg_state_of_health: mean(|m| m.state_of_health),
            avg_resistance_ratio: mean(|m| m.resistance_ratio()),
            avg_temperature: mean(|m| m.temperature),
            avg_voltage: mean(|m| m.voltage),
            defective: battery
                .defective_modules()
                .map(|m| m.module_id.clone())
                .collect(),
        })
    }
}

impl DecisionCriteria {
    /// Derive criteria from a battery and its modules as of `today`.
    ///
    /// # Errors
    /// `NoModules` when the battery has no modules to aggregate.
    pub fn from_battery(
        battery: &Battery,
        today: NaiveDate,
        market_demand: MarketDemand,
        config: &CriteriaConfig,
    ) -> Result<Self> {
        let stats = ModuleStats::of(battery)?;

        let age_months = battery
            .manufacturing_date
            .map(|date| age_in_months(date, today))
            .unwrap_or(config.default_age_months);

        let chemistry = battery
            .chemistry
            .clone()
            .unwrap_or_else(|| config.default_chemistry.clone());

        tracing::debug!(
            battery_id = %battery.battery_id,
            avg_soh = stats.avg_state_of_health,
            defective = stats.defective.len(),
            age_months,
            chemistry = %chemistry,
            "Derived decision criteria"
        );

        Ok(DecisionCriteria {
            avg_state_of_health: stats.avg_state_of_health,
            age_months,
            defective_module_count: stats.defective.len() as u32,
            avg_resistance_ratio: stats.avg_resistance_ratio,
            chemistry,
            market_demand,
        })
    }
}
