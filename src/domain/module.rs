//! Battery modules and their telemetry.
//!
//! A module is one cell group inside a battery. Its values are overwritten by
//! telemetry readings; a module is defective when its measured internal
//! resistance exceeds its rated maximum.

use serde::{Deserialize, Serialize};

use crate::error::{PassportError, Result};

/// Identifier of a module, unique within its battery (e.g. "M1").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub String);

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        ModuleId(id.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        ModuleId(id)
    }
}

impl std::ops::Deref for ModuleId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cell group inside a battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub module_id: ModuleId,
    /// Measured internal resistance in ohms
    pub internal_resistance: f64,
    /// Rated maximum internal resistance in ohms
    pub max_resistance: f64,
    /// Volts
    pub voltage: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Remaining capacity relative to nominal, 0-100
    pub state_of_health: f64,
}

impl Module {
    pub fn is_defective(&self) -> bool {
        self.internal_resistance > self.max_resistance
    }

    /// `internal_resistance / max_resistance`, with an unrated (zero) maximum treated as 1 ohm.
    pub fn resistance_ratio(&self) -> f64 {
        let max = if self.max_resistance > 0.0 {
            self.max_resistance
        } else {
            1.0
        };
        self.internal_resistance / max
    }

    /// Overwrite the measured values from a telemetry reading.
    ///
    /// The rated maximum resistance is not part of a reading and never changes.
    /// Returns an alert when the module is defective after the update.
    pub fn apply_reading(&mut self, reading: &ModuleReading) -> Option<DefectAlert> {
        self.internal_resistance = reading.internal_resistance;
        self.voltage = reading.voltage;
        self.temperature = reading.temperature;
        self.state_of_health = reading.state_of_health;

        self.is_defective().then(|| DefectAlert::for_module(self))
    }
}

/// A single telemetry sample for one module, as reported by the BMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReading {
    pub module_id: ModuleId,
    pub internal_resistance: f64,
    pub voltage: f64,
    pub temperature: f64,
    pub state_of_health: f64,
}

impl ModuleReading {
    pub fn validate(&self) -> Result<()> {
        if !self.internal_resistance.is_finite() || self.internal_resistance < 0.0 {
            return Err(PassportError::InvalidInput(format!(
                "module {}: internal resistance must be a non-negative number, got {}",
                self.module_id, self.internal_resistance
            )));
        }
        if !self.voltage.is_finite() || self.voltage < 0.0 {
            return Err(PassportError::InvalidInput(format!(
                "module {}: voltage must be a non-negative number, got {}",
                self.module_id, self.voltage
            )));
        }
        if !self.temperature.is_finite() {
            return Err(PassportError::InvalidInput(format!(
                "module {}: temperature must be finite",
                self.module_id
            )));
        }
        if !(0.0..=100.0).contains(&self.state_of_health) {
            return Err(PassportError::InvalidInput(format!(
                "module {}: state of health must be within 0-100, got {}",
                self.module_id, self.state_of_health
            )));
        }
        Ok(())
    }
}

/// Raised when a telemetry update leaves a module over its rated resistance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectAlert {
    pub module_id: ModuleId,
    pub resistance: f64,
    pub max_resistance: f64,
    pub message: String,
}

impl DefectAlert {
    fn for_module(module: &Module) -> Self {
        DefectAlert {
            module_id: module.module_id.clone(),
            resistance: module.internal_resistance,
            max_resistance: module.max_resistance,
            message: format!(
                "Module {} défaillant: résistance {}Ω > max {}Ω",
                module.module_id, module.internal_resistance, module.max_resistance
            ),
        }
    }
}
