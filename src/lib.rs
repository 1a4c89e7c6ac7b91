//! Battery passport core: lifecycle status management and end-of-life decisions.
//!
//! Two engines sit on top of a storage collaborator:
//!
//! - [`StatusEngine`] validates and applies lifecycle transitions
//!   (`Original`, `Waste`, `Signaled As Waste`, `Reused`, `Repurposed`) against a
//!   [`TransitionPolicy`], recording an audit entry for each change, and logs
//!   sorting-centre receptions of confirmed waste.
//! - [`decision::recommend`] scores the four end-of-life dispositions from a
//!   [`DecisionCriteria`] snapshot and returns the best one with its reasoning.
//!
//! Persistence is behind [`BatteryStorage`]; [`InMemoryStorage`] is the bundled
//! implementation.

pub mod decision;
pub mod diagnostic;
pub mod domain;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use decision::{
    CriteriaConfig, DecisionCriteria, Disposition, DispositionScores, MarketDemand,
    Recommendation, recommend, try_recommend,
};
pub use diagnostic::{Diagnostic, HealthStatus, diagnose};
pub use domain::battery::{
    Battery, BatteryFilter, BatteryId, BatteryStatus, BatterySummary, Chemistry, ModuleAlert,
};
pub use domain::module::{DefectAlert, Module, ModuleId, ModuleReading};
pub use domain::status::{
    ReceptionEvent, ReceptionId, StatusChange, StatusChangeId, StatusChangeRequest,
    StatusChangeResult, StatusEngine, StatusEngineConfig, TransitionPolicy, WasteReport,
};
pub use error::{ErrorKind, PassportError, Result};
pub use storage::{BatteryStorage, InMemoryStorage, TelemetryUpdate};
