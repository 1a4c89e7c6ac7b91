//! Core domain types for the battery passport.
//!
//! This module contains pure domain types with no persistence dependencies:
//! - Batteries, their status and chemistry
//! - Modules and telemetry readings
//! - The status state machine

pub mod battery;
pub mod module;
pub mod status;
