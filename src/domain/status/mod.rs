//! Battery status aggregate - lifecycle policy and transitions.
//!
//! This module contains the status engine:
//! - The explicit transition table ([`TransitionPolicy`])
//! - Requests, audit entries and results
//! - The engine that applies transitions through a storage collaborator

pub mod policy;
pub mod transitions;
pub mod types;

pub use policy::TransitionPolicy;
pub use transitions::{StatusEngine, StatusEngineConfig};
pub use types::*;
