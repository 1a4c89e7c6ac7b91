//! Transition table for battery lifecycle states.
//!
//! The policy is an explicit map from current state to the set of states that may
//! be requested next. The default is unrestricted: every requestable state is
//! reachable from every state, including a no-op transition to the current one.
//! `SignaledAsWaste` is never a target of the default table; it is entered only
//! through the waste reporting workflow, which uses [`TransitionPolicy::waste_reporting`].
//!
//! ```text
//!   Original ─┐
//!   Waste ────┤
//!   Reused ───┼──any──> { Original, Waste, Reused, Repurposed }
//!   Repurposed┤
//!   Signaled ─┘
//!
//!   any ──report_waste()──> Signaled As Waste
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::battery::{BatteryId, BatteryStatus};
use crate::error::{PassportError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionPolicy {
    allowed: HashMap<BatteryStatus, HashSet<BatteryStatus>>,
}

impl TransitionPolicy {
    /// Every requestable state from every state.
    pub fn unrestricted() -> Self {
        let allowed = BatteryStatus::ALL
            .into_iter()
            .map(|from| (from, BatteryStatus::REQUESTABLE.into_iter().collect()))
            .collect();
        TransitionPolicy { allowed }
    }

    /// Nothing allowed; build up with [`allow`](Self::allow).
    pub fn empty() -> Self {
        TransitionPolicy {
            allowed: HashMap::new(),
        }
    }

    /// Policy used by the reporting workflow: any state may be signaled as waste.
    pub fn waste_reporting() -> Self {
        let allowed = BatteryStatus::ALL
            .into_iter()
            .map(|from| (from, HashSet::from([BatteryStatus::SignaledAsWaste])))
            .collect();
        TransitionPolicy { allowed }
    }

    pub fn allow(mut self, from: BatteryStatus, to: BatteryStatus) -> Self {
        self.allowed.entry(from).or_default().insert(to);
        self
    }

    pub fn deny(mut self, from: BatteryStatus, to: BatteryStatus) -> Self {
        if let Some(targets) = self.allowed.get_mut(&from) {
            targets.remove(&to);
        }
        self
    }

    pub fn allows(&self, from: BatteryStatus, to: BatteryStatus) -> bool {
        self.allowed
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Allowed next states from `from`, in [`BatteryStatus::ALL`] order.
    pub fn allowed_from(&self, from: BatteryStatus) -> Vec<BatteryStatus> {
        BatteryStatus::ALL
            .into_iter()
            .filter(|to| self.allows(from, *to))
            .collect()
    }

    /// The state a battery ends up in, or `None` when the policy forbids the move.
    pub fn next_status(
        &self,
        current: BatteryStatus,
        requested: BatteryStatus,
    ) -> Option<BatteryStatus> {
        self.allows(current, requested).then_some(requested)
    }

    pub fn check(
        &self,
        battery_id: &BatteryId,
        from: BatteryStatus,
        to: BatteryStatus,
    ) -> Result<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(PassportError::TransitionRejected {
                battery_id: battery_id.clone(),
                from,
                to,
            })
        }
    }
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::unrestricted()
    }
}
