//! Status engine: applies lifecycle transitions through the storage collaborator.
//!
//! The engine is the single authority on whether a transition is legal and what the
//! resulting status is. It holds no battery state of its own; every call reads and
//! writes through [`BatteryStorage`], which performs the policy check and the write
//! as one atomic step per battery.
//!
//! # Transitions
//!
//! - [`StatusEngine::transition`] / [`StatusEngine::transition_with`]: move a battery
//!   to any requestable status allowed by the configured [`TransitionPolicy`]
//!   (unrestricted by default, including no-op transitions).
//! - [`StatusEngine::report_waste`]: the reporting workflow, the only way into
//!   `Signaled As Waste`.
//!
//! Failures surface unchanged to the caller: `BatteryNotFound`, `TransitionRejected`
//! or `Persistence`. The engine never retries.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};

use super::policy::TransitionPolicy;
use super::types::{
    ReceptionDraft, ReceptionEvent, StatusChange, StatusChangeDraft, StatusChangeRequest,
    StatusChangeResult, WasteReport,
};
use crate::domain::battery::{BatteryId, BatteryStatus};
use crate::error::{PassportError, Result};
use crate::storage::BatteryStorage;

/// Configuration for the status engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEngineConfig {
    /// Table of allowed direct transitions
    #[serde(default)]
    pub policy: TransitionPolicy,
}

impl StatusEngineConfig {
    /// Parse and validate a JSON config such as `{"policy": {"Original": ["Waste"]}}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: StatusEngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject a policy that makes `Signaled As Waste` a direct target.
    pub fn validate(&self) -> Result<()> {
        for from in BatteryStatus::ALL {
            if let Some(to) = self
                .policy
                .allowed_from(from)
                .into_iter()
                .find(|to| !to.is_requestable())
            {
                return Err(PassportError::InvalidInput(format!(
                    "policy allows '{}' -> '{}', which is only reachable by a waste report",
                    from, to
                )));
            }
        }
        Ok(())
    }
}

pub struct StatusEngine<S: BatteryStorage + ?Sized> {
    storage: Arc<S>,
    config: StatusEngineConfig,
    reporting: TransitionPolicy,
}

impl<S: BatteryStorage + ?Sized> StatusEngine<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_config(storage, StatusEngineConfig::default())
    }

    pub fn with_config(storage: Arc<S>, config: StatusEngineConfig) -> Self {
        StatusEngine {
            storage,
            config,
            reporting: TransitionPolicy::waste_reporting(),
        }
    }

    pub fn policy(&self) -> &TransitionPolicy {
        &self.config.policy
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Move a battery to `requested`, with no reason or requester recorded.
    pub async fn transition(
        &self,
        battery_id: &BatteryId,
        requested: BatteryStatus,
    ) -> Result<StatusChangeResult> {
        self.transition_with(battery_id, StatusChangeRequest::new(requested))
            .await
    }

    #[tracing::instrument(skip(self, request), fields(battery_id = %battery_id, to = %request.new_status))]
    pub async fn transition_with(
        &self,
        battery_id: &BatteryId,
        request: StatusChangeRequest,
    ) -> Result<StatusChangeResult> {
        if !request.new_status.is_requestable() {
            // Workflow-only target; the lookup only feeds the error and the not-found check.
            let from = self
                .storage
                .find_battery(battery_id)
                .await?
                .ok_or_else(|| PassportError::BatteryNotFound(battery_id.clone()))?
                .status();
            counter!(
                "battery_passport_transitions_rejected_total",
                "from" => from.as_str(),
                "to" => request.new_status.as_str()
            )
            .increment(1);
            tracing::warn!(%from, "Direct transition into a workflow-only status refused");
            return Err(PassportError::TransitionRejected {
                battery_id: battery_id.clone(),
                from,
                to: request.new_status,
            });
        }

        let draft = StatusChangeDraft::from_request(request);
        let change = self.apply(battery_id, draft, &self.config.policy).await?;
        Ok(StatusChangeResult::from(&change))
    }

    /// Record an installer's waste report and move the battery to `Signaled As Waste`.
    #[tracing::instrument(skip(self, report), fields(battery_id = %battery_id))]
    pub async fn report_waste(
        &self,
        battery_id: &BatteryId,
        report: WasteReport,
    ) -> Result<StatusChangeResult> {
        let mut request =
            StatusChangeRequest::new(BatteryStatus::SignaledAsWaste).with_reason(report.reason);
        request.requested_by = report.reported_by;

        let draft = StatusChangeDraft::from_request(request);
        let change = self.apply(battery_id, draft, &self.reporting).await?;
        Ok(StatusChangeResult::from(&change))
    }

    /// Record that a sorting centre has received a battery confirmed as `Waste`.
    ///
    /// The status is not changed. Fails `UnexpectedStatus` naming the current status
    /// when the battery is not in `Waste`.
    #[tracing::instrument(skip(self), fields(battery_id = %battery_id))]
    pub async fn confirm_reception(
        &self,
        battery_id: &BatteryId,
        center_name: &str,
    ) -> Result<ReceptionEvent> {
        let center_name = center_name.trim();
        if center_name.is_empty() {
            return Err(PassportError::InvalidInput(
                "center name must not be empty".to_string(),
            ));
        }

        let draft = ReceptionDraft::new(center_name);
        match self
            .storage
            .record_reception(battery_id, draft, BatteryStatus::Waste)
            .await
        {
            Ok(event) => {
                counter!("battery_passport_receptions_total").increment(1);
                tracing::info!(
                    event_id = %event.event_id,
                    center = %event.center_name,
                    "Reception confirmed"
                );
                Ok(event)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reception refused");
                Err(e)
            }
        }
    }

    /// Reception log of a battery, oldest first.
    pub async fn receptions(&self, battery_id: &BatteryId) -> Result<Vec<ReceptionEvent>> {
        self.storage.receptions(battery_id).await
    }

    /// Audit trail of a battery, oldest first.
    pub async fn history(&self, battery_id: &BatteryId) -> Result<Vec<StatusChange>> {
        self.storage.status_history(battery_id).await
    }

    async fn apply(
        &self,
        battery_id: &BatteryId,
        draft: StatusChangeDraft,
        policy: &TransitionPolicy,
    ) -> Result<StatusChange> {
        let to = draft.new_status;
        match self.storage.apply_status(battery_id, draft, policy).await {
            Ok(change) => {
                counter!(
                    "battery_passport_transitions_total",
                    "from" => change.previous_status.as_str(),
                    "to" => change.new_status.as_str()
                )
                .increment(1);
                tracing::info!(
                    change_id = %change.change_id,
                    previous_status = %change.previous_status,
                    new_status = %change.new_status,
                    requested_by = change.requested_by.as_deref(),
                    "Battery status changed"
                );
                Ok(change)
            }
            Err(PassportError::TransitionRejected {
                battery_id,
                from,
                to,
            }) => {
                counter!(
                    "battery_passport_transitions_rejected_total",
                    "from" => from.as_str(),
                    "to" => to.as_str()
                )
                .increment(1);
                tracing::warn!(%from, %to, "Transition not allowed by policy");
                Err(PassportError::TransitionRejected {
                    battery_id,
                    from,
                    to,
                })
            }
            Err(e) => {
                tracing::error!(%to, error = %e, "Failed to apply status change");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::battery::{Battery, BatteryFilter, BatterySummary, ModuleAlert};
    use crate::domain::module::{Module, ModuleId, ModuleReading};
    use crate::storage::{InMemoryStorage, TelemetryUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Storage whose status writes can be made to fail.
    struct FlakyStorage {
        inner: InMemoryStorage,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl BatteryStorage for FlakyStorage {
        async fn find_battery(&self, battery_id: &BatteryId) -> Result<Option<Battery>> {
            self.inner.find_battery(battery_id).await
        }

        async fn apply_status(
            &self,
            battery_id: &BatteryId,
            draft: StatusChangeDraft,
            policy: &TransitionPolicy,
        ) -> Result<StatusChange> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PassportError::persistence(anyhow::anyhow!(
                    "graph store unavailable"
                )));
            }
            self.inner.apply_status(battery_id, draft, policy).await
        }

        async fn status_history(&self, battery_id: &BatteryId) -> Result<Vec<StatusChange>> {
            self.inner.status_history(battery_id).await
        }

        async fn record_reception(
            &self,
            battery_id: &BatteryId,
            draft: ReceptionDraft,
            expected_status: BatteryStatus,
        ) -> Result<ReceptionEvent> {
            self.inner
                .record_reception(battery_id, draft, expected_status)
                .await
        }

        async fn receptions(&self, battery_id: &BatteryId) -> Result<Vec<ReceptionEvent>> {
            self.inner.receptions(battery_id).await
        }

        async fn list_alerts(&self) -> Result<Vec<ModuleAlert>> {
            self.inner.list_alerts().await
        }

        async fn list_batteries(&self, filter: BatteryFilter) -> Result<Vec<BatterySummary>> {
            self.inner.list_batteries(filter).await
        }

        async fn update_telemetry(
            &self,
            battery_id: &BatteryId,
            readings: Vec<ModuleReading>,
        ) -> Result<TelemetryUpdate> {
            self.inner.update_telemetry(battery_id, readings).await
        }

        async fn insert_battery(&self, battery: Battery) -> Result<()> {
            self.inner.insert_battery(battery).await
        }
    }

    fn test_battery(id: &str) -> Battery {
        Battery::new(
            id,
            "EU-BP-DE-2024-00002",
            vec![Module {
                module_id: ModuleId::from("M1"),
                internal_resistance: 0.012,
                max_resistance: 0.020,
                voltage: 3.7,
                temperature: 25.0,
                state_of_health: 98.0,
            }],
        )
        .unwrap()
    }

    fn engine_with(batteries: Vec<Battery>) -> StatusEngine<InMemoryStorage> {
        StatusEngine::new(Arc::new(InMemoryStorage::with_batteries(batteries)))
    }

    #[tokio::test]
    async fn test_transition_reports_previous_and_new() {
        let engine = engine_with(vec![test_battery("BP-1")]);
        let id = BatteryId::from("BP-1");

        let result = engine.transition(&id, BatteryStatus::Waste).await.unwrap();
        assert_eq!(result.battery_id, id);
        assert_eq!(result.previous_status, BatteryStatus::Original);
        assert_eq!(result.new_status, BatteryStatus::Waste);
        assert!(result.success);

        let stored = engine.storage().find_battery(&id).await.unwrap().unwrap();
        assert_eq!(stored.status(), BatteryStatus::Waste);
    }

    #[tokio::test]
    async fn test_repeated_transition_is_a_no_op_success() {
        let engine = engine_with(vec![test_battery("BP-1")]);
        let id = BatteryId::from("BP-1");

        engine.transition(&id, BatteryStatus::Reused).await.unwrap();
        let second = engine.transition(&id, BatteryStatus::Reused).await.unwrap();
        assert!(second.success);
        assert_eq!(second.previous_status, BatteryStatus::Reused);
        assert_eq!(second.new_status, BatteryStatus::Reused);
        assert_eq!(engine.history(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_battery_is_not_found() {
        let engine = engine_with(vec![]);
        let err = engine
            .transition(&BatteryId::from("BP-404"), BatteryStatus::Waste)
            .await
            .unwrap_err();
        assert!(matches!(err, PassportError::BatteryNotFound(ref id) if &**id == "BP-404"));
    }

    #[tokio::test]
    async fn test_direct_signaled_as_waste_is_rejected() {
        let engine = engine_with(vec![test_battery("BP-1")]);
        let id = BatteryId::from("BP-1");

        let err = engine
            .transition(&id, BatteryStatus::SignaledAsWaste)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PassportError::TransitionRejected {
                from: BatteryStatus::Original,
                to: BatteryStatus::SignaledAsWaste,
                ..
            }
        ));
        assert!(engine.history(&id).await.unwrap().is_empty());

        let err = engine
            .transition(&BatteryId::from("BP-404"), BatteryStatus::SignaledAsWaste)
            .await
            .unwrap_err();
        assert!(matches!(err, PassportError::BatteryNotFound(_)));
    }

    #[tokio::test]
    async fn test_report_waste_then_owner_confirms() {
        let engine = engine_with(vec![test_battery("BP-1")]);
        let id = BatteryId::from("BP-1");

        let reported = engine
            .report_waste(
                &id,
                WasteReport {
                    reason: "Module M3 défaillant".to_string(),
                    reported_by: Some("Garage Auto Plus".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(reported.new_status, BatteryStatus::SignaledAsWaste);

        let confirmed = engine
            .transition_with(
                &id,
                StatusChangeRequest::new(BatteryStatus::Waste)
                    .with_reason("Confirmé par le propriétaire")
                    .requested_by("Propriétaire BP"),
            )
            .await
            .unwrap();
        assert_eq!(confirmed.previous_status, BatteryStatus::SignaledAsWaste);
        assert_eq!(confirmed.new_status, BatteryStatus::Waste);

        let history = engine.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason.as_deref(), Some("Module M3 défaillant"));
        assert_eq!(history[0].requested_by.as_deref(), Some("Garage Auto Plus"));
        assert_eq!(history[1].requested_by.as_deref(), Some("Propriétaire BP"));
    }

    #[tokio::test]
    async fn test_tightened_policy_rejects_without_writing() {
        let storage = Arc::new(InMemoryStorage::with_batteries([
            test_battery("BP-1").rehydrate_status(BatteryStatus::Repurposed)
        ]));
        let config = StatusEngineConfig {
            policy: TransitionPolicy::unrestricted()
                .deny(BatteryStatus::Repurposed, BatteryStatus::Original),
        };
        let engine = StatusEngine::with_config(storage, config);
        let id = BatteryId::from("BP-1");

        let err = engine
            .transition(&id, BatteryStatus::Original)
            .await
            .unwrap_err();
        assert!(matches!(err, PassportError::TransitionRejected { .. }));

        let stored = engine.storage().find_battery(&id).await.unwrap().unwrap();
        assert_eq!(stored.status(), BatteryStatus::Repurposed);
        assert!(engine.history(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_surfaces_and_leaves_status() {
        let storage = Arc::new(FlakyStorage {
            inner: InMemoryStorage::with_batteries([test_battery("BP-1")]),
            fail_writes: AtomicBool::new(true),
        });
        let engine = StatusEngine::new(storage.clone());
        let id = BatteryId::from("BP-1");

        let err = engine.transition(&id, BatteryStatus::Waste).await.unwrap_err();
        assert!(err.is_retriable());

        let stored = storage.find_battery(&id).await.unwrap().unwrap();
        assert_eq!(stored.status(), BatteryStatus::Original);

        // Caller-side retry once the store recovers
        storage.fail_writes.store(false, Ordering::SeqCst);
        let result = engine.transition(&id, BatteryStatus::Waste).await.unwrap();
        assert_eq!(result.previous_status, BatteryStatus::Original);
    }

    #[tokio::test]
    async fn test_confirm_reception_requires_waste() {
        let engine = engine_with(vec![test_battery("BP-1")]);
        let id = BatteryId::from("BP-1");

        engine.transition(&id, BatteryStatus::Reused).await.unwrap();
        let err = engine
            .confirm_reception(&id, "Centre de Tri Lyon")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PassportError::UnexpectedStatus {
                actual: BatteryStatus::Reused,
                expected: BatteryStatus::Waste,
                ..
            }
        ));
        assert!(err.to_string().contains("'Reused'"));
        assert!(engine.receptions(&id).await.unwrap().is_empty());

        // Signaled but not yet confirmed by the owner
        engine
            .report_waste(
                &id,
                WasteReport {
                    reason: "Module M1 défaillant".to_string(),
                    reported_by: None,
                },
            )
            .await
            .unwrap();
        assert!(engine.confirm_reception(&id, "Centre de Tri Lyon").await.is_err());
    }

    #[tokio::test]
    async fn test_confirm_reception_records_event() {
        let engine = engine_with(vec![
            test_battery("BP-1").rehydrate_status(BatteryStatus::Waste)
        ]);
        let id = BatteryId::from("BP-1");

        let event = engine
            .confirm_reception(&id, "  Centre de Tri Lyon ")
            .await
            .unwrap();
        assert_eq!(event.center_name, "Centre de Tri Lyon");
        assert_eq!(event.battery_status, BatteryStatus::Waste);
        assert_eq!(engine.receptions(&id).await.unwrap(), vec![event]);

        let stored = engine.storage().find_battery(&id).await.unwrap().unwrap();
        assert_eq!(stored.status(), BatteryStatus::Waste);
    }

    #[tokio::test]
    async fn test_confirm_reception_input_and_lookup_failures() {
        let engine = engine_with(vec![
            test_battery("BP-1").rehydrate_status(BatteryStatus::Waste)
        ]);

        assert!(matches!(
            engine
                .confirm_reception(&BatteryId::from("BP-1"), "   ")
                .await,
            Err(PassportError::InvalidInput(_))
        ));
        assert!(matches!(
            engine
                .confirm_reception(&BatteryId::from("BP-404"), "Centre de Tri Lyon")
                .await,
            Err(PassportError::BatteryNotFound(_))
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = StatusEngineConfig::from_json(
            r#"{"policy": {"Original": ["Waste"], "Waste": ["Reused", "Repurposed"]}}"#,
        )
        .unwrap();
        assert!(config.policy.allows(BatteryStatus::Original, BatteryStatus::Waste));
        assert!(!config.policy.allows(BatteryStatus::Original, BatteryStatus::Reused));

        let err = StatusEngineConfig::from_json(r#"{"policy": "#).unwrap_err();
        assert!(matches!(err, PassportError::Serialization(_)));

        let err = StatusEngineConfig::from_json(r#"{"policy": {"Original": ["Signaled As Waste"]}}"#)
            .unwrap_err();
        assert!(matches!(err, PassportError::InvalidInput(_)));
    }

    #[test]
    fn test_config_defaults_to_unrestricted() {
        let config: StatusEngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.policy, TransitionPolicy::unrestricted());
    }
}
