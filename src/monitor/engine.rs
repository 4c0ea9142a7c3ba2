use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::alerts::generate_alerts;
use super::contributors::{compute_contributors, total_contribution};
use super::prediction::{PredictionClient, PredictionError, PredictionSynchronizer, SyncOutcome};
use super::types::{
    PredictionResult, RiskContributor, VitalAlert, VitalKind, VitalSnapshot, ViewSnapshot,
};
use super::MonitorError;

/// State carried between change events.
struct EngineState {
    vitals: VitalSnapshot,
    generation: u64,
    contributors: Vec<RiskContributor>,
    alerts: Vec<VitalAlert>,
    sync: PredictionSynchronizer,
}

impl EngineState {
    /// Build the immutable view for the current state.
    fn assemble(&self) -> ViewSnapshot {
        let prediction = self.sync.current();
        ViewSnapshot {
            generation: self.generation,
            vitals: self.vitals,
            readings: self.vitals.readings(),
            risk_score: self.sync.risk_score(),
            status: self.sync.status(),
            assessment: self.sync.status().summary(),
            risk_contributors: self.contributors.clone(),
            local_deviation_percent: total_contribution(&self.contributors),
            alerts: self.alerts.clone(),
            trend: self.sync.trend().to_vec(),
            prediction_generation: prediction.map(|p| p.generation),
            prediction_received_at: prediction.map(|p| p.received_at),
        }
    }
}

struct EngineInner {
    client: Arc<dyn PredictionClient>,
    state: Mutex<EngineState>,
    publisher: watch::Sender<Arc<ViewSnapshot>>,
}

impl EngineInner {
    /// Every field of `EngineState` is replaced whole under the lock, so a
    /// guard left behind by a panicking holder is still consistent.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Engine state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Replace the published view. Called with the state lock held so
    /// publication order matches state order.
    fn publish(&self, state: &EngineState) -> Arc<ViewSnapshot> {
        let view = Arc::new(state.assemble());
        self.publisher.send_replace(view.clone());
        view
    }

    fn complete(
        &self,
        generation: u64,
        outcome: Result<PredictionResult, PredictionError>,
    ) -> SyncOutcome {
        let mut state = self.lock();
        let result = state.sync.complete(generation, outcome);
        if matches!(result, SyncOutcome::Applied { .. }) {
            self.publish(&state);
        }
        result
    }
}

/// Reconciles vital changes into [`ViewSnapshot`]s.
///
/// Contributors and alerts are recomputed synchronously on every change.
/// The risk prediction is requested in a background task and folded in
/// when it arrives, provided no newer change has been made since.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct MonitorEngine {
    inner: Arc<EngineInner>,
}

impl MonitorEngine {
    /// Engine showing `initial` with no prediction yet. No request is sent
    /// until the first [`MonitorEngine::on_vitals_changed`].
    pub fn new(client: Arc<dyn PredictionClient>, initial: VitalSnapshot) -> Self {
        let contributors = compute_contributors(&initial);
        let alerts = generate_alerts(&initial);
        let state = EngineState {
            vitals: initial,
            generation: 0,
            contributors,
            alerts,
            sync: PredictionSynchronizer::new(),
        };
        let (publisher, _) = watch::channel(Arc::new(state.assemble()));

        Self {
            inner: Arc::new(EngineInner {
                client,
                state: Mutex::new(state),
                publisher,
            }),
        }
    }

    /// Latest reconciled view.
    pub fn current(&self) -> Arc<ViewSnapshot> {
        self.inner.publisher.borrow().clone()
    }

    /// Receiver notified on every wholesale view replacement.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewSnapshot>> {
        self.inner.publisher.subscribe()
    }

    /// Reconcile a new vital snapshot.
    ///
    /// Publishes a view with fresh contributors and alerts before returning,
    /// then requests a prediction in the background. Must be called from
    /// within a Tokio runtime.
    pub fn on_vitals_changed(&self, vitals: VitalSnapshot) -> Result<PredictionTask, MonitorError> {
        self.apply(|_| Ok(vitals))
    }

    /// Apply a single vital change on top of the current snapshot.
    pub fn update_vital(&self, kind: VitalKind, value: f64) -> Result<PredictionTask, MonitorError> {
        self.apply(|current| current.with_reading(kind, value))
    }

    /// Derive the next snapshot from the current one and reconcile it, all
    /// under one lock acquisition so concurrent changes are never lost.
    fn apply<F>(&self, next: F) -> Result<PredictionTask, MonitorError>
    where
        F: FnOnce(&VitalSnapshot) -> Result<VitalSnapshot, MonitorError>,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

        let (ticket, view) = {
            let mut state = self.inner.lock();
            let vitals = next(&state.vitals)?.sanitized()?;
            let ticket = state.sync.issue(&vitals);
            state.vitals = vitals;
            state.generation = ticket.generation;
            state.contributors = compute_contributors(&vitals);
            state.alerts = generate_alerts(&vitals);
            let view = self.inner.publish(&state);
            (ticket, view)
        };

        tracing::debug!(
            generation = ticket.generation,
            alerts = view.alerts.len(),
            contributors = view.risk_contributors.len(),
            "Vitals reconciled, requesting prediction"
        );

        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            let outcome = inner.client.predict(ticket.features).await;
            inner.complete(ticket.generation, outcome)
        });

        Ok(PredictionTask { view, handle })
    }

    /// Reconcile and return the synchronous view, leaving the prediction
    /// to land in the background.
    pub fn reconcile(&self, vitals: VitalSnapshot) -> Result<Arc<ViewSnapshot>, MonitorError> {
        self.on_vitals_changed(vitals).map(PredictionTask::into_view)
    }
}

/// Handle on an in-flight prediction request.
///
/// Dropping it does not cancel the request.
pub struct PredictionTask {
    view: Arc<ViewSnapshot>,
    handle: JoinHandle<SyncOutcome>,
}

impl PredictionTask {
    pub fn generation(&self) -> u64 {
        self.view.generation
    }

    /// View published when the change was reconciled.
    pub fn view(&self) -> &Arc<ViewSnapshot> {
        &self.view
    }

    pub fn into_view(self) -> Arc<ViewSnapshot> {
        self.view
    }

    /// Wait for the request to complete and report what became of it.
    pub async fn settled(self) -> SyncOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Prediction task aborted");
                SyncOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::monitor::prediction::mock::{FixedClient, GatedClient, UnavailableClient};
    use crate::monitor::types::{AlertKind, RiskStatus};

    const WAIT: Duration = Duration::from_secs(5);

    fn offline_engine() -> MonitorEngine {
        MonitorEngine::new(Arc::new(UnavailableClient), VitalSnapshot::baseline())
    }

    fn result(risk_score: u8, status: RiskStatus) -> PredictionResult {
        PredictionResult { risk_score, status }
    }

    async fn settle(task: PredictionTask) -> SyncOutcome {
        tokio::time::timeout(WAIT, task.settled())
            .await
            .expect("prediction task did not settle")
    }

    #[tokio::test]
    async fn initial_state_with_service_unreachable() {
        let engine = offline_engine();
        let task = engine.on_vitals_changed(VitalSnapshot::baseline()).unwrap();
        assert_eq!(settle(task).await, SyncOutcome::Failed);

        let view = engine.current();
        assert!(view.risk_contributors.is_empty());
        assert!(view.alerts.is_empty());
        assert_eq!(view.risk_score, 0);
        assert_eq!(view.status, RiskStatus::Stable);
        assert_eq!(view.assessment, RiskStatus::Stable.summary());
        assert!(view.trend.is_empty());
        assert!(view.prediction_is_stale());
        assert!(!view.has_critical_alert());
    }

    #[tokio::test]
    async fn tachycardia_scenario() {
        let engine = offline_engine();
        let task = engine.update_vital(VitalKind::HeartRate, 115.0).unwrap();

        let view = task.view().clone();
        assert_eq!(view.alerts.len(), 1);
        assert_eq!(view.alerts[0].kind, AlertKind::Tachycardia);
        assert!(view.alerts[0].message.starts_with("Tachycardia"));

        let high_hr = view
            .risk_contributors
            .iter()
            .find(|c| c.label == "High HR")
            .expect("High HR contributor");
        assert!((high_hr.contribution_percent - 15.0).abs() < 1e-9);
        assert!((view.local_deviation_percent - 15.0).abs() < 1e-9);

        settle(task).await;
        assert_eq!(engine.current().vitals.heart_rate, 115.0);
    }

    #[tokio::test]
    async fn reconciling_same_snapshot_is_idempotent() {
        let engine = offline_engine();
        let vitals = VitalSnapshot {
            heart_rate: 45.0,
            oxygen_saturation: 91.0,
            ..VitalSnapshot::baseline()
        };

        let first = engine.reconcile(vitals).unwrap();
        let second = engine.reconcile(vitals).unwrap();
        assert_eq!(first.risk_contributors, second.risk_contributors);
        assert_eq!(first.alerts, second.alerts);
        assert_eq!(second.generation, first.generation + 1);
    }

    #[tokio::test]
    async fn successful_prediction_updates_score_and_trend() {
        let engine = MonitorEngine::new(
            Arc::new(FixedClient(result(35, RiskStatus::Stable))),
            VitalSnapshot::baseline(),
        );
        let task = engine.on_vitals_changed(VitalSnapshot::baseline()).unwrap();
        let generation = task.generation();

        assert!(matches!(settle(task).await, SyncOutcome::Applied { .. }));
        let view = engine.current();
        assert_eq!(view.risk_score, 35);
        assert_eq!(view.trend.len(), 1);
        assert_eq!(view.trend[0].score, 65);
        assert_eq!(view.prediction_generation, Some(generation));
        assert!(view.prediction_received_at.is_some());
        assert!(!view.prediction_is_stale());
    }

    #[tokio::test]
    async fn stale_response_never_overwrites_newer_one() {
        let client = Arc::new(GatedClient::default());
        let s1 = VitalSnapshot::baseline().with_reading(VitalKind::HeartRate, 90.0).unwrap();
        let s2 = VitalSnapshot::baseline().with_reading(VitalKind::HeartRate, 130.0).unwrap();
        let gate1 = client.gate(90.0);
        let gate2 = client.gate(130.0);

        let engine = MonitorEngine::new(client, VitalSnapshot::baseline());
        let task1 = engine.on_vitals_changed(s1).unwrap();
        let task2 = engine.on_vitals_changed(s2).unwrap();

        // S2 answers first, then S1's slow answer lands.
        gate2.send(Ok(result(88, RiskStatus::High))).unwrap();
        assert!(matches!(settle(task2).await, SyncOutcome::Applied { .. }));
        gate1.send(Ok(result(5, RiskStatus::Stable))).unwrap();
        assert!(matches!(settle(task1).await, SyncOutcome::Stale { .. }));

        let view = engine.current();
        assert_eq!(view.risk_score, 88);
        assert_eq!(view.status, RiskStatus::High);
        assert_eq!(view.assessment, RiskStatus::High.summary());
        assert_eq!(view.vitals.heart_rate, 130.0);
        assert_eq!(view.trend.len(), 1);
    }

    #[tokio::test]
    async fn hung_request_does_not_block_newer_one() {
        let client = Arc::new(GatedClient::default());
        let _never_released = client.gate(90.0);
        let gate2 = client.gate(95.0);

        let engine = MonitorEngine::new(client, VitalSnapshot::baseline());
        let hung = engine.update_vital(VitalKind::HeartRate, 90.0).unwrap();
        let fresh = engine.update_vital(VitalKind::HeartRate, 95.0).unwrap();

        gate2.send(Ok(result(12, RiskStatus::Stable))).unwrap();
        assert!(matches!(settle(fresh).await, SyncOutcome::Applied { .. }));
        assert_eq!(engine.current().risk_score, 12);
        drop(hung);
    }

    #[tokio::test]
    async fn failure_after_success_keeps_last_known_score() {
        let client = Arc::new(GatedClient::default());
        let gate1 = client.gate(82.0);
        let gate2 = client.gate(120.0);

        let engine = MonitorEngine::new(client, VitalSnapshot::baseline());
        let first = engine.on_vitals_changed(VitalSnapshot::baseline()).unwrap();
        gate1.send(Ok(result(61, RiskStatus::High))).unwrap();
        settle(first).await;

        let second = engine.update_vital(VitalKind::HeartRate, 120.0).unwrap();
        gate2
            .send(Err(PredictionError::ResponseParsing("expected value".into())))
            .unwrap();
        assert_eq!(settle(second).await, SyncOutcome::Failed);

        let view = engine.current();
        assert_eq!(view.risk_score, 61);
        assert_eq!(view.status, RiskStatus::High);
        assert_eq!(view.trend.len(), 1);
        // Local parts follow the newest vitals regardless.
        assert_eq!(view.alerts[0].kind, AlertKind::Tachycardia);
        assert!(view.prediction_is_stale());
    }

    #[tokio::test]
    async fn trend_slides_after_ten_predictions() {
        let engine = MonitorEngine::new(
            Arc::new(FixedClient(result(10, RiskStatus::Stable))),
            VitalSnapshot::baseline(),
        );
        for _ in 0..12 {
            let task = engine.on_vitals_changed(VitalSnapshot::baseline()).unwrap();
            settle(task).await;
        }
        let trend = engine.current().trend.clone();
        assert_eq!(trend.len(), 10);
        assert_eq!(trend[0].sequence_index, 2);
        assert_eq!(trend[9].sequence_index, 11);
    }

    #[tokio::test]
    async fn subscribers_see_each_replacement() {
        let engine = MonitorEngine::new(
            Arc::new(FixedClient(result(47, RiskStatus::Stable))),
            VitalSnapshot::baseline(),
        );
        let mut rx = engine.subscribe();
        assert!(!rx.has_changed().unwrap());

        let task = engine.update_vital(VitalKind::Temperature, 38.5).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().alerts[0].kind, AlertKind::Fever);

        settle(task).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().risk_score, 47);
    }

    #[tokio::test]
    async fn update_vital_rejects_non_finite() {
        let engine = offline_engine();
        let err = engine
            .update_vital(VitalKind::OxygenSaturation, f64::INFINITY)
            .err()
            .expect("infinite reading must be rejected");
        assert!(matches!(err, MonitorError::NonFiniteReading { .. }));
        assert_eq!(engine.current().generation, 0);
    }

    #[tokio::test]
    async fn out_of_envelope_values_are_clamped() {
        let engine = offline_engine();
        let view = engine
            .reconcile(VitalSnapshot {
                systolic_bp: 1_000.0,
                oxygen_saturation: 91.0,
                ..VitalSnapshot::baseline()
            })
            .unwrap();
        assert_eq!(view.vitals.systolic_bp, 260.0);
        assert_eq!(view.alerts[0].kind, AlertKind::LowOxygen);
        assert_eq!(view.alerts[1].kind, AlertKind::Hypertension);
        assert!(view.has_critical_alert());
    }

    #[tokio::test]
    async fn out_of_range_score_from_client_leaves_engine_usable() {
        let engine = MonitorEngine::new(
            Arc::new(FixedClient(result(150, RiskStatus::High))),
            VitalSnapshot::baseline(),
        );
        let task = engine.on_vitals_changed(VitalSnapshot::baseline()).unwrap();
        assert_eq!(settle(task).await, SyncOutcome::Failed);

        let view = engine.current();
        assert_eq!(view.risk_score, 0);
        assert_eq!(view.status, RiskStatus::Stable);
        assert!(view.trend.is_empty());

        let task = engine.update_vital(VitalKind::HeartRate, 115.0).unwrap();
        assert_eq!(task.view().alerts[0].kind, AlertKind::Tachycardia);
        assert_eq!(settle(task).await, SyncOutcome::Failed);
        assert_eq!(engine.current().vitals.heart_rate, 115.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_to_different_vitals_are_kept() {
        let engine = offline_engine();
        let rounds = 100u32;

        let updates = [
            (VitalKind::HeartRate, 60.0),
            (VitalKind::MeanArterialPressure, 50.0),
            (VitalKind::SystolicBp, 100.0),
        ];
        let workers: Vec<_> = updates
            .into_iter()
            .map(|(kind, base)| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    for i in 0..rounds {
                        engine.update_vital(kind, base + f64::from(i)).unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.await.unwrap();
        }

        let last = f64::from(rounds - 1);
        let vitals = engine.current().vitals;
        assert_eq!(vitals.heart_rate, 60.0 + last);
        assert_eq!(vitals.mean_arterial_pressure, 50.0 + last);
        assert_eq!(vitals.systolic_bp, 100.0 + last);
        assert_eq!(engine.current().generation, u64::from(rounds) * 3);
    }

    #[tokio::test]
    async fn engine_recovers_from_poisoned_lock() {
        let engine = offline_engine();
        let inner = Arc::clone(&engine.inner);
        let poisoner = std::thread::spawn(move || {
            let _guard = inner.state.lock().unwrap();
            panic!("holder panicked");
        });
        assert!(poisoner.join().is_err());
        assert!(engine.inner.state.is_poisoned());

        let task = engine.update_vital(VitalKind::HeartRate, 120.0).unwrap();
        assert_eq!(task.generation(), 1);
        assert_eq!(settle(task).await, SyncOutcome::Failed);
        assert_eq!(engine.current().vitals.heart_rate, 120.0);
    }

    #[test]
    fn on_vitals_changed_outside_runtime_fails() {
        let engine = offline_engine();
        let err = engine
            .on_vitals_changed(VitalSnapshot::baseline())
            .err()
            .expect("no runtime available");
        assert!(matches!(err, MonitorError::NoRuntime));
        assert_eq!(engine.current().generation, 0);
    }
}
