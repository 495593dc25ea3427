//! Request-driven orchestration of the knowledge-tracing pipeline.
//!
//! One interaction runs: behavioral signals → load/stress estimate → mastery
//! update (per-key serialized) → one-hop transfer → fairness recording →
//! append to the event log → time budget for the next question. Store reads
//! on this path are timeout-guarded and fall back to safe defaults; a slow
//! dependency degrades the estimate, never the request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::akt::calibration::{logit, CalibrationError, CalibrationTable};
use crate::akt::config::AktConfig;
use crate::akt::fairness::FairnessMonitor;
use crate::akt::load::LoadEstimator;
use crate::akt::mastery::{self, MasteryError};
use crate::akt::timing::{AllocationError, AllocationInput, TimeAllocator};
use crate::akt::transfer::TransferGraph;
use crate::akt::types::*;
use crate::store::{EventLog, KnowledgeStateStore, ParameterStore};

const LOCK_REGISTRY_PRUNE_THRESHOLD: usize = 8192;
const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("interaction carries no concept ids")]
    EmptyConcepts,
    #[error(transparent)]
    Mastery(#[from] MasteryError),
}

pub struct AktEngine {
    config: AktConfig,
    transfer: TransferGraph,
    parameters: Arc<ParameterStore>,
    states: Arc<KnowledgeStateStore>,
    events: Arc<EventLog>,
    calibration: CalibrationTable,
    fairness: FairnessMonitor,
    update_locks: parking_lot::Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl AktEngine {
    pub fn new(
        config: AktConfig,
        parameters: Arc<ParameterStore>,
        states: Arc<KnowledgeStateStore>,
        events: Arc<EventLog>,
    ) -> Self {
        let transfer = TransferGraph::new(&config.transfer);
        let calibration = CalibrationTable::new(config.calibration.clone());
        let fairness = FairnessMonitor::new(config.fairness.clone());
        Self {
            config,
            transfer,
            parameters,
            states,
            events,
            calibration,
            fairness,
            update_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AktConfig {
        &self.config
    }

    pub fn event_log(&self) -> Arc<EventLog> {
        Arc::clone(&self.events)
    }

    /// Serialization point for the per-(student, concept) read-modify-write.
    /// The registry lock is held only long enough to hand out the key mutex.
    fn state_lock(&self, student_id: &str, concept_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.update_locks.lock();
        if locks.len() > LOCK_REGISTRY_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(
            locks
                .entry((student_id.to_string(), concept_id.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn load_parameters(&self, concept_id: &str) -> ConceptParameters {
        let timeout = Duration::from_millis(self.config.store.read_timeout_ms);
        match tokio::time::timeout(timeout, self.parameters.get(concept_id)).await {
            Ok(Some(params)) => params,
            Ok(None) => {
                tracing::debug!(concept_id, "no stored parameters, using defaults");
                ConceptParameters::with_defaults(concept_id)
            }
            Err(_) => {
                tracing::warn!(
                    concept_id,
                    timeout_ms = self.config.store.read_timeout_ms,
                    "parameter store read timed out, falling back to defaults"
                );
                ConceptParameters::with_defaults(concept_id)
            }
        }
    }

    async fn load_state(&self, student_id: &str, concept_id: &str) -> KnowledgeState {
        let timeout = Duration::from_millis(self.config.store.read_timeout_ms);
        match tokio::time::timeout(timeout, self.states.get(student_id, concept_id)).await {
            Ok(Some(state)) => state,
            Ok(None) => KnowledgeState::new(
                student_id,
                concept_id,
                self.config.mastery.default_prior,
                now_ms(),
            ),
            Err(_) => {
                tracing::warn!(
                    student_id,
                    concept_id,
                    timeout_ms = self.config.store.read_timeout_ms,
                    "knowledge state read timed out, falling back to default prior"
                );
                KnowledgeState::new(
                    student_id,
                    concept_id,
                    self.config.mastery.default_prior,
                    now_ms(),
                )
            }
        }
    }

    /// Update one (student, concept) pair from an observed response, then
    /// propagate one hop through the transfer graph.
    pub async fn update_mastery(
        &self,
        student_id: &str,
        concept_id: &str,
        is_correct: bool,
        signals: &BehavioralSignals,
    ) -> Result<MasteryUpdate, MasteryError> {
        let load = LoadEstimator::new(&self.config.load).estimate(signals);
        self.update_concept(student_id, concept_id, is_correct, load.stress)
            .await
    }

    async fn update_concept(
        &self,
        student_id: &str,
        concept_id: &str,
        is_correct: bool,
        stress: f64,
    ) -> Result<MasteryUpdate, MasteryError> {
        let lock = self.state_lock(student_id, concept_id);
        let guard = lock.lock().await;

        let params = self.load_parameters(concept_id).await;
        let mut state = self.load_state(student_id, concept_id).await;
        let now = now_ms();

        let elapsed_days = (now - state.last_practiced).max(0) as f64 / MS_PER_DAY;
        let decayed = mastery::decay_toward_prior(
            state.mastery_probability,
            self.config.mastery.default_prior,
            params.forgetting_rate,
            elapsed_days,
        );

        // Rejected updates leave the stored state untouched.
        let result = mastery::update(decayed, &params, is_correct, stress, &self.config.mastery)?;
        let predicted_correct = mastery::predicted_correct_probability(
            decayed,
            result.effective_slip,
            result.effective_guess,
        );

        let previous_mastery = state.mastery_probability;
        state.mastery_probability = result.new_mastery;
        state.practice_count += 1;
        state.consecutive_incorrect = if is_correct {
            0
        } else {
            state.consecutive_incorrect + 1
        };
        state.last_practiced = now;

        let recovery = mastery::recovery_triggered(
            state.consecutive_incorrect,
            state.mastery_probability,
            &self.config.mastery,
        );
        if recovery {
            tracing::debug!(
                student_id,
                concept_id,
                mastery = state.mastery_probability,
                streak = state.consecutive_incorrect,
                "recovery state flagged"
            );
        }

        let practice_count = state.practice_count;
        self.states.put(state).await;
        drop(guard);

        let transfers = self
            .apply_transfer(student_id, concept_id, result.new_mastery - decayed)
            .await;

        Ok(MasteryUpdate {
            student_id: student_id.to_string(),
            concept_id: concept_id.to_string(),
            previous_mastery,
            new_mastery: result.new_mastery,
            practice_count,
            recovery,
            effective_slip: result.effective_slip,
            effective_guess: result.effective_guess,
            predicted_correct,
            transfers,
        })
    }

    /// One hop only. Neighbor keys are locked one at a time with the origin
    /// lock already released, so mutually-linked concepts cannot deadlock.
    async fn apply_transfer(
        &self,
        student_id: &str,
        origin_concept: &str,
        origin_delta: f64,
    ) -> Vec<TransferEffect> {
        if origin_delta == 0.0 || self.transfer.is_empty() {
            return Vec::new();
        }

        let neighbors: Vec<(String, f64)> = self.transfer.neighbors(origin_concept).to_vec();
        let mut effects = Vec::with_capacity(neighbors.len());

        for (neighbor, weight) in neighbors {
            let lock = self.state_lock(student_id, &neighbor);
            let _guard = lock.lock().await;

            let mut state = self.load_state(student_id, &neighbor).await;
            let previous = state.mastery_probability;
            let shifted =
                (previous + self.transfer.propagated_delta(weight, origin_delta)).clamp(0.0, 1.0);
            // Partial credit, not practice: counts and timestamps stay put.
            state.mastery_probability = shifted;
            self.states.put(state).await;

            effects.push(TransferEffect {
                concept_id: neighbor,
                previous_mastery: previous,
                new_mastery: shifted,
                edge_weight: weight,
            });
        }

        effects
    }

    /// Time budget for the next question, bounded by the exam's hard cap.
    pub async fn allocate_time(
        &self,
        student_id: &str,
        question: &QuestionProfile,
        exam_code: &str,
        signals: &BehavioralSignals,
    ) -> Result<TimeAllocation, AllocationError> {
        let load = LoadEstimator::new(&self.config.load).estimate(signals);
        let state = self.load_state(student_id, &question.concept_id).await;
        let input = AllocationInput {
            base_time_ms: question.base_time_ms,
            difficulty: question.difficulty,
            mastery: state.mastery_probability,
            stress: load.stress,
            fatigue: load.fatigue,
            session_minutes: signals.session_minutes,
        };
        TimeAllocator::new(&self.config.timing, &self.config.exams).allocate(exam_code, &input)
    }

    /// The full one-interaction pipeline.
    pub async fn process_interaction(
        &self,
        request: InteractionRequest,
    ) -> Result<InteractionOutcome, EngineError> {
        if request.concept_ids.is_empty() {
            return Err(EngineError::EmptyConcepts);
        }

        let load = LoadEstimator::new(&self.config.load).estimate(&request.signals);

        let mut updates = Vec::with_capacity(request.concept_ids.len());
        for concept_id in &request.concept_ids {
            let update = self
                .update_concept(
                    &request.student_id,
                    concept_id,
                    request.is_correct,
                    load.stress,
                )
                .await?;
            updates.push(update);
        }

        let primary = &updates[0];
        if let Some(group) = &request.group {
            self.fairness.record(
                &request.exam_code,
                &request.subject,
                group,
                primary.new_mastery,
            );
        }

        let event = InteractionEvent {
            id: uuid::Uuid::new_v4().to_string(),
            student_id: request.student_id.clone(),
            concept_ids: request.concept_ids.clone(),
            is_correct: request.is_correct,
            response_time_ms: request.signals.response_time_ms,
            exam_code: request.exam_code.clone(),
            subject: request.subject.clone(),
            group: request.group.clone(),
            device: request.signals.device,
            network: request.signals.network,
            stress: load.stress,
            total_load: load.total_load,
            predicted_logit: logit(primary.predicted_correct),
            timestamp: now_ms(),
        };
        let event_id = event.id.clone();
        self.events.append(event).await;

        // The next-question budget is advisory; a bad exam code degrades to
        // no allocation instead of failing a pipeline that already persisted.
        let next_allocation = match &request.next_question {
            Some(question) => {
                match self
                    .allocate_time(
                        &request.student_id,
                        question,
                        &request.exam_code,
                        &request.signals,
                    )
                    .await
                {
                    Ok(allocation) => Some(allocation),
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            exam_code = %request.exam_code,
                            "skipping next-question allocation"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        Ok(InteractionOutcome {
            event_id,
            load,
            updates,
            next_allocation,
        })
    }

    pub fn estimate_load(&self, signals: &BehavioralSignals) -> LoadProfile {
        LoadEstimator::new(&self.config.load).estimate(signals)
    }

    pub fn fit_calibration(
        &self,
        exam_code: &str,
        subject: &str,
        logits: &[f64],
        labels: &[bool],
    ) -> Result<f64, CalibrationError> {
        self.calibration.fit(exam_code, subject, logits, labels)
    }

    pub fn apply_calibration(&self, exam_code: &str, subject: &str, raw_score: f64) -> f64 {
        self.calibration.apply(exam_code, subject, raw_score)
    }

    pub fn calibration_temperature(&self, exam_code: &str, subject: &str) -> Option<f64> {
        self.calibration.temperature(exam_code, subject)
    }

    pub fn record_fairness_sample(&self, exam_code: &str, subject: &str, group: &str, outcome: f64) {
        self.fairness.record(exam_code, subject, group, outcome);
    }

    pub fn fairness_report(&self, exam_code: &str, subject: &str) -> FairnessReport {
        self.fairness.report(exam_code, subject)
    }

    pub fn fairness_keys(&self) -> Vec<(String, String)> {
        self.fairness.observed_keys()
    }

    /// Batch refit of every (exam, subject) key with enough logged
    /// predictions. Runs off a snapshot; never blocks the live path.
    pub async fn refit_calibration_from_log(&self) -> usize {
        let snapshot = self.events.snapshot().await;
        let mut batches: HashMap<(String, String), (Vec<f64>, Vec<bool>)> = HashMap::new();
        for event in &snapshot {
            let entry = batches
                .entry((event.exam_code.clone(), event.subject.clone()))
                .or_default();
            entry.0.push(event.predicted_logit);
            entry.1.push(event.is_correct);
        }

        let mut fitted = 0;
        for ((exam_code, subject), (logits, labels)) in batches {
            if logits.len() < self.config.calibration.min_batch {
                tracing::debug!(
                    exam_code,
                    subject,
                    samples = logits.len(),
                    "calibration batch below minimum, skipped"
                );
                continue;
            }
            match self.calibration.fit(&exam_code, &subject, &logits, &labels) {
                Ok(_) => fitted += 1,
                Err(err) => {
                    tracing::warn!(exam_code, subject, error = %err, "calibration refit skipped");
                }
            }
        }

        tracing::info!(
            fitted,
            events = snapshot.len(),
            "calibration refit pass complete"
        );
        fitted
    }
}
