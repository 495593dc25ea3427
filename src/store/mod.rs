//! In-process stores behind async interfaces.
//!
//! The engine only ever talks to these through timeout-guarded calls; a
//! persistence-backed implementation can replace the map-backed internals at
//! the service layer without touching the engine. `StoreRuntime` injects
//! artificial latency so the timeout/fallback path stays testable.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::akt::types::{ConceptParameters, InteractionEvent, KnowledgeState};

#[derive(Debug, Default)]
pub struct StoreRuntime {
    slow_enabled: AtomicBool,
    delay_ms: AtomicU64,
}

impl StoreRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_slow(&self, enabled: bool, delay_ms: u64) {
        self.slow_enabled.store(enabled, Ordering::Relaxed);
        self.delay_ms.store(delay_ms, Ordering::Relaxed);
    }

    pub fn is_slow(&self) -> bool {
        self.slow_enabled.load(Ordering::Relaxed)
    }

    pub async fn maybe_delay(&self) {
        if self.is_slow() {
            let delay = self.delay_ms.load(Ordering::Relaxed);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

/// Read-mostly concept parameter lookup. The live update path never writes
/// here; mutation belongs to calibration/administration flows.
pub struct ParameterStore {
    runtime: Arc<StoreRuntime>,
    inner: RwLock<HashMap<String, ConceptParameters>>,
}

impl ParameterStore {
    pub fn new(runtime: Arc<StoreRuntime>) -> Self {
        Self {
            runtime,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, concept_id: &str) -> Option<ConceptParameters> {
        self.runtime.maybe_delay().await;
        self.inner.read().await.get(concept_id).cloned()
    }

    pub async fn upsert(&self, params: ConceptParameters) {
        let mut inner = self.inner.write().await;
        inner.insert(params.concept_id.clone(), params);
    }

    pub async fn seed(&self, batch: Vec<ConceptParameters>) {
        let mut inner = self.inner.write().await;
        for params in batch {
            inner.insert(params.concept_id.clone(), params);
        }
    }
}

/// Mastery state keyed by (student, concept). Uniqueness per pair is the
/// map key; serialization of the read-modify-write lives in the engine's
/// per-key locks.
pub struct KnowledgeStateStore {
    runtime: Arc<StoreRuntime>,
    inner: RwLock<HashMap<(String, String), KnowledgeState>>,
}

impl KnowledgeStateStore {
    pub fn new(runtime: Arc<StoreRuntime>) -> Self {
        Self {
            runtime,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, student_id: &str, concept_id: &str) -> Option<KnowledgeState> {
        self.runtime.maybe_delay().await;
        self.inner
            .read()
            .await
            .get(&(student_id.to_string(), concept_id.to_string()))
            .cloned()
    }

    pub async fn put(&self, state: KnowledgeState) {
        let mut inner = self.inner.write().await;
        inner.insert((state.student_id.clone(), state.concept_id.clone()), state);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// Append-only interaction log. Batch consumers (calibration refit, fairness
/// scans) work from snapshots and never block appenders for long.
pub struct EventLog {
    inner: RwLock<Vec<InteractionEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    pub async fn append(&self, event: InteractionEvent) {
        self.inner.write().await.push(event);
    }

    pub async fn snapshot(&self) -> Vec<InteractionEvent> {
        self.inner.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
