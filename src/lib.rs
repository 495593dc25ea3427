#![allow(dead_code)]

pub mod akt;
pub mod logging;
pub mod store;
pub mod workers;

use std::sync::Arc;

use crate::akt::{AktConfig, AktEngine};
use crate::store::{EventLog, KnowledgeStateStore, ParameterStore, StoreRuntime};

/// Build an engine with env-derived configuration and fresh in-process
/// stores. The surrounding service wires its own stores through
/// `AktEngine::new` when it needs shared or persistence-backed ones.
pub fn create_engine() -> Arc<AktEngine> {
    let runtime = Arc::new(StoreRuntime::new());
    let parameters = Arc::new(ParameterStore::new(Arc::clone(&runtime)));
    let states = Arc::new(KnowledgeStateStore::new(runtime));
    let events = Arc::new(EventLog::new());
    Arc::new(AktEngine::new(
        AktConfig::from_env(),
        parameters,
        states,
        events,
    ))
}
