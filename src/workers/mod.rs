//! Periodic batch jobs, decoupled from the live update path.
//!
//! Calibration refitting and fairness scans run on snapshots of the event
//! log on a cron schedule, gated by env flags so only a designated leader
//! instance runs them.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::akt::AktEngine;

static WORKER_LEADER: AtomicBool = AtomicBool::new(false);

pub fn is_worker_leader() -> bool {
    WORKER_LEADER.load(Ordering::Relaxed)
}

fn set_worker_leader(val: bool) {
    WORKER_LEADER.store(val, Ordering::Relaxed);
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| {
            if default {
                v != "false" && v != "0"
            } else {
                v == "true" || v == "1"
            }
        })
        .unwrap_or(default)
}

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    engine: Arc<AktEngine>,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

impl WorkerManager {
    pub async fn new(engine: Arc<AktEngine>) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            engine,
        })
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        if !env_flag("WORKER_LEADER", false) {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        set_worker_leader(true);
        info!("Starting workers (leader mode)");

        let scheduler = self.scheduler.lock().await;

        if env_flag("ENABLE_CALIBRATION_WORKER", true) {
            let schedule = std::env::var("CALIBRATION_REFIT_SCHEDULE")
                .unwrap_or_else(|_| "0 0 * * * *".to_string());
            let engine = Arc::clone(&self.engine);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(&schedule, move |_uuid, _lock| {
                let engine = Arc::clone(&engine);
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        fitted = engine.refit_calibration_from_log() => {
                            if fitted == 0 {
                                info!("calibration refit pass fitted no keys");
                            }
                        }
                    }
                })
            })
            .map_err(WorkerError::Scheduler)?;
            scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
            info!(schedule = %schedule, "Calibration refit worker scheduled");
        }

        if env_flag("ENABLE_FAIRNESS_WORKER", true) {
            let schedule = std::env::var("FAIRNESS_SCAN_SCHEDULE")
                .unwrap_or_else(|_| "0 30 2 * * *".to_string());
            let engine = Arc::clone(&self.engine);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(&schedule, move |_uuid, _lock| {
                let engine = Arc::clone(&engine);
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        _ = async {
                            scan_fairness(&engine);
                        } => {}
                    }
                })
            })
            .map_err(WorkerError::Scheduler)?;
            scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
            info!(schedule = %schedule, "Fairness scan worker scheduled");
        }

        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        info!("All workers started");
        Ok(())
    }

    pub async fn stop(&self) {
        if !is_worker_leader() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        set_worker_leader(false);
        info!("Workers stopped");
    }
}

fn scan_fairness(engine: &AktEngine) {
    for (exam_code, subject) in engine.fairness_keys() {
        let report = engine.fairness_report(&exam_code, &subject);
        if report.flagged {
            warn!(
                exam_code,
                subject,
                disparity = report.disparity,
                groups = report.groups.len(),
                "fairness disparity above threshold"
            );
        } else {
            info!(
                exam_code,
                subject,
                disparity = report.disparity,
                "fairness scan clean"
            );
        }
    }
}
