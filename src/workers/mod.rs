mod recompute_sweep;

pub use recompute_sweep::{run_recompute_sweep, SweepStats};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::services::course_status::CourseStatusService;

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    service: Arc<CourseStatusService>,
    config: WorkerConfig,
    running: AtomicBool,
}

impl WorkerManager {
    pub async fn new(
        service: Arc<CourseStatusService>,
        config: WorkerConfig,
    ) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            service,
            config,
            running: AtomicBool::new(false),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        if !self.config.leader {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        info!("Starting workers (leader mode)");
        let scheduler = self.scheduler.lock().await;

        if self.config.recompute_enabled {
            let schedule = self.config.recompute_schedule.clone();
            let service = Arc::clone(&self.service);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
                let service = Arc::clone(&service);
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        result = run_recompute_sweep(service) => {
                            if let Err(e) = result {
                                error!(error = %e, "Recompute sweep worker error");
                            }
                        }
                    }
                })
            })?;
            scheduler.add(job).await?;
            info!(schedule = %schedule, "Recompute sweep worker scheduled");
        }

        scheduler.start().await?;
        self.running.store(true, Ordering::Relaxed);
        info!("All workers started");

        Ok(())
    }

    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        self.running.store(false, Ordering::Relaxed);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
