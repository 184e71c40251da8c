use tokio::sync::broadcast;

use studyplan_progress::config::Config;
use studyplan_progress::core::EventDispatcher;
use studyplan_progress::db::Database;
use studyplan_progress::logging::init_tracing;
use studyplan_progress::state::AppState;
use studyplan_progress::workers::WorkerManager;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level, &config.logging);

    let db = match Database::from_env().await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(error = %err, "database initialization failed");
            std::process::exit(1);
        }
    };

    let state = AppState::new(db);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let dispatcher = EventDispatcher::new(state.course_status())
        .spawn(&state.event_bus(), shutdown_tx.subscribe());

    let workers = WorkerManager::new(state.course_status(), config.worker.clone()).await;
    let worker_manager = match workers {
        Ok(manager) => {
            if let Err(e) = manager.start().await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    tracing::info!("studyplan-progress running");

    shutdown_signal().await;

    tracing::info!("Shutdown signal received, stopping");

    let _ = shutdown_tx.send(());
    if let Err(e) = dispatcher.await {
        tracing::warn!(error = %e, "event dispatcher task ended abnormally");
    }

    if let Some(ref manager) = worker_manager {
        manager.stop().await;
    }

    state.db().close().await;
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
