use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::shutdown::{shutdown_signal, wait_for_shutdown, ShutdownNotifier};
use crate::core::state::AppState;
use crate::services::ai_feedback::QaFeedbackProvider;
use crate::tasks::grading;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Runs the AI feedback workers until Ctrl+C or SIGTERM.
pub(crate) async fn run(state: AppState, provider: Arc<dyn QaFeedbackProvider>) -> Result<()> {
    run_until(state, provider, shutdown_signal()).await
}

pub(crate) async fn run_until(
    state: AppState,
    provider: Arc<dyn QaFeedbackProvider>,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    let notifier = ShutdownNotifier::new();
    let concurrency = state.settings().grading().worker_concurrency;
    let mut handles = Vec::with_capacity(concurrency + 1);

    for worker in 0..concurrency {
        handles.push(tokio::spawn(feedback_worker(
            worker,
            state.clone(),
            provider.clone(),
            notifier.subscribe(),
        )));
    }
    handles.push(tokio::spawn(maintenance_loop(state.clone(), notifier.subscribe())));

    tracing::info!(workers = concurrency, "AI feedback workers started");
    stop.await;
    notifier.trigger();

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    tracing::info!("AI feedback workers stopped");
    Ok(())
}

async fn feedback_worker(
    worker: usize,
    state: AppState,
    provider: Arc<dyn QaFeedbackProvider>,
    mut shutdown: watch::Receiver<bool>,
) {
    let idle = Duration::from_secs(state.settings().grading().poll_interval_seconds);
    loop {
        if *shutdown.borrow() {
            break;
        }

        match grading::grade_next_submission(&state, provider.as_ref()).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => tracing::error!(worker, error = %format!("{err:#}"), "AI feedback poll failed"),
        }

        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = sleep(idle) => {}
        }
    }
}

async fn maintenance_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(MAINTENANCE_INTERVAL);
    loop {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = tick.tick() => {
                if let Err(err) = grading::report_exhausted_claims(&state).await {
                    tracing::error!(error = %format!("{err:#}"), "report_exhausted_claims failed");
                }
            }
        }
    }
}
