use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::game::{GameError, ProcessOutcome, StartOutcome};
use crate::AppState;

/// Tournaments currently being handled in this process.
#[derive(Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<i64>>>,
}

impl InFlight {
    /// Claim a tournament; `None` if another task holds it.
    pub fn try_claim(&self, tournament_id: i64) -> Option<InFlightGuard> {
        if self.ids.lock().insert(tournament_id) {
            Some(InFlightGuard {
                ids: self.ids.clone(),
                tournament_id,
            })
        } else {
            None
        }
    }
}

pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<i64>>>,
    tournament_id: i64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids.lock().remove(&self.tournament_id);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickFailure {
    pub tournament_id: Option<i64>,
    pub error: String,
}

/// What one scheduler pass did, per tournament.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub started: Vec<i64>,
    pub advanced: Vec<i64>,
    pub completed: Vec<i64>,
    pub skipped: Vec<i64>,
    pub failed: Vec<TickFailure>,
}

enum Handled {
    Started,
    Advanced,
    Completed,
    Idle,
}

/// Start every tournament past its scheduled start, then process every
/// active tournament past its round deadline.
pub async fn run_scheduler_tick(state: &AppState, now: DateTime<Utc>) -> TickReport {
    let mut report = TickReport::default();

    match state.store.list_ready_to_start(now).await {
        Ok(ready) => {
            let ids = ready.into_iter().map(|t| t.id).collect();
            run_each(state, ids, &mut report, |state, id| async move {
                match state.engine.start_if_ready(id, now).await? {
                    StartOutcome::NotDue => Ok(Handled::Idle),
                    StartOutcome::Started { .. } => Ok(Handled::Started),
                    StartOutcome::Walkover { .. } => Ok(Handled::Completed),
                }
            })
            .await;
        }
        Err(e) => {
            error!("Failed to list tournaments ready to start: {}", e);
            report.failed.push(TickFailure {
                tournament_id: None,
                error: e.to_string(),
            });
        }
    }

    match state.store.list_due_for_processing(now).await {
        Ok(due) => {
            let ids = due.into_iter().map(|t| t.id).collect();
            run_each(state, ids, &mut report, |state, id| async move {
                match state.engine.process_active_if_due(id, now).await? {
                    ProcessOutcome::NotDue => Ok(Handled::Idle),
                    ProcessOutcome::Advanced { .. } => Ok(Handled::Advanced),
                    ProcessOutcome::Completed { .. } => Ok(Handled::Completed),
                }
            })
            .await;
        }
        Err(e) => {
            error!("Failed to list tournaments due for processing: {}", e);
            report.failed.push(TickFailure {
                tournament_id: None,
                error: e.to_string(),
            });
        }
    }

    report
}

/// Run `op` for each tournament with bounded concurrency and a per-operation timeout.
async fn run_each<F, Fut>(state: &AppState, ids: Vec<i64>, report: &mut TickReport, op: F)
where
    F: Fn(AppState, i64) -> Fut,
    Fut: Future<Output = Result<Handled, GameError>>,
{
    let limit = state.config().scheduler_concurrency;
    let timeout = state.config().operation_timeout;

    let outcomes: Vec<(i64, Option<Result<Handled, GameError>>)> = stream::iter(ids)
        .map(|id| {
            let claim = state.in_flight.try_claim(id);
            let fut = op(state.clone(), id);
            async move {
                let Some(_guard) = claim else {
                    return (id, None);
                };
                let outcome = match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(GameError::Upstream(format!(
                        "timed out after {}s",
                        timeout.as_secs()
                    ))),
                };
                (id, Some(outcome))
            }
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    for (id, outcome) in outcomes {
        match outcome {
            None => {
                debug!("Tournament {} already in flight, skipping", id);
                report.skipped.push(id);
            }
            Some(Ok(Handled::Started)) => report.started.push(id),
            Some(Ok(Handled::Advanced)) => report.advanced.push(id),
            Some(Ok(Handled::Completed)) => report.completed.push(id),
            Some(Ok(Handled::Idle)) => {}
            Some(Err(e)) => {
                if e.is_integrity_violation() {
                    error!("Bracket integrity violation in tournament {}: {}", id, e);
                } else {
                    warn!("Scheduler could not handle tournament {}: {}", id, e);
                }
                report.failed.push(TickFailure {
                    tournament_id: Some(id),
                    error: e.to_string(),
                });
            }
        }
    }
}

pub struct SchedulerService {
    state: AppState,
    interval: Interval,
}

impl SchedulerService {
    pub fn new(state: AppState) -> Self {
        let mut interval = interval(state.config().scheduler_interval.max(Duration::from_secs(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { state, interval }
    }

    /// Start the background scheduler
    pub async fn run(&mut self) {
        info!("Starting tournament scheduler");

        loop {
            self.interval.tick().await;

            let report = run_scheduler_tick(&self.state, Utc::now()).await;
            if !report.started.is_empty()
                || !report.advanced.is_empty()
                || !report.completed.is_empty()
                || !report.failed.is_empty()
            {
                info!(
                    "Scheduler tick: {} started, {} advanced, {} completed, {} failed",
                    report.started.len(),
                    report.advanced.len(),
                    report.completed.len(),
                    report.failed.len()
                );
            }
        }
    }
}

/// Spawn the scheduler as a background task
pub fn spawn_scheduler(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut service = SchedulerService::new(state);
        service.run().await;
    })
}
