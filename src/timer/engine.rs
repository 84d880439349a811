//! Cancellable countdown engine
//!
//! Absolute-deadline countdown with one-second ticks. Remaining time is
//! recomputed from the deadline on every tick, so a stalled or suspended
//! process shows the true remaining time on resume instead of drifting.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One timer run.
#[derive(Debug, Clone)]
pub struct TimerSession {
    /// Display label, shown at start
    pub label: String,
    /// Task to annotate after completion
    pub task_id: Option<String>,
    /// Duration in whole minutes; must be at least 1
    pub minutes: u32,
}

/// Observer for the phases of a countdown.
pub trait TimerCallbacks {
    fn on_start(&mut self, ends_at: DateTime<Local>);
    fn on_update(&mut self, remaining: Duration);
    fn on_complete(&mut self);
    fn on_error(&mut self, err: &anyhow::Error);
}

/// Post-completion annotation sink.
#[async_trait]
pub trait Annotator {
    async fn append_note(&self, task_id: &str, text: &str) -> anyhow::Result<()>;
}

/// Annotator for sessions with nothing to annotate.
pub struct NoAnnotation;

#[async_trait]
impl Annotator for NoAnnotation {
    async fn append_note(&self, _task_id: &str, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// How a countdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Completed,
    Cancelled,
}

/// Run a countdown to its deadline or cancellation.
///
/// The deadline is fixed once at entry and every tick measures against it.
/// Completion fires `on_complete` exactly once, then annotates the session's
/// task if it has one. Annotation failure is reported through `on_error` and
/// does not change the outcome.
pub async fn run_countdown<C, A>(
    session: &TimerSession,
    callbacks: &mut C,
    annotator: &A,
    cancel: &CancellationToken,
) -> TimerOutcome
where
    C: TimerCallbacks,
    A: Annotator + ?Sized,
{
    let total = Duration::from_secs(u64::from(session.minutes) * 60);
    let deadline = Instant::now() + total;
    let ends_at = Local::now() + chrono::Duration::seconds(total.as_secs() as i64);

    callbacks.on_start(ends_at);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return TimerOutcome::Cancelled,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            callbacks.on_complete();
            if let Some(task_id) = &session.task_id {
                let note = format!("Focused for {} minute(s) on this task.", session.minutes);
                if let Err(e) = annotator.append_note(task_id, &note).await {
                    callbacks.on_error(&e);
                }
            }
            return TimerOutcome::Completed;
        }

        callbacks.on_update(remaining);
    }
}
