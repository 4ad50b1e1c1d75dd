//! Run lifecycle events

use std::fmt;

use taskloop_core::Task;

use crate::phases::{ParseReport, Phase};

/// Why a run ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A transition led to the terminal marker, or no transition was registered
    Terminal,
    /// The stop check answered "yes"
    ObjectiveComplete,
    /// Cancellation was requested
    Cancelled,
    /// The configured cycle bound was reached
    MaxCycles,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Terminal => write!(f, "terminal"),
            StopReason::ObjectiveComplete => write!(f, "objective complete"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::MaxCycles => write!(f, "max cycles reached"),
        }
    }
}

/// Something observable happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        objective: String,
        initial_queue: Vec<Task>,
    },
    PhaseEntered {
        state: String,
        phase: Phase,
    },
    TaskPopped {
        task: Task,
    },
    TaskCompleted {
        task: Task,
        result: String,
    },
    QueueReplaced {
        phase: Phase,
        tasks: Vec<Task>,
        report: ParseReport,
    },
    StopChecked {
        keep_going: bool,
    },
    RunTerminated {
        reason: StopReason,
        cycles: usize,
        phases_run: usize,
    },
    /// The run ended with an error
    RunFailed {
        error: String,
    },
}

impl RunEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "run_started",
            RunEvent::PhaseEntered { .. } => "phase_entered",
            RunEvent::TaskPopped { .. } => "task_popped",
            RunEvent::TaskCompleted { .. } => "task_completed",
            RunEvent::QueueReplaced { .. } => "queue_replaced",
            RunEvent::StopChecked { .. } => "stop_checked",
            RunEvent::RunTerminated { .. } => "run_terminated",
            RunEvent::RunFailed { .. } => "run_failed",
        }
    }

    /// Emit this event through `tracing`
    pub fn trace(&self) {
        match self {
            RunEvent::RunStarted {
                run_id,
                objective,
                initial_queue,
            } => tracing::info!(%run_id, %objective, queued = initial_queue.len(), "Run started"),
            RunEvent::PhaseEntered { state, phase } => {
                tracing::debug!(%state, phase = phase.name(), "Entering phase")
            }
            RunEvent::TaskPopped { task } => {
                tracing::info!(task_id = task.id, task = %task.name, "Executing task")
            }
            RunEvent::TaskCompleted { task, result } => tracing::info!(
                task_id = task.id,
                result_chars = result.chars().count(),
                "Task completed"
            ),
            RunEvent::QueueReplaced {
                phase,
                tasks,
                report,
            } => tracing::info!(
                phase = phase.name(),
                queued = tasks.len(),
                discarded = report.discarded,
                "Task queue replaced"
            ),
            RunEvent::StopChecked { keep_going } => {
                tracing::info!(keep_going, "Stop check answered")
            }
            RunEvent::RunTerminated {
                reason,
                cycles,
                phases_run,
            } => tracing::info!(%reason, cycles, phases_run, "Run finished"),
            RunEvent::RunFailed { error } => tracing::error!(%error, "Run failed"),
        }
    }
}
