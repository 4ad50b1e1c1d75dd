//! Phase handlers for the task loop
//!
//! Each phase pairs a prompt builder (shared state -> prompt text) with a
//! response handler (response text + shared state -> mutated state + event).
//! Response handlers never fail: malformed lines are dropped and counted in
//! a [`ParseReport`].

use std::fmt;

use taskloop_core::{Result, SharedState, Task, TaskId, TaskResult};
use tracing::{debug, warn};

use crate::context::ContextProvider;
use crate::prompt;

/// Outcome symbol a phase hands back to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseEvent {
    Done,
    Stop,
}

impl fmt::Display for PhaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseEvent::Done => write!(f, "done"),
            PhaseEvent::Stop => write!(f, "stop"),
        }
    }
}

/// The four phase kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Execute,
    Create,
    Prioritize,
    StopCheck,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Accepted vs dropped lines from a list-shaped response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Lines that became tasks
    pub accepted: usize,
    /// Non-blank lines that did not parse
    pub discarded: usize,
    /// Blank lines skipped
    pub blank: usize,
}

/// What a response handler produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub event: PhaseEvent,
    pub report: Option<ParseReport>,
}

impl PhaseOutcome {
    fn done() -> Self {
        Self {
            event: PhaseEvent::Done,
            report: None,
        }
    }
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Execute => "execute",
            Phase::Create => "create",
            Phase::Prioritize => "prioritize",
            Phase::StopCheck => "stop_check",
        }
    }

    /// Build the prompt for this phase
    ///
    /// Execute pops the head of the queue into `current_task` here and fails
    /// with `EmptyQueue` when there is nothing to pop.
    pub async fn build_prompt(
        &self,
        state: &mut SharedState,
        context: &ContextProvider,
    ) -> Result<String> {
        match self {
            Phase::Execute => {
                let task = state.pop_current()?.clone();
                debug!(task_id = task.id, task = %task.name, "Popped task for execution");
                let ctx = context.get_context(state).await;
                Ok(prompt::build_execution_prompt(&state.objective, &ctx, &task))
            }
            Phase::Create => {
                let completed = state
                    .current_task
                    .as_ref()
                    .map(|t| t.name.as_str())
                    .unwrap_or("none");
                Ok(prompt::build_creation_prompt(
                    &state.objective,
                    &state.last_result.data,
                    completed,
                    &state.task_queue.names(),
                ))
            }
            Phase::Prioritize => Ok(prompt::build_prioritization_prompt(
                &state.objective,
                &state.task_queue.names(),
            )),
            Phase::StopCheck => {
                let ctx = context.get_context(state).await;
                Ok(prompt::build_stop_check_prompt(&state.objective, &ctx))
            }
        }
    }

    /// Apply a gateway response to the shared state
    pub fn handle_response(&self, response: &str, state: &mut SharedState) -> PhaseOutcome {
        match self {
            Phase::Execute => {
                state.last_result = TaskResult::new(response);
                PhaseOutcome::done()
            }
            Phase::Create => {
                let first_id = next_task_id(state);
                let (tasks, report) = parse_created_tasks(response, first_id);
                log_report(*self, &report);
                state.replace_queue(tasks);
                PhaseOutcome {
                    event: PhaseEvent::Done,
                    report: Some(report),
                }
            }
            Phase::Prioritize => {
                let (tasks, report) = parse_prioritized_tasks(response);
                log_report(*self, &report);
                state.replace_queue(tasks);
                PhaseOutcome {
                    event: PhaseEvent::Done,
                    report: Some(report),
                }
            }
            Phase::StopCheck => {
                state.keep_going = !objective_reached(response);
                PhaseOutcome {
                    event: if state.keep_going {
                        PhaseEvent::Done
                    } else {
                        PhaseEvent::Stop
                    },
                    report: None,
                }
            }
        }
    }
}

/// First id for tasks created after the current queue
///
/// Tail of the queue + 1; with an empty queue, the just-completed task's
/// id + 1; with neither, 1. `None` when the base id is already `TaskId::MAX`.
pub fn next_task_id(state: &SharedState) -> Option<TaskId> {
    match state
        .task_queue
        .last_id()
        .or_else(|| state.current_task.as_ref().map(|t| t.id))
    {
        Some(id) => id.checked_add(1),
        None => Some(1),
    }
}

/// One task per non-blank line, numbered from `first_id`
///
/// Lines past the end of the id space are discarded.
pub fn parse_created_tasks(response: &str, first_id: Option<TaskId>) -> (Vec<Task>, ParseReport) {
    let mut report = ParseReport::default();
    let mut tasks = Vec::new();
    let mut next_id = first_id;

    for line in response.lines() {
        let name = line.trim();
        if name.is_empty() {
            report.blank += 1;
            continue;
        }
        match next_id {
            Some(id) => {
                tasks.push(Task::new(id, name));
                next_id = id.checked_add(1);
            }
            None => report.discarded += 1,
        }
    }

    report.accepted = tasks.len();
    (tasks, report)
}

/// Parse `"<id>. <name>"` lines, dropping anything else
///
/// Splits on the first `.` only; both sides must be non-empty and the left
/// side must be plain ASCII digits.
pub fn parse_prioritized_tasks(response: &str) -> (Vec<Task>, ParseReport) {
    let mut report = ParseReport::default();
    let mut tasks = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            report.blank += 1;
            continue;
        }
        match parse_numbered_line(line) {
            Some(task) => tasks.push(task),
            None => report.discarded += 1,
        }
    }

    report.accepted = tasks.len();
    (tasks, report)
}

fn parse_numbered_line(line: &str) -> Option<Task> {
    let (id, name) = line.split_once('.')?;
    let (id, name) = (id.trim(), name.trim());
    if id.is_empty() || name.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = id.parse::<TaskId>().ok()?;
    Some(Task::new(id, name))
}

/// Exactly "yes", ignoring case and surrounding whitespace
pub fn objective_reached(response: &str) -> bool {
    response.trim().eq_ignore_ascii_case("yes")
}

fn log_report(phase: Phase, report: &ParseReport) {
    if report.discarded > 0 {
        warn!(
            phase = phase.name(),
            accepted = report.accepted,
            discarded = report.discarded,
            "Dropped malformed response lines"
        );
    } else {
        debug!(
            phase = phase.name(),
            accepted = report.accepted,
            blank = report.blank,
            "Parsed response lines"
        );
    }
}
