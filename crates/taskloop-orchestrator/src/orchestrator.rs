//! Orchestrator - drives the phase loop over the state machine
//!
//! Phases run strictly one at a time. Each phase builds a prompt from shared
//! state, sends it through the generation gateway, and applies the response.
//! The resulting event picks the next state from the transition table.
//!
//! Cancellation is checked between phases only, so the shared state is
//! always left between two complete phases.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use taskloop_agent::{GenerationGateway, GenerationOptions, VectorBackend};
use taskloop_core::{Result, SharedState, TaskloopConfig, TaskloopError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::activity_logger::ActivityLogger;
use crate::context::ContextProvider;
use crate::events::{RunEvent, StopReason};
use crate::phases::{Phase, PhaseEvent};
use crate::state_machine::{StateMachine, Step};

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub stop_reason: StopReason,
    /// Completed cycles (returns to the initial state)
    pub cycles: usize,
    pub phases_run: usize,
    pub final_state: SharedState,
}

/// Runs one objective to completion
pub struct Orchestrator {
    run_id: String,
    gateway: Arc<dyn GenerationGateway>,
    machine: StateMachine,
    context: ContextProvider,
    options: GenerationOptions,
    state: SharedState,
    max_cycles: Option<usize>,
    cycle_delay: Duration,
    cancel: Option<watch::Receiver<bool>>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    activity_logger: Option<ActivityLogger>,
    cycles: usize,
    phases_run: usize,
}

impl Orchestrator {
    /// Create an orchestrator with raw context, default generation options
    /// and no pacing between cycles
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        machine: StateMachine,
        state: SharedState,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            gateway,
            machine,
            context: ContextProvider::raw(),
            options: GenerationOptions::default(),
            state,
            max_cycles: None,
            cycle_delay: Duration::ZERO,
            cancel: None,
            events: None,
            activity_logger: None,
            cycles: 0,
            phases_run: 0,
        }
    }

    /// Build an orchestrator from configuration
    ///
    /// Semantic context needs `vector`; without one the run uses raw context.
    pub fn from_config(
        objective: &str,
        first_task: &str,
        config: &TaskloopConfig,
        gateway: Arc<dyn GenerationGateway>,
        vector: Option<Arc<dyn VectorBackend>>,
    ) -> Result<Self> {
        config.validate()?;
        let machine = StateMachine::for_stop_check(config.run.enable_stop_check)?;

        let context = match (config.run.use_semantic_context, vector) {
            (true, Some(backend)) => ContextProvider::semantic(backend, config.semantic.top_k),
            (true, None) => {
                warn!("Semantic context requested without a vector backend, using raw context");
                ContextProvider::raw()
            }
            (false, _) => ContextProvider::raw(),
        };

        Ok(Self::new(gateway, machine, SharedState::new(objective, first_task))
            .with_context(context)
            .with_options(GenerationOptions::from(&config.generation))
            .with_max_cycles(config.run.max_cycles)
            .with_cycle_delay(Duration::from_millis(config.run.cycle_delay_ms)))
    }

    pub fn with_context(mut self, context: ContextProvider) -> Self {
        self.context = context;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<usize>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    /// Stop between phases once the channel holds `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Forward lifecycle events to a channel
    pub fn with_events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Enable activity logging to `<log_dir>/activity.md`
    pub fn with_activity_logging(mut self, log_dir: PathBuf) -> Self {
        self.activity_logger = Some(ActivityLogger::new(log_dir));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Run on a background task
    pub fn spawn(mut self) -> JoinHandle<Result<RunOutcome>> {
        tokio::spawn(async move { self.run().await })
    }

    /// Run until the terminal state, cancellation or the cycle bound
    ///
    /// Generation failures and `EmptyQueue` end the run with an error.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        self.emit(RunEvent::RunStarted {
            run_id: self.run_id.clone(),
            objective: self.state.objective.clone(),
            initial_queue: self.state.task_queue.snapshot(),
        })
        .await;

        match self.drive().await {
            Ok(stop_reason) => {
                self.emit(RunEvent::RunTerminated {
                    reason: stop_reason,
                    cycles: self.cycles,
                    phases_run: self.phases_run,
                })
                .await;

                Ok(RunOutcome {
                    stop_reason,
                    cycles: self.cycles,
                    phases_run: self.phases_run,
                    final_state: self.state.clone(),
                })
            }
            Err(e) => {
                self.emit(RunEvent::RunFailed {
                    error: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<StopReason> {
        let mut current = self.machine.initial().to_string();

        loop {
            if self.is_cancelled() {
                info!(state = %current, "Cancellation requested, stopping before next phase");
                return Ok(StopReason::Cancelled);
            }
            if !self.state.keep_going {
                return Ok(StopReason::ObjectiveComplete);
            }

            let phase = self.machine.phase_of(&current).ok_or_else(|| {
                TaskloopError::StateMachine(format!("state '{}' is not registered", current))
            })?;
            let event = self.run_phase(&current, phase).await?;

            match self.machine.transition(&current, event) {
                Step::Next(next) => {
                    if next == self.machine.initial() {
                        self.cycles += 1;
                        if self.max_cycles.is_some_and(|max| self.cycles >= max) {
                            info!(cycles = self.cycles, "Cycle limit reached");
                            return Ok(StopReason::MaxCycles);
                        }
                        self.pause_between_cycles().await;
                    }
                    current = next;
                }
                Step::Terminal => return Ok(self.halt_reason()),
                Step::Unhandled => {
                    warn!(state = %current, %event, "No transition registered, halting");
                    return Ok(self.halt_reason());
                }
            }
        }
    }

    async fn run_phase(&mut self, state_name: &str, phase: Phase) -> Result<PhaseEvent> {
        self.emit(RunEvent::PhaseEntered {
            state: state_name.to_string(),
            phase,
        })
        .await;

        let prompt = phase.build_prompt(&mut self.state, &self.context).await?;
        if phase == Phase::Execute {
            if let Some(task) = self.state.current_task.clone() {
                self.emit(RunEvent::TaskPopped { task }).await;
            }
        }

        debug!(
            phase = phase.name(),
            prompt_chars = prompt.len(),
            "Calling generation gateway"
        );
        let response = self.gateway.generate(&prompt, &self.options).await?;
        let outcome = phase.handle_response(&response, &mut self.state);
        self.phases_run += 1;

        match phase {
            Phase::Execute => {
                if let Some(task) = self.state.current_task.clone() {
                    self.context.record_result(&task, &response).await;
                    self.emit(RunEvent::TaskCompleted {
                        task,
                        result: response,
                    })
                    .await;
                }
            }
            Phase::Create | Phase::Prioritize => {
                self.emit(RunEvent::QueueReplaced {
                    phase,
                    tasks: self.state.task_queue.snapshot(),
                    report: outcome.report.unwrap_or_default(),
                })
                .await;
            }
            Phase::StopCheck => {
                self.emit(RunEvent::StopChecked {
                    keep_going: self.state.keep_going,
                })
                .await;
            }
        }

        Ok(outcome.event)
    }

    fn halt_reason(&self) -> StopReason {
        if self.state.keep_going {
            StopReason::Terminal
        } else {
            StopReason::ObjectiveComplete
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn pause_between_cycles(&self) {
        if self.cycle_delay.is_zero() {
            return;
        }
        debug!(
            delay_ms = self.cycle_delay.as_millis() as u64,
            "Pausing between cycles"
        );

        match &self.cancel {
            Some(rx) => {
                let mut rx = rx.clone();
                tokio::select! {
                    _ = tokio::time::sleep(self.cycle_delay) => {}
                    _ = wait_for_cancel(&mut rx) => {}
                }
            }
            None => tokio::time::sleep(self.cycle_delay).await,
        }
    }

    async fn emit(&self, event: RunEvent) {
        event.trace();
        if let Some(logger) = &self.activity_logger {
            logger.record(&event).await;
        }
        if let Some(events) = &self.events {
            // Receiver may be gone; the run does not depend on it
            let _ = events.send(event);
        }
    }
}

/// Resolves once cancellation is requested; never if the sender is dropped
async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Run an objective with settings from `config`
///
/// Returns when the run reaches a terminal state or its cycle bound.
pub async fn start_run(
    objective: &str,
    first_task: &str,
    config: &TaskloopConfig,
    gateway: Arc<dyn GenerationGateway>,
    vector: Option<Arc<dyn VectorBackend>>,
) -> Result<RunOutcome> {
    Orchestrator::from_config(objective, first_task, config, gateway, vector)?
        .run()
        .await
}
