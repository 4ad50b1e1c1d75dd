//! # taskloop-orchestrator
//!
//! The task loop engine.
//!
//! This crate provides:
//! - Context provider with raw and semantic strategies
//! - Prompt builders and response handlers for each phase
//! - A table-driven state machine over named phase slots
//! - The orchestrator run loop with cancellation and cycle bounds
//! - Lifecycle events and a markdown activity log

mod activity_logger;
mod context;
mod events;
mod orchestrator;
mod phases;
pub mod prompt;
pub mod state_machine;

pub use activity_logger::ActivityLogger;
pub use context::{result_id, ContextProvider, ContextStrategy};
pub use events::{RunEvent, StopReason};
pub use orchestrator::{start_run, Orchestrator, RunOutcome};
pub use phases::{
    next_task_id, objective_reached, parse_created_tasks, parse_prioritized_tasks, ParseReport,
    Phase, PhaseEvent, PhaseOutcome,
};
pub use state_machine::{StateDef, StateMachine, StateMachineBuilder, Step, Target};
