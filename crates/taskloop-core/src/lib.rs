//! # taskloop-core
//!
//! Core types for the taskloop task-orchestration loop.
//!
//! A run owns exactly one [`SharedState`]: the objective, the pending
//! [`TaskQueue`], the task currently being executed and the latest result.
//! Phase handlers in `taskloop-orchestrator` are the only code that mutates it.
//!
//! ## Ordering
//!
//! - Queue position IS priority (there is no priority field)
//! - Execution is FIFO: the head of the queue runs next
//! - Re-prioritization swaps the whole queue at once

pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::{GenerationConfig, ModelTier, RunConfig, SemanticConfig, TaskloopConfig};
pub use error::{Result, TaskloopError};
pub use types::*;
