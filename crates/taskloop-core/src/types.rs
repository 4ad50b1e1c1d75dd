//! Core type definitions for the task loop

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::{Result, TaskloopError};

/// Task identifier
///
/// Assignment-only: ids are not guaranteed contiguous or unique once the
/// generation backend has renumbered the queue.
pub type TaskId = u64;

/// A unit of work in the loop
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.id, self.name)
    }
}

/// Ordered queue of pending tasks
///
/// Position is priority. The head executes next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the tail
    pub fn enqueue(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Remove and return the head
    pub fn dequeue(&mut self) -> Result<Task> {
        self.tasks.pop_front().ok_or(TaskloopError::EmptyQueue)
    }

    /// Discard the current contents and install `tasks` in order
    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks.into();
    }

    /// Read-only ordered view
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.iter().cloned().collect()
    }

    /// Names of all queued tasks, in queue order
    pub fn names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name.clone()).collect()
    }

    /// Id of the tail task, if any
    pub fn last_id(&self) -> Option<TaskId> {
        self.tasks.back().map(|t| t.id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

impl FromIterator<Task> for TaskQueue {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// Output of the most recent Execute phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub data: String,
}

impl TaskResult {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

/// Per-run state shared by every phase
///
/// Created once from the caller's objective and first task. Only phase
/// response handlers (and Execute's queue pop) mutate it, one phase at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    pub objective: String,
    pub task_queue: TaskQueue,
    pub current_task: Option<Task>,
    pub last_result: TaskResult,
    pub keep_going: bool,
}

impl SharedState {
    /// Seed a run: the queue holds the first task with id 1
    pub fn new(objective: impl Into<String>, first_task: impl Into<String>) -> Self {
        let mut task_queue = TaskQueue::new();
        task_queue.enqueue(Task::new(1, first_task));
        Self {
            objective: objective.into(),
            task_queue,
            current_task: None,
            last_result: TaskResult::default(),
            keep_going: true,
        }
    }

    /// Pop the head of the queue into `current_task`
    pub fn pop_current(&mut self) -> Result<&Task> {
        let task = self.task_queue.dequeue()?;
        Ok(self.current_task.insert(task))
    }

    /// Swap the whole queue and clear `current_task`
    pub fn replace_queue(&mut self, tasks: Vec<Task>) {
        self.task_queue.replace(tasks);
        self.current_task = None;
    }
}
