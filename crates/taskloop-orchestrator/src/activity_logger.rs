//! Activity Logger - Human-readable run log in `.taskloop/activity.md`
//!
//! One markdown section per lifecycle event. The file is truncated when a
//! run starts and appended to afterwards. Every write is fail-open.

use chrono::Utc;
use std::path::PathBuf;
use taskloop_core::fail_open::fail_open;
use taskloop_core::TaskloopError;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::events::RunEvent;

/// Maximum characters of a task result shown in the log
const ACTIVITY_LOG_PREVIEW_CHARS: usize = 500;

/// Activity logger for task loop runs
pub struct ActivityLogger {
    output_path: PathBuf,
}

impl ActivityLogger {
    pub fn new(log_dir: PathBuf) -> Self {
        Self {
            output_path: log_dir.join("activity.md"),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.output_path
    }

    /// Record one event
    ///
    /// `RunStarted` starts a fresh file.
    pub async fn record(&self, event: &RunEvent) {
        let content = render(event);
        let content = content.as_str();
        let fresh = matches!(event, RunEvent::RunStarted { .. });

        fail_open("activity_logger::record", || async move {
            if let Some(parent) = self.output_path.parent() {
                fs::create_dir_all(parent).await?;
            }

            let mut options = OpenOptions::new();
            options.create(true);
            if fresh {
                options.write(true).truncate(true);
            } else {
                options.append(true);
            }

            let mut file = options.open(&self.output_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            Ok::<(), TaskloopError>(())
        })
        .await;
    }
}

fn render(event: &RunEvent) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

    match event {
        RunEvent::RunStarted {
            run_id,
            objective,
            initial_queue,
        } => {
            let queue: Vec<String> = initial_queue.iter().map(|t| t.to_string()).collect();
            format!(
                "# Taskloop Activity Log\n\n## Objective: {}\n**Run**: {}\n**Started**: {}\n**Initial Queue**: {}\n\n---\n\n",
                objective.lines().next().unwrap_or(objective),
                run_id,
                timestamp,
                queue.join(", ")
            )
        }
        RunEvent::PhaseEntered { state, phase } => {
            format!("### {} ({})\n**Time**: {}\n\n", state, phase, timestamp)
        }
        RunEvent::TaskPopped { task } => format!("**Task**: {}\n\n", task),
        RunEvent::TaskCompleted { result, .. } => {
            let (shown, truncated) = preview(result);
            let mut content = if truncated {
                String::from("**Result** (truncated):\n> ")
            } else {
                String::from("**Result**:\n> ")
            };
            content.push_str(&shown.replace('\n', "\n> "));
            content.push_str("\n\n---\n\n");
            content
        }
        RunEvent::QueueReplaced { tasks, report, .. } => {
            let mut content = format!(
                "**Queue** ({} accepted, {} discarded):\n",
                report.accepted, report.discarded
            );
            if tasks.is_empty() {
                content.push_str("- (empty)\n");
            }
            for task in tasks {
                content.push_str(&format!("- {}\n", task));
            }
            content.push_str("\n---\n\n");
            content
        }
        RunEvent::StopChecked { keep_going } => format!(
            "**Objective reached**: {}\n\n---\n\n",
            if *keep_going { "no" } else { "yes" }
        ),
        RunEvent::RunTerminated {
            reason,
            cycles,
            phases_run,
        } => format!(
            "## Run Summary\n\n**Completed**: {}\n**Stop Reason**: {}\n**Cycles**: {}\n**Phases Run**: {}\n",
            timestamp, reason, cycles, phases_run
        ),
        RunEvent::RunFailed { error } => format!(
            "## Run Summary\n\n**Failed**: {}\n**Error**: {}\n",
            timestamp, error
        ),
    }
}

/// Text capped at the preview length, and whether it was cut
fn preview(text: &str) -> (String, bool) {
    if text.chars().count() > ACTIVITY_LOG_PREVIEW_CHARS {
        let truncated: String = text.chars().take(ACTIVITY_LOG_PREVIEW_CHARS).collect();
        (format!("{truncated}..."), true)
    } else {
        (text.to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StopReason;
    use crate::phases::{ParseReport, Phase};
    use taskloop_core::Task;
    use tempfile::TempDir;

    fn started() -> RunEvent {
        RunEvent::RunStarted {
            run_id: "run-1".to_string(),
            objective: "Write a poem".to_string(),
            initial_queue: vec![Task::new(1, "Pick a topic")],
        }
    }

    async fn read_log(logger: &ActivityLogger) -> String {
        fs::read_to_string(logger.path()).await.unwrap()
    }

    #[tokio::test]
    async fn test_run_start_creates_directory_and_header() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().join(".taskloop"));

        logger.record(&started()).await;

        let content = read_log(&logger).await;
        assert!(content.contains("# Taskloop Activity Log"));
        assert!(content.contains("Objective: Write a poem"));
        assert!(content.contains("**Initial Queue**: 1: Pick a topic"));
    }

    #[tokio::test]
    async fn test_run_start_truncates_previous_log() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().to_path_buf());

        logger.record(&started()).await;
        logger
            .record(&RunEvent::RunFailed {
                error: "old failure".to_string(),
            })
            .await;
        logger.record(&started()).await;

        assert!(!read_log(&logger).await.contains("old failure"));
    }

    #[tokio::test]
    async fn test_events_append() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().to_path_buf());

        logger.record(&started()).await;
        logger
            .record(&RunEvent::PhaseEntered {
                state: "create".to_string(),
                phase: Phase::Create,
            })
            .await;
        logger
            .record(&RunEvent::QueueReplaced {
                phase: Phase::Create,
                tasks: vec![Task::new(2, "Rhyme"), Task::new(3, "Meter")],
                report: ParseReport {
                    accepted: 2,
                    discarded: 1,
                    blank: 0,
                },
            })
            .await;
        logger
            .record(&RunEvent::RunTerminated {
                reason: StopReason::MaxCycles,
                cycles: 1,
                phases_run: 4,
            })
            .await;

        let content = read_log(&logger).await;
        assert!(content.contains("### create (create)"));
        assert!(content.contains("2 accepted, 1 discarded"));
        assert!(content.contains("- 2: Rhyme\n- 3: Meter"));
        assert!(content.contains("**Stop Reason**: max cycles reached"));
        assert!(content.contains("**Phases Run**: 4"));
    }

    #[tokio::test]
    async fn test_truncate_long_result() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().to_path_buf());

        logger.record(&started()).await;
        logger
            .record(&RunEvent::TaskCompleted {
                task: Task::new(1, "Pick a topic"),
                result: "x".repeat(1000),
            })
            .await;

        let content = read_log(&logger).await;
        assert!(content.contains("**Result** (truncated):"));
        assert!(content.contains("..."));
        assert!(!content.contains(&"x".repeat(600)));
    }

    #[tokio::test]
    async fn test_short_result_not_marked_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().to_path_buf());

        logger.record(&started()).await;
        logger
            .record(&RunEvent::TaskCompleted {
                task: Task::new(1, "Pick a topic"),
                result: "Autumn leaves\nfalling".to_string(),
            })
            .await;

        let content = read_log(&logger).await;
        assert!(content.contains("**Result**:\n> Autumn leaves\n> falling"));
        assert!(!content.contains("(truncated)"));
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let logger = ActivityLogger::new(blocker.join("nested"));
        logger.record(&started()).await;
        assert!(!logger.path().exists());
    }
}
