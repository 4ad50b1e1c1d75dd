//! Prompt builders for each phase
//!
//! Every prompt embeds the objective. Response shape instructions are kept
//! close to what the phase handlers parse:
//! - Create: one task per line
//! - Prioritize: `"<id>. <name>"` per line, numbered from 1
//! - Stop check: a bare "yes" or "no"

use taskloop_core::Task;

/// Prompt for carrying out one task
pub fn build_execution_prompt(objective: &str, context: &[String], task: &Task) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are an AI who performs one task based on the following objective: {}\n\n",
        objective
    ));

    prompt.push_str("## PREVIOUSLY COMPLETED TASKS\n\n");
    push_list(&mut prompt, context);

    prompt.push_str("## YOUR TASK\n\n");
    prompt.push_str(&task.name);
    prompt.push_str("\n\n");

    prompt.push_str(
        "Respond with the result of this task only. Do not restate the task \
         and do not plan further work.\n",
    );

    prompt
}

/// Prompt for deriving new tasks from the last result
pub fn build_creation_prompt(
    objective: &str,
    last_result: &str,
    completed_task: &str,
    incomplete_tasks: &[String],
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are a task creation AI that uses the result of an execution agent \
         to create new tasks with the following objective: {}\n\n",
        objective
    ));

    prompt.push_str("## LAST COMPLETED TASK\n\n");
    prompt.push_str(completed_task);
    prompt.push_str("\n\n");

    prompt.push_str("## RESULT\n\n");
    if last_result.trim().is_empty() {
        prompt.push_str("(no result)\n\n");
    } else {
        prompt.push_str(last_result);
        prompt.push_str("\n\n");
    }

    prompt.push_str("## INCOMPLETE TASKS\n\n");
    push_list(&mut prompt, incomplete_tasks);

    prompt.push_str(
        "Based on the result, create new tasks to be completed by the AI system \
         that do not overlap with the incomplete tasks.\n\
         Return the full task list, one task per line, without numbering or bullets.\n",
    );

    prompt
}

/// Prompt for reordering the queue
pub fn build_prioritization_prompt(objective: &str, task_names: &[String]) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are a task prioritization AI tasked with cleaning the formatting of \
         and reprioritizing the following tasks:\n\n",
    );
    push_list(&mut prompt, task_names);

    prompt.push_str(&format!(
        "Consider the ultimate objective of your team: {}\n\n",
        objective
    ));

    prompt.push_str(
        "Do not remove any tasks. Return the result as a numbered list, one task \
         per line, starting with 1, like:\n\
         1. First task\n\
         2. Second task\n",
    );

    prompt
}

/// Prompt asking whether the objective has been reached
pub fn build_stop_check_prompt(objective: &str, context: &[String]) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are an AI that judges whether an objective has been fully achieved.\n\n\
         ## OBJECTIVE\n\n{}\n\n",
        objective
    ));

    prompt.push_str("## RELEVANT COMPLETED WORK\n\n");
    push_list(&mut prompt, context);

    prompt.push_str("Has the objective been achieved? Answer with exactly \"yes\" or \"no\".\n");

    prompt
}

fn push_list(prompt: &mut String, items: &[String]) {
    if items.is_empty() {
        prompt.push_str("(none)\n\n");
        return;
    }
    for item in items {
        prompt.push_str(&format!("- {}\n", item));
    }
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_execution_prompt() {
        let task = Task::new(3, "Draft outline");
        let prompt = build_execution_prompt("Write a book", &names(&["Research"]), &task);

        assert!(prompt.contains("Write a book"));
        assert!(prompt.contains("- Research"));
        assert!(prompt.contains("Draft outline"));
    }

    #[test]
    fn test_execution_prompt_without_context() {
        let prompt = build_execution_prompt("obj", &[], &Task::new(1, "t"));
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn test_creation_prompt() {
        let prompt = build_creation_prompt(
            "Write a book",
            "Found three sources",
            "Research",
            &names(&["Outline", "Draft"]),
        );

        assert!(prompt.contains("Write a book"));
        assert!(prompt.contains("Found three sources"));
        assert!(prompt.contains("Research"));
        assert!(prompt.contains("- Outline"));
        assert!(prompt.contains("- Draft"));
        assert!(prompt.contains("one task per line"));
    }

    #[test]
    fn test_creation_prompt_empty_result() {
        let prompt = build_creation_prompt("obj", "  ", "none", &[]);
        assert!(prompt.contains("(no result)"));
    }

    #[test]
    fn test_prioritization_prompt() {
        let prompt = build_prioritization_prompt("Ship it", &names(&["B", "C"]));
        assert!(prompt.contains("Ship it"));
        assert!(prompt.contains("- B\n- C"));
        assert!(prompt.contains("1. First task"));
    }

    #[test]
    fn test_stop_check_prompt() {
        let prompt = build_stop_check_prompt("Ship it", &names(&["Tested"]));
        assert!(prompt.contains("Ship it"));
        assert!(prompt.contains("- Tested"));
        assert!(prompt.contains("\"yes\" or \"no\""));
    }
}
