// ghost-tribunal: Per-task prompt templates

use crate::session::Task;

/// Render the judge prompt for a task. One template per known task type,
/// generic fallback otherwise.
pub fn render_prompt(task: &Task) -> String {
    match task.task_type.as_str() {
        "code-review" => format!(
            "Review the following change. Reply with a verdict \
             (approve/reject/revise), a confidence in [0,1], and your \
             reasoning.\n\n{}",
            task.content
        ),
        "bug-analysis" => format!(
            "Analyse the following defect report. Identify the most likely \
             root cause. Reply with a verdict (confirmed/not-a-bug/needs-info), \
             a confidence in [0,1], and your reasoning.\n\n{}",
            task.content
        ),
        "optimisation" => format!(
            "Evaluate the following optimisation proposal. Reply with a \
             verdict (worthwhile/marginal/harmful), a confidence in [0,1], \
             and your reasoning.\n\n{}",
            task.content
        ),
        "security-audit" => format!(
            "Audit the following for security weaknesses. Reply with a \
             verdict (safe/vulnerable/needs-review), a confidence in [0,1], \
             and your reasoning.\n\n{}",
            task.content
        ),
        other => format!(
            "Evaluate the following {} task. Reply with a verdict, a \
             confidence in [0,1], and your reasoning.\n\n{}",
            other, task.content
        ),
    }
}
