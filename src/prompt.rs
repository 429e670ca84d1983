//! Per-phase prompt rendering.
//!
//! Prompts are simple templates with a `{plan_file}` placeholder; the
//! orchestrator consumes the rendered string and never re-substitutes.
//! Each template instructs the agent to end its run with one of the
//! whole-line markers the signal scanner recognizes.

use std::path::Path;

use crate::phase::Phase;

const TASK_TEMPLATE: &str = "\
Read the plan at {plan_file} and implement the next incomplete task.
Commit your work as you go.
When every task in the plan is implemented, print COMPLETED alone on the final line.
If you hit an unrecoverable problem, print FAILED alone on the final line.
";

const FIRST_REVIEW_TEMPLATE: &str = "\
Review the uncommitted and recently committed changes on this branch
against the plan at {plan_file}. Fix the problems you find.
When the review pass is finished, print REVIEW_DONE alone on the final line.
If you hit an unrecoverable problem, print FAILED alone on the final line.
";

const CODEX_TEMPLATE: &str = "\
Review the changes on this branch for correctness and regressions.
Apply fixes for any issue you find.
When no issues remain, print COMPLETED alone on the final line.
If you hit an unrecoverable problem, print FAILED alone on the final line.
";

const SECOND_REVIEW_TEMPLATE: &str = "\
Do a final review pass over the changes on this branch.
When the review pass is finished, print REVIEW_DONE alone on the final line.
If you hit an unrecoverable problem, print FAILED alone on the final line.
";

/// Placeholder text used when a plan-less mode renders a template that
/// mentions the plan.
const NO_PLAN: &str = "(no plan - review existing changes)";

/// Substitute the `{plan_file}` placeholder in a template.
#[must_use]
pub fn substitute(template: &str, plan_file: &str) -> String {
    template.replace("{plan_file}", plan_file)
}

/// Rendered prompt strings, one per phase.
#[derive(Debug, Clone)]
pub struct PhasePrompts {
    task: String,
    first_review: String,
    codex: String,
    second_review: String,
}

impl PhasePrompts {
    /// Render all built-in templates against the selected plan file.
    #[must_use]
    pub fn render(plan_file: Option<&Path>) -> Self {
        let plan = plan_file
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| NO_PLAN.to_string());

        Self {
            task: substitute(TASK_TEMPLATE, &plan),
            first_review: substitute(FIRST_REVIEW_TEMPLATE, &plan),
            codex: substitute(CODEX_TEMPLATE, &plan),
            second_review: substitute(SECOND_REVIEW_TEMPLATE, &plan),
        }
    }

    /// The rendered prompt for one phase.
    #[must_use]
    pub fn for_phase(&self, phase: Phase) -> &str {
        match phase {
            Phase::TaskLoop => &self.task,
            Phase::FirstReview => &self.first_review,
            Phase::CodexLoop => &self.codex,
            Phase::SecondReview => &self.second_review,
        }
    }
}
