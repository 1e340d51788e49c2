use crate::engine::journal::ActionJournal;
use crate::engine::model::{ActionRecord, Approval, Plan, PlanStep, StepStatus, ToolResult};
use crate::engine::router::ToolRouter;
use crate::engine::snapshot::SnapshotStore;
use crate::shared::clock::now_secs;
use crate::shared::logging::append_engine_log_line;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const DEFAULT_STEP_BUDGET: usize = 50;

/// Walks a plan's steps in order, journaling every attempt. The runtime is
/// the only writer of `step.status` while one of its calls is in flight; a
/// caller wanting to retry a failed step builds a fresh runtime and journal.
pub struct PlanRuntime {
    router: ToolRouter,
    journal: ActionJournal,
    snapshots: Arc<Mutex<SnapshotStore>>,
    step_budget: usize,
    log_root: Option<PathBuf>,
}

impl PlanRuntime {
    /// The snapshot store is shared: the same handle is given to the
    /// `create_snapshot` tool at registration time, so references created by
    /// plan steps stay visible to the caller for rollback.
    pub fn new(
        router: ToolRouter,
        journal: ActionJournal,
        snapshots: Arc<Mutex<SnapshotStore>>,
    ) -> Self {
        Self {
            router,
            journal,
            snapshots,
            step_budget: DEFAULT_STEP_BUDGET,
            log_root: None,
        }
    }

    pub fn with_step_budget(mut self, step_budget: usize) -> Self {
        self.step_budget = step_budget;
        self
    }

    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = Some(log_root.into());
        self
    }

    pub fn router(&self) -> &ToolRouter {
        &self.router
    }

    pub fn journal(&self) -> &ActionJournal {
        &self.journal
    }

    pub fn snapshots(&self) -> &Arc<Mutex<SnapshotStore>> {
        &self.snapshots
    }

    /// Attempts up to `step_budget` steps in plan order. A failed step does
    /// not halt the loop; partial progress stays visible in the journal.
    /// Steps beyond the budget are left completely untouched.
    pub fn run_plan(
        &mut self,
        plan: &mut Plan,
        approvals: &BTreeMap<String, Approval>,
    ) -> Vec<ActionRecord> {
        let plan_id = plan.id.clone();
        let mut attempted = 0;
        for step in plan.steps.iter_mut() {
            if attempted >= self.step_budget {
                break;
            }
            let approval = approvals.get(&step.id);
            self.run_step_inner(&plan_id, step, approval);
            attempted += 1;
        }
        plan.updated_at = now_secs();
        self.journal.to_log()
    }

    /// Executes a single step. Every error on the tool-call path is converted
    /// into a `Failed` status plus a journal entry; this method never
    /// propagates an error to the caller.
    pub fn run_step(
        &mut self,
        plan_id: &str,
        step: &mut PlanStep,
        approval: Option<&Approval>,
    ) -> Option<ToolResult> {
        self.run_step_inner(plan_id, step, approval)
    }

    fn run_step_inner(
        &mut self,
        plan_id: &str,
        step: &mut PlanStep,
        approval: Option<&Approval>,
    ) -> Option<ToolResult> {
        let record_id = self.journal.start(plan_id, step);
        // the approval gate comes before any tool dispatch or side effect
        if step.requires_approval && approval.is_none() {
            step.status = StepStatus::Pending;
            self.log_step(plan_id, step, "blocked awaiting approval");
            return None;
        }
        if let Some(approval) = approval {
            // the record was created pending just above, so this cannot fail
            let _ = self.journal.approve(&record_id, approval);
        }
        let Some(tool) = step.tool.clone() else {
            step.status = StepStatus::Skipped;
            self.log_step(plan_id, step, "no tool attached");
            return None;
        };
        let approved = approval.is_some() || !step.requires_approval;
        match self.router.call(&tool, &step.args, approved) {
            Ok(result) => {
                let _ = self.journal.apply(&record_id, &result);
                step.status = StepStatus::Applied;
                self.log_step(plan_id, step, "applied");
                Some(result)
            }
            Err(err) => {
                let _ = self.journal.fail(&record_id, err.to_string());
                step.status = StepStatus::Failed;
                self.log_step(plan_id, step, "failed");
                None
            }
        }
    }

    fn log_step(&self, plan_id: &str, step: &PlanStep, outcome: &str) {
        let Some(root) = &self.log_root else { return };
        let line = format!(
            "ts={} run_id={plan_id} step_id={} tool={} status={} {outcome}",
            now_secs(),
            step.id,
            step.tool.as_deref().unwrap_or("-"),
            step.status,
        );
        let _ = append_engine_log_line(root, &line);
    }
}
