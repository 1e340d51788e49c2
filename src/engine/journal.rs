use crate::engine::error::EngineError;
use crate::engine::model::{ActionRecord, Approval, PlanStep, StepStatus, ToolResult};
use crate::shared::clock::now_secs;
use crate::shared::ids::generate_id;
use serde_json::{Map, Value};

/// Append-only audit trail scoped to one runtime invocation. Records are
/// never reordered or pruned; each one settles into exactly one terminal
/// status, or stays pending forever when approval was withheld.
#[derive(Debug, Default)]
pub struct ActionJournal {
    records: Vec<ActionRecord>,
}

impl ActionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pending record for an execution attempt and returns its id.
    /// Called exactly once per attempt, before the approval gate, so blocked
    /// steps are visible in the trail too.
    pub fn start(&mut self, run_id: &str, step: &PlanStep) -> String {
        let record = ActionRecord::start(run_id, step);
        let record_id = record.id.clone();
        self.records.push(record);
        record_id
    }

    pub fn approve(&mut self, record_id: &str, approval: &Approval) -> Result<(), EngineError> {
        let record = self.record_mut(record_id)?;
        if record.status != StepStatus::Pending {
            return Err(EngineError::InvalidRecordTransition {
                from: record.status.clone(),
                to: StepStatus::Approved,
            });
        }
        record.approvals.push(approval.clone());
        record.status = StepStatus::Approved;
        Ok(())
    }

    pub fn apply(&mut self, record_id: &str, result: &ToolResult) -> Result<(), EngineError> {
        let record = self.record_mut(record_id)?;
        if record.status.is_terminal() {
            return Err(EngineError::InvalidRecordTransition {
                from: record.status.clone(),
                to: StepStatus::Applied,
            });
        }
        record.status = StepStatus::Applied;
        record.finished_at = Some(now_secs());
        record.output = Some(result.output.clone());
        record.artifacts = result.artifacts.clone();
        record.diff = result.diff.clone();
        Ok(())
    }

    pub fn fail(&mut self, record_id: &str, error: impl Into<String>) -> Result<(), EngineError> {
        let record = self.record_mut(record_id)?;
        if record.status.is_terminal() {
            return Err(EngineError::InvalidRecordTransition {
                from: record.status.clone(),
                to: StepStatus::Failed,
            });
        }
        record.status = StepStatus::Failed;
        record.finished_at = Some(now_secs());
        record.error = Some(error.into());
        Ok(())
    }

    /// Appends an already-applied record for out-of-band tool feedback that
    /// did not run through a plan step.
    pub fn record_feedback(
        &mut self,
        run_id: &str,
        step_id: &str,
        tool: &str,
        output: Map<String, Value>,
    ) -> String {
        let now = now_secs();
        let record = ActionRecord {
            id: generate_id("act", now),
            run_id: run_id.to_string(),
            step_id: step_id.to_string(),
            tool: Some(tool.to_string()),
            args: Map::new(),
            status: StepStatus::Applied,
            started_at: now,
            finished_at: Some(now),
            output: Some(output),
            error: None,
            approvals: Vec::new(),
            artifacts: Vec::new(),
            diff: None,
        };
        let record_id = record.id.clone();
        self.records.push(record);
        record_id
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    /// Insertion-ordered snapshot for persistence; pure, no mutation.
    pub fn to_log(&self) -> Vec<ActionRecord> {
        self.records.clone()
    }

    fn record_mut(&mut self, record_id: &str) -> Result<&mut ActionRecord, EngineError> {
        self.records
            .iter_mut()
            .find(|record| record.id == record_id)
            .ok_or_else(|| EngineError::UnknownRecord {
                record_id: record_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::PlanStep;

    fn step() -> PlanStep {
        PlanStep::new("inspect", "look at the workspace")
    }

    #[test]
    fn start_appends_pending_records_in_order() {
        let mut journal = ActionJournal::new();
        let first = journal.start("run-1", &step());
        let second = journal.start("run-1", &step());
        assert_ne!(first, second);
        let log = journal.to_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, first);
        assert_eq!(log[0].status, StepStatus::Pending);
        assert_eq!(log[1].id, second);
    }

    #[test]
    fn approve_twice_is_rejected() {
        let mut journal = ActionJournal::new();
        let record_id = journal.start("run-1", &step());
        let approval = Approval::new("alice");
        journal.approve(&record_id, &approval).expect("approve");
        let err = journal
            .approve(&record_id, &approval)
            .expect_err("second approve");
        assert!(matches!(err, EngineError::InvalidRecordTransition { .. }));
    }

    #[test]
    fn terminal_records_reject_further_transitions() {
        let mut journal = ActionJournal::new();
        let record_id = journal.start("run-1", &step());
        journal.fail(&record_id, "boom").expect("fail");
        let err = journal
            .apply(&record_id, &ToolResult::default())
            .expect_err("apply after fail");
        assert!(matches!(err, EngineError::InvalidRecordTransition { .. }));
        let err = journal.fail(&record_id, "again").expect_err("double fail");
        assert!(matches!(err, EngineError::InvalidRecordTransition { .. }));
    }

    #[test]
    fn unknown_record_id_is_an_error() {
        let mut journal = ActionJournal::new();
        let err = journal.fail("act-missing", "x").expect_err("unknown record");
        assert!(matches!(err, EngineError::UnknownRecord { .. }));
    }

    #[test]
    fn record_feedback_appends_an_applied_record() {
        let mut journal = ActionJournal::new();
        journal.start("run-1", &step());
        let mut output = Map::new();
        output.insert("note".to_string(), Value::String("lint clean".into()));
        let record_id = journal.record_feedback("run-1", "step-9", "run_shell", output);

        let record = journal
            .records()
            .iter()
            .find(|record| record.id == record_id)
            .expect("feedback record");
        assert_eq!(record.status, StepStatus::Applied);
        assert!(record.finished_at.is_some());
        assert_eq!(record.tool.as_deref(), Some("run_shell"));
        assert_eq!(
            record.output.as_ref().and_then(|output| output.get("note")),
            Some(&Value::String("lint clean".into()))
        );
        // appended after the pending record, never reordered
        assert_eq!(journal.records().len(), 2);
        assert_eq!(journal.records()[1].id, record_id);
    }

    #[test]
    fn to_log_is_idempotent() {
        let mut journal = ActionJournal::new();
        journal.start("run-1", &step());
        assert_eq!(journal.to_log(), journal.to_log());
    }
}
