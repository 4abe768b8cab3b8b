//! Approval-gated execution of resolution plans.
//!
//! Every group walks three stages: pre-merge validation, merge operations,
//! post-merge validation. A failure or rejection ends the group at a status
//! describing exactly where it stopped, and execution moves on to the next
//! group. Nothing mutates the graph without passing the gates first.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::dedup::plan::{GroupPlan, ResolutionPlan, ValidationStep};
use crate::dedup::report::{
    ExecutionReport, GroupResult, GroupStatus, OperationRecord, StepRecord,
};
use crate::error::{QuarryError, QuarryResult};
use crate::traits::GraphStore;

/// A question put to the operator before execution continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalRequest<'a> {
    /// Shown after a validation query ran: do its results look right?
    ValidationPasses { description: &'a str },
    /// Asked before a merge operation marked `requires_confirmation`.
    RunOperation { description: &'a str },
    /// Asked once, before the first group of a live run.
    CreateBackup,
    /// Backup unavailable or failed; continue on the live graph anyway?
    ProceedWithoutBackup,
}

/// Answers approval requests. Implementations decide interactively (a CLI
/// prompt) or mechanically (always yes).
pub trait ApprovalPolicy: Send + Sync {
    fn approve(&self, request: &ApprovalRequest<'_>) -> bool;
}

/// Approves everything. Headless runs.
pub struct AutoApprove;

impl ApprovalPolicy for AutoApprove {
    fn approve(&self, _request: &ApprovalRequest<'_>) -> bool {
        true
    }
}

/// External backup mechanism invoked before the first mutation.
#[async_trait]
pub trait BackupHook: Send + Sync {
    async fn backup(&self) -> QuarryResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionOptions {
    /// Record what would run without issuing any query.
    pub dry_run: bool,
    /// Skip the backup gate entirely.
    pub skip_backup: bool,
}

/// Drives a [`ResolutionPlan`] against the graph under an approval policy.
pub struct PlanExecutor {
    store: Arc<dyn GraphStore>,
    policy: Arc<dyn ApprovalPolicy>,
    backup: Option<Arc<dyn BackupHook>>,
}

impl PlanExecutor {
    pub fn new(store: Arc<dyn GraphStore>, policy: Arc<dyn ApprovalPolicy>) -> Self {
        Self {
            store,
            policy,
            backup: None,
        }
    }

    pub fn with_backup(mut self, hook: Arc<dyn BackupHook>) -> Self {
        self.backup = Some(hook);
        self
    }

    /// Execute the plan group by group. The plan is re-validated first so a
    /// hand-edited file with dangling references is rejected before anything
    /// touches the graph. An operator abort is an outcome, not an error: the
    /// report comes back with `aborted` set.
    pub async fn execute(
        &self,
        plan: &ResolutionPlan,
        options: &ExecutionOptions,
    ) -> QuarryResult<ExecutionReport> {
        plan.validate()?;
        let mut report = ExecutionReport::new(options.dry_run);

        if options.dry_run {
            info!(groups = plan.resolution_plan.len(), "dry run, no queries will be issued");
            for entry in &plan.resolution_plan {
                report.record(dry_run_group(plan, entry));
            }
            report.finish();
            return Ok(report);
        }

        if !options.skip_backup && !self.backup_gate().await {
            warn!("execution aborted before any operation ran");
            report.aborted = true;
            report.finish();
            return Ok(report);
        }

        for entry in &plan.resolution_plan {
            let result = self.execute_group(plan, entry).await;
            info!(
                group = %result.group_id,
                status = result.status.as_str(),
                "group finished"
            );
            report.record(result);
        }
        report.finish();
        Ok(report)
    }

    /// Returns false when execution must stop: the operator wanted a backup,
    /// none could be made, and they declined to continue without one.
    async fn backup_gate(&self) -> bool {
        if !self.policy.approve(&ApprovalRequest::CreateBackup) {
            info!("operator declined backup, continuing without one");
            return true;
        }
        match &self.backup {
            Some(hook) => match hook.backup().await {
                Ok(()) => {
                    info!("backup completed");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "backup failed");
                    self.policy.approve(&ApprovalRequest::ProceedWithoutBackup)
                }
            },
            None => {
                warn!("no backup mechanism configured");
                self.policy.approve(&ApprovalRequest::ProceedWithoutBackup)
            }
        }
    }

    async fn execute_group(&self, plan: &ResolutionPlan, entry: &GroupPlan) -> GroupResult {
        let mut result = empty_result(plan, entry);

        for (i, step) in entry.pre_merge_validation.iter().enumerate() {
            let number = i + 1;
            match self.run_validation(number, step).await {
                Ok(mut record) => {
                    let approved = self.policy.approve(&ApprovalRequest::ValidationPasses {
                        description: &step.description,
                    });
                    record.user_approved = Some(approved);
                    result.pre_validation_results.push(record);
                    if !approved {
                        result
                            .details
                            .push(format!("pre-merge validation {number} rejected by operator"));
                        result.status = GroupStatus::PreValidationRejected;
                        return result;
                    }
                }
                Err((record, e)) => {
                    result.pre_validation_results.push(record);
                    result
                        .details
                        .push(format!("pre-merge validation {number} failed: {e}"));
                    result.status = GroupStatus::PreValidationFailed;
                    return result;
                }
            }
        }

        // Merge stage. `applied` decides whether a halt leaves the group
        // untouched or half-merged.
        let mut applied = 0usize;
        for (i, op) in entry.merge_operations.iter().enumerate() {
            let number = i + 1;
            if op.requires_confirmation
                && !self.policy.approve(&ApprovalRequest::RunOperation {
                    description: &op.description,
                })
            {
                result.operation_results.push(OperationRecord {
                    step: number,
                    description: op.description.clone(),
                    query: op.query.clone(),
                    requires_confirmation: true,
                    executed: false,
                    success: false,
                    records_affected: 0,
                    user_skipped: true,
                });
                if applied > 0 {
                    result.details.push(format!(
                        "operation {number} rejected after {applied} applied operations"
                    ));
                    result.status = GroupStatus::PartialSuccess;
                } else {
                    result
                        .details
                        .push(format!("operation {number} rejected by operator"));
                    result.status = GroupStatus::OperationRejected;
                }
                return result;
            }

            match self.store.run(&op.query).await {
                Ok(rows) => {
                    applied += 1;
                    result.operation_results.push(OperationRecord {
                        step: number,
                        description: op.description.clone(),
                        query: op.query.clone(),
                        requires_confirmation: op.requires_confirmation,
                        executed: true,
                        success: true,
                        records_affected: rows.len(),
                        user_skipped: false,
                    });
                }
                Err(e) => {
                    result.operation_results.push(OperationRecord {
                        step: number,
                        description: op.description.clone(),
                        query: op.query.clone(),
                        requires_confirmation: op.requires_confirmation,
                        executed: true,
                        success: false,
                        records_affected: 0,
                        user_skipped: false,
                    });
                    if applied > 0 {
                        result.details.push(format!(
                            "operation {number} failed after {applied} applied operations: {e}"
                        ));
                        result.status = GroupStatus::PartialSuccess;
                    } else {
                        result
                            .details
                            .push(format!("operation {number} failed: {e}"));
                        result.status = GroupStatus::OperationFailed;
                    }
                    return result;
                }
            }
        }

        for (i, step) in entry.post_merge_validation.iter().enumerate() {
            let number = i + 1;
            match self.run_validation(number, step).await {
                Ok(mut record) => {
                    let approved = self.policy.approve(&ApprovalRequest::ValidationPasses {
                        description: &step.description,
                    });
                    record.user_approved = Some(approved);
                    result.post_validation_results.push(record);
                    if !approved {
                        result
                            .details
                            .push(format!("post-merge validation {number} rejected by operator"));
                        result.status = GroupStatus::PostValidationRejected;
                        return result;
                    }
                }
                Err((record, e)) => {
                    result.post_validation_results.push(record);
                    result
                        .details
                        .push(format!("post-merge validation {number} failed: {e}"));
                    result.status = GroupStatus::PostValidationFailed;
                    return result;
                }
            }
        }

        result.status = GroupStatus::Success;
        result
    }

    /// Run one read-only validation query. On failure the record is returned
    /// alongside the error so the report still shows the step.
    async fn run_validation(
        &self,
        number: usize,
        step: &ValidationStep,
    ) -> Result<StepRecord, (StepRecord, QuarryError)> {
        match self.store.run(&step.query).await {
            Ok(rows) => Ok(StepRecord {
                step: number,
                description: step.description.clone(),
                query: step.query.clone(),
                success: true,
                result_count: rows.len(),
                sample_results: rows.into_iter().take(5).collect(),
                user_approved: None,
            }),
            Err(e) => Err((
                StepRecord {
                    step: number,
                    description: step.description.clone(),
                    query: step.query.clone(),
                    success: false,
                    result_count: 0,
                    sample_results: Vec::new(),
                    user_approved: None,
                },
                e,
            )),
        }
    }
}

fn empty_result(plan: &ResolutionPlan, entry: &GroupPlan) -> GroupResult {
    let summary = plan
        .group(&entry.group_id)
        .map(|g| g.summary.clone())
        .unwrap_or_default();
    GroupResult {
        group_id: entry.group_id.clone(),
        summary,
        status: GroupStatus::Success,
        details: Vec::new(),
        pre_validation_results: Vec::new(),
        operation_results: Vec::new(),
        post_validation_results: Vec::new(),
    }
}

/// A dry-run group lists every step untouched: nothing executed, nobody asked.
fn dry_run_group(plan: &ResolutionPlan, entry: &GroupPlan) -> GroupResult {
    let mut result = empty_result(plan, entry);
    result
        .details
        .push("dry run: no queries executed".to_string());
    result.pre_validation_results = dry_run_steps(&entry.pre_merge_validation);
    result.post_validation_results = dry_run_steps(&entry.post_merge_validation);
    result.operation_results = entry
        .merge_operations
        .iter()
        .enumerate()
        .map(|(i, op)| OperationRecord {
            step: i + 1,
            description: op.description.clone(),
            query: op.query.clone(),
            requires_confirmation: op.requires_confirmation,
            executed: false,
            success: false,
            records_affected: 0,
            user_skipped: false,
        })
        .collect();
    result
}

fn dry_run_steps(steps: &[ValidationStep]) -> Vec<StepRecord> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| StepRecord {
            step: i + 1,
            description: step.description.clone(),
            query: step.query.clone(),
            success: false,
            result_count: 0,
            sample_results: Vec::new(),
            user_approved: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::plan::{MergeOperation, PlanGroup};
    use crate::error::ErrorCode;
    use crate::traits::{
        GraphRow, LabelCount, PropertySummary, RelTypeCount, RelationshipPattern,
    };
    use crate::types::{Entity, Relationship};
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    struct ScriptedStore {
        statements: Mutex<Vec<String>>,
        fail_containing: Option<&'static str>,
        rows_per_query: usize,
    }

    impl ScriptedStore {
        fn new() -> Self {
            Self {
                statements: Mutex::new(Vec::new()),
                fail_containing: None,
                rows_per_query: 1,
            }
        }

        fn failing_on(marker: &'static str) -> Self {
            Self {
                fail_containing: Some(marker),
                ..Self::new()
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphStore for ScriptedStore {
        async fn ping(&self) -> QuarryResult<()> {
            Ok(())
        }

        async fn clear(&self) -> QuarryResult<()> {
            Ok(())
        }

        async fn upsert_entity(&self, _entity: &Entity) -> QuarryResult<()> {
            Ok(())
        }

        async fn upsert_relationship(&self, _relationship: &Relationship) -> QuarryResult<()> {
            Ok(())
        }

        async fn run(&self, query: &str) -> QuarryResult<Vec<GraphRow>> {
            self.statements.lock().unwrap().push(query.to_string());
            if let Some(marker) = self.fail_containing {
                if query.contains(marker) {
                    return Err(QuarryError::graph_store("scripted failure"));
                }
            }
            let mut row = GraphRow::new();
            row.insert("n".to_string(), serde_json::json!(1));
            Ok(vec![row; self.rows_per_query])
        }

        async fn node_labels(&self) -> QuarryResult<Vec<LabelCount>> {
            Ok(vec![])
        }

        async fn relationship_types(&self) -> QuarryResult<Vec<RelTypeCount>> {
            Ok(vec![])
        }

        async fn entities_with_label(&self, _label: &str, _limit: usize) -> QuarryResult<Vec<Entity>> {
            Ok(vec![])
        }

        async fn property_summary(
            &self,
            _label: &str,
        ) -> QuarryResult<BTreeMap<String, PropertySummary>> {
            Ok(BTreeMap::new())
        }

        async fn relationship_patterns(
            &self,
            _limit: usize,
        ) -> QuarryResult<Vec<RelationshipPattern>> {
            Ok(vec![])
        }

        async fn count_nodes(&self) -> QuarryResult<u64> {
            Ok(0)
        }

        async fn count_relationships(&self) -> QuarryResult<u64> {
            Ok(0)
        }
    }

    /// Pops one scripted answer per question; defaults to yes when exhausted.
    struct ScriptedPolicy {
        answers: Mutex<VecDeque<bool>>,
        asked: Mutex<Vec<&'static str>>,
    }

    impl ScriptedPolicy {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                asked: Mutex::new(Vec::new()),
            }
        }

        fn asked(&self) -> Vec<&'static str> {
            self.asked.lock().unwrap().clone()
        }
    }

    impl ApprovalPolicy for ScriptedPolicy {
        fn approve(&self, request: &ApprovalRequest<'_>) -> bool {
            let kind = match request {
                ApprovalRequest::ValidationPasses { .. } => "validation",
                ApprovalRequest::RunOperation { .. } => "operation",
                ApprovalRequest::CreateBackup => "create_backup",
                ApprovalRequest::ProceedWithoutBackup => "proceed_without_backup",
            };
            self.asked.lock().unwrap().push(kind);
            self.answers.lock().unwrap().pop_front().unwrap_or(true)
        }
    }

    struct FailingBackup;

    #[async_trait]
    impl BackupHook for FailingBackup {
        async fn backup(&self) -> QuarryResult<()> {
            Err(QuarryError::graph_store("no disk space"))
        }
    }

    fn sample_plan(pre: usize, ops: usize, post: usize) -> ResolutionPlan {
        let group_id = "11111111-1111-1111-1111-111111111111".to_string();
        ResolutionPlan {
            groups: vec![PlanGroup {
                group_id: group_id.clone(),
                summary: "Merge Person and person".to_string(),
                items: vec!["Person".to_string(), "person".to_string()],
                merge_target: Some("Person".to_string()),
                impact: Some("2 labels affected".to_string()),
            }],
            resolution_plan: vec![GroupPlan {
                group_id,
                pre_merge_validation: (1..=pre)
                    .map(|i| ValidationStep {
                        query: format!("MATCH (n) RETURN count(n) // PRE {i}"),
                        description: format!("pre check {i}"),
                        success_criteria: None,
                    })
                    .collect(),
                merge_operations: (1..=ops)
                    .map(|i| MergeOperation {
                        query: format!("MATCH (n:person) SET n:Person // OP {i}"),
                        description: format!("merge step {i}"),
                        requires_confirmation: true,
                    })
                    .collect(),
                post_merge_validation: (1..=post)
                    .map(|i| ValidationStep {
                        query: format!("MATCH (n:person) RETURN n // POST {i}"),
                        description: format!("post check {i}"),
                        success_criteria: None,
                    })
                    .collect(),
            }],
        }
    }

    fn options() -> ExecutionOptions {
        ExecutionOptions {
            dry_run: false,
            skip_backup: true,
        }
    }

    #[tokio::test]
    async fn test_all_stages_pass() {
        let store = Arc::new(ScriptedStore::new());
        let executor = PlanExecutor::new(store.clone(), Arc::new(AutoApprove));
        let plan = sample_plan(1, 2, 1);

        let report = executor.execute(&plan, &options()).await.unwrap();
        assert_eq!(report.successful_groups, 1);
        assert_eq!(report.failed_groups, 0);
        assert!(!report.aborted);
        assert!(report.finished_at.is_some());

        let result = &report.group_results[0];
        assert_eq!(result.status, GroupStatus::Success);
        assert_eq!(result.pre_validation_results[0].user_approved, Some(true));
        assert!(result.operation_results.iter().all(|op| op.executed && op.success));
        assert_eq!(result.operation_results[0].records_affected, 1);
        // pre + two ops + post, in order
        assert_eq!(store.statements().len(), 4);
        assert!(store.statements()[0].contains("PRE 1"));
        assert!(store.statements()[3].contains("POST 1"));
    }

    #[tokio::test]
    async fn test_pre_validation_rejection_runs_no_operations() {
        let store = Arc::new(ScriptedStore::new());
        // First question is the pre-validation pass check.
        let policy = Arc::new(ScriptedPolicy::new(&[false]));
        let executor = PlanExecutor::new(store.clone(), policy);
        let plan = sample_plan(1, 2, 1);

        let report = executor.execute(&plan, &options()).await.unwrap();
        assert_eq!(report.skipped_groups, 1);
        let result = &report.group_results[0];
        assert_eq!(result.status, GroupStatus::PreValidationRejected);
        assert_eq!(result.pre_validation_results[0].user_approved, Some(false));
        assert!(result.operation_results.is_empty());
        // Only the validation query reached the store.
        assert_eq!(store.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_pre_validation_query_failure_skips_approval() {
        let store = Arc::new(ScriptedStore::failing_on("PRE 1"));
        let policy = Arc::new(ScriptedPolicy::new(&[]));
        let executor = PlanExecutor::new(store.clone(), policy.clone());
        let plan = sample_plan(1, 1, 0);

        let report = executor.execute(&plan, &options()).await.unwrap();
        let result = &report.group_results[0];
        assert_eq!(result.status, GroupStatus::PreValidationFailed);
        assert!(!result.pre_validation_results[0].success);
        assert_eq!(result.pre_validation_results[0].user_approved, None);
        assert!(policy.asked().is_empty());
        assert_eq!(report.skipped_groups, 1);
    }

    #[tokio::test]
    async fn test_operation_rejection_before_any_mutation() {
        let store = Arc::new(ScriptedStore::new());
        // Validation passes, first operation declined.
        let policy = Arc::new(ScriptedPolicy::new(&[true, false]));
        let executor = PlanExecutor::new(store.clone(), policy);
        let plan = sample_plan(1, 2, 1);

        let report = executor.execute(&plan, &options()).await.unwrap();
        let result = &report.group_results[0];
        assert_eq!(result.status, GroupStatus::OperationRejected);
        assert_eq!(result.operation_results.len(), 1);
        assert!(result.operation_results[0].user_skipped);
        assert!(!result.operation_results[0].executed);
        // Pre-validation only; no op or post query ran.
        assert_eq!(store.statements().len(), 1);
        assert_eq!(report.skipped_groups, 1);
    }

    #[tokio::test]
    async fn test_halt_after_mutation_is_partial_success() {
        let store = Arc::new(ScriptedStore::failing_on("OP 2"));
        let executor = PlanExecutor::new(store.clone(), Arc::new(AutoApprove));
        let plan = sample_plan(0, 3, 1);

        let report = executor.execute(&plan, &options()).await.unwrap();
        let result = &report.group_results[0];
        assert_eq!(result.status, GroupStatus::PartialSuccess);
        assert_eq!(result.operation_results.len(), 2);
        assert!(result.operation_results[0].success);
        assert!(!result.operation_results[1].success);
        assert!(result.details[0].contains("after 1 applied operations"));
        // Third op and post-validation never ran.
        assert_eq!(store.statements().len(), 2);
        assert_eq!(report.failed_groups, 1);
    }

    #[tokio::test]
    async fn test_first_operation_failure_leaves_graph_untouched() {
        let store = Arc::new(ScriptedStore::failing_on("OP 1"));
        let executor = PlanExecutor::new(store.clone(), Arc::new(AutoApprove));
        let plan = sample_plan(0, 2, 0);

        let report = executor.execute(&plan, &options()).await.unwrap();
        let result = &report.group_results[0];
        assert_eq!(result.status, GroupStatus::OperationFailed);
        assert_eq!(report.failed_groups, 1);
    }

    #[tokio::test]
    async fn test_post_validation_rejection() {
        let store = Arc::new(ScriptedStore::new());
        // Op confirmation yes, post-validation rejected.
        let policy = Arc::new(ScriptedPolicy::new(&[true, false]));
        let executor = PlanExecutor::new(store.clone(), policy);
        let plan = sample_plan(0, 1, 1);

        let report = executor.execute(&plan, &options()).await.unwrap();
        let result = &report.group_results[0];
        assert_eq!(result.status, GroupStatus::PostValidationRejected);
        assert_eq!(result.post_validation_results[0].user_approved, Some(false));
        // The merge already ran; the rejection is an audit outcome.
        assert!(result.operation_results[0].success);
        assert_eq!(report.skipped_groups, 1);
    }

    #[tokio::test]
    async fn test_failed_group_does_not_stop_later_groups() {
        let store = Arc::new(ScriptedStore::failing_on("OP 1"));
        let executor = PlanExecutor::new(store.clone(), Arc::new(AutoApprove));
        let mut plan = sample_plan(0, 1, 0);

        // Second group whose operation avoids the failure marker.
        let second_id = "22222222-2222-2222-2222-222222222222".to_string();
        plan.groups.push(PlanGroup {
            group_id: second_id.clone(),
            summary: "Merge Vehicle and Vehicles".to_string(),
            items: vec!["Vehicle".to_string(), "Vehicles".to_string()],
            merge_target: Some("Vehicle".to_string()),
            impact: None,
        });
        plan.resolution_plan.push(GroupPlan {
            group_id: second_id,
            pre_merge_validation: vec![],
            merge_operations: vec![MergeOperation {
                query: "MATCH (n:Vehicles) SET n:Vehicle // SECOND".to_string(),
                description: "relabel".to_string(),
                requires_confirmation: false,
            }],
            post_merge_validation: vec![],
        });

        let report = executor.execute(&plan, &options()).await.unwrap();
        assert_eq!(report.failed_groups, 1);
        assert_eq!(report.successful_groups, 1);
        assert_eq!(report.group_results[1].status, GroupStatus::Success);
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_queries() {
        let store = Arc::new(ScriptedStore::new());
        let policy = Arc::new(ScriptedPolicy::new(&[]));
        let executor = PlanExecutor::new(store.clone(), policy.clone());
        let plan = sample_plan(1, 2, 1);

        let report = executor
            .execute(
                &plan,
                &ExecutionOptions {
                    dry_run: true,
                    skip_backup: false,
                },
            )
            .await
            .unwrap();

        assert!(report.dry_run);
        assert!(store.statements().is_empty());
        assert!(policy.asked().is_empty());
        assert_eq!(report.successful_groups, 0);
        assert_eq!(report.failed_groups, 0);

        let result = &report.group_results[0];
        assert_eq!(result.pre_validation_results.len(), 1);
        assert_eq!(result.operation_results.len(), 2);
        assert!(result.operation_results.iter().all(|op| !op.executed));
    }

    #[tokio::test]
    async fn test_dangling_plan_rejected_before_any_query() {
        let store = Arc::new(ScriptedStore::new());
        let executor = PlanExecutor::new(store.clone(), Arc::new(AutoApprove));
        let mut plan = sample_plan(1, 1, 0);
        plan.resolution_plan[0].group_id = "99999999-9999-9999-9999-999999999999".to_string();

        let err = executor.execute(&plan, &options()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PlanDanglingGroup);
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_backup_decline_then_refuse_aborts() {
        let store = Arc::new(ScriptedStore::new());
        // Wants a backup, backup fails, refuses to continue.
        let policy = Arc::new(ScriptedPolicy::new(&[true, false]));
        let executor = PlanExecutor::new(store.clone(), policy.clone())
            .with_backup(Arc::new(FailingBackup));
        let plan = sample_plan(0, 1, 0);

        let report = executor
            .execute(
                &plan,
                &ExecutionOptions {
                    dry_run: false,
                    skip_backup: false,
                },
            )
            .await
            .unwrap();

        assert!(report.aborted);
        assert!(report.group_results.is_empty());
        assert!(store.statements().is_empty());
        assert_eq!(policy.asked(), vec!["create_backup", "proceed_without_backup"]);
    }

    #[tokio::test]
    async fn test_backup_declined_by_operator_still_runs() {
        let store = Arc::new(ScriptedStore::new());
        // No backup wanted; everything else approved.
        let policy = Arc::new(ScriptedPolicy::new(&[false]));
        let executor = PlanExecutor::new(store.clone(), policy.clone());
        let plan = sample_plan(0, 1, 0);

        let report = executor
            .execute(
                &plan,
                &ExecutionOptions {
                    dry_run: false,
                    skip_backup: false,
                },
            )
            .await
            .unwrap();

        assert!(!report.aborted);
        assert_eq!(report.successful_groups, 1);
        // Declining the backup offer never triggers the proceed-without question.
        assert_eq!(policy.asked()[0], "create_backup");
        assert!(!policy.asked().contains(&"proceed_without_backup"));
    }
}
