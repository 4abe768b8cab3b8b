//! Duplicate resolution - detection, planning, and gated execution.
//!
//! Detection combines cheap rule-based prefilters with an LLM pass over the
//! graph's label and entity inventory. Confirmed groups feed a planner that
//! asks the model for a query-level resolution plan, and an executor walks
//! that plan under operator approval, emitting an audit report.

mod detect;
mod execute;
mod plan;
mod prompts;
mod report;
mod types;

pub use detect::{
    prefilter_entity_groups, prefilter_label_groups, union_groups, DuplicateDetector,
};
pub use execute::{
    ApprovalPolicy, ApprovalRequest, AutoApprove, BackupHook, ExecutionOptions, PlanExecutor,
};
pub use plan::{
    dedupe_groups, GroupPlan, MergeOperation, PlanGroup, ResolutionPlan, ResolutionPlanner,
    ValidationStep,
};
pub use prompts::{
    entity_duplicates_prompt, label_duplicates_prompt, parse_entity_groups, parse_label_groups,
    resolution_plan_prompt,
};
pub use report::{
    ExecutionReport, GroupResult, GroupStatus, OperationRecord, StepRecord, Tally,
};
pub use types::{Confidence, DuplicateGroup, DuplicateKind};
