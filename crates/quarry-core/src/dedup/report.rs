//! Execution reports: the append-only audit trail of a plan run.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::QuarryResult;
use crate::traits::GraphRow;

/// Terminal status of one group's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// All stages ran and passed.
    Success,
    /// Halted mid-merge after at least one mutation had been applied.
    PartialSuccess,
    OperationFailed,
    OperationRejected,
    PreValidationFailed,
    PreValidationRejected,
    PostValidationFailed,
    PostValidationRejected,
}

/// How a status counts in the report summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Successful,
    Failed,
    Skipped,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::OperationFailed => "operation_failed",
            Self::OperationRejected => "operation_rejected",
            Self::PreValidationFailed => "pre_validation_failed",
            Self::PreValidationRejected => "pre_validation_rejected",
            Self::PostValidationFailed => "post_validation_failed",
            Self::PostValidationRejected => "post_validation_rejected",
        }
    }

    /// Rejections before any mutation are skips; anything that left the
    /// graph wrong or half-merged is a failure.
    pub fn tally(&self) -> Tally {
        match self {
            Self::Success => Tally::Successful,
            Self::PartialSuccess | Self::OperationFailed | Self::PostValidationFailed => {
                Tally::Failed
            }
            Self::OperationRejected
            | Self::PreValidationFailed
            | Self::PreValidationRejected
            | Self::PostValidationRejected => Tally::Skipped,
        }
    }
}

/// One validation step as it ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position within its stage.
    pub step: usize,
    pub description: String,
    pub query: String,
    pub success: bool,
    pub result_count: usize,
    /// Up to five rows surfaced to the operator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_results: Vec<GraphRow>,
    /// `None` when the query failed before anyone was asked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_approved: Option<bool>,
}

/// One merge operation as it ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub step: usize,
    pub description: String,
    pub query: String,
    pub requires_confirmation: bool,
    /// Whether the query was issued at all.
    pub executed: bool,
    pub success: bool,
    pub records_affected: usize,
    pub user_skipped: bool,
}

/// Everything that happened to one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResult {
    pub group_id: String,
    pub summary: String,
    pub status: GroupStatus,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub pre_validation_results: Vec<StepRecord>,
    #[serde(default)]
    pub operation_results: Vec<OperationRecord>,
    #[serde(default)]
    pub post_validation_results: Vec<StepRecord>,
}

/// The audit trail of one plan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// Execution stopped before any group (backup unavailable and the
    /// operator declined to continue).
    #[serde(default)]
    pub aborted: bool,
    pub successful_groups: usize,
    pub failed_groups: usize,
    pub skipped_groups: usize,
    #[serde(default)]
    pub group_results: Vec<GroupResult>,
}

impl ExecutionReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            aborted: false,
            successful_groups: 0,
            failed_groups: 0,
            skipped_groups: 0,
            group_results: Vec::new(),
        }
    }

    /// Append a group result. Dry runs keep the records but tally nothing.
    pub fn record(&mut self, result: GroupResult) {
        if !self.dry_run {
            match result.status.tally() {
                Tally::Successful => self.successful_groups += 1,
                Tally::Failed => self.failed_groups += 1,
                Tally::Skipped => self.skipped_groups += 1,
            }
        }
        self.group_results.push(result);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Human-readable summary.
    pub fn render(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "EXECUTION REPORT");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Started:  {}", self.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        if let Some(finished) = self.finished_at {
            let _ = writeln!(out, "Finished: {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        let _ = writeln!(out, "Mode: {}", if self.dry_run { "dry run" } else { "live" });
        if self.aborted {
            let _ = writeln!(out, "Aborted before any operation ran.");
        }
        let _ = writeln!(
            out,
            "Groups: {} total | {} successful | {} failed | {} skipped",
            self.group_results.len(),
            self.successful_groups,
            self.failed_groups,
            self.skipped_groups
        );

        for result in &self.group_results {
            let _ = writeln!(out, "\nGROUP {}: {}", result.group_id, result.summary);
            let _ = writeln!(out, "  Status: {}", result.status.as_str());
            for detail in &result.details {
                let _ = writeln!(out, "  - {detail}");
            }
            for record in &result.operation_results {
                let ran = if record.user_skipped {
                    "skipped by operator".to_string()
                } else if !record.executed {
                    "not executed".to_string()
                } else if record.success {
                    format!("ok, {} records affected", record.records_affected)
                } else {
                    "failed".to_string()
                };
                let _ = writeln!(out, "  op {}: {} ({ran})", record.step, record.description);
            }
        }

        let _ = writeln!(out, "\n{rule}");
        out
    }

    /// Save as `execution_report_<timestamp>.json` plus a rendered `.txt`
    /// companion. Returns the JSON path.
    pub fn save(&self, dir: &Path) -> QuarryResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let json_path = dir.join(format!("execution_report_{timestamp}.json"));
        fs::write(&json_path, serde_json::to_string_pretty(self)?)?;
        let txt_path = json_path.with_extension("txt");
        fs::write(&txt_path, self.render())?;
        info!(path = %json_path.display(), "execution report saved");
        Ok(json_path)
    }
}
