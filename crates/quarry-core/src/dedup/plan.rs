//! Resolution plans: structure, defensive parsing, and LLM-backed planning.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dedup::prompts::resolution_plan_prompt;
use crate::dedup::types::DuplicateGroup;
use crate::error::{ErrorCode, QuarryError, QuarryResult};
use crate::extract::parse::{isolate_object, strip_trailing_commas};
use crate::traits::{GenerationOptions, GraphStore, Llm, ResponseFormat};
use crate::types::Message;

fn default_true() -> bool {
    true
}

/// A read-only check before or after a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStep {
    pub query: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<String>,
}

/// A mutating step; confirmation defaults to required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOperation {
    pub query: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub requires_confirmation: bool,
}

/// A duplicate group as the plan describes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanGroup {
    #[serde(default)]
    pub group_id: String,
    #[serde(default, rename = "group_summary", alias = "summary")]
    pub summary: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_target: Option<String>,
    #[serde(
        default,
        rename = "impact_assessment",
        alias = "impact",
        skip_serializing_if = "Option::is_none"
    )]
    pub impact: Option<String>,
}

/// The three-stage step sequence for one group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPlan {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub pre_merge_validation: Vec<ValidationStep>,
    #[serde(default)]
    pub merge_operations: Vec<MergeOperation>,
    #[serde(default)]
    pub post_merge_validation: Vec<ValidationStep>,
}

/// A full resolution plan.
///
/// Invariant, enforced by [`ResolutionPlan::validate`]: every `group_id` in
/// `resolution_plan` has a matching entry in `groups`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionPlan {
    #[serde(default)]
    pub groups: Vec<PlanGroup>,
    #[serde(default)]
    pub resolution_plan: Vec<GroupPlan>,
}

impl ResolutionPlan {
    /// Parse a model response into a plan. Unparseable output is a typed
    /// error; nothing executes a partial plan.
    pub fn parse(response: &str) -> QuarryResult<Self> {
        let isolated = isolate_object(response).ok_or_else(|| {
            QuarryError::plan(
                "no JSON object found in plan response",
                ErrorCode::PlanUnparseable,
            )
        })?;

        match serde_json::from_str(isolated) {
            Ok(plan) => Ok(plan),
            Err(first_err) => {
                let repaired = strip_trailing_commas(isolated);
                serde_json::from_str(&repaired).map_err(|_| {
                    QuarryError::plan(
                        format!("plan response is not valid JSON: {}", first_err),
                        ErrorCode::PlanUnparseable,
                    )
                })
            }
        }
    }

    /// Model-output repair: fresh UUIDs for missing or suspiciously short
    /// group ids (rewritten consistently across `resolution_plan`), and
    /// `items` backfilled from the originating duplicate group by position.
    pub fn normalize(&mut self, sources: &[DuplicateGroup]) {
        let old_ids: Vec<String> = self.groups.iter().map(|g| g.group_id.clone()).collect();

        for (position, group) in self.groups.iter_mut().enumerate() {
            if group.group_id.len() < 8 {
                let fresh = Uuid::new_v4().to_string();
                warn!(position, "plan group id missing or too short, assigning a fresh one");
                group.group_id = fresh;
            }
            if group.items.is_empty() {
                if let Some(source) = sources.get(position) {
                    group.items = source.items.clone();
                }
            }
        }

        for entry in &mut self.resolution_plan {
            if let Some(position) = old_ids.iter().position(|old| *old == entry.group_id) {
                entry.group_id = self.groups[position].group_id.clone();
            }
        }
    }

    /// Reject empty plans and dangling group references before execution.
    pub fn validate(&self) -> QuarryResult<()> {
        if self.resolution_plan.is_empty() {
            return Err(QuarryError::plan(
                "plan has no executable groups",
                ErrorCode::PlanEmpty,
            ));
        }
        let known: HashSet<&str> = self.groups.iter().map(|g| g.group_id.as_str()).collect();
        for entry in &self.resolution_plan {
            if !known.contains(entry.group_id.as_str()) {
                return Err(QuarryError::plan(
                    format!(
                        "resolution plan references unknown group_id {}",
                        entry.group_id
                    ),
                    ErrorCode::PlanDanglingGroup,
                ));
            }
        }
        Ok(())
    }

    /// Group metadata for a plan entry.
    pub fn group(&self, group_id: &str) -> Option<&PlanGroup> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub fn is_empty(&self) -> bool {
        self.resolution_plan.is_empty()
    }

    /// Human-readable rendering for operator review.
    pub fn render(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "DUPLICATE RESOLUTION PLAN");
        let _ = writeln!(out, "{rule}");

        for (number, entry) in self.resolution_plan.iter().enumerate() {
            let group = self.group(&entry.group_id);
            let summary = group.map(|g| g.summary.as_str()).unwrap_or("(no summary)");
            let _ = writeln!(out, "\nGROUP {}: {}", number + 1, summary);
            let _ = writeln!(out, "  ID: {}", entry.group_id);
            if let Some(group) = group {
                if !group.items.is_empty() {
                    let _ = writeln!(out, "  Items: {}", group.items.join(", "));
                }
                if let Some(target) = &group.merge_target {
                    let _ = writeln!(out, "  Merge target: {target}");
                }
                if let Some(impact) = &group.impact {
                    let _ = writeln!(out, "  Impact: {impact}");
                }
            }

            if !entry.pre_merge_validation.is_empty() {
                let _ = writeln!(out, "\n  PRE-MERGE VALIDATION:");
                render_validation_steps(&mut out, &entry.pre_merge_validation);
            }
            if !entry.merge_operations.is_empty() {
                let _ = writeln!(out, "\n  MERGE OPERATIONS:");
                for (i, op) in entry.merge_operations.iter().enumerate() {
                    let confirm = if op.requires_confirmation {
                        " [requires confirmation]"
                    } else {
                        ""
                    };
                    let _ = writeln!(out, "    {}. {}{}", i + 1, op.description, confirm);
                    let _ = writeln!(out, "       Query: {}", op.query);
                }
            }
            if !entry.post_merge_validation.is_empty() {
                let _ = writeln!(out, "\n  POST-MERGE VALIDATION:");
                render_validation_steps(&mut out, &entry.post_merge_validation);
            }
        }

        let _ = writeln!(out, "\n{rule}");
        out
    }

    /// Save as `resolution_plan_<timestamp>.json` plus a rendered `.txt`
    /// companion. Returns the JSON path.
    pub fn save(&self, dir: &Path) -> QuarryResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let json_path = dir.join(format!("resolution_plan_{timestamp}.json"));
        fs::write(&json_path, serde_json::to_string_pretty(self)?)?;
        let txt_path = json_path.with_extension("txt");
        fs::write(&txt_path, self.render())?;
        info!(path = %json_path.display(), "resolution plan saved");
        Ok(json_path)
    }

    /// Load a previously saved plan.
    pub fn load(path: &Path) -> QuarryResult<Self> {
        let json = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&json)?;
        info!(path = %path.display(), groups = plan.resolution_plan.len(), "resolution plan loaded");
        Ok(plan)
    }
}

fn render_validation_steps(out: &mut String, steps: &[ValidationStep]) {
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "    {}. {}", i + 1, step.description);
        let _ = writeln!(out, "       Query: {}", step.query);
        if let Some(criteria) = &step.success_criteria {
            let _ = writeln!(out, "       Success criteria: {criteria}");
        }
    }
}

/// Keep groups with at least two members and distinct member sets.
pub fn dedupe_groups(groups: &[DuplicateGroup]) -> Vec<DuplicateGroup> {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    groups
        .iter()
        .filter(|group| group.items.len() >= 2)
        .filter(|group| {
            let mut key = group.items.clone();
            key.sort();
            seen.insert(key)
        })
        .cloned()
        .collect()
}

/// Builds resolution plans through the LLM.
pub struct ResolutionPlanner {
    llm: Arc<dyn Llm>,
    store: Arc<dyn GraphStore>,
}

impl ResolutionPlanner {
    pub fn new(llm: Arc<dyn Llm>, store: Arc<dyn GraphStore>) -> Self {
        Self { llm, store }
    }

    /// Ask the LLM for a plan covering `groups`, then repair and validate
    /// it. An unusable plan is an error to the operator, never a partial
    /// execution.
    pub async fn build(&self, groups: &[DuplicateGroup]) -> QuarryResult<ResolutionPlan> {
        let selected = dedupe_groups(groups);
        if selected.is_empty() {
            return Err(QuarryError::plan(
                "no duplicate groups to plan for",
                ErrorCode::PlanEmpty,
            ));
        }

        let groups_json = serde_json::to_string_pretty(&selected)?;
        let context = self.graph_context().await;
        let options = GenerationOptions {
            response_format: Some(ResponseFormat::Json),
            ..Default::default()
        };
        let response = self
            .llm
            .generate(
                &[Message::user(resolution_plan_prompt(&groups_json, &context))],
                Some(options),
            )
            .await?;

        let mut plan = ResolutionPlan::parse(response.content_or_empty())?;
        plan.normalize(&selected);
        plan.validate()?;
        info!(
            groups = plan.resolution_plan.len(),
            "resolution plan built"
        );
        Ok(plan)
    }

    /// Label inventory and label-to-label relationship patterns.
    async fn graph_context(&self) -> String {
        let mut context = String::new();

        match self.store.node_labels().await {
            Ok(labels) => {
                let _ = writeln!(context, "Node labels:");
                for label in labels {
                    let _ = writeln!(context, "- {}: {} nodes", label.label, label.count);
                }
            }
            Err(e) => warn!(error = %e, "could not list node labels for plan context"),
        }

        match self.store.relationship_patterns(50).await {
            Ok(patterns) if !patterns.is_empty() => {
                let _ = writeln!(context, "Relationship patterns:");
                for pattern in patterns {
                    let _ = writeln!(
                        context,
                        "- ({})-[{}]->({}): {}",
                        pattern.source_label,
                        pattern.relationship_type,
                        pattern.target_label,
                        pattern.count
                    );
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not list relationship patterns for plan context"),
        }

        context
    }
}
