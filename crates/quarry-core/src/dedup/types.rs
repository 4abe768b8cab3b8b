//! Duplicate candidate types.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What a duplicate group's members are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKind {
    /// Members are entity-type labels.
    EntityType,
    /// Members are entity ids within one label.
    Entity,
}

/// How sure the detector is that the group is a real duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    /// Lenient parse of model output; anything unknown is `Medium`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// A set of labels or entities suspected to be the same real-world concept.
///
/// Produced by detection, consumed by planning, discarded after execution or
/// rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub kind: DuplicateKind,
    /// Labels (for `EntityType`) or entity ids (for `Entity`).
    pub items: Vec<String>,
    /// Display names matching `items`.
    pub names: Vec<String>,
    /// The label entity members live under; `None` for type groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub reasoning: String,
    /// Suggested member to keep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_target: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
}

impl DuplicateGroup {
    /// Member set for overlap comparison.
    pub fn item_set(&self) -> HashSet<&str> {
        self.items.iter().map(String::as_str).collect()
    }

    /// Whether this group shares any member with `other`.
    pub fn overlaps(&self, other: &DuplicateGroup) -> bool {
        self.kind == other.kind && !self.item_set().is_disjoint(&other.item_set())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(kind: DuplicateKind, items: &[&str]) -> DuplicateGroup {
        DuplicateGroup {
            kind,
            items: items.iter().map(|s| s.to_string()).collect(),
            names: items.iter().map(|s| s.to_string()).collect(),
            entity_type: None,
            reasoning: String::new(),
            merge_target: None,
            confidence: Confidence::Medium,
            risk: None,
        }
    }

    #[test]
    fn test_confidence_parse_lenient() {
        assert_eq!(Confidence::parse("High"), Confidence::High);
        assert_eq!(Confidence::parse(" low "), Confidence::Low);
        assert_eq!(Confidence::parse("certain"), Confidence::Medium);
    }

    #[test]
    fn test_overlap_requires_same_kind() {
        let a = group(DuplicateKind::EntityType, &["Person", "person"]);
        let b = group(DuplicateKind::Entity, &["Person", "e2"]);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_overlap_on_shared_member() {
        let a = group(DuplicateKind::Entity, &["e1", "e2"]);
        let b = group(DuplicateKind::Entity, &["e2", "e3"]);
        let c = group(DuplicateKind::Entity, &["e4"]);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
