//! Duplicate candidate detection: rule-based prefilter plus LLM assistance.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DedupConfig;
use crate::dedup::prompts::{
    entity_duplicates_prompt, label_duplicates_prompt, parse_entity_groups, parse_label_groups,
};
use crate::dedup::types::{Confidence, DuplicateGroup, DuplicateKind};
use crate::error::QuarryResult;
use crate::traits::{GenerationOptions, GraphStore, LabelCount, Llm, ResponseFormat};
use crate::types::{Entity, Message};

// ============================================================================
// Rule-based prefilters
// ============================================================================

/// Deterministic label-level duplicates: case-insensitive collisions and
/// singular/plural pairs. Runs before the LLM and wins ties against it.
pub fn prefilter_label_groups(labels: &[LabelCount]) -> Vec<DuplicateGroup> {
    let mut groups = Vec::new();

    // Case-insensitive collisions; keep the most populous variant.
    let mut by_lowercase: HashMap<String, Vec<&LabelCount>> = HashMap::new();
    for label in labels {
        by_lowercase
            .entry(label.label.to_lowercase())
            .or_default()
            .push(label);
    }
    let mut collisions: Vec<_> = by_lowercase
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .collect();
    collisions.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, members) in collisions {
        let keep = members
            .iter()
            .max_by_key(|l| l.count)
            .map(|l| l.label.clone());
        let names: Vec<String> = members.iter().map(|l| l.label.clone()).collect();
        groups.push(DuplicateGroup {
            kind: DuplicateKind::EntityType,
            items: names.clone(),
            names,
            entity_type: None,
            reasoning: "Case variants of the same type name".to_string(),
            merge_target: keep,
            confidence: Confidence::High,
            risk: None,
        });
    }

    // Singular/plural pairs; keep the singular.
    let mut plural_pairs = Vec::new();
    for i in 0..labels.len() {
        for j in (i + 1)..labels.len() {
            let a = labels[i].label.to_lowercase();
            let b = labels[j].label.to_lowercase();
            let (singular, plural) = if format!("{a}s") == b {
                (&labels[i], &labels[j])
            } else if format!("{b}s") == a {
                (&labels[j], &labels[i])
            } else {
                continue;
            };
            plural_pairs.push(DuplicateGroup {
                kind: DuplicateKind::EntityType,
                items: vec![singular.label.clone(), plural.label.clone()],
                names: vec![singular.label.clone(), plural.label.clone()],
                entity_type: None,
                reasoning: "Singular and plural of the same type name".to_string(),
                merge_target: Some(singular.label.clone()),
                confidence: Confidence::Medium,
                risk: None,
            });
        }
    }

    union_groups(groups, plural_pairs)
}

/// Deterministic entity-level duplicates within one label: same name
/// ignoring case.
pub fn prefilter_entity_groups(label: &str, entities: &[Entity]) -> Vec<DuplicateGroup> {
    let mut by_name: HashMap<String, Vec<&Entity>> = HashMap::new();
    for entity in entities {
        by_name
            .entry(entity.name.to_lowercase())
            .or_default()
            .push(entity);
    }

    let mut collisions: Vec<_> = by_name
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .collect();
    collisions.sort_by(|a, b| a.0.cmp(&b.0));

    collisions
        .into_iter()
        .map(|(_, members)| DuplicateGroup {
            kind: DuplicateKind::Entity,
            items: members.iter().map(|e| e.id.clone()).collect(),
            names: members.iter().map(|e| e.name.clone()).collect(),
            entity_type: Some(label.to_string()),
            reasoning: "Same name ignoring case".to_string(),
            merge_target: None,
            confidence: Confidence::High,
            risk: None,
        })
        .collect()
}

/// Union two group lists, treating groups as the same when their member
/// sets intersect. First-seen wins; the overlapping later group is dropped.
pub fn union_groups(
    first: Vec<DuplicateGroup>,
    second: Vec<DuplicateGroup>,
) -> Vec<DuplicateGroup> {
    let mut result = first;
    for group in second {
        if result.iter().any(|existing| existing.overlaps(&group)) {
            continue;
        }
        result.push(group);
    }
    result
}

// ============================================================================
// LLM-assisted detection
// ============================================================================

/// Finds duplicate candidates over an existing graph.
pub struct DuplicateDetector {
    llm: Arc<dyn Llm>,
    store: Arc<dyn GraphStore>,
    config: DedupConfig,
}

impl DuplicateDetector {
    pub fn new(llm: Arc<dyn Llm>, store: Arc<dyn GraphStore>, config: DedupConfig) -> Self {
        Self { llm, store, config }
    }

    /// Detect duplicate entity-type labels across the whole graph.
    ///
    /// The rule-based prefilter always runs; the LLM pass is additive, and a
    /// failed LLM call degrades to the rule-based result with a warning.
    pub async fn detect_label_duplicates(&self) -> QuarryResult<Vec<DuplicateGroup>> {
        let labels = self.store.node_labels().await?;
        if labels.len() < 2 {
            info!(labels = labels.len(), "not enough labels for duplicate detection");
            return Ok(vec![]);
        }

        let rule_groups = prefilter_label_groups(&labels);
        info!(groups = rule_groups.len(), "rule-based label prefilter done");

        let context = self.label_context(&labels).await;
        let llm_groups = match self.ask(label_duplicates_prompt(&context)).await {
            Ok(response) => parse_label_groups(&response),
            Err(e) => {
                warn!(error = %e, "LLM label detection failed, keeping rule-based groups only");
                vec![]
            }
        };

        Ok(union_groups(rule_groups, llm_groups))
    }

    /// Detect duplicate entities within one label.
    pub async fn detect_entity_duplicates(&self, label: &str) -> QuarryResult<Vec<DuplicateGroup>> {
        let entities = self
            .store
            .entities_with_label(label, self.config.entity_limit)
            .await?;
        if entities.len() < 2 {
            info!(label, entities = entities.len(), "not enough entities for duplicate detection");
            return Ok(vec![]);
        }

        let rule_groups = prefilter_entity_groups(label, &entities);
        info!(label, groups = rule_groups.len(), "rule-based entity prefilter done");

        let context = entity_context(&entities);
        let llm_groups = match self.ask(entity_duplicates_prompt(label, &context)).await {
            Ok(response) => parse_entity_groups(&response, label),
            Err(e) => {
                warn!(label, error = %e, "LLM entity detection failed, keeping rule-based groups only");
                vec![]
            }
        };

        Ok(union_groups(rule_groups, llm_groups))
    }

    async fn ask(&self, prompt: String) -> QuarryResult<String> {
        let options = GenerationOptions {
            response_format: Some(ResponseFormat::Json),
            ..Default::default()
        };
        let response = self
            .llm
            .generate(&[Message::user(prompt)], Some(options))
            .await?;
        Ok(response.content_or_empty().to_string())
    }

    /// Label inventory with counts and a few property keys per label.
    async fn label_context(&self, labels: &[LabelCount]) -> String {
        let mut context = String::new();
        for label in labels {
            let _ = write!(context, "- {}: {} nodes", label.label, label.count);
            if let Ok(properties) = self.store.property_summary(&label.label).await {
                let keys: Vec<&str> = properties.keys().map(String::as_str).take(5).collect();
                if !keys.is_empty() {
                    let _ = write!(context, " (properties: {})", keys.join(", "));
                }
            }
            context.push('\n');
        }
        context
    }
}

/// One line per entity: id, name, compacted properties.
fn entity_context(entities: &[Entity]) -> String {
    let mut context = String::new();
    for entity in entities {
        let mut properties =
            serde_json::to_string(&entity.properties).unwrap_or_else(|_| "{}".to_string());
        if properties.len() > 200 {
            properties.truncate(200);
            properties.push_str("...");
        }
        let _ = writeln!(
            context,
            "- id={} name={} properties={}",
            entity.id, entity.name, properties
        );
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuarryError;
    use crate::traits::{GraphRow, LlmResponse, PropertySummary, RelTypeCount, RelationshipPattern};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    fn label(name: &str, count: u64) -> LabelCount {
        LabelCount {
            label: name.to_string(),
            count,
        }
    }

    #[test]
    fn test_case_variants_grouped_keeping_most_populous() {
        let labels = [label("Person", 12), label("person", 3), label("Vehicle", 5)];
        let groups = prefilter_label_groups(&labels);
        assert_eq!(groups.len(), 1);
        let mut items = groups[0].items.clone();
        items.sort();
        assert_eq!(items, vec!["Person", "person"]);
        assert_eq!(groups[0].merge_target.as_deref(), Some("Person"));
        assert!(!groups.iter().any(|g| g.items.iter().any(|i| i == "Vehicle")));
    }

    #[test]
    fn test_singular_plural_pair_keeps_singular() {
        let labels = [label("Car", 4), label("Cars", 9)];
        let groups = prefilter_label_groups(&labels);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].merge_target.as_deref(), Some("Car"));
    }

    #[test]
    fn test_plural_pair_overlapping_case_group_dropped() {
        let labels = [label("Person", 12), label("person", 3), label("Persons", 1)];
        let groups = prefilter_label_groups(&labels);
        // The case-variant group wins; both plural pairs overlap it.
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reasoning, "Case variants of the same type name");
    }

    #[test]
    fn test_entity_prefilter_groups_same_name() {
        let entities = [
            Entity::new("p1", "Person", "Elias Thorn"),
            Entity::new("p2", "Person", "elias thorn"),
            Entity::new("p3", "Person", "Clara"),
        ];
        let groups = prefilter_entity_groups("Person", &entities);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].items, vec!["p1", "p2"]);
        assert_eq!(groups[0].entity_type.as_deref(), Some("Person"));
    }

    #[test]
    fn test_union_drops_overlapping_later_group() {
        let first = prefilter_label_groups(&[label("Person", 2), label("person", 1)]);
        let llm = vec![
            DuplicateGroup {
                kind: DuplicateKind::EntityType,
                items: vec!["person".to_string(), "People".to_string()],
                names: vec![],
                entity_type: None,
                reasoning: "overlapping".to_string(),
                merge_target: None,
                confidence: Confidence::Low,
                risk: None,
            },
            DuplicateGroup {
                kind: DuplicateKind::EntityType,
                items: vec!["Car".to_string(), "Automobile".to_string()],
                names: vec![],
                entity_type: None,
                reasoning: "synonyms".to_string(),
                merge_target: None,
                confidence: Confidence::Low,
                risk: None,
            },
        ];
        let unioned = union_groups(first, llm);
        assert_eq!(unioned.len(), 2);
        assert_eq!(unioned[1].reasoning, "synonyms");
    }

    /// Store with a fixed label inventory and entity list.
    struct FixtureStore {
        labels: Vec<LabelCount>,
        entities: Vec<Entity>,
    }

    #[async_trait]
    impl GraphStore for FixtureStore {
        async fn ping(&self) -> QuarryResult<()> {
            Ok(())
        }
        async fn clear(&self) -> QuarryResult<()> {
            Ok(())
        }
        async fn upsert_entity(&self, _entity: &Entity) -> QuarryResult<()> {
            Ok(())
        }
        async fn upsert_relationship(
            &self,
            _relationship: &crate::types::Relationship,
        ) -> QuarryResult<()> {
            Ok(())
        }
        async fn run(&self, _statement: &str) -> QuarryResult<Vec<GraphRow>> {
            Ok(vec![])
        }
        async fn node_labels(&self) -> QuarryResult<Vec<LabelCount>> {
            Ok(self.labels.clone())
        }
        async fn relationship_types(&self) -> QuarryResult<Vec<RelTypeCount>> {
            Ok(vec![])
        }
        async fn entities_with_label(
            &self,
            _label: &str,
            limit: usize,
        ) -> QuarryResult<Vec<Entity>> {
            Ok(self.entities.iter().take(limit).cloned().collect())
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

    struct CannedLlm {
        response: Result<&'static str, ()>,
    }

    #[async_trait]
    impl Llm for CannedLlm {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: Option<GenerationOptions>,
        ) -> QuarryResult<LlmResponse> {
            match self.response {
                Ok(content) => Ok(LlmResponse {
                    content: Some(content.to_string()),
                    usage: None,
                }),
                Err(()) => Err(QuarryError::llm_connection("canned failure")),
            }
        }
        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_detection_unions_rules_and_llm() {
        let store = Arc::new(FixtureStore {
            labels: vec![label("Person", 12), label("person", 3), label("Auto", 2), label("Car", 4)],
            entities: vec![],
        });
        let llm = Arc::new(CannedLlm {
            response: Ok(r#"[{"duplicate_types": ["Auto", "Car"], "reasoning": "synonyms"}]"#),
        });
        let detector = DuplicateDetector::new(llm, store, DedupConfig::default());
        let groups = detector.detect_label_duplicates().await.unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_to_rules() {
        let store = Arc::new(FixtureStore {
            labels: vec![label("Person", 12), label("person", 3)],
            entities: vec![],
        });
        let llm = Arc::new(CannedLlm { response: Err(()) });
        let detector = DuplicateDetector::new(llm, store, DedupConfig::default());
        let groups = detector.detect_label_duplicates().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reasoning, "Case variants of the same type name");
    }

    #[tokio::test]
    async fn test_single_label_graph_yields_nothing() {
        let store = Arc::new(FixtureStore {
            labels: vec![label("Person", 12)],
            entities: vec![],
        });
        let llm = Arc::new(CannedLlm { response: Ok("[]") });
        let detector = DuplicateDetector::new(llm, store, DedupConfig::default());
        assert!(detector.detect_label_duplicates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entity_detection_respects_limit_and_label() {
        let store = Arc::new(FixtureStore {
            labels: vec![],
            entities: vec![
                Entity::new("p1", "Person", "Elias"),
                Entity::new("p2", "Person", "ELIAS"),
            ],
        });
        let llm = Arc::new(CannedLlm { response: Ok("[]") });
        let detector = DuplicateDetector::new(llm, store, DedupConfig::default());
        let groups = detector.detect_entity_duplicates("Person").await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, DuplicateKind::Entity);
    }
}
