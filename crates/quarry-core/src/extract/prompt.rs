//! Prompt template for knowledge graph extraction.

/// Prompt asking the model to extract entities and relationships from one
/// chunk as strict JSON.
pub fn extraction_prompt(chunk_text: &str) -> String {
    format!(
        r#"You are a knowledge graph extraction system. Extract all entities and relationships from the text below.

Return ONLY a JSON object in exactly this format, with no other text:
{{
  "entities": [
    {{"id": "unique_id", "type": "EntityType", "name": "Entity Name", "properties": {{"key": "value"}}}}
  ],
  "relationships": [
    {{"source": "entity_id", "target": "entity_id", "type": "RELATIONSHIP_TYPE", "properties": {{}}}}
  ]
}}

Rules:
- Every entity needs a unique id, a type (e.g. Person, Place, Organization), and a name.
- Relationship source and target must be entity ids from this same response.
- Relationship types are UPPERCASE_WITH_UNDERSCORES (e.g. WORKS_FOR, LOCATED_IN).
- Put additional attributes in properties; omit properties you do not know.
- If nothing can be extracted, return empty lists.

Text:
{chunk_text}"#
    )
}
