//! Retrieved context passages from the docstore

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Coarse relevance category attached to a retrieved passage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum Relevance {
    High,
    Medium,
    Low,
    NotRelevant,
}

impl Relevance {
    /// Classify a similarity score with the docstore's thresholds
    pub fn from_similarity(similarity: f32) -> Self {
        if similarity > 0.5 {
            Relevance::High
        } else if similarity > 0.2 {
            Relevance::Medium
        } else if similarity > 0.1 {
            Relevance::Low
        } else {
            Relevance::NotRelevant
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::High => "high",
            Relevance::Medium => "medium",
            Relevance::Low => "low",
            Relevance::NotRelevant => "not_relevant",
        }
    }
}

impl From<String> for Relevance {
    fn from(label: String) -> Self {
        match label.to_lowercase().as_str() {
            "high" => Relevance::High,
            "medium" => Relevance::Medium,
            "low" => Relevance::Low,
            _ => Relevance::NotRelevant,
        }
    }
}

/// One retrieved passage, as shown in the context panel
#[derive(Debug, Clone, PartialEq)]
pub struct ContextItem {
    pub text: String,
    pub source: String,
    pub similarity: f32,
    pub relevance: Relevance,
    pub full_document: Option<String>,
}

impl ContextItem {
    /// The full document if the docstore sent one, otherwise the passage
    pub fn document(&self) -> &str {
        self.full_document.as_deref().unwrap_or(&self.text)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query: &'a str,
    pub num_results: usize,
    pub min_similarity: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    text: String,
    metadata: ResultMetadata,
}

#[derive(Debug, Deserialize)]
struct ResultMetadata {
    #[serde(default, alias = "filename")]
    source: String,
    #[serde(default)]
    similarity: f32,
    #[serde(default)]
    relevance: Option<Relevance>,
    #[serde(default)]
    full_document: Option<String>,
}

impl QueryResponse {
    pub(crate) fn into_items(self) -> Vec<ContextItem> {
        let items = self.results.into_iter().map(|result| {
            let meta = result.metadata;
            ContextItem {
                text: result.text,
                relevance: meta
                    .relevance
                    .unwrap_or_else(|| Relevance::from_similarity(meta.similarity)),
                source: meta.source,
                similarity: meta.similarity,
                full_document: meta.full_document,
            }
        });
        dedup_by_source(items)
    }
}

/// Keep one passage per source, the one with the highest similarity.
/// Sources stay in order of first appearance.
pub fn dedup_by_source(items: impl IntoIterator<Item = ContextItem>) -> Vec<ContextItem> {
    let mut unique: Vec<ContextItem> = Vec::new();
    let mut by_source: HashMap<String, usize> = HashMap::new();

    for item in items {
        match by_source.get(&item.source) {
            Some(&i) => {
                if item.similarity > unique[i].similarity {
                    unique[i] = item;
                }
            }
            None => {
                by_source.insert(item.source.clone(), unique.len());
                unique.push(item);
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: &str, similarity: f32) -> ContextItem {
        ContextItem {
            text: format!("passage from {}", source),
            source: source.to_string(),
            similarity,
            relevance: Relevance::from_similarity(similarity),
            full_document: None,
        }
    }

    #[test]
    fn test_dedup_keeps_highest_similarity() {
        let items = vec![item("doc.md", 0.4), item("other.md", 0.3), item("doc.md", 0.8)];
        let unique = dedup_by_source(items);

        assert_eq!(unique.len(), 2);
        let docs: Vec<&ContextItem> = unique.iter().filter(|i| i.source == "doc.md").collect();
        assert_eq!(docs.len(), 1);
        assert!((docs[0].similarity - 0.8).abs() < 0.0001);
        assert_eq!(unique[0].source, "doc.md");
    }

    #[test]
    fn test_relevance_thresholds() {
        assert_eq!(Relevance::from_similarity(0.9), Relevance::High);
        assert_eq!(Relevance::from_similarity(0.5), Relevance::Medium);
        assert_eq!(Relevance::from_similarity(0.15), Relevance::Low);
        assert_eq!(Relevance::from_similarity(0.1), Relevance::NotRelevant);
    }

    #[test]
    fn test_query_response_parsing() {
        let json = r#"{
            "results": [
                {"text": "a", "metadata": {"source": "doc.md", "similarity": 0.4, "relevance": "MEDIUM"}},
                {"text": "b", "metadata": {"source": "doc.md", "similarity": 0.8, "relevance": "high",
                                           "full_document": "whole doc"}},
                {"text": "c", "metadata": {"filename": "notes.txt", "similarity": 0.15}}
            ],
            "has_results": true
        }"#;
        let response: QueryResponse = serde_json::from_str(json).unwrap();
        let items = response.into_items();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "b");
        assert_eq!(items[0].relevance, Relevance::High);
        assert_eq!(items[0].document(), "whole doc");
        assert_eq!(items[1].source, "notes.txt");
        assert_eq!(items[1].relevance, Relevance::Low);
        assert_eq!(items[1].document(), "c");
    }

    #[test]
    fn test_missing_results_is_empty() {
        let response: QueryResponse = serde_json::from_str(r#"{"has_results": false}"#).unwrap();
        assert!(response.into_items().is_empty());
    }
}
