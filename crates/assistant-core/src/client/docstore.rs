use anyhow::{Context, Result, anyhow};
use reqwest::Client;

use super::endpoint;
use crate::config::Config;
use crate::context::{ContextItem, QueryRequest, QueryResponse};

/// Client for the docstore's retrieval endpoint
#[derive(Clone)]
pub struct ContextClient {
    client: Client,
    base_url: String,
    num_results: usize,
    min_similarity: f32,
}

impl ContextClient {
    pub fn new(base_url: &str) -> Self {
        let defaults = Config::new();
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            num_results: defaults.num_results,
            min_similarity: defaults.min_similarity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            num_results: config.num_results,
            min_similarity: config.min_similarity,
            ..Self::new(&config.docstore_url)
        }
    }

    /// Retrieve passages related to `query`, one per source
    pub async fn query(&self, query: &str) -> Result<Vec<ContextItem>> {
        let url = endpoint(&self.base_url, "query");

        let request = QueryRequest {
            query,
            num_results: self.num_results,
            min_similarity: self.min_similarity,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Could not reach docstore at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Context query failed with status {}: {}", status, text));
        }

        let body: QueryResponse = response.json().await?;
        let items = body.into_items();
        tracing::info!(count = items.len(), "Retrieved context");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_server::serve_once;

    #[tokio::test]
    async fn test_query_dedups_by_source() {
        let (base_url, server) = serve_once(
            "200 OK",
            "application/json",
            vec![
                r#"{"results": [
                    {"text": "low", "metadata": {"source": "doc.md", "similarity": 0.4, "relevance": "medium"}},
                    {"text": "high", "metadata": {"source": "doc.md", "similarity": 0.8, "relevance": "high"}}
                ]}"#,
            ],
        )
        .await;

        let items = ContextClient::new(&base_url).query("what is x").await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "high");
        assert!((items[0].similarity - 0.8).abs() < 0.0001);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /query"));
        assert!(request.contains(r#""query":"what is x""#));
        assert!(request.contains(r#""num_results":5"#));
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let (base_url, _server) = serve_once(
            "500 Internal Server Error",
            "application/json",
            vec![r#"{"detail": "collection missing"}"#],
        )
        .await;

        let err = ContextClient::new(&base_url).query("x").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }
}
