use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::EmbeddingConfig;
use crate::infrastructure::http::{check_status, endpoint, transport_error};

/// Client for `POST {base}/embeddings`.
pub struct OpenAiEmbeddings {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    pub fn new(
        client: Client,
        base_url: &str,
        config: &EmbeddingConfig,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: endpoint(config.base_url.as_deref().unwrap_or(base_url), "embeddings"),
            api_key: api_key.into(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
        }
    }

    async fn request(&self, inputs: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        let body = EmbeddingsRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| DomainError::provider(format!("malformed embeddings response: {e}")))?;
        order_embeddings(payload, inputs.len())
    }
}

/// Restores input order from `data[].index` and checks nothing is missing.
fn order_embeddings(
    payload: EmbeddingsResponse,
    expected: usize,
) -> Result<Vec<Embedding>, DomainError> {
    let mut slots: Vec<Option<Embedding>> = vec![None; expected];
    for item in payload.data {
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            DomainError::provider(format!("embedding index {} out of range", item.index))
        })?;
        *slot = Some(Embedding::new(item.embedding));
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            e.ok_or_else(|| DomainError::provider(format!("no embedding returned for input {i}")))
        })
        .collect()
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddings {
    #[instrument(skip(self, text), fields(model = %self.model))]
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| DomainError::provider("no embedding returned"))
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.request(batch).await?);
        }
        Ok(embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> EmbeddingsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_orders_by_index() {
        let payload = parse(
            r#"{"object":"list","model":"text-embedding-ada-002","data":[
                {"object":"embedding","index":1,"embedding":[0.0,1.0]},
                {"object":"embedding","index":0,"embedding":[1.0,0.0]}
            ],"usage":{"prompt_tokens":4,"total_tokens":4}}"#,
        );

        let embeddings = order_embeddings(payload, 2).unwrap();
        assert_eq!(embeddings[0].as_slice(), &[1.0, 0.0]);
        assert_eq!(embeddings[1].as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn test_missing_item_is_provider_error() {
        let payload = parse(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#);
        assert!(matches!(
            order_embeddings(payload, 2),
            Err(DomainError::Provider(_))
        ));
    }

    #[test]
    fn test_out_of_range_index() {
        let payload = parse(r#"{"data":[{"index":5,"embedding":[1.0]}]}"#);
        assert!(order_embeddings(payload, 1).is_err());
    }

    #[test]
    fn test_embedding_base_url_override() {
        let config = EmbeddingConfig {
            base_url: Some("http://localhost:1234/v1".to_string()),
            ..EmbeddingConfig::default()
        };
        let client = OpenAiEmbeddings::new(Client::new(), "https://api.openai.com/v1", &config, "k");
        assert_eq!(client.url, "http://localhost:1234/v1/embeddings");
        assert_eq!(client.model(), "text-embedding-ada-002");
    }
}
