//! Token-classification NER model detector
//!
//! Talks to an inference endpoint that runs a token-classification pipeline
//! with simple aggregation and answers with entity groups:
//!
//! ```json
//! [{"entity_group": "PER", "score": 0.998, "word": "John Smith", "start": 0, "end": 10}]
//! ```
//!
//! Offsets are character offsets into the submitted text. Labels are passed
//! through as the model names them (`PER`, `LOC`, `ORG`, `MISC`) and mapped
//! onto the vocabulary by the resolver.

use crate::client::{HttpClientConfig, create_client, send_error, with_retry};
use crate::retry_after::retry_after_from_headers;
use crate::{EgressError, Result};
use async_trait::async_trait;
use lexmask_core::{CharIndex, DetectorError, DetectorKind, EntityDetector, EntityLabel, Span};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Model NER detector configuration
#[derive(Debug, Clone)]
pub struct ModelNerConfig {
    /// URL the text is posted to
    pub endpoint: String,

    /// Path (or absolute URL) probed at startup; without it the endpoint
    /// itself is probed with a short request
    pub health_path: Option<String>,

    /// Name reported in logs and capabilities
    pub model_name: Option<String>,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl ModelNerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            health_path: None,
            model_name: None,
            client_config: HttpClientConfig::default(),
        }
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = Some(path.into());
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    inputs: &'a str,
    parameters: NerParameters,
}

#[derive(Debug, Serialize)]
struct NerParameters {
    aggregation_strategy: &'static str,
}

/// One entity group from the model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntity {
    #[serde(alias = "entity")]
    pub entity_group: String,
    pub score: f32,
    #[serde(default)]
    pub word: Option<String>,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
}

/// Detector backed by a remote NER model
pub struct ModelNerDetector {
    config: ModelNerConfig,
    client: Client,
    endpoint: Url,
    health_url: Option<Url>,
    name: String,
}

impl ModelNerDetector {
    pub fn new(config: ModelNerConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            EgressError::ConfigError(format!("Invalid model endpoint {}: {}", config.endpoint, e))
        })?;

        let health_url = config
            .health_path
            .as_deref()
            .map(|path| {
                endpoint.join(path).map_err(|e| {
                    EgressError::ConfigError(format!("Invalid model health path {}: {}", path, e))
                })
            })
            .transpose()?;

        let client = create_client(&config.client_config)?;
        let name = config
            .model_name
            .clone()
            .unwrap_or_else(|| endpoint.to_string());

        Ok(Self {
            config,
            client,
            endpoint,
            health_url,
            name,
        })
    }

    /// Post `text` and return the raw entity groups
    pub async fn infer(&self, text: &str) -> Result<Vec<ModelEntity>> {
        let timeout_secs = self.config.client_config.timeout_secs;

        with_retry(self.config.client_config.max_retries, || async move {
            let response = self
                .client
                .post(self.endpoint.clone())
                .json(&NerRequest {
                    inputs: text,
                    parameters: NerParameters {
                        aggregation_strategy: "simple",
                    },
                })
                .send()
                .await
                .map_err(|e| send_error(e, timeout_secs))?;

            let status = response.status();
            if status.as_u16() == 503 || status.as_u16() == 429 {
                return Err(EgressError::Busy {
                    retry_after_secs: retry_after_from_headers(response.headers()),
                });
            }
            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error body".to_string());
                return Err(EgressError::ProviderError {
                    status_code: status.as_u16(),
                    message,
                });
            }

            response.json::<Vec<ModelEntity>>().await.map_err(|e| {
                EgressError::ParseError(format!("Failed to parse model NER response: {}", e))
            })
        })
        .await
    }
}

/// Turn model entity groups into spans over `text`
///
/// Groups without offsets or with offsets outside the text are dropped;
/// `matched_text` always comes from the input, never from `word`.
pub fn entities_to_spans(text: &str, entities: Vec<ModelEntity>) -> Vec<Span> {
    let index = CharIndex::new(text);

    entities
        .into_iter()
        .filter_map(|entity| {
            let (Some(start), Some(end)) = (entity.start, entity.end) else {
                debug!(
                    "Dropping {} group without offsets ({:?})",
                    entity.entity_group, entity.word
                );
                return None;
            };

            let span = Span::from_text(
                &index,
                start,
                end,
                EntityLabel::from(entity.entity_group.as_str()),
                entity.score,
                DetectorKind::Model,
            );
            if span.is_none() {
                debug!(
                    "Dropping {} group with invalid range {}..{}",
                    entity.entity_group, start, end
                );
            }
            span
        })
        .collect()
}

#[async_trait]
impl EntityDetector for ModelNerDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Model
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, text), fields(detector = %self.name, chars = text.chars().count()))]
    async fn detect(&self, text: &str) -> std::result::Result<Vec<Span>, DetectorError> {
        let entities = self.infer(text).await?;
        let spans = entities_to_spans(text, entities);
        debug!("Model returned {} usable entity groups", spans.len());
        Ok(spans)
    }

    async fn is_available(&self) -> bool {
        match &self.health_url {
            Some(url) => match self.client.get(url.clone()).send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    debug!("Model health probe failed: {}", e);
                    false
                }
            },
            None => match self.infer("Availability probe.").await {
                Ok(_) => true,
                Err(e) => {
                    debug!("Model probe request failed: {}", e);
                    false
                }
            },
        }
    }

    fn supported_labels(&self) -> Vec<EntityLabel> {
        vec![EntityLabel::Person, EntityLabel::Org, EntityLabel::Gpe]
    }
}
