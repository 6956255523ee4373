//! Linguistic NLP pipeline detector
//!
//! Posts `{"text": ...}` and reads back the pipeline's named entities as
//! `{"ents": [{"label": "PERSON", "start": 0, "end": 10}]}`. The pipeline
//! reports no scores, so every span gets the configured confidence.

use crate::client::{HttpClientConfig, create_client, send_error, with_retry};
use crate::retry_after::retry_after_from_headers;
use crate::{EgressError, Result};
use async_trait::async_trait;
use lexmask_core::{CharIndex, DetectorError, DetectorKind, EntityDetector, EntityLabel, Span};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Default confidence for linguistic entities
pub const DEFAULT_LINGUISTIC_CONFIDENCE: f32 = 0.9;

/// Linguistic detector configuration
#[derive(Debug, Clone)]
pub struct LinguisticConfig {
    /// URL the text is posted to
    pub endpoint: String,

    /// Confidence assigned to every entity
    pub confidence: f32,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl LinguisticConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            confidence: DEFAULT_LINGUISTIC_CONFIDENCE,
            client_config: HttpClientConfig::default(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

#[derive(Debug, Serialize)]
struct PipelineRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    #[serde(alias = "entities")]
    ents: Vec<PipelineEntity>,
}

#[derive(Debug, Deserialize)]
struct PipelineEntity {
    #[serde(alias = "label_")]
    label: String,
    #[serde(alias = "start_char")]
    start: usize,
    #[serde(alias = "end_char")]
    end: usize,
}

/// Detector backed by a remote linguistic pipeline
pub struct LinguisticDetector {
    config: LinguisticConfig,
    client: Client,
    endpoint: Url,
}

impl LinguisticDetector {
    pub fn new(config: LinguisticConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            EgressError::ConfigError(format!(
                "Invalid linguistic endpoint {}: {}",
                config.endpoint, e
            ))
        })?;
        let client = create_client(&config.client_config)?;

        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    async fn request(&self, text: &str) -> Result<PipelineResponse> {
        let timeout_secs = self.config.client_config.timeout_secs;

        with_retry(self.config.client_config.max_retries, || async move {
            let response = self
                .client
                .post(self.endpoint.clone())
                .json(&PipelineRequest { text })
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

            response.json::<PipelineResponse>().await.map_err(|e| {
                EgressError::ParseError(format!("Failed to parse linguistic response: {}", e))
            })
        })
        .await
    }
}

#[async_trait]
impl EntityDetector for LinguisticDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Linguistic
    }

    fn name(&self) -> &str {
        self.config.endpoint.as_str()
    }

    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn detect(&self, text: &str) -> std::result::Result<Vec<Span>, DetectorError> {
        let response = self.request(text).await?;
        let index = CharIndex::new(text);

        let spans: Vec<Span> = response
            .ents
            .into_iter()
            .filter_map(|ent| {
                Span::from_text(
                    &index,
                    ent.start,
                    ent.end,
                    EntityLabel::from(ent.label),
                    self.config.confidence,
                    DetectorKind::Linguistic,
                )
            })
            .collect();

        debug!("Linguistic pipeline returned {} entities", spans.len());
        Ok(spans)
    }

    async fn is_available(&self) -> bool {
        match self.request("Availability probe.").await {
            Ok(_) => true,
            Err(e) => {
                debug!("Linguistic probe request failed: {}", e);
                false
            }
        }
    }

    fn supported_labels(&self) -> Vec<EntityLabel> {
        vec![
            EntityLabel::Person,
            EntityLabel::Org,
            EntityLabel::Gpe,
            EntityLabel::Date,
            EntityLabel::Money,
        ]
    }
}
