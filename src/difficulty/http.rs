//! HTTP client for the sentence-difficulty prediction service.

use super::DifficultyClassifier;
use crate::config::ClassifierSettings;
use crate::error::{Result, ShadowifyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Request body: every segment text, in segment order.
#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub sentences: &'a [String],
}

/// One element of the response array.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Prediction {
    pub cefr: String,
    #[serde(default)]
    pub sentence: String,
}

/// Classifier that posts all sentences to the prediction endpoint in one call.
///
/// Labels are matched to sentences purely by position, so any response whose
/// length differs from the request is rejected.
pub struct HttpDifficultyClassifier {
    client: reqwest::Client,
    endpoint: String,
    verify_echo: bool,
}

impl HttpDifficultyClassifier {
    pub fn new(settings: &ClassifierSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds.max(1)))
            .build()
            .map_err(|e| ShadowifyError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            verify_echo: settings.verify_echo,
        })
    }
}

#[async_trait]
impl DifficultyClassifier for HttpDifficultyClassifier {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Requesting difficulty for {} sentences", texts.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&PredictRequest { sentences: texts })
            .send()
            .await
            .map_err(|e| ShadowifyError::Classification(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShadowifyError::Classification(format!(
                "prediction service returned {}: {}",
                status,
                body.trim()
            )));
        }

        let predictions: Vec<Prediction> = response
            .json()
            .await
            .map_err(|e| ShadowifyError::Classification(format!("undecodable response: {e}")))?;

        align_labels(texts, predictions, self.verify_echo)
    }
}

/// Check the response lines up with the request and extract the labels.
pub(crate) fn align_labels(
    texts: &[String],
    predictions: Vec<Prediction>,
    verify_echo: bool,
) -> Result<Vec<String>> {
    if predictions.len() != texts.len() {
        return Err(ShadowifyError::Classification(format!(
            "expected {} labels, got {}",
            texts.len(),
            predictions.len()
        )));
    }

    if verify_echo {
        if let Some((idx, _)) = texts
            .iter()
            .zip(&predictions)
            .enumerate()
            .find(|(_, (text, p))| text.trim() != p.sentence.trim())
        {
            return Err(ShadowifyError::Classification(format!(
                "response item {} echoes a different sentence",
                idx
            )));
        }
    }

    Ok(predictions.into_iter().map(|p| p.cefr).collect())
}
