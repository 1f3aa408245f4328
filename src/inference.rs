use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{InferenceConfig, VoiceReference};
use crate::dialogue::Turn;

/// Body sent to the text-to-speech model.
#[derive(Debug, Serialize)]
pub struct RequestPayload<'a> {
    pub dialogue: &'a [Turn],
    pub role_mapping: &'a BTreeMap<String, VoiceReference>,
}

/// Turns a dialogue into speech. Implementations return the audio as a
/// base64 string in whatever compressed container the model produces.
pub trait Synthesizer {
    async fn synthesize(&self, request: &RequestPayload<'_>) -> Result<String>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Bare(String),
    Wrapped { audio: String },
}

impl InferenceResponse {
    fn into_audio(self) -> String {
        match self {
            Self::Bare(audio) | Self::Wrapped { audio } => audio,
        }
    }
}

pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSynthesizer {
    pub fn new(config: &InferenceConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, request: &RequestPayload<'_>) -> Result<String> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to inference server")?
            .error_for_status()
            .context("Inference server error")?;

        let body: InferenceResponse = response
            .json()
            .await
            .context("Failed to parse inference response")?;

        Ok(body.into_audio())
    }
}
