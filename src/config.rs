use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "dialogue-to-speech.toml";

/// Reference recording used to clone a speaker's voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceReference {
    #[serde(rename = "ref_audio", alias = "reference_audio")]
    pub reference_audio: PathBuf,
    #[serde(rename = "ref_text", alias = "reference_text")]
    pub reference_text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/inference".to_owned(),
            timeout_secs: 600,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Silence added before and after each synthesized clip.
    pub padding_ms: u64,
    /// Container hint for the synthesized audio; the actual format is probed.
    pub source_format: String,
    pub inference: InferenceConfig,
    pub voices: BTreeMap<String, VoiceReference>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("claimJson"),
            output_dir: PathBuf::from("output"),
            padding_ms: 300,
            source_format: "mp3".to_owned(),
            inference: InferenceConfig::default(),
            voices: default_voices(),
        }
    }
}

impl Config {
    pub fn padding(&self) -> Duration {
        Duration::from_millis(self.padding_ms)
    }

    /// Loads the configuration from `path`, or from the default location when
    /// none is given. Only an explicitly requested file has to exist.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read config file {}", path.display()));
            }
        };

        toml::from_str(&contents).context("Failed to parse config TOML")
    }
}

fn default_voices() -> BTreeMap<String, VoiceReference> {
    BTreeMap::from([
        (
            "0".to_owned(),
            VoiceReference {
                reference_audio: PathBuf::from("./en_prompt0.wav"),
                reference_text: "Yeah, no, this is my backyard. It's never ending so just the way I like it. So social distancing has never been a problem.".to_owned(),
            },
        ),
        (
            "1".to_owned(),
            VoiceReference {
                reference_audio: PathBuf::from("./en_prompt1.wav"),
                reference_text: "I'm doing great and, look, it couldn't be any better than having you at your set, which is the outdoors.".to_owned(),
            },
        ),
    ])
}
