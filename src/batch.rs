use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strum::Display;

use crate::audio::{self, Pcm};
use crate::config::Config;
use crate::dialogue::sanitize::{self, ValidationError};
use crate::dialogue::{self, DialogueError};
use crate::inference::{RequestPayload, Synthesizer};

/// Pipeline step a file was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Discover,
    Parse,
    Sanitize,
    Synthesize,
    Decode,
    Save,
}

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("output {output} already belongs to {owner}")]
    DuplicateOutput { output: String, owner: String },

    #[error("failed to read input: {0}")]
    Read(#[source] std::io::Error),

    #[error("malformed input: {0}")]
    Parse(#[from] DialogueError),

    #[error("malformed input: dialogue has no turns")]
    EmptyDialogue,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no voice reference configured for role '{0}'")]
    UnknownVoice(String),

    #[error("inference failed: {0:#}")]
    Inference(#[source] anyhow::Error),

    #[error("invalid base64 audio: {0}")]
    Envelope(#[from] base64::DecodeError),

    #[error("audio codec failed: {0:#}")]
    Codec(#[source] anyhow::Error),

    #[error("failed to write output: {0}")]
    Write(#[source] std::io::Error),
}

impl FileError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::DuplicateOutput { .. } => Stage::Discover,
            Self::Read(_) | Self::Parse(_) | Self::EmptyDialogue => Stage::Parse,
            Self::Validation(_) | Self::UnknownVoice(_) => Stage::Sanitize,
            Self::Inference(_) => Stage::Synthesize,
            Self::Envelope(_) | Self::Codec(_) => Stage::Decode,
            Self::Write(_) => Stage::Save,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Skipped,
    Succeeded { output: PathBuf },
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub name: String,
    pub input: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub reports: Vec<FileReport>,
}

impl Summary {
    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Succeeded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.reports
            .iter()
            .filter(|report| predicate(&report.outcome))
            .count()
    }
}

pub struct Orchestrator<S> {
    config: Config,
    synthesizer: S,
}

impl<S: Synthesizer> Orchestrator<S> {
    pub fn new(config: Config, synthesizer: S) -> Self {
        Self {
            config,
            synthesizer,
        }
    }

    /// Converts every dialogue in the input directory. Only directory setup
    /// errors abort the run; per-file problems end up in the summary.
    pub async fn run(&self) -> Result<Summary> {
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create output directory {}",
                    self.config.output_dir.display()
                )
            })?;

        let inputs = discover_inputs(&self.config.input_dir).await?;
        let mut summary = Summary::default();

        if inputs.is_empty() {
            println!(
                "No JSON files found in '{}'",
                self.config.input_dir.display()
            );
            return Ok(summary);
        }

        let total = inputs.len();
        // Lowercased stem -> file that claimed it first.
        let mut owners: HashMap<String, String> = HashMap::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let index = index + 1;
            let name = input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let output = self.config.output_dir.join(format!("{name}.wav"));

            let outcome = if let Err(err) = claim_output(&mut owners, &name, &input) {
                failure(&name, err)
            } else if is_done(&output).await {
                println!("✓ Skipping {name} (already exists)");
                FileOutcome::Skipped
            } else {
                println!("→ Processing {name} ({index}/{total})…");
                match self.process(&input, &output).await {
                    Ok(()) => {
                        println!("✓ Saved to {}", output.display());
                        tracing::info!(file = %name, output = %output.display(), "Saved");
                        FileOutcome::Succeeded { output }
                    }
                    Err(err) => failure(&name, err),
                }
            };

            summary.reports.push(FileReport {
                name,
                input,
                outcome,
            });
        }

        Ok(summary)
    }

    async fn process(&self, input: &Path, output: &Path) -> Result<(), FileError> {
        let bytes = tokio::fs::read(input).await.map_err(FileError::Read)?;
        let turns = dialogue::parse(&bytes)?;
        if turns.is_empty() {
            return Err(FileError::EmptyDialogue);
        }

        let dialogue = sanitize::sanitize(turns)?;
        if let Some(turn) = dialogue
            .iter()
            .find(|turn| !self.config.voices.contains_key(&turn.role))
        {
            return Err(FileError::UnknownVoice(turn.role.clone()));
        }

        let payload = RequestPayload {
            dialogue: &dialogue,
            role_mapping: &self.config.voices,
        };
        let encoded = self
            .synthesizer
            .synthesize(&payload)
            .await
            .map_err(FileError::Inference)?;

        let compressed = audio::decode_envelope(&encoded)?;
        let wav = self.render(compressed).map_err(FileError::Codec)?;

        write_atomically(output, &wav)
            .await
            .map_err(FileError::Write)
    }

    fn render(&self, compressed: Vec<u8>) -> Result<Vec<u8>> {
        let mut pcm = Pcm::decode(compressed, &self.config.source_format)?;
        tracing::debug!(
            sample_rate = pcm.sample_rate,
            channels = pcm.channels,
            seconds = pcm.duration().as_secs_f32(),
            "Decoded synthesized audio"
        );

        pcm.pad_silence(self.config.padding());
        pcm.encode_wav()
    }
}

fn failure(name: &str, err: FileError) -> FileOutcome {
    let stage = err.stage();
    tracing::error!(file = name, %stage, "{err}");
    println!("❌ Failed {name}: {err}");

    FileOutcome::Failed {
        stage,
        reason: err.to_string(),
    }
}

fn claim_output(
    owners: &mut HashMap<String, String>,
    name: &str,
    input: &Path,
) -> Result<(), FileError> {
    let file_name = input
        .file_name()
        .map(|file_name| file_name.to_string_lossy().into_owned())
        .unwrap_or_default();

    match owners.get(&name.to_lowercase()) {
        Some(owner) => Err(FileError::DuplicateOutput {
            output: format!("{name}.wav"),
            owner: owner.clone(),
        }),
        None => {
            owners.insert(name.to_lowercase(), file_name);
            Ok(())
        }
    }
}

// Any existing output, whatever its size, marks the input as done.
async fn is_done(output: &Path) -> bool {
    tokio::fs::try_exists(output).await.unwrap_or(false)
}

async fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let partial = path.with_extension("wav.part");
    let written = match tokio::fs::write(&partial, contents).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(err) => Err(err),
    };

    if written.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    written
}

async fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "Input directory does not exist");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to list input directory {}", dir.display()));
        }
    };

    let mut inputs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("Failed to read input directory entry")?
    {
        let path = entry.path();
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        if is_json
            && tokio::fs::metadata(&path)
                .await
                .is_ok_and(|metadata| metadata.is_file())
        {
            inputs.push(path);
        }
    }

    inputs.sort();
    Ok(inputs)
}
