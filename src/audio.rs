use anyhow::{Context, Result, bail};
use base64::Engine;
use std::io::Cursor;
use std::time::Duration;

/// Decodes the base64 envelope returned by the model. A `data:` URL prefix
/// is accepted and dropped.
pub fn decode_envelope(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let encoded = encoded.trim();
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    base64::engine::general_purpose::STANDARD.decode(encoded)
}

/// Interleaved f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub sample_rate: u32,
    pub channels: usize,
    pub samples: Vec<f32>,
}

impl Pcm {
    /// Decodes compressed audio. The container is probed from the bytes;
    /// `hint` is only a file extension that speeds up the probe.
    pub fn decode(bytes: Vec<u8>, hint: &str) -> Result<Self> {
        use symphonia::core::audio::SampleBuffer;
        use symphonia::core::codecs::DecoderOptions;
        use symphonia::core::errors::Error as SymphoniaError;
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut probe_hint = Hint::new();
        probe_hint.with_extension(hint);

        let probed = symphonia::default::get_probe()
            .format(
                &probe_hint,
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("Failed to detect audio format")?;

        let mut format = probed.format;
        let track = format.default_track().context("No audio track found")?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;

        let mut pcm: Option<Self> = None;
        let mut buffer: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(err) => return Err(err).context("Failed to read audio packet"),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(err)) => {
                    tracing::warn!(%err, "Skipping corrupt audio packet");
                    continue;
                }
                Err(err) => return Err(err).context("Failed to decode audio packet"),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            let required = frames * spec.channels.count();
            if buffer
                .as_ref()
                .is_none_or(|buffer| buffer.capacity() < required)
            {
                buffer = Some(SampleBuffer::new(frames as u64, spec));
            }
            let Some(buffer) = buffer.as_mut() else {
                continue;
            };
            buffer.copy_interleaved_ref(decoded);

            let pcm = pcm.get_or_insert_with(|| Self {
                sample_rate: spec.rate,
                channels: spec.channels.count(),
                samples: Vec::new(),
            });
            if pcm.channels != spec.channels.count() || pcm.sample_rate != spec.rate {
                bail!("Audio stream changes layout mid-stream");
            }
            pcm.samples.extend_from_slice(buffer.samples());
        }

        pcm.context("Audio stream contains no decodable frames")
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    fn frames_for(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }

    /// Surrounds the clip with `duration` of silence on each side.
    pub fn pad_silence(&mut self, duration: Duration) {
        let pad = self.frames_for(duration) * self.channels;
        if pad == 0 {
            return;
        }

        let mut samples = Vec::with_capacity(self.samples.len() + 2 * pad);
        samples.resize(pad, 0.0);
        samples.extend_from_slice(&self.samples);
        samples.resize(samples.len() + pad, 0.0);
        self.samples = samples;
    }

    /// Encodes as 16-bit PCM WAV.
    pub fn encode_wav(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: u16::try_from(self.channels).context("Too many audio channels")?,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for &sample in &self.samples {
            let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer
                .write_sample(scaled)
                .context("Failed to write WAV sample")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;

        Ok(cursor.into_inner())
    }
}
