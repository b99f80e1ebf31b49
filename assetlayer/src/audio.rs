//! Audio assets.
//!
//! Loading an audio file only probes its WAV header; the record keeps the
//! encoded bytes. Clips shorter than the decompress limit are decoded to
//! interleaved `f32` samples in a later post-processing pass, so short
//! sound effects can be played without decoding on the audio thread.

use std::fmt;
use std::io::Cursor;
use std::time::Duration;

use bytes::Bytes;
use hound::{SampleFormat, WavReader};

use crate::error::{AssetError, AssetResult};

/// A loaded audio clip.
#[derive(Clone)]
pub struct Audio {
    encoded: Bytes,
    channels: u16,
    sample_rate: u32,
    frames: u32,
    samples: Option<Vec<f32>>,
}

impl Audio {
    /// Read the WAV header of `encoded`.
    pub fn probe(path: &str, encoded: Bytes) -> AssetResult<Self> {
        let reader =
            WavReader::new(Cursor::new(encoded.clone())).map_err(|e| AssetError::malformed(path, e))?;
        let spec = reader.spec();

        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(AssetError::malformed(path, "WAV header has no channels or rate"));
        }

        Ok(Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            frames: reader.duration(),
            encoded,
            samples: None,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sample frames per channel.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }

    /// The encoded file content.
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// Decoded interleaved samples, if this clip was decompressed.
    pub fn samples(&self) -> Option<&[f32]> {
        self.samples.as_deref()
    }

    pub fn is_decompressed(&self) -> bool {
        self.samples.is_some()
    }

    /// A copy of this clip with its samples decoded.
    pub fn decompress(&self, path: &str) -> AssetResult<Audio> {
        let samples = match &self.samples {
            Some(samples) => samples.clone(),
            None => self.decode_samples(path)?,
        };
        Ok(Audio {
            samples: Some(samples),
            ..self.clone()
        })
    }

    /// Decode every sample to `f32` in `[-1.0, 1.0]`.
    pub fn decode_samples(&self, path: &str) -> AssetResult<Vec<f32>> {
        let mut reader = WavReader::new(Cursor::new(self.encoded.clone()))
            .map_err(|e| AssetError::malformed(path, e))?;
        let spec = reader.spec();

        let samples: Result<Vec<f32>, _> = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect(),
            SampleFormat::Int => {
                let max_value = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 / max_value))
                    .collect()
            }
        };

        samples.map_err(|e| AssetError::malformed(path, format!("bad WAV samples: {}", e)))
    }
}

impl fmt::Debug for Audio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audio")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames)
            .field("encoded_len", &self.encoded.len())
            .field("decompressed", &self.is_decompressed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    /// Encode a 16-bit WAV with `frames` sample frames of a ramp.
    fn wav_bytes(channels: u16, sample_rate: u32, frames: u32) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buffer, spec).unwrap();
            for i in 0..frames * channels as u32 {
                writer.write_sample((i % 100) as i16 * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_probe_reads_header_only() {
        let audio = Audio::probe("/a.wav", Bytes::from(wav_bytes(2, 8000, 4000))).unwrap();
        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.sample_rate(), 8000);
        assert_eq!(audio.frames(), 4000);
        assert_eq!(audio.duration(), Duration::from_millis(500));
        assert!(!audio.is_decompressed());
        assert!(audio.samples().is_none());
    }

    #[test]
    fn test_decompress_scales_samples() {
        let audio = Audio::probe("/a.wav", Bytes::from(wav_bytes(1, 100, 3))).unwrap();
        let decompressed = audio.decompress("/a.wav").unwrap();

        let samples = decompressed.samples().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[2] - 200.0 / 32768.0).abs() < f32::EPSILON);
        assert_eq!(decompressed.encoded(), audio.encoded());
    }

    #[test]
    fn test_probe_rejects_garbage() {
        let result = Audio::probe("/bad.wav", Bytes::from_static(&[0, 1, 2, 3, 4]));
        assert!(matches!(result, Err(AssetError::Malformed { .. })));
    }
}
