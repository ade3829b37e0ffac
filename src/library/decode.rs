// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decoding of audio files into memory.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

/// Error types for decoding sample files.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio file error: {0}")]
    Audio(#[from] SymphoniaError),

    #[error("No audio track found in {0}")]
    NoTrack(String),

    #[error("Sample rate not specified for {0}")]
    UnknownSampleRate(String),

    #[error("No audio channels in {0}")]
    NoChannels(String),
}

/// A fully decoded audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Number of interleaved channels.
    pub channels: u16,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved samples scaled to [-1.0, 1.0].
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }
}

/// Turns a file on disk into PCM frames. Loading calls this from worker threads.
pub trait SampleDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError>;
}

/// Decodes WAV, AIFF, FLAC, MP3 and anything else symphonia supports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SampleDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError> {
        // Include the path in errors so the user can see which file failed.
        let file = File::open(path)
            .map_err(|e| std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let file_name = path.display().to_string();
        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::NoTrack(file_name.clone()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| DecodeError::UnknownSampleRate(file_name.clone()))?;
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs().make(&track.codec_params, &decoder_opts)?;

        let mut samples = Vec::new();
        while let Some(packet) = next_packet(format_reader.as_mut())? {
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // A corrupt packet is skipped rather than failing the whole file.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(path = %file_name, error = %e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            if decoded.frames() == 0 {
                continue;
            }
            // Containers without channel metadata report it on the first buffer.
            if channels == 0 {
                channels = spec.channels.count() as u16;
            }
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        if channels == 0 {
            return Err(DecodeError::NoChannels(file_name));
        }

        Ok(DecodedAudio {
            channels,
            sample_rate,
            samples,
        })
    }
}

/// Reads the next packet, mapping the various end-of-stream signals to `None`.
fn next_packet(format_reader: &mut dyn FormatReader) -> Result<Option<Packet>, DecodeError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) => return Ok(Some(packet)),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            // Some readers report end of stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => return Ok(None),
            Err(SymphoniaError::ResetRequired) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_decode_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("C4_100_1.wav");
        write_wav(
            &path,
            vec![vec![0.5, 0.25, -0.5], vec![-1.0, 0.0, 1.0]],
            48000,
        )
        .unwrap();

        let audio = SymphoniaDecoder.decode(&path).unwrap();
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.sample_rate, 48000);
        assert_eq!(audio.frames(), 3);
        assert_eq!(audio.samples, vec![0.5, -1.0, 0.25, 0.0, -0.5, 1.0]);
    }

    #[test]
    fn test_decode_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SymphoniaDecoder.decode(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_decode_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("C4_100_1.wav");
        std::fs::write(&path, b"this is not a wav file").unwrap();
        assert!(SymphoniaDecoder.decode(&path).is_err());
    }

    #[test]
    fn test_frames_without_channels() {
        let audio = DecodedAudio {
            channels: 0,
            sample_rate: 44100,
            samples: vec![0.0; 4],
        };
        assert_eq!(audio.frames(), 0);
    }
}
