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

use std::{
    error::Error,
    fs::{self, File},
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::library::{DecodeError, DecodedAudio, Sample, SampleDecoder, SampleName};

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Creates an in-memory sample from interleaved data.
pub fn interleaved_sample(
    note: u8,
    velocity: u8,
    round_robin: u8,
    channels: u16,
    samples: Vec<f32>,
) -> Sample {
    Sample::new(
        SampleName {
            note,
            velocity,
            round_robin,
        },
        DecodedAudio {
            channels,
            sample_rate: 44100,
            samples,
        },
        PathBuf::from(format!("{}_{}_{}.wav", note, velocity, round_robin)),
    )
}

/// Creates a mono sample of the given length filled with `value`.
pub fn sample(note: u8, velocity: u8, round_robin: u8, frames: usize, value: f32) -> Sample {
    interleaved_sample(note, velocity, round_robin, 1, vec![value; frames])
}

/// Writes a 32 bit float WAV file. Each inner vector is one channel.
pub fn write_wav(
    path: &Path,
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let num_channels = channels.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);

    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    for frame in 0..frames {
        for channel in &channels {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// A decoder that does not look at audio content. Any readable file decodes to a mono
/// buffer of `frames` samples at 0.5, unless its content is [`StubDecoder::CORRUPT`].
pub struct StubDecoder {
    frames: usize,
}

impl StubDecoder {
    pub const CORRUPT: &'static str = "corrupt";

    pub fn new(frames: usize) -> StubDecoder {
        StubDecoder { frames }
    }
}

impl SampleDecoder for StubDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError> {
        let content = fs::read(path)?;
        if content == Self::CORRUPT.as_bytes() {
            return Err(DecodeError::NoChannels(path.display().to_string()));
        }
        Ok(DecodedAudio {
            channels: 1,
            sample_rate: 44100,
            samples: vec![0.5; self.frames],
        })
    }
}
