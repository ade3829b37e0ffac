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

//! Voice allocation, stealing and mixing for polyphonic sample playback.

use std::fmt;
use std::sync::Arc;

use super::collector::Retirer;
use crate::library::Sample;

/// Maximum number of simultaneously sounding voices.
pub const MAX_VOICES: usize = 32;

/// A single playing sample.
#[derive(Default)]
pub struct Voice {
    /// The sample being played. `None` when the voice is idle.
    sample: Option<Arc<Sample>>,
    /// Play-head in frames.
    position: usize,
    /// The note that triggered this voice.
    note: u8,
}

impl Voice {
    pub fn is_active(&self) -> bool {
        self.sample.is_some()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn sample(&self) -> Option<&Arc<Sample>> {
        self.sample.as_ref()
    }

    /// Mixes up to `frames` frames of this voice into `output`. Returns false once the
    /// sample has been played to its end.
    #[inline]
    fn mix_into(&mut self, output: &mut [f32], channels: usize, frames: usize) -> bool {
        let Some(sample) = self.sample.as_ref() else {
            return false;
        };

        let sample_channels = usize::from(sample.channel_count());
        if sample_channels == 0 {
            return false;
        }

        let remaining = sample.len().saturating_sub(self.position);
        let count = remaining.min(frames);
        let source = sample.frames_from(self.position);

        // Output channels beyond the sample's channel count reuse its last channel.
        for (out, src) in output
            .chunks_exact_mut(channels)
            .zip(source.chunks_exact(sample_channels))
            .take(count)
        {
            for (ch, value) in out.iter_mut().enumerate() {
                *value += src[ch.min(sample_channels - 1)];
            }
        }

        self.position += count;
        self.position < sample.len()
    }
}

/// A fixed pool of voices. Nothing here allocates after construction.
pub struct VoicePool {
    voices: Vec<Voice>,
    retirer: Retirer,
}

/// What happened when a sample was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// An idle voice was used.
    Free(usize),
    /// An active voice was stolen.
    Stolen(usize),
}

impl Allocation {
    pub fn voice(&self) -> usize {
        match self {
            Allocation::Free(index) | Allocation::Stolen(index) => *index,
        }
    }
}

impl VoicePool {
    /// Creates a pool of [`MAX_VOICES`] idle voices.
    pub fn new(retirer: Retirer) -> VoicePool {
        VoicePool::with_capacity(MAX_VOICES, retirer)
    }

    pub fn with_capacity(capacity: usize, retirer: Retirer) -> VoicePool {
        VoicePool {
            voices: (0..capacity).map(|_| Voice::default()).collect(),
            retirer,
        }
    }

    /// Starts playing a sample from its first frame.
    ///
    /// The first idle voice is used. If every voice is busy, the one that has played
    /// the furthest is stolen; ties go to the lowest voice index.
    pub fn trigger(&mut self, sample: Arc<Sample>, note: u8) -> Option<Allocation> {
        let allocation = match self.voices.iter().position(|voice| !voice.is_active()) {
            Some(index) => Allocation::Free(index),
            None => {
                let mut victim = 0;
                for (index, voice) in self.voices.iter().enumerate() {
                    if voice.position > self.voices[victim].position {
                        victim = index;
                    }
                }
                Allocation::Stolen(victim)
            }
        };

        let voice = self.voices.get_mut(allocation.voice())?;
        if let Some(previous) = voice.sample.replace(sample) {
            self.retirer.retire_sample(previous);
        }
        voice.position = 0;
        voice.note = note;

        Some(allocation)
    }

    /// Adds every active voice into `output`, an interleaved buffer with `channels`
    /// channels. The buffer is not cleared first.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let frames = output.len() / channels;

        for voice in self.voices.iter_mut() {
            if !voice.is_active() {
                continue;
            }
            if !voice.mix_into(output, channels, frames) {
                if let Some(sample) = voice.sample.take() {
                    self.retirer.retire_sample(sample);
                }
                voice.position = 0;
            }
        }
    }

    /// Silences every voice.
    pub fn reset(&mut self) {
        for voice in self.voices.iter_mut() {
            if let Some(sample) = voice.sample.take() {
                self.retirer.retire_sample(sample);
            }
            voice.position = 0;
        }
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_active()).count()
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }
}

impl fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePool")
            .field("active_voices", &self.active_count())
            .field("max_voices", &self.voices.len())
            .finish()
    }
}
