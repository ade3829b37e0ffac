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

//! Drives the sampler from a device callback of arbitrary size.

use crossbeam_channel::Receiver;
use midly::MidiMessage;

use crate::sampler::{MidiEvent, Sampler};

/// Most MIDI messages applied per block. Anything beyond waits for the next block.
pub const MAX_EVENTS_PER_BLOCK: usize = 256;

/// Splits device buffers into fixed size blocks and feeds incoming MIDI to the sampler
/// at the start of each block. All buffers are allocated up front.
pub struct BlockRenderer {
    sampler: Sampler,
    midi_rx: Receiver<MidiMessage>,
    events: Vec<MidiEvent>,
    scratch: Vec<f32>,
    channels: usize,
    block_size: usize,
}

impl BlockRenderer {
    pub fn new(
        mut sampler: Sampler,
        midi_rx: Receiver<MidiMessage>,
        sample_rate: u32,
        channels: usize,
        block_size: usize,
    ) -> BlockRenderer {
        let channels = channels.max(1);
        let block_size = block_size.max(1);
        sampler.prepare(sample_rate, block_size);
        BlockRenderer {
            sampler,
            midi_rx,
            events: Vec::with_capacity(MAX_EVENTS_PER_BLOCK),
            scratch: vec![0.0; block_size * channels],
            channels,
            block_size,
        }
    }

    /// Fills an interleaved device buffer, converting to the device sample type.
    pub fn process<T, F>(&mut self, output: &mut [T], convert: F)
    where
        F: Fn(f32) -> T,
    {
        let chunk_len = self.block_size * self.channels;
        for chunk in output.chunks_mut(chunk_len) {
            self.events.clear();
            while self.events.len() < MAX_EVENTS_PER_BLOCK {
                match self.midi_rx.try_recv() {
                    Ok(message) => self.events.push(MidiEvent::new(0, message)),
                    Err(_) => break,
                }
            }

            let scratch = &mut self.scratch[..chunk.len()];
            self.sampler.render(&self.events, scratch, self.channels);
            for (out, value) in chunk.iter_mut().zip(scratch.iter()) {
                *out = convert(*value);
            }
        }
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use midly::num::u7;

    use super::*;
    use crate::testutil::StubDecoder;

    #[test]
    fn test_process_splits_into_blocks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("C4_100_1.wav"), "ok").unwrap();

        let (sampler, handle) = Sampler::new(Arc::new(StubDecoder::new(6)));
        handle.load_library_blocking(dir.path());
        let (midi_tx, midi_rx) = crossbeam_channel::bounded(16);
        let mut renderer = BlockRenderer::new(sampler, midi_rx, 44100, 2, 4);

        midi_tx
            .send(MidiMessage::NoteOn {
                key: u7::from(60),
                vel: u7::from(100),
            })
            .unwrap();

        // A 10 frame stereo buffer is three blocks of 4, 4 and 2 frames.
        let mut output = vec![0i32; 20];
        renderer.process(&mut output, |v| (v * 100.0) as i32);

        assert!(output[..12].iter().all(|v| *v == 50));
        assert!(output[12..].iter().all(|v| *v == 0));
        assert!(handle.keyboard().is_note_on(60));
        assert_eq!(renderer.sampler().block_size(), 4);
    }

    #[test]
    fn test_process_without_events() {
        let (sampler, _handle) = Sampler::new(Arc::new(StubDecoder::new(6)));
        let (_midi_tx, midi_rx) = crossbeam_channel::bounded(16);
        let mut renderer = BlockRenderer::new(sampler, midi_rx, 44100, 1, 8);

        let mut output = vec![1.0f32; 8];
        renderer.process(&mut output, |v| v);
        assert!(output.iter().all(|v| *v == 0.0));
    }
}
