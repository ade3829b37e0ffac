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

//! Sample engine that coordinates sample resolution and playback.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::collector::{Retired, Retirer};
use super::voice::{Allocation, VoicePool};
use crate::library::LibraryIndex;

/// Counters updated by the audio thread and read from anywhere.
#[derive(Debug, Default)]
pub struct EngineStats {
    active_voices: AtomicUsize,
    triggers: AtomicU64,
    dropped_triggers: AtomicU64,
    steals: AtomicU64,
    library_swaps: AtomicU64,
}

impl EngineStats {
    /// Number of voices that were sounding at the end of the last block.
    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    /// Number of samples started.
    pub fn triggers(&self) -> u64 {
        self.triggers.load(Ordering::Relaxed)
    }

    /// Number of note-ons that had no sample to play.
    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers.load(Ordering::Relaxed)
    }

    /// Number of triggers that had to take over a sounding voice.
    pub fn steals(&self) -> u64 {
        self.steals.load(Ordering::Relaxed)
    }

    /// Number of library indexes the audio thread has switched to.
    pub fn library_swaps(&self) -> u64 {
        self.library_swaps.load(Ordering::Relaxed)
    }
}

/// The sample engine owns the current library index and the voice pool. It lives on
/// the audio thread.
pub struct SampleEngine {
    /// The index used to resolve samples.
    index: Arc<LibraryIndex>,
    /// New indexes published by the loader.
    updates: Receiver<Arc<LibraryIndex>>,
    voices: VoicePool,
    retirer: Retirer,
    stats: Arc<EngineStats>,
}

impl SampleEngine {
    /// Creates a new sample engine with an empty library.
    pub fn new(
        updates: Receiver<Arc<LibraryIndex>>,
        retirer: Retirer,
        stats: Arc<EngineStats>,
    ) -> SampleEngine {
        SampleEngine {
            index: Arc::new(LibraryIndex::default()),
            updates,
            voices: VoicePool::new(retirer.clone()),
            retirer,
            stats,
        }
    }

    /// Switches to the most recently published library, if any. The replaced index is
    /// handed to the collector. Voices keep playing the samples they hold.
    pub fn poll_library(&mut self) -> bool {
        let mut swapped = false;
        while let Ok(index) = self.updates.try_recv() {
            let previous = std::mem::replace(&mut self.index, index);
            self.retirer.retire(Retired::Index(previous));
            self.stats.library_swaps.fetch_add(1, Ordering::Relaxed);
            swapped = true;
        }
        swapped
    }

    /// Starts the sample for a note, velocity and round robin slot. Returns false if
    /// nothing is mapped.
    pub fn note_on(&mut self, note: u8, velocity: u8, round_robin: u8) -> bool {
        let Some(sample) = self.index.resolve(note, velocity, round_robin) else {
            self.stats.dropped_triggers.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match self.voices.trigger(Arc::clone(sample), note) {
            Some(allocation) => {
                if let Allocation::Stolen(_) = allocation {
                    self.stats.steals.fetch_add(1, Ordering::Relaxed);
                }
                self.stats.triggers.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .active_voices
                    .store(self.voices.active_count(), Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Samples always play to completion, so releasing a note does nothing.
    pub fn note_off(&mut self, _note: u8) {}

    /// Position of the velocity layer a note and velocity select in the current index.
    pub fn velocity_layer_index(&self, note: u8, velocity: u8) -> Option<usize> {
        self.index.velocity_layer_index(note, velocity)
    }

    /// Mixes all active voices into an interleaved buffer. The buffer is not cleared.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        self.voices.render(output, channels);
        self.stats
            .active_voices
            .store(self.voices.active_count(), Ordering::Relaxed);
    }

    /// Silences all voices.
    pub fn prepare(&mut self) {
        self.voices.reset();
        self.stats.active_voices.store(0, Ordering::Relaxed);
    }

    pub fn index(&self) -> &Arc<LibraryIndex> {
        &self.index
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }
}

impl std::fmt::Debug for SampleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleEngine")
            .field("index", &self.index)
            .field("voices", &self.voices)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::Sender;

    use super::*;
    use crate::library::IndexBuilder;
    use crate::samples::collector::{collector, Collector};
    use crate::samples::MAX_VOICES;
    use crate::testutil::sample;

    struct Fixture {
        engine: SampleEngine,
        updates: Sender<Arc<LibraryIndex>>,
        collector: Collector,
        stats: Arc<EngineStats>,
    }

    fn fixture() -> Fixture {
        let (updates, rx) = crossbeam_channel::bounded(4);
        let (retirer, collector) = collector(256);
        let stats = Arc::new(EngineStats::default());
        Fixture {
            engine: SampleEngine::new(rx, retirer, stats.clone()),
            updates,
            collector,
            stats,
        }
    }

    fn index(samples: &[(u8, u8, u8, usize)]) -> Arc<LibraryIndex> {
        let mut builder = IndexBuilder::new();
        for &(note, velocity, rr, frames) in samples {
            builder.insert(sample(note, velocity, rr, frames, 0.5));
        }
        Arc::new(builder.build(None))
    }

    #[test]
    fn test_note_on_without_library_is_dropped() {
        let mut f = fixture();
        assert!(!f.engine.note_on(60, 100, 1));
        assert_eq!(f.stats.dropped_triggers(), 1);
        assert_eq!(f.stats.triggers(), 0);
        assert_eq!(f.engine.active_voices(), 0);
    }

    #[test]
    fn test_poll_library_swaps_and_retires() {
        let mut f = fixture();
        assert!(!f.engine.poll_library());

        f.updates.send(index(&[(60, 100, 1, 100)])).unwrap();
        assert!(f.engine.poll_library());
        assert_eq!(f.stats.library_swaps(), 1);
        assert_eq!(f.engine.index().sample_count(), 1);
        // The empty starting index was retired.
        assert_eq!(f.collector.collect(), 1);

        assert!(f.engine.note_on(60, 100, 1));
        assert_eq!(f.stats.triggers(), 1);
        assert_eq!(f.stats.active_voices(), 1);
    }

    #[test]
    fn test_poll_library_takes_latest() {
        let mut f = fixture();
        f.updates.send(index(&[(60, 100, 1, 100)])).unwrap();
        f.updates.send(index(&[(62, 100, 1, 100)])).unwrap();

        f.engine.poll_library();
        assert!(f.engine.index().mapping(62).unwrap().is_sampled());
        assert!(f.engine.index().mapping(60).unwrap().fallback() == Some(62));
        assert_eq!(f.stats.library_swaps(), 2);
    }

    #[test]
    fn test_voice_outlives_library_swap() {
        let mut f = fixture();
        f.updates.send(index(&[(60, 100, 1, 1000)])).unwrap();
        f.engine.poll_library();
        f.engine.note_on(60, 100, 1);

        f.updates.send(Arc::new(LibraryIndex::default())).unwrap();
        f.engine.poll_library();
        f.collector.collect();

        let mut output = vec![0.0; 64];
        f.engine.render(&mut output, 1);
        assert!(output.iter().all(|v| *v == 0.5));
        assert!(!f.engine.note_on(60, 100, 1));
    }

    #[test]
    fn test_steal_counted() {
        let mut f = fixture();
        f.updates.send(index(&[(60, 100, 1, 1000)])).unwrap();
        f.engine.poll_library();

        for _ in 0..MAX_VOICES {
            assert!(f.engine.note_on(60, 100, 1));
        }
        assert_eq!(f.stats.steals(), 0);
        assert!(f.engine.note_on(60, 100, 1));
        assert_eq!(f.stats.steals(), 1);
        assert_eq!(f.stats.triggers(), MAX_VOICES as u64 + 1);
        assert_eq!(f.stats.active_voices(), MAX_VOICES);
    }

    #[test]
    fn test_prepare_silences() {
        let mut f = fixture();
        f.updates.send(index(&[(60, 100, 1, 1000)])).unwrap();
        f.engine.poll_library();
        f.engine.note_on(60, 100, 1);
        f.engine.note_off(60);
        assert_eq!(f.engine.active_voices(), 1);

        f.engine.prepare();
        assert_eq!(f.engine.active_voices(), 0);
        assert_eq!(f.stats.active_voices(), 0);
    }
}
