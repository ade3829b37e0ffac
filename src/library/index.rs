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

//! The note -> velocity layer -> round robin index.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::decode::DecodedAudio;
use super::filename::{note_name, SampleName, ROUND_ROBINS};

/// Number of MIDI notes.
pub const NUM_NOTES: usize = 128;

/// A decoded sample held in memory for the lifetime of a library.
/// Voices share it through an `Arc`, so it is never copied during playback.
pub struct Sample {
    /// Interleaved sample data.
    data: Vec<f32>,
    channel_count: u16,
    frames: usize,
    sample_rate: u32,
    name: SampleName,
    path: PathBuf,
}

impl Sample {
    /// Creates a new sample from decoded audio.
    pub fn new(name: SampleName, audio: DecodedAudio, path: PathBuf) -> Sample {
        let frames = audio.frames();
        Sample {
            data: audio.samples,
            channel_count: audio.channels,
            frames,
            sample_rate: audio.sample_rate,
            name,
            path,
        }
    }

    /// Returns the interleaved data starting at the given frame.
    #[inline]
    pub fn frames_from(&self, frame: usize) -> &[f32] {
        let start = (frame * usize::from(self.channel_count)).min(self.data.len());
        &self.data[start..]
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn note(&self) -> u8 {
        self.name.note
    }

    pub fn velocity(&self) -> u8 {
        self.name.velocity
    }

    pub fn round_robin(&self) -> u8 {
        self.name.round_robin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("name", &self.name)
            .field("channels", &self.channel_count)
            .field("frames", &self.frames)
            .field("sample_rate", &self.sample_rate)
            .field("path", &self.path)
            .finish()
    }
}

/// One velocity tier of a note.
#[derive(Clone, Debug)]
pub struct VelocityLayer {
    /// The velocity value from the file name.
    velocity: u8,
    /// Lowest velocity that selects this layer.
    range_start: u8,
    /// Highest velocity that selects this layer.
    range_end: u8,
    /// Round robin slots 1-3, stored at index 0-2.
    round_robins: [Option<Arc<Sample>>; ROUND_ROBINS as usize],
}

impl VelocityLayer {
    fn new(velocity: u8) -> VelocityLayer {
        VelocityLayer {
            velocity,
            range_start: velocity,
            range_end: velocity,
            round_robins: Default::default(),
        }
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// The inclusive velocity range covered by this layer.
    pub fn range(&self) -> (u8, u8) {
        (self.range_start, self.range_end)
    }

    #[inline]
    pub fn contains(&self, velocity: u8) -> bool {
        (self.range_start..=self.range_end).contains(&velocity)
    }

    /// Returns the sample in the given round robin slot (1-3), without fallback.
    pub fn round_robin(&self, slot: u8) -> Option<&Arc<Sample>> {
        let index = usize::from(slot).checked_sub(1)?;
        self.round_robins.get(index)?.as_ref()
    }

    /// Iterates over the populated round robin slots as (slot, sample).
    pub fn samples(&self) -> impl Iterator<Item = (u8, &Arc<Sample>)> {
        self.round_robins
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i as u8 + 1, s)))
    }
}

/// All samples for a single MIDI note, or a pointer to the note that stands in for it.
#[derive(Clone, Debug)]
pub struct NoteMapping {
    note: u8,
    /// Sorted ascending by velocity.
    layers: Vec<VelocityLayer>,
    /// The nearest higher note with samples, if this note has none.
    fallback: Option<u8>,
}

impl NoteMapping {
    fn new(note: u8) -> NoteMapping {
        NoteMapping {
            note,
            layers: Vec::new(),
            fallback: None,
        }
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn layers(&self) -> &[VelocityLayer] {
        &self.layers
    }

    pub fn fallback(&self) -> Option<u8> {
        self.fallback
    }

    /// Returns true if this note has samples of its own.
    pub fn is_sampled(&self) -> bool {
        !self.layers.is_empty()
    }

    fn insert(&mut self, name: SampleName, sample: Arc<Sample>) {
        let slot = usize::from(name.round_robin - 1);
        let layer = match self
            .layers
            .iter()
            .position(|layer| layer.velocity == name.velocity)
        {
            Some(position) => &mut self.layers[position],
            None => {
                self.layers.push(VelocityLayer::new(name.velocity));
                let last = self.layers.len() - 1;
                &mut self.layers[last]
            }
        };
        // The later file wins when two files share note, velocity and round robin.
        layer.round_robins[slot] = Some(sample);
    }

    /// Sorts the layers and makes each one cover everything above the previous layer.
    fn build_velocity_ranges(&mut self) {
        self.layers.sort_by_key(|layer| layer.velocity);
        let mut range_start = 1;
        for layer in self.layers.iter_mut() {
            layer.range_start = range_start;
            layer.range_end = layer.velocity;
            range_start = layer.velocity.saturating_add(1);
        }
    }
}

/// Collects samples for a library before the index is finalized.
#[derive(Default)]
pub struct IndexBuilder {
    notes: BTreeMap<u8, NoteMapping>,
}

impl IndexBuilder {
    pub fn new() -> IndexBuilder {
        IndexBuilder::default()
    }

    /// Adds a sample. A later sample with the same note, velocity and round robin replaces
    /// the earlier one.
    pub fn insert(&mut self, sample: Sample) {
        let name = sample.name;
        if !(1..=ROUND_ROBINS).contains(&name.round_robin) || usize::from(name.note) >= NUM_NOTES {
            return;
        }
        self.notes
            .entry(name.note)
            .or_insert_with(|| NoteMapping::new(name.note))
            .insert(name, Arc::new(sample));
    }

    /// Computes velocity ranges and note fallbacks and produces the final index.
    pub fn build(mut self, folder: Option<PathBuf>) -> LibraryIndex {
        for mapping in self.notes.values_mut() {
            mapping.build_velocity_ranges();
        }

        let mut notes: Vec<Option<NoteMapping>> = (0..NUM_NOTES).map(|_| None).collect();
        let mut fallbacks = 0;
        let mut nearest_above: Option<u8> = None;
        for note in (0..NUM_NOTES as u8).rev() {
            match self.notes.remove(&note) {
                Some(mapping) => {
                    notes[usize::from(note)] = Some(mapping);
                    nearest_above = Some(note);
                }
                None => {
                    if let Some(fallback) = nearest_above {
                        let mut mapping = NoteMapping::new(note);
                        mapping.fallback = Some(fallback);
                        notes[usize::from(note)] = Some(mapping);
                        fallbacks += 1;
                    }
                }
            }
        }

        // Duplicates replace each other, so count what actually survived.
        let (sample_count, memory_size) = notes
            .iter()
            .flatten()
            .flat_map(|mapping| mapping.layers.iter())
            .flat_map(|layer| layer.samples())
            .fold((0, 0), |(count, memory), (_, sample)| {
                (count + 1, memory + sample.memory_size())
            });

        LibraryIndex {
            notes,
            folder,
            sample_count,
            memory_size,
            fallback_count: fallbacks,
        }
    }
}

/// An immutable, fully built sample library.
pub struct LibraryIndex {
    /// Indexed by MIDI note number.
    notes: Vec<Option<NoteMapping>>,
    folder: Option<PathBuf>,
    sample_count: usize,
    memory_size: usize,
    fallback_count: usize,
}

impl LibraryIndex {
    /// An index with no samples.
    pub fn empty(folder: Option<PathBuf>) -> LibraryIndex {
        IndexBuilder::new().build(folder)
    }

    /// Returns the mapping for a note, if it has samples or a fallback.
    #[inline]
    pub fn mapping(&self, note: u8) -> Option<&NoteMapping> {
        self.notes.get(usize::from(note))?.as_ref()
    }

    /// Iterates over all mapped notes in ascending order.
    pub fn mappings(&self) -> impl Iterator<Item = &NoteMapping> {
        self.notes.iter().flatten()
    }

    /// Returns true if no samples were loaded.
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// The folder this library was loaded from.
    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Number of notes that have samples of their own.
    pub fn sampled_note_count(&self) -> usize {
        self.mappings().filter(|m| m.is_sampled()).count()
    }

    /// Number of notes that borrow samples from a higher note.
    pub fn fallback_count(&self) -> usize {
        self.fallback_count
    }

    /// Returns the total memory used by the samples in bytes.
    pub fn memory_usage(&self) -> usize {
        self.memory_size
    }
}

impl Default for LibraryIndex {
    fn default() -> Self {
        LibraryIndex::empty(None)
    }
}

impl fmt::Debug for LibraryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryIndex")
            .field("folder", &self.folder)
            .field("samples", &self.sample_count)
            .field("sampled_notes", &self.sampled_note_count())
            .field("fallbacks", &self.fallback_count)
            .field("memory_kb", &(self.memory_size / 1024))
            .finish()
    }
}

impl fmt::Display for NoteMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<4} ({:>3})", note_name(self.note), self.note)?;
        if let Some(fallback) = self.fallback {
            return write!(f, " -> {} ({})", note_name(fallback), fallback);
        }
        for layer in &self.layers {
            let (start, end) = layer.range();
            let slots: Vec<String> = (1..=ROUND_ROBINS)
                .map(|rr| match layer.round_robin(rr) {
                    Some(_) => rr.to_string(),
                    None => "-".to_string(),
                })
                .collect();
            write!(f, " [{:>3}-{:>3} rr {}]", start, end, slots.join(""))?;
        }
        Ok(())
    }
}
