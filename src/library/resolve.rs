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

//! Sample lookup. Everything here runs on the audio thread, so it must not allocate.

use std::sync::Arc;

use super::filename::ROUND_ROBINS;
use super::index::{LibraryIndex, NoteMapping, Sample, VelocityLayer};

impl NoteMapping {
    /// Finds the layer whose velocity range contains `velocity`, with its position.
    #[inline]
    pub fn layer_for_velocity(&self, velocity: u8) -> Option<(usize, &VelocityLayer)> {
        let layers = self.layers();
        // Ranges are contiguous and sorted, so the first layer ending at or above the
        // velocity is the only candidate.
        let position = layers.partition_point(|layer| layer.range().1 < velocity);
        layers
            .get(position)
            .filter(|layer| layer.contains(velocity))
            .map(|layer| (position, layer))
    }
}

impl VelocityLayer {
    /// Returns the sample for a round robin slot, falling back to the first populated
    /// slot. Slots outside 1-3 never resolve.
    #[inline]
    pub fn select(&self, round_robin: u8) -> Option<&Arc<Sample>> {
        if !(1..=ROUND_ROBINS).contains(&round_robin) {
            return None;
        }
        self.round_robin(round_robin)
            .or_else(|| (1..=ROUND_ROBINS).find_map(|slot| self.round_robin(slot)))
    }
}

impl LibraryIndex {
    /// Returns the mapping that supplies samples for a note, following its fallback once.
    #[inline]
    pub fn source_mapping(&self, note: u8) -> Option<&NoteMapping> {
        let mapping = self.mapping(note)?;
        match mapping.fallback() {
            Some(fallback) => self.mapping(fallback),
            None => Some(mapping),
        }
    }

    /// Finds the sample to play for a note, velocity and round robin slot.
    #[inline]
    pub fn resolve(&self, note: u8, velocity: u8, round_robin: u8) -> Option<&Arc<Sample>> {
        let (_, layer) = self.source_mapping(note)?.layer_for_velocity(velocity)?;
        layer.select(round_robin)
    }

    /// Returns the position of the velocity layer a note and velocity select.
    #[inline]
    pub fn velocity_layer_index(&self, note: u8, velocity: u8) -> Option<usize> {
        self.source_mapping(note)?
            .layer_for_velocity(velocity)
            .map(|(position, _)| position)
    }
}

#[cfg(test)]
mod tests {
    use crate::library::index::IndexBuilder;
    use crate::testutil::sample;

    use super::*;

    fn build(samples: &[(u8, u8, u8)]) -> LibraryIndex {
        let mut builder = IndexBuilder::new();
        for &(note, velocity, rr) in samples {
            builder.insert(sample(note, velocity, rr, 16, 0.5));
        }
        builder.build(None)
    }

    fn resolved(index: &LibraryIndex, note: u8, velocity: u8, rr: u8) -> Option<(u8, u8, u8)> {
        index
            .resolve(note, velocity, rr)
            .map(|s| (s.note(), s.velocity(), s.round_robin()))
    }

    #[test]
    fn test_resolve_direct() {
        let index = build(&[(60, 40, 1), (60, 90, 1), (60, 127, 1), (60, 127, 2)]);

        assert_eq!(resolved(&index, 60, 1, 1), Some((60, 40, 1)));
        assert_eq!(resolved(&index, 60, 40, 1), Some((60, 40, 1)));
        assert_eq!(resolved(&index, 60, 41, 1), Some((60, 90, 1)));
        assert_eq!(resolved(&index, 60, 91, 2), Some((60, 127, 2)));
        assert_eq!(resolved(&index, 60, 0, 1), None);
    }

    #[test]
    fn test_resolve_velocity_above_top_layer() {
        let index = build(&[(60, 40, 1), (60, 90, 1)]);
        assert_eq!(resolved(&index, 60, 90, 1), Some((60, 90, 1)));
        assert_eq!(resolved(&index, 60, 91, 1), None);
        assert_eq!(resolved(&index, 60, 127, 1), None);
    }

    #[test]
    fn test_resolve_round_robin_fallback() {
        let index = build(&[(60, 100, 1), (60, 100, 3)]);

        assert_eq!(resolved(&index, 60, 100, 1), Some((60, 100, 1)));
        // Slot 2 is empty, so the scan 1, 2, 3 picks slot 1.
        assert_eq!(resolved(&index, 60, 100, 2), Some((60, 100, 1)));
        assert_eq!(resolved(&index, 60, 100, 3), Some((60, 100, 3)));

        let only_third = build(&[(62, 100, 3)]);
        assert_eq!(resolved(&only_third, 62, 100, 1), Some((62, 100, 3)));
    }

    #[test]
    fn test_resolve_invalid_round_robin() {
        let index = build(&[(60, 100, 1), (60, 100, 2), (60, 100, 3)]);
        assert_eq!(resolved(&index, 60, 100, 0), None);
        assert_eq!(resolved(&index, 60, 100, 4), None);
    }

    #[test]
    fn test_resolve_fallback_note() {
        let index = build(&[(48, 100, 1), (60, 100, 1)]);

        assert_eq!(resolved(&index, 21, 100, 1), Some((48, 100, 1)));
        assert_eq!(resolved(&index, 49, 100, 1), Some((60, 100, 1)));
        assert_eq!(resolved(&index, 59, 80, 2), Some((60, 100, 1)));
        assert_eq!(resolved(&index, 61, 100, 1), None);
        assert_eq!(resolved(&index, 127, 100, 1), None);
    }

    #[test]
    fn test_velocity_layer_index() {
        let index = build(&[(60, 40, 1), (60, 90, 1), (60, 127, 1)]);

        assert_eq!(index.velocity_layer_index(60, 1), Some(0));
        assert_eq!(index.velocity_layer_index(60, 41), Some(1));
        assert_eq!(index.velocity_layer_index(60, 127), Some(2));
        // Fallback notes report the layer of the note they borrow from.
        assert_eq!(index.velocity_layer_index(30, 100), Some(2));
        assert_eq!(index.velocity_layer_index(61, 100), None);
        assert_eq!(index.velocity_layer_index(60, 0), None);
    }

    #[test]
    fn test_resolve_empty_index() {
        let index = LibraryIndex::default();
        for note in 0..=127u8 {
            assert!(index.resolve(note, 100, 1).is_none());
        }
    }
}
