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

//! Per-note display state.
//!
//! Only the note event processor writes here. Readers on other threads see each value
//! individually up to date, but a group of values read together may mix two events.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::library::{NUM_NOTES, ROUND_ROBINS};

/// Number of velocity tiers shown for the whole keyboard.
pub const VELOCITY_TIERS: u8 = 3;

/// Number of velocity layers per note that can be latched while the pedal is down.
pub const MAX_LATCHED_LAYERS: usize = 32;

/// Returns the display tier (1-3) for a velocity, or 0 for a velocity of 0.
pub fn velocity_tier(velocity: u8) -> u8 {
    match velocity {
        0 => 0,
        1..=42 => 1,
        43..=84 => 2,
        _ => 3,
    }
}

#[derive(Default)]
struct NoteState {
    /// Held velocity, 0 when idle.
    velocity: AtomicU8,
    /// Round robin slot of the last trigger, 0 when idle.
    round_robin: AtomicU8,
    /// Velocity layer position plus one, 0 when unknown.
    layer: AtomicU8,
    sustained: AtomicBool,
    /// Bit n set when layer n was played while the pedal was down.
    layers_activated: AtomicU32,
    /// Bit n set when slot n was played while the pedal was down.
    round_robins_activated: AtomicU8,
}

impl NoteState {
    fn release(&self) {
        self.velocity.store(0, Ordering::Relaxed);
        self.round_robin.store(0, Ordering::Relaxed);
        self.layer.store(0, Ordering::Relaxed);
        self.sustained.store(false, Ordering::Relaxed);
    }

    fn clear_latches(&self) {
        self.layers_activated.store(0, Ordering::Relaxed);
        self.round_robins_activated.store(0, Ordering::Relaxed);
    }
}

/// The keyboard state shared between the audio thread and any display.
pub struct KeyboardState {
    notes: Box<[NoteState]>,
    sustain_down: AtomicBool,
    /// Bit n set when tier n was played while the pedal was down.
    tiers_activated: AtomicU8,
}

impl KeyboardState {
    pub fn new() -> KeyboardState {
        KeyboardState {
            notes: (0..NUM_NOTES).map(|_| NoteState::default()).collect(),
            sustain_down: AtomicBool::new(false),
            tiers_activated: AtomicU8::new(0),
        }
    }

    #[inline]
    fn note(&self, note: u8) -> Option<&NoteState> {
        self.notes.get(usize::from(note))
    }

    /// Returns true if the note is held by a key or by the sustain pedal.
    pub fn is_note_on(&self, note: u8) -> bool {
        self.note_velocity(note) > 0
    }

    /// Returns the velocity the note was played with, or 0 if it is not on.
    pub fn note_velocity(&self, note: u8) -> u8 {
        self.note(note)
            .map_or(0, |state| state.velocity.load(Ordering::Relaxed))
    }

    /// Returns the round robin slot the note last triggered, or 0 if it is not on.
    pub fn note_round_robin(&self, note: u8) -> u8 {
        self.note(note)
            .map_or(0, |state| state.round_robin.load(Ordering::Relaxed))
    }

    /// Returns the velocity layer the note is playing counted from 1, or 0 if none.
    pub fn note_velocity_tier(&self, note: u8) -> u8 {
        self.note(note)
            .map_or(0, |state| state.layer.load(Ordering::Relaxed))
    }

    /// Returns true if the key was released while the pedal was down.
    pub fn is_note_sustained(&self, note: u8) -> bool {
        self.note(note)
            .is_some_and(|state| state.sustained.load(Ordering::Relaxed))
    }

    /// Returns true if any sounding note falls in the tier (1: 1-42, 2: 43-84,
    /// 3: 85-127), or the tier was played since the pedal went down.
    pub fn is_velocity_tier_active(&self, tier: u8) -> bool {
        if !(1..=VELOCITY_TIERS).contains(&tier) {
            return false;
        }
        if self.tiers_activated.load(Ordering::Relaxed) & (1 << tier) != 0 {
            return true;
        }
        self.notes
            .iter()
            .any(|state| velocity_tier(state.velocity.load(Ordering::Relaxed)) == tier)
    }

    /// Returns true if any note last triggered the given round robin slot.
    pub fn is_round_robin_active(&self, slot: u8) -> bool {
        if !(1..=ROUND_ROBINS).contains(&slot) {
            return false;
        }
        self.notes
            .iter()
            .any(|state| state.round_robin.load(Ordering::Relaxed) == slot)
    }

    /// Returns true if the note played its velocity layer `tier` (counted from 1)
    /// since the pedal went down.
    pub fn is_note_tier_activated(&self, note: u8, tier: u8) -> bool {
        let Some(bit) = usize::from(tier).checked_sub(1) else {
            return false;
        };
        if bit >= MAX_LATCHED_LAYERS {
            return false;
        }
        self.note(note).is_some_and(|state| {
            state.layers_activated.load(Ordering::Relaxed) & (1 << bit) != 0
        })
    }

    /// Returns true if the note played the round robin slot since the pedal went down.
    pub fn is_note_round_robin_activated(&self, note: u8, slot: u8) -> bool {
        if !(1..=ROUND_ROBINS).contains(&slot) {
            return false;
        }
        self.note(note).is_some_and(|state| {
            state.round_robins_activated.load(Ordering::Relaxed) & (1 << slot) != 0
        })
    }

    pub fn is_sustain_down(&self) -> bool {
        self.sustain_down.load(Ordering::Relaxed)
    }

    pub(crate) fn note_on(&self, note: u8, velocity: u8, round_robin: u8, layer: Option<usize>) {
        let Some(state) = self.note(note) else {
            return;
        };
        state.sustained.store(false, Ordering::Relaxed);
        state.velocity.store(velocity, Ordering::Relaxed);
        state.round_robin.store(round_robin, Ordering::Relaxed);
        let layer = layer
            .and_then(|index| u8::try_from(index + 1).ok())
            .unwrap_or(0);
        state.layer.store(layer, Ordering::Relaxed);
    }

    /// Records that a note was played while the pedal was down.
    pub(crate) fn latch(&self, note: u8, velocity: u8, round_robin: u8, layer: Option<usize>) {
        let Some(state) = self.note(note) else {
            return;
        };
        if let Some(index) = layer.filter(|index| *index < MAX_LATCHED_LAYERS) {
            state
                .layers_activated
                .fetch_or(1 << index, Ordering::Relaxed);
        }
        if (1..=ROUND_ROBINS).contains(&round_robin) {
            state
                .round_robins_activated
                .fetch_or(1 << round_robin, Ordering::Relaxed);
        }
        let tier = velocity_tier(velocity);
        if tier > 0 {
            self.tiers_activated.fetch_or(1 << tier, Ordering::Relaxed);
        }
    }

    pub(crate) fn sustain(&self, note: u8) {
        if let Some(state) = self.note(note) {
            state.sustained.store(true, Ordering::Relaxed);
        }
    }

    pub(crate) fn release(&self, note: u8) {
        if let Some(state) = self.note(note) {
            state.release();
        }
    }

    pub(crate) fn set_sustain_down(&self, down: bool) {
        self.sustain_down.store(down, Ordering::Relaxed);
    }

    /// Releases every sustained note and clears all latches. Calls `released` with each
    /// note that was sustained.
    pub(crate) fn release_sustained<F: FnMut(u8)>(&self, mut released: F) {
        for (note, state) in (0u8..).zip(self.notes.iter()) {
            if state.sustained.load(Ordering::Relaxed) {
                state.release();
                released(note);
            }
            state.clear_latches();
        }
        self.tiers_activated.store(0, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        for state in self.notes.iter() {
            state.release();
            state.clear_latches();
        }
        self.tiers_activated.store(0, Ordering::Relaxed);
        self.sustain_down.store(false, Ordering::Relaxed);
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyboardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held: Vec<u8> = (0..=127u8).filter(|note| self.is_note_on(*note)).collect();
        f.debug_struct("KeyboardState")
            .field("held", &held)
            .field("sustain_down", &self.is_sustain_down())
            .finish()
    }
}
