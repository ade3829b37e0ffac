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

use std::sync::Arc;

use midly::MidiMessage;

use super::state::KeyboardState;
use crate::library::ROUND_ROBINS;
use crate::samples::SampleEngine;

/// Controller number of the sustain pedal.
pub const SUSTAIN_CONTROLLER: u8 = 64;

/// Pedal values at or above this are down.
pub const SUSTAIN_THRESHOLD: u8 = 64;

/// Whatever plays the notes the processor decides on.
pub trait NoteTarget {
    /// Starts a note with the given round robin slot.
    fn trigger(&mut self, note: u8, velocity: u8, round_robin: u8);

    /// Ends a note.
    fn release(&mut self, note: u8);

    /// Position of the velocity layer the note and velocity select, if any.
    fn velocity_layer_index(&self, note: u8, velocity: u8) -> Option<usize>;
}

impl NoteTarget for SampleEngine {
    fn trigger(&mut self, note: u8, velocity: u8, round_robin: u8) {
        self.note_on(note, velocity, round_robin);
    }

    fn release(&mut self, note: u8) {
        self.note_off(note);
    }

    fn velocity_layer_index(&self, note: u8, velocity: u8) -> Option<usize> {
        SampleEngine::velocity_layer_index(self, note, velocity)
    }
}

/// Turns note and sustain pedal messages into triggers and releases, assigning round
/// robin slots and tracking the display state.
///
/// A note moves from idle to held on note-on. Releasing the key while the pedal is
/// down leaves it sustained until the pedal comes up.
pub struct NoteEventProcessor {
    state: Arc<KeyboardState>,
    /// Slot assigned to the next note-on.
    next_round_robin: u8,
    sustain: bool,
}

impl NoteEventProcessor {
    pub fn new(state: Arc<KeyboardState>) -> NoteEventProcessor {
        NoteEventProcessor {
            state,
            next_round_robin: 1,
            sustain: false,
        }
    }

    pub fn state(&self) -> &Arc<KeyboardState> {
        &self.state
    }

    pub fn next_round_robin(&self) -> u8 {
        self.next_round_robin
    }

    pub fn is_sustain_down(&self) -> bool {
        self.sustain
    }

    /// Returns every note and the round robin cursor to their starting state.
    pub fn reset(&mut self) {
        self.next_round_robin = 1;
        self.sustain = false;
        self.state.reset();
    }

    /// Handles one channel message. Messages other than notes and the sustain pedal are
    /// ignored.
    pub fn handle<T: NoteTarget>(&mut self, message: MidiMessage, target: &mut T) {
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                self.note_off(key.as_int(), target);
            }
            MidiMessage::NoteOn { key, vel } => {
                self.note_on(key.as_int(), vel.as_int(), target);
            }
            MidiMessage::NoteOff { key, .. } => {
                self.note_off(key.as_int(), target);
            }
            MidiMessage::Controller { controller, value }
                if controller.as_int() == SUSTAIN_CONTROLLER =>
            {
                self.sustain_pedal(value.as_int() >= SUSTAIN_THRESHOLD, target);
            }
            _ => {}
        }
    }

    pub fn note_on<T: NoteTarget>(&mut self, note: u8, velocity: u8, target: &mut T) {
        let round_robin = self.next_round_robin;
        let layer = target.velocity_layer_index(note, velocity);

        self.state.note_on(note, velocity, round_robin, layer);
        if self.sustain {
            self.state.latch(note, velocity, round_robin, layer);
        }
        target.trigger(note, velocity, round_robin);

        self.next_round_robin = round_robin % ROUND_ROBINS + 1;
    }

    pub fn note_off<T: NoteTarget>(&mut self, note: u8, target: &mut T) {
        if self.sustain {
            self.state.sustain(note);
        } else {
            self.state.release(note);
            target.release(note);
        }
    }

    pub fn sustain_pedal<T: NoteTarget>(&mut self, down: bool, target: &mut T) {
        if self.sustain && !down {
            self.state.release_sustained(|note| target.release(note));
        }
        self.sustain = down;
        self.state.set_sustain_down(down);
    }
}

impl std::fmt::Debug for NoteEventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteEventProcessor")
            .field("next_round_robin", &self.next_round_robin)
            .field("sustain", &self.sustain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use midly::num::u7;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Call {
        Trigger(u8, u8, u8),
        Release(u8),
    }

    /// Records calls and reports every velocity above 64 as layer 1, the rest layer 0.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl NoteTarget for Recorder {
        fn trigger(&mut self, note: u8, velocity: u8, round_robin: u8) {
            self.calls.push(Call::Trigger(note, velocity, round_robin));
        }

        fn release(&mut self, note: u8) {
            self.calls.push(Call::Release(note));
        }

        fn velocity_layer_index(&self, _note: u8, velocity: u8) -> Option<usize> {
            Some(usize::from(velocity > 64))
        }
    }

    fn processor() -> (NoteEventProcessor, Recorder) {
        (
            NoteEventProcessor::new(Arc::new(KeyboardState::new())),
            Recorder::default(),
        )
    }

    fn note_on(key: u8, vel: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            key: u7::from(key),
            vel: u7::from(vel),
        }
    }

    fn note_off(key: u8) -> MidiMessage {
        MidiMessage::NoteOff {
            key: u7::from(key),
            vel: u7::from(0),
        }
    }

    fn pedal(value: u8) -> MidiMessage {
        MidiMessage::Controller {
            controller: u7::from(SUSTAIN_CONTROLLER),
            value: u7::from(value),
        }
    }

    #[test]
    fn test_round_robin_cycles() {
        let (mut processor, mut target) = processor();
        for k in 1..=7u8 {
            processor.handle(note_on(60, 100), &mut target);
            assert_eq!(processor.state().note_round_robin(60), (k - 1) % 3 + 1);
        }

        let slots: Vec<u8> = target
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Trigger(_, _, rr) => Some(*rr),
                Call::Release(_) => None,
            })
            .collect();
        assert_eq!(slots, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_round_robin_is_global() {
        let (mut processor, mut target) = processor();
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(note_on(62, 100), &mut target);
        processor.handle(note_on(64, 100), &mut target);

        assert_eq!(processor.state().note_round_robin(60), 1);
        assert_eq!(processor.state().note_round_robin(62), 2);
        assert_eq!(processor.state().note_round_robin(64), 3);
        assert_eq!(processor.next_round_robin(), 1);
    }

    #[test]
    fn test_note_off_without_pedal() {
        let (mut processor, mut target) = processor();
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(note_off(60), &mut target);

        let state = processor.state();
        assert!(!state.is_note_on(60));
        assert_eq!(state.note_round_robin(60), 0);
        assert_eq!(state.note_velocity_tier(60), 0);
        assert_eq!(
            target.calls,
            vec![Call::Trigger(60, 100, 1), Call::Release(60)]
        );
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let (mut processor, mut target) = processor();
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(note_on(60, 0), &mut target);

        assert!(!processor.state().is_note_on(60));
        assert_eq!(target.calls.last(), Some(&Call::Release(60)));
        // The cursor only advances on real note-ons.
        assert_eq!(processor.next_round_robin(), 2);
    }

    #[test]
    fn test_sustain_holds_released_notes() {
        let (mut processor, mut target) = processor();
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(pedal(127), &mut target);
        processor.handle(note_off(60), &mut target);

        let state = processor.state().clone();
        assert!(state.is_note_on(60));
        assert_eq!(state.note_velocity(60), 100);
        assert_eq!(state.note_round_robin(60), 1);
        assert!(state.is_note_sustained(60));
        assert!(state.is_sustain_down());
        assert_eq!(target.calls, vec![Call::Trigger(60, 100, 1)]);

        processor.handle(pedal(0), &mut target);
        assert!(!state.is_note_on(60));
        assert!(!state.is_note_sustained(60));
        assert!(!state.is_sustain_down());
        assert_eq!(target.calls.last(), Some(&Call::Release(60)));
    }

    #[test]
    fn test_pedal_up_keeps_held_keys() {
        let (mut processor, mut target) = processor();
        processor.handle(pedal(100), &mut target);
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(note_on(62, 30), &mut target);
        processor.handle(note_off(60), &mut target);
        processor.handle(pedal(10), &mut target);

        let state = processor.state();
        assert!(!state.is_note_on(60));
        assert!(state.is_note_on(62));
        assert!(!state.is_note_sustained(62));
        assert_eq!(target.calls.last(), Some(&Call::Release(60)));
    }

    #[test]
    fn test_replayed_note_clears_sustain() {
        let (mut processor, mut target) = processor();
        processor.handle(pedal(127), &mut target);
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(note_off(60), &mut target);
        processor.handle(note_on(60, 50), &mut target);

        let state = processor.state();
        assert!(!state.is_note_sustained(60));
        assert_eq!(state.note_velocity(60), 50);
        assert_eq!(state.note_round_robin(60), 2);
    }

    #[test]
    fn test_pedal_latches_layers_and_round_robins() {
        let (mut processor, mut target) = processor();
        processor.handle(note_on(60, 100), &mut target);
        // Not latched, the pedal was up.
        assert!(!processor.state().is_note_tier_activated(60, 2));

        processor.handle(pedal(64), &mut target);
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(note_on(60, 20), &mut target);

        let state = processor.state().clone();
        assert!(state.is_note_tier_activated(60, 2));
        assert!(state.is_note_tier_activated(60, 1));
        assert!(state.is_note_round_robin_activated(60, 2));
        assert!(state.is_note_round_robin_activated(60, 3));
        assert!(!state.is_note_round_robin_activated(60, 1));
        assert!(state.is_velocity_tier_active(3));
        assert!(state.is_velocity_tier_active(1));
        assert_eq!(state.note_velocity_tier(60), 1);

        processor.handle(pedal(63), &mut target);
        assert!(!state.is_note_tier_activated(60, 2));
        assert!(!state.is_note_round_robin_activated(60, 2));
        // Still held by the key, so its own tier stays lit.
        assert!(state.is_velocity_tier_active(1));
        assert!(!state.is_velocity_tier_active(3));
    }

    #[test]
    fn test_pedal_down_twice_changes_nothing() {
        let (mut processor, mut target) = processor();
        processor.handle(pedal(127), &mut target);
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(note_off(60), &mut target);
        processor.handle(pedal(100), &mut target);

        assert!(processor.state().is_note_sustained(60));
        assert_eq!(target.calls.len(), 1);
    }

    #[test]
    fn test_pedal_up_while_up_changes_nothing() {
        let (mut processor, mut target) = processor();
        processor.handle(note_on(60, 100), &mut target);
        processor.handle(pedal(0), &mut target);

        assert!(processor.state().is_note_on(60));
        assert_eq!(target.calls.len(), 1);
    }

    #[test]
    fn test_other_messages_ignored() {
        let (mut processor, mut target) = processor();
        processor.handle(
            MidiMessage::Controller {
                controller: u7::from(1),
                value: u7::from(127),
            },
            &mut target,
        );
        processor.handle(
            MidiMessage::ProgramChange {
                program: u7::from(3),
            },
            &mut target,
        );

        assert!(!processor.is_sustain_down());
        assert!(target.calls.is_empty());
        assert_eq!(processor.next_round_robin(), 1);
    }

    #[test]
    fn test_reset() {
        let (mut processor, mut target) = processor();
        processor.handle(pedal(127), &mut target);
        processor.handle(note_on(60, 100), &mut target);
        processor.reset();

        assert_eq!(processor.next_round_robin(), 1);
        assert!(!processor.is_sustain_down());
        assert!(!processor.state().is_note_on(60));
        assert!(!processor.state().is_note_tier_activated(60, 2));
    }
}
