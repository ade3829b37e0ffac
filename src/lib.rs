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

//! A velocity layered, round robin multi-sample player.
//!
//! A folder of samples named `NoteName_Velocity_RoundRobin[_Suffix].ext` is indexed
//! into notes, velocity layers and round robin slots. Incoming MIDI notes are assigned
//! round robin slots, resolved to samples and mixed by a fixed pool of voices.

pub mod audio;
pub mod config;
pub mod device;
pub mod keyboard;
pub mod library;
pub mod midi;
pub mod render;
pub mod sampler;
pub mod samples;
#[cfg(test)]
mod testutil;

pub use sampler::{MidiEvent, Sampler, SamplerHandle};
