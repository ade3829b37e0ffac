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

//! Real-time sample playback.
//!
//! This module provides:
//! - Voice management with a fixed polyphony limit and voice stealing
//! - Additive mixing of active voices into an output buffer
//! - Switching between library indexes without blocking the audio thread
//! - Releasing retired sample memory away from the audio thread

mod collector;
mod engine;
mod voice;

pub use collector::{collector, Collector, Retired, Retirer, DEFAULT_COLLECTOR_CAPACITY};
pub use engine::{EngineStats, SampleEngine};
pub use voice::{Allocation, Voice, VoicePool, MAX_VOICES};
