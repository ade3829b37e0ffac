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

//! Sample library indexing and lookup.
//!
//! This module provides:
//! - File name parsing (`NoteName_Velocity_RoundRobin[_Suffix].ext`)
//! - Decoding of sample files into memory
//! - The note -> velocity layer -> round robin index with note fallbacks
//! - Real-time safe sample resolution

mod decode;
mod filename;
mod index;
mod loader;
mod resolve;

pub use decode::{DecodeError, DecodedAudio, SampleDecoder, SymphoniaDecoder};
pub use filename::{
    note_name, parse_file_name, parse_note_name, FileNameError, NoteNameError, SampleName,
    ROUND_ROBINS,
};
pub use index::{IndexBuilder, LibraryIndex, NoteMapping, Sample, VelocityLayer, NUM_NOTES};
pub use loader::{is_audio_file, LibraryLoader, AUDIO_EXTENSIONS};
