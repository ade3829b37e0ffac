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

//! Parsing of sample file names.
//!
//! Sample files are named `NoteName_Velocity_RoundRobin[_Suffix].ext`, for example
//! `C4_001_02.wav`, `G#6_033_01.wav` or `Db3_127_03_soft.wav`.

use std::fmt;
use std::path::Path;

/// Highest MIDI note number.
pub const MAX_NOTE: i32 = 127;

/// Number of round robin slots per velocity layer.
pub const ROUND_ROBINS: u8 = 3;

/// Reasons a note name can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteNameError {
    #[error("note name is empty")]
    Empty,

    #[error("invalid note letter '{0}'")]
    InvalidLetter(char),

    #[error("invalid octave '{0}'")]
    InvalidOctave(String),

    #[error("note {0} is outside the MIDI range")]
    OutOfRange(i32),
}

/// Reasons a sample file name can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileNameError {
    #[error("expected NoteName_Velocity_RoundRobin, found {0} token(s)")]
    TooFewTokens(usize),

    #[error(transparent)]
    Note(#[from] NoteNameError),

    #[error("invalid velocity '{0}' (expected 1-127)")]
    Velocity(String),

    #[error("invalid round robin '{0}' (expected 1-3)")]
    RoundRobin(String),

    #[error("file name is not valid UTF-8")]
    Encoding,
}

/// The note, velocity and round robin slot encoded in a sample file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleName {
    pub note: u8,
    pub velocity: u8,
    pub round_robin: u8,
}

impl SampleName {
    /// Parses the file name component of the given path.
    pub fn from_path(path: &Path) -> Result<SampleName, FileNameError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(FileNameError::Encoding)?;
        parse_file_name(file_name)
    }
}

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (note {}) velocity {} rr {}",
            note_name(self.note),
            self.note,
            self.velocity,
            self.round_robin
        )
    }
}

/// Parses a note name such as `C4`, `G#6`, `Db3` or `A-1` into a MIDI note number.
/// C4 is MIDI note 60, so C-1 is note 0.
pub fn parse_note_name(name: &str) -> Result<u8, NoteNameError> {
    let mut chars = name.chars();
    let letter = chars.next().ok_or(NoteNameError::Empty)?;
    let mut base: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(NoteNameError::InvalidLetter(letter)),
    };

    let mut octave = chars.as_str();
    let mut rest = octave.chars();
    match (rest.next(), rest.next()) {
        (Some('#'), _) => {
            base += 1;
            octave = &octave[1..];
        }
        // A 'b' is only a flat when the octave follows it directly.
        (Some('b' | 'B'), Some(next)) if next.is_ascii_digit() || next == '-' => {
            base -= 1;
            octave = &octave[1..];
        }
        _ => {}
    }

    let digits = octave.strip_prefix('-').unwrap_or(octave);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NoteNameError::InvalidOctave(octave.to_string()));
    }
    let octave: i32 = octave
        .parse()
        .map_err(|_| NoteNameError::InvalidOctave(octave.to_string()))?;

    let note = octave
        .checked_add(1)
        .and_then(|o| o.checked_mul(12))
        .and_then(|n| n.checked_add(base))
        .ok_or_else(|| NoteNameError::InvalidOctave(octave.to_string()))?;
    if !(0..=MAX_NOTE).contains(&note) {
        return Err(NoteNameError::OutOfRange(note));
    }
    Ok(note as u8)
}

/// Parses a sample file name (with or without extension).
pub fn parse_file_name(file_name: &str) -> Result<SampleName, FileNameError> {
    let base_name = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    };

    let tokens: Vec<&str> = base_name.split('_').collect();
    if tokens.len() < 3 {
        return Err(FileNameError::TooFewTokens(tokens.len()));
    }

    let note = parse_note_name(tokens[0])?;
    let velocity = parse_bounded(tokens[1], 1, 127)
        .ok_or_else(|| FileNameError::Velocity(tokens[1].to_string()))?;
    let round_robin = parse_bounded(tokens[2], 1, ROUND_ROBINS)
        .ok_or_else(|| FileNameError::RoundRobin(tokens[2].to_string()))?;

    Ok(SampleName {
        note,
        velocity,
        round_robin,
    })
}

/// Parses an all-digit token into a value within `[min, max]`.
fn parse_bounded(token: &str, min: u8, max: u8) -> Option<u8> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Leading zeros are common ("001"), so strip them before the width check.
    let trimmed = token.trim_start_matches('0');
    if trimmed.len() > 3 {
        return None;
    }
    let value: u16 = if trimmed.is_empty() {
        0
    } else {
        trimmed.parse().ok()?
    };
    (u16::from(min)..=u16::from(max))
        .contains(&value)
        .then_some(value as u8)
}

/// Formats a MIDI note number using sharps, e.g. 61 -> "C#4".
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = i32::from(note / 12) - 1;
    format!("{}{}", NAMES[usize::from(note % 12)], octave)
}
