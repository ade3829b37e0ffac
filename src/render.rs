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

//! Offline rendering of a Standard MIDI File through the sampler into a WAV file.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use midly::{Format, MidiMessage, Smf, Timing};
use nodi::timers::Ticker;
use nodi::{Connection, Player, Sheet, Timer};
use tracing::info;

use crate::library::SampleDecoder;
use crate::sampler::{MidiEvent, Sampler};

/// Microseconds per quarter note until the file sets a tempo (120 BPM).
const DEFAULT_TEMPO: u32 = 500_000;

/// Error types for offline rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI file error: {0}")]
    Midi(#[from] midly::Error),

    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported MIDI timing: {0}")]
    Timing(String),

    #[error("No samples found in {0}")]
    EmptyLibrary(PathBuf),

    #[error("Invalid render option: {0}")]
    InvalidOption(String),
}

/// What to render and how.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub library: PathBuf,
    pub midi_file: PathBuf,
    pub output: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: usize,
    /// Time rendered after the last MIDI event.
    pub tail: Duration,
}

/// What a render produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub frames: u64,
    pub events: usize,
    pub triggers: u64,
    pub dropped_triggers: u64,
}

/// Renders a MIDI file through a freshly loaded library.
pub fn render_midi_file(
    options: &RenderOptions,
    decoder: Arc<dyn SampleDecoder>,
) -> Result<RenderSummary, RenderError> {
    if options.sample_rate == 0 || options.channels == 0 || options.block_size == 0 {
        return Err(RenderError::InvalidOption(format!(
            "sample rate {}, channels {} and block size {} must all be positive",
            options.sample_rate, options.channels, options.block_size
        )));
    }

    let (mut sampler, handle) = Sampler::new(decoder);
    handle.load_library_blocking(&options.library);
    if !handle.is_library_loaded() {
        return Err(RenderError::EmptyLibrary(options.library.clone()));
    }

    let buf = fs::read(&options.midi_file)?;
    let smf = Smf::parse(&buf)?;
    let timeline = timeline(&smf, options.sample_rate)?;

    let channels = usize::from(options.channels);
    let block_size = options.block_size;
    let tail_frames = (options.tail.as_secs_f64() * f64::from(options.sample_rate)).round() as u64;
    let end_frame = timeline.last().map_or(0, |(frame, _)| *frame) + tail_frames;

    let mut writer = WavWriter::create(
        &options.output,
        WavSpec {
            channels: options.channels,
            sample_rate: options.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    info!(
        midi_file = ?options.midi_file,
        output = ?options.output,
        events = timeline.len(),
        frames = end_frame,
        "Rendering MIDI file"
    );

    sampler.prepare(options.sample_rate, block_size);
    let mut output = vec![0.0f32; block_size * channels];
    let mut events: Vec<MidiEvent> = Vec::new();
    let mut next_event = 0;
    let mut frame: u64 = 0;
    while frame < end_frame {
        let frames = (end_frame - frame).min(block_size as u64) as usize;
        let block_end = frame + frames as u64;

        events.clear();
        while let Some((event_frame, message)) = timeline.get(next_event) {
            if *event_frame >= block_end {
                break;
            }
            events.push(MidiEvent::new((event_frame - frame) as usize, *message));
            next_event += 1;
        }

        let block = &mut output[..frames * channels];
        sampler.render(&events, block, channels);
        for value in block.iter() {
            writer.write_sample(*value)?;
        }
        handle.collect_garbage();
        frame = block_end;
    }
    writer.finalize()?;

    let summary = RenderSummary {
        frames: end_frame,
        events: timeline.len(),
        triggers: handle.stats().triggers(),
        dropped_triggers: handle.stats().dropped_triggers(),
    };
    info!(
        frames = summary.frames,
        triggers = summary.triggers,
        dropped = summary.dropped_triggers,
        "Render complete"
    );
    Ok(summary)
}

/// Converts every channel message in the file to an absolute frame position, in play
/// order. Tempo changes in any track apply to all tracks.
pub fn timeline(smf: &Smf, sample_rate: u32) -> Result<Vec<(u64, MidiMessage)>, RenderError> {
    let ticks = match smf.header.timing {
        Timing::Metrical(_) => {
            let mut ticker = Ticker::try_from(smf.header.timing)
                .map_err(|e| RenderError::Timing(e.to_string()))?;
            ticker.change_tempo(DEFAULT_TEMPO);
            TickLength::Tempo(ticker)
        }
        Timing::Timecode(fps, subframes) => TickLength::Timecode(Duration::from_secs_f64(
            1.0 / (f64::from(fps.as_f32()) * f64::from(subframes.max(1))),
        )),
    };
    let sheet = match smf.header.format {
        Format::SingleTrack | Format::Sequential => Sheet::sequential(&smf.tracks),
        Format::Parallel => Sheet::parallel(&smf.tracks),
    };

    let shared = Rc::new(RefCell::new(Timeline {
        position: Duration::ZERO,
        sample_rate: f64::from(sample_rate),
        events: Vec::new(),
    }));
    let mut player = Player::new(
        OfflineTimer {
            ticks,
            timeline: shared.clone(),
        },
        TimelineConnection {
            timeline: shared.clone(),
        },
    );
    player.play(&sheet);

    let events = std::mem::take(&mut shared.borrow_mut().events);
    Ok(events)
}

struct Timeline {
    position: Duration,
    sample_rate: f64,
    events: Vec<(u64, MidiMessage)>,
}

enum TickLength {
    Tempo(Ticker),
    /// Timecode files tick at a fixed rate and ignore tempo.
    Timecode(Duration),
}

/// A nodi timer that advances the render position instead of sleeping.
struct OfflineTimer {
    ticks: TickLength,
    timeline: Rc<RefCell<Timeline>>,
}

impl Timer for OfflineTimer {
    fn sleep_duration(&mut self, n_ticks: u32) -> Duration {
        match &mut self.ticks {
            TickLength::Tempo(ticker) => ticker.sleep_duration(n_ticks),
            TickLength::Timecode(tick) => *tick * n_ticks,
        }
    }

    fn change_tempo(&mut self, tempo: u32) {
        if let TickLength::Tempo(ticker) = &mut self.ticks {
            ticker.change_tempo(tempo);
        }
    }

    fn sleep(&mut self, n_ticks: u32) {
        let duration = self.sleep_duration(n_ticks);
        self.timeline.borrow_mut().position += duration;
    }
}

/// A nodi connection that records each message at the current render position.
struct TimelineConnection {
    timeline: Rc<RefCell<Timeline>>,
}

impl Connection for TimelineConnection {
    fn play(&mut self, event: nodi::MidiEvent) -> bool {
        let mut timeline = self.timeline.borrow_mut();
        let frame = (timeline.position.as_secs_f64() * timeline.sample_rate).round() as u64;
        timeline.events.push((frame, event.message));
        true
    }
}
