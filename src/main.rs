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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use rrsampler::library::{LibraryLoader, SymphoniaDecoder};
use rrsampler::render::{render_midi_file, RenderOptions};
use rrsampler::{audio, config, midi, Sampler};

/// Number of MIDI messages that can wait for the audio thread.
const MIDI_QUEUE: usize = 1024;

/// How often the live player frees retired samples.
const COLLECT_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A velocity layered, round robin multi-sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Indexes a sample folder and prints the note mapping.
    Scan {
        /// The path to the sample folder.
        path: PathBuf,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Starts the live sampler.
    Start {
        /// The path to the player config.
        player_path: PathBuf,
    },
    /// Renders a MIDI file through a sample folder into a WAV file.
    Render {
        /// The path to the sample folder.
        library: PathBuf,
        /// The MIDI file to render.
        midi_file: PathBuf,
        /// The WAV file to write.
        output: PathBuf,
        /// The output sample rate.
        #[arg(short, long, default_value_t = 44100)]
        sample_rate: u32,
        /// The number of output channels.
        #[arg(short, long, default_value_t = 2)]
        channels: u16,
        /// The number of frames rendered at a time.
        #[arg(short, long, default_value_t = 256)]
        block_size: usize,
        /// Seconds rendered after the last MIDI event.
        #[arg(short, long, default_value_t = 2.0)]
        tail: f64,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { path } => {
            let index = LibraryLoader::new(Arc::new(SymphoniaDecoder)).load(&path);

            if index.is_empty() {
                println!("No samples found in {}.", path.display());
                return Ok(());
            }

            println!(
                "Samples (count: {}, notes: {}, fallbacks: {}, memory: {} KiB):",
                index.sample_count(),
                index.sampled_note_count(),
                index.fallback_count(),
                index.memory_usage() / 1024,
            );
            for mapping in index.mappings() {
                println!("- {}", mapping);
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { player_path } => {
            let player = config::Player::deserialize(&player_path)?;
            let (sampler, handle) = Sampler::new(Arc::new(SymphoniaDecoder));
            let (midi_tx, midi_rx) = crossbeam_channel::bounded(MIDI_QUEUE);

            let _midi_device = match player.midi() {
                Some(midi_config) => {
                    let device = midi::get_device(midi_config.device())?;
                    device.watch_events(midi_tx)?;
                    Some(device)
                }
                None => {
                    warn!("No MIDI device configured, the sampler will stay silent.");
                    None
                }
            };

            let _stream = audio::start(player.audio(), sampler, midi_rx)?;

            match player.library() {
                Some(library) => {
                    handle.load_library(library);
                }
                None => warn!("No sample library configured."),
            }

            info!("Sampler started.");
            loop {
                thread::sleep(COLLECT_INTERVAL);
                let freed = handle.collect_garbage();
                if freed > 0 {
                    let stats = handle.stats();
                    debug!(
                        freed,
                        active_voices = stats.active_voices(),
                        triggers = stats.triggers(),
                        dropped = stats.dropped_triggers(),
                        steals = stats.steals(),
                        "Collected retired samples"
                    );
                }
            }
        }
        Commands::Render {
            library,
            midi_file,
            output,
            sample_rate,
            channels,
            block_size,
            tail,
        } => {
            let options = RenderOptions {
                library,
                midi_file,
                output,
                sample_rate,
                channels,
                block_size,
                tail: Duration::try_from_secs_f64(tail)?,
            };
            let summary = render_midi_file(&options, Arc::new(SymphoniaDecoder))?;
            println!(
                "Rendered {} frames to {} ({} notes played, {} unmapped).",
                summary.frames,
                options.output.display(),
                summary.triggers,
                summary.dropped_triggers
            );
        }
    }

    Ok(())
}
