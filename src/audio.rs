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
use crossbeam_channel::Receiver;
use midly::MidiMessage;

use crate::config;
use crate::device::DeviceError;
use crate::sampler::Sampler;

pub mod cpal;
mod renderer;

pub use renderer::BlockRenderer;

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::Device>, DeviceError> {
    cpal::Device::list()
}

/// Opens the configured output device and starts rendering the sampler into it.
pub fn start(
    config: &config::Audio,
    sampler: Sampler,
    midi_rx: Receiver<MidiMessage>,
) -> Result<cpal::OutputStream, DeviceError> {
    let device = cpal::Device::get(config.device())?;
    device.start(config, sampler, midi_rx)
}
