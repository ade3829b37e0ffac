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

/// Errors from opening or running audio and MIDI devices.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No device found with name {0}")]
    NotFound(String),

    #[error("No default output device available")]
    NoDefaultOutput,

    #[error("Unsupported output sample format {0}")]
    UnsupportedSampleFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio host unavailable: {0}")]
    HostUnavailable(#[from] cpal::HostUnavailable),

    #[error("Unable to list audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Unable to read audio device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("Unable to read default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Unable to read supported output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Unable to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Unable to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("MIDI initialization error: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("Unable to read MIDI port name: {0}")]
    MidiPortInfo(#[from] midir::PortInfoError),

    #[error("Unable to connect to MIDI port: {0}")]
    MidiConnect(String),
}
