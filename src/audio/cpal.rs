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
use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::Receiver;
use midly::MidiMessage;
use tracing::{error, info, span, Level};

use super::renderer::BlockRenderer;
use crate::config;
use crate::device::DeviceError;
use crate::sampler::Sampler;

const DEFAULT_DEVICE: &str = "default";

/// A cpal output device.
pub struct Device {
    name: String,
    max_channels: u16,
    host_id: cpal::HostId,
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal output devices across all hosts.
    pub fn list() -> Result<Vec<Device>, DeviceError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the output device with the given name. "default" picks the default host's
    /// default output.
    pub fn get(name: &str) -> Result<Device, DeviceError> {
        if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(DeviceError::NoDefaultOutput)?;
            let max_channels = device.default_output_config()?.channels();
            return Ok(Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
            });
        }

        Device::list()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_channels(&self) -> u16 {
        self.max_channels
    }

    /// Starts an output stream whose callback renders the sampler. MIDI messages are
    /// taken from `midi_rx` at the start of every block.
    pub fn start(
        &self,
        config: &config::Audio,
        sampler: Sampler,
        midi_rx: Receiver<MidiMessage>,
    ) -> Result<OutputStream, DeviceError> {
        let span = span!(Level::INFO, "output stream (cpal)");
        let _enter = span.enter();

        let channels = config.channels().min(self.max_channels.max(1));
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(config.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };
        let renderer = BlockRenderer::new(
            sampler,
            midi_rx,
            config.sample_rate(),
            usize::from(channels),
            config.block_size(),
        );

        let sample_format = self.device.default_output_config()?.sample_format();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&stream_config, renderer)?,
            cpal::SampleFormat::I32 => self.build_stream::<i32>(&stream_config, renderer)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&stream_config, renderer)?,
            other => return Err(DeviceError::UnsupportedSampleFormat(other.to_string())),
        };
        stream.play()?;

        info!(
            device = self.name,
            channels,
            sample_rate = config.sample_rate(),
            block_size = config.block_size(),
            format = sample_format.to_string(),
            "Output stream started"
        );
        Ok(OutputStream { _stream: stream })
    }

    fn build_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        mut renderer: BlockRenderer,
    ) -> Result<cpal::Stream, DeviceError>
    where
        T: SizedSample + FromSample<f32>,
    {
        Ok(self.device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                renderer.process(data, T::from_sample);
            },
            |err| error!("CPAL output stream error: {}", err),
            None,
        )?)
    }
}

/// A running output stream. Playback stops when this is dropped.
pub struct OutputStream {
    _stream: cpal::Stream,
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream").finish_non_exhaustive()
    }
}
