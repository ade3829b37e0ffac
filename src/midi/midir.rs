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

use crossbeam_channel::{Sender, TrySendError};
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use midly::live::LiveEvent;
use midly::MidiMessage;
use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use crate::device::DeviceError;

/// A midir input port.
pub struct Device {
    name: String,
    input_port: MidiInputPort,
    event_connection: Mutex<Option<MidiInputConnection<()>>>,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Watches the port and forwards channel messages to the sender. Messages are
    /// dropped if the receiver falls behind.
    pub fn watch_events(&self, sender: Sender<MidiMessage>) -> Result<(), DeviceError> {
        let span = span!(Level::INFO, "wait for event (midir)");
        let _enter = span.enter();

        let mut event_connection = self.event_connection.lock();
        if event_connection.is_some() {
            return Err(DeviceError::MidiConnect(format!(
                "already watching events on {}",
                self.name
            )));
        }

        info!(device = self.name, "Watching MIDI events.");

        let input = MidiInput::new("rrsampler input")?;
        *event_connection = Some(
            input
                .connect(
                    &self.input_port,
                    "rrsampler input watcher",
                    move |_, raw_event, _| {
                        let Ok(LiveEvent::Midi { message, .. }) = LiveEvent::parse(raw_event)
                        else {
                            return;
                        };
                        debug!(event = format!("{:?}", message), "Received MIDI event.");
                        if let Err(TrySendError::Full(message)) = sender.try_send(message) {
                            warn!(
                                event = format!("{:?}", message),
                                "MIDI queue full, dropping event."
                            );
                        }
                    },
                    (),
                )
                .map_err(|e| DeviceError::MidiConnect(e.to_string()))?,
        );

        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Input)", self.name)
    }
}

/// Lists midir input ports.
pub fn list() -> Result<Vec<Device>, DeviceError> {
    let input = MidiInput::new("rrsampler input listing")?;

    let mut devices = Vec::new();
    for port in input.ports() {
        devices.push(Device {
            name: input.port_name(&port)?,
            input_port: port,
            event_connection: Mutex::new(None),
        });
    }
    devices.sort_by_key(|device| device.name.clone());
    Ok(devices)
}

/// Gets the input port whose name contains `name`.
pub fn get(name: &str) -> Result<Device, DeviceError> {
    let mut matches = list()?
        .into_iter()
        .filter(|device| device.name.contains(name))
        .collect::<Vec<Device>>();

    if matches.len() > 1 {
        return Err(DeviceError::NotFound(format!(
            "{} matches too many devices ({}), use a less ambiguous device name",
            name,
            matches
                .iter()
                .map(|device| device.name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )));
    }
    matches
        .pop()
        .ok_or_else(|| DeviceError::NotFound(name.to_string()))
}
