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
use crate::device::DeviceError;

pub mod midir;

/// Lists MIDI input ports known to midir.
pub fn list_devices() -> Result<Vec<midir::Device>, DeviceError> {
    midir::list()
}

/// Gets the input port whose name contains `name`.
pub fn get_device(name: &str) -> Result<midir::Device, DeviceError> {
    midir::get(name)
}
