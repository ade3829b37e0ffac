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

//! Moves the release of sample memory off the audio thread.
//!
//! When a voice finishes, or a new library replaces the old one, the audio thread may
//! hold the last reference to a large buffer. Dropping it there would free memory inside
//! the audio callback, so the reference is sent to a [`Collector`] instead and dropped on
//! a control thread.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::library::{LibraryIndex, Sample};

/// Default number of retired objects that can wait for collection.
pub const DEFAULT_COLLECTOR_CAPACITY: usize = 256;

/// Something the audio thread no longer needs.
pub enum Retired {
    Sample(Arc<Sample>),
    Index(Arc<LibraryIndex>),
}

/// The audio thread side. Sending never blocks or allocates.
#[derive(Clone)]
pub struct Retirer {
    tx: Sender<Retired>,
}

impl Retirer {
    /// Hands an object to the collector. If the collector is full the object is dropped
    /// in place.
    #[inline]
    pub fn retire(&self, retired: Retired) {
        let _ = self.tx.try_send(retired);
    }

    #[inline]
    pub fn retire_sample(&self, sample: Arc<Sample>) {
        self.retire(Retired::Sample(sample));
    }
}

/// The control thread side.
pub struct Collector {
    rx: Receiver<Retired>,
}

impl Collector {
    /// Drops everything waiting for collection and returns how many objects were freed.
    pub fn collect(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Number of objects waiting for collection.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Creates a connected retirer and collector.
pub fn collector(capacity: usize) -> (Retirer, Collector) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (Retirer { tx }, Collector { rx })
}
