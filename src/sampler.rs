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

//! The sampler ties the library, the note event processor and the voice pool together.
//!
//! [`Sampler::new`] returns two halves. The [`Sampler`] belongs to the audio thread and
//! only ever uses non-blocking operations. The [`SamplerHandle`] is used from control
//! threads to load libraries, read display state and free retired memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use midly::live::LiveEvent;
use midly::MidiMessage;
use parking_lot::{Mutex, RwLock};
use tracing::{info, span, Level};

use crate::keyboard::{KeyboardState, NoteEventProcessor};
use crate::library::{LibraryIndex, LibraryLoader, SampleDecoder};
use crate::samples::{collector, Collector, EngineStats, SampleEngine, DEFAULT_COLLECTOR_CAPACITY};

/// Number of published libraries that can wait for the audio thread.
const LIBRARY_QUEUE: usize = 4;

/// A MIDI message at a frame offset inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub offset: usize,
    pub message: MidiMessage,
}

impl MidiEvent {
    pub fn new(offset: usize, message: MidiMessage) -> MidiEvent {
        MidiEvent { offset, message }
    }

    /// Parses a raw channel message. System messages and malformed bytes give `None`.
    pub fn from_bytes(offset: usize, bytes: &[u8]) -> Option<MidiEvent> {
        match LiveEvent::parse(bytes) {
            Ok(LiveEvent::Midi { message, .. }) => Some(MidiEvent { offset, message }),
            _ => None,
        }
    }
}

/// The audio thread half of the sampler.
pub struct Sampler {
    engine: SampleEngine,
    processor: NoteEventProcessor,
    sample_rate: u32,
    block_size: usize,
}

impl Sampler {
    /// Creates a sampler with an empty library.
    pub fn new(decoder: Arc<dyn SampleDecoder>) -> (Sampler, SamplerHandle) {
        let (updates_tx, updates_rx) = crossbeam_channel::bounded(LIBRARY_QUEUE);
        let pending = updates_rx.clone();
        let (retirer, collector) = collector(DEFAULT_COLLECTOR_CAPACITY);
        let keyboard = Arc::new(KeyboardState::new());
        let stats = Arc::new(EngineStats::default());

        let sampler = Sampler {
            engine: SampleEngine::new(updates_rx, retirer, stats.clone()),
            processor: NoteEventProcessor::new(keyboard.clone()),
            sample_rate: 44100,
            block_size: 256,
        };
        let handle = SamplerHandle {
            loader: LibraryLoader::new(decoder),
            updates: updates_tx,
            pending,
            collector: Arc::new(collector),
            keyboard,
            stats,
            status: Arc::new(RwLock::new(LibraryStatus::default())),
            load_lock: Arc::new(Mutex::new(())),
        };
        (sampler, handle)
    }

    /// Resets all notes, voices and the round robin cursor. Call before playback starts
    /// or whenever the stream format changes.
    pub fn prepare(&mut self, sample_rate: u32, block_size: usize) {
        self.sample_rate = sample_rate;
        self.block_size = block_size;
        self.processor.reset();
        self.engine.prepare();
    }

    /// Renders one block into `output`, an interleaved buffer with `channels` channels.
    ///
    /// Each event takes effect at its frame offset. Events at or past the end of the
    /// block are applied after the block is rendered. Events are applied in slice order.
    pub fn render(&mut self, events: &[MidiEvent], output: &mut [f32], channels: usize) {
        output.fill(0.0);
        self.engine.poll_library();
        if channels == 0 {
            for event in events {
                self.processor.handle(event.message, &mut self.engine);
            }
            return;
        }

        let frames = output.len() / channels;
        let mut rendered = 0;
        for event in events {
            let offset = event.offset.min(frames);
            if offset > rendered {
                self.engine
                    .render(&mut output[rendered * channels..offset * channels], channels);
                rendered = offset;
            }
            self.processor.handle(event.message, &mut self.engine);
        }
        if rendered < frames {
            self.engine
                .render(&mut output[rendered * channels..frames * channels], channels);
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn active_voices(&self) -> usize {
        self.engine.active_voices()
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("engine", &self.engine)
            .field("processor", &self.processor)
            .field("sample_rate", &self.sample_rate)
            .field("block_size", &self.block_size)
            .finish()
    }
}

#[derive(Debug, Default)]
struct LibraryStatus {
    folder: Option<PathBuf>,
    loaded: bool,
}

/// The control half of the sampler. Cheap to clone.
#[derive(Clone)]
pub struct SamplerHandle {
    loader: LibraryLoader,
    updates: Sender<Arc<LibraryIndex>>,
    /// Lets a publisher discard the oldest waiting library when the audio thread is not
    /// draining the queue.
    pending: Receiver<Arc<LibraryIndex>>,
    collector: Arc<Collector>,
    keyboard: Arc<KeyboardState>,
    stats: Arc<EngineStats>,
    status: Arc<RwLock<LibraryStatus>>,
    /// Loads run one at a time so the last one started is the last one published.
    load_lock: Arc<Mutex<()>>,
}

impl SamplerHandle {
    /// Loads a library folder on a background thread. The audio thread keeps using the
    /// current library until the new one is complete.
    pub fn load_library(&self, folder: &Path) -> JoinHandle<()> {
        let handle = self.clone();
        let folder = folder.to_path_buf();
        thread::spawn(move || {
            let span = span!(Level::INFO, "library loader");
            let _enter = span.enter();
            handle.load_library_blocking(&folder);
        })
    }

    /// Loads a library folder on the calling thread and publishes it. Never waits on the
    /// audio thread.
    pub fn load_library_blocking(&self, folder: &Path) {
        let _guard = self.load_lock.lock();
        let index = self.loader.load(folder);
        self.publish(index);
    }

    fn publish(&self, index: LibraryIndex) {
        let loaded = !index.is_empty();
        let folder = index.folder().map(Path::to_path_buf);
        info!(
            path = ?folder,
            samples = index.sample_count(),
            "Publishing sample library"
        );

        let mut index = Arc::new(index);
        loop {
            match self.updates.try_send(index) {
                Ok(()) => break,
                Err(TrySendError::Full(returned)) => {
                    // Only the newest library matters to the audio thread.
                    drop(self.pending.try_recv());
                    index = returned;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }

        let mut status = self.status.write();
        status.folder = folder;
        status.loaded = loaded;
    }

    /// Returns true if the last loaded folder produced at least one sample.
    pub fn is_library_loaded(&self) -> bool {
        self.status.read().loaded
    }

    /// The folder of the last completed load.
    pub fn loaded_folder_path(&self) -> Option<PathBuf> {
        self.status.read().folder.clone()
    }

    pub fn keyboard(&self) -> &Arc<KeyboardState> {
        &self.keyboard
    }

    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    /// Frees samples and libraries the audio thread has finished with.
    pub fn collect_garbage(&self) -> usize {
        self.collector.collect()
    }
}

impl std::fmt::Debug for SamplerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerHandle")
            .field("status", &*self.status.read())
            .finish()
    }
}
