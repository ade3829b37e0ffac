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

//! Loading of a sample library folder.
//!
//! Samples are loaded entirely into memory so playback never touches the disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::decode::SampleDecoder;
use super::filename::SampleName;
use super::index::{IndexBuilder, LibraryIndex, Sample};

/// File extensions that are considered audio files.
pub const AUDIO_EXTENSIONS: [&str; 5] = ["wav", "aif", "aiff", "flac", "mp3"];

/// Builds library indexes from folders of sample files.
#[derive(Clone)]
pub struct LibraryLoader {
    decoder: Arc<dyn SampleDecoder>,
}

impl LibraryLoader {
    /// Creates a new loader that decodes files with the given decoder.
    pub fn new(decoder: Arc<dyn SampleDecoder>) -> LibraryLoader {
        LibraryLoader { decoder }
    }

    /// Builds an index from the audio files directly inside `folder`.
    ///
    /// This never fails: files with unrecognized names or undecodable audio are skipped,
    /// and a missing folder produces an empty index.
    pub fn load(&self, folder: &Path) -> LibraryIndex {
        let start = Instant::now();
        let folder_path = folder.to_path_buf();

        if !folder.is_dir() {
            warn!(path = ?folder, "Sample folder does not exist or is not a directory");
            return LibraryIndex::empty(Some(folder_path));
        }

        info!(path = ?folder, "Loading sample library");

        let files = match audio_files(folder) {
            Ok(files) => files,
            Err(e) => {
                warn!(path = ?folder, error = %e, "Unable to read sample folder");
                return LibraryIndex::empty(Some(folder_path));
            }
        };
        let file_count = files.len();

        let named: Vec<(PathBuf, SampleName)> = files
            .into_iter()
            .filter_map(|path| match SampleName::from_path(&path) {
                Ok(name) => Some((path, name)),
                Err(e) => {
                    debug!(path = ?path, reason = %e, "Skipping file with unrecognized name");
                    None
                }
            })
            .collect();

        // Decoding is the expensive part, so spread it across threads. The collected
        // order matches the folder order, which keeps duplicate handling the same as
        // a sequential load.
        let samples: Vec<Option<Sample>> = named
            .into_par_iter()
            .map(|(path, name)| match self.decoder.decode(&path) {
                Ok(audio) => Some(Sample::new(name, audio, path)),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to decode sample");
                    None
                }
            })
            .collect();

        let mut builder = IndexBuilder::new();
        for sample in samples.into_iter().flatten() {
            builder.insert(sample);
        }
        let index = builder.build(Some(folder_path));

        info!(
            path = ?folder,
            files = file_count,
            samples = index.sample_count(),
            notes = index.sampled_note_count(),
            fallbacks = index.fallback_count(),
            memory_kb = index.memory_usage() / 1024,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sample library loaded"
        );

        index
    }
}

impl fmt::Debug for LibraryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryLoader").finish_non_exhaustive()
    }
}

/// Returns true if the path has one of the supported audio extensions.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// Lists the audio files directly inside a folder, in directory order.
fn audio_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() && is_audio_file(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::library::SymphoniaDecoder;
    use crate::testutil::{write_wav, StubDecoder};

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("C4_100_1.wav")));
        assert!(is_audio_file(Path::new("C4_100_1.WAV")));
        assert!(is_audio_file(Path::new("C4_100_1.aif")));
        assert!(is_audio_file(Path::new("C4_100_1.aiff")));
        assert!(is_audio_file(Path::new("C4_100_1.flac")));
        assert!(is_audio_file(Path::new("C4_100_1.mp3")));
        assert!(!is_audio_file(Path::new("C4_100_1.ogg")));
        assert!(!is_audio_file(Path::new("C4_100_1")));
        assert!(!is_audio_file(Path::new("notes.txt")));
    }

    #[test]
    fn test_load_skips_malformed_and_undecodable() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "C4_100_1.wav",
            "C4_100_2.wav",
            "D4_64_1.flac",
            "readme.txt",
            "C4_100.wav",
            "C4_000_1.wav",
            "C4_100_4.wav",
            "H4_100_1.wav",
        ] {
            fs::write(dir.path().join(name), "ok").unwrap();
        }
        fs::write(dir.path().join("E4_100_1.wav"), StubDecoder::CORRUPT).unwrap();
        // Nested folders are not searched.
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("F4_100_1.wav"), "ok").unwrap();

        let loader = LibraryLoader::new(Arc::new(StubDecoder::new(8)));
        let index = loader.load(dir.path());

        assert_eq!(index.sample_count(), 3);
        assert_eq!(index.sampled_note_count(), 2);
        assert!(index.mapping(60).unwrap().is_sampled());
        assert!(index.mapping(62).unwrap().is_sampled());
        // E4 failed to decode and F4 is nested, so nothing above D4 is mapped.
        assert!(index.mapping(64).is_none());
        assert!(index.mapping(65).is_none());
        assert_eq!(index.mapping(61).unwrap().fallback(), Some(62));
        assert_eq!(index.folder(), Some(dir.path()));
    }

    #[test]
    fn test_load_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let loader = LibraryLoader::new(Arc::new(StubDecoder::new(8)));

        let index = loader.load(&missing);
        assert!(index.is_empty());
        assert_eq!(index.folder(), Some(missing.as_path()));
    }

    #[test]
    fn test_load_file_instead_of_folder() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("C4_100_1.wav");
        fs::write(&file, "ok").unwrap();
        let loader = LibraryLoader::new(Arc::new(StubDecoder::new(8)));

        assert!(loader.load(&file).is_empty());
    }

    #[test]
    fn test_load_real_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("A3_060_01.wav"), vec![vec![0.25; 100]], 44100).unwrap();
        write_wav(
            &dir.path().join("A3_127_01_loud.wav"),
            vec![vec![0.5; 50], vec![-0.5; 50]],
            48000,
        )
        .unwrap();

        let loader = LibraryLoader::new(Arc::new(SymphoniaDecoder));
        let index = loader.load(dir.path());

        assert_eq!(index.sample_count(), 2);
        let soft = index.resolve(57, 30, 1).unwrap();
        assert_eq!(soft.channel_count(), 1);
        assert_eq!(soft.len(), 100);
        assert_eq!(soft.sample_rate(), 44100);

        let loud = index.resolve(57, 100, 2).unwrap();
        assert_eq!(loud.channel_count(), 2);
        assert_eq!(loud.len(), 50);
        assert_eq!(loud.sample_rate(), 48000);
        assert_eq!(&loud.frames_from(0)[..2], &[0.5, -0.5]);

        // Every note below A3 borrows from it.
        assert_eq!(index.mapping(0).unwrap().fallback(), Some(57));
        assert_eq!(index.memory_usage(), (100 + 100) * 4);
    }
}
