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
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;
use super::midi::Midi;

/// The configuration for the live sampler.
#[derive(Deserialize, Clone, Debug)]
pub struct Player {
    /// The sample library folder loaded at start.
    library: Option<PathBuf>,

    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,

    /// The MIDI input configuration.
    midi: Option<Midi>,
}

impl Player {
    /// Creates a new player configuration.
    pub fn new(library: Option<PathBuf>, audio: Audio, midi: Option<Midi>) -> Player {
        Player {
            library,
            audio,
            midi,
        }
    }

    /// Parse a player configuration from a YAML file. A relative library path is taken
    /// to be relative to the configuration file.
    pub fn deserialize(path: &Path) -> Result<Player, ConfigError> {
        let mut player = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Player>()?;

        if let (Some(library), Some(parent)) = (player.library.as_ref(), path.parent()) {
            if library.is_relative() {
                player.library = Some(parent.join(library));
            }
        }
        Ok(player)
    }

    /// Returns the sample library folder.
    pub fn library(&self) -> Option<&Path> {
        self.library.as_deref()
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the MIDI configuration.
    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use config::FileFormat;

    use super::*;

    #[test]
    fn test_deserialize_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rrsampler.yaml");
        fs::write(
            &path,
            r#"
            library: /samples/piano
            audio:
              device: UltraLite-mk5
              sample_rate: 48000
              channels: 4
              block_size: 128
            midi:
              device: Keystation
            "#,
        )
        .unwrap();

        let player = Player::deserialize(&path).unwrap();
        assert_eq!(player.library(), Some(Path::new("/samples/piano")));
        assert_eq!(player.audio().device(), "UltraLite-mk5");
        assert_eq!(player.audio().sample_rate(), 48000);
        assert_eq!(player.audio().channels(), 4);
        assert_eq!(player.audio().block_size(), 128);
        assert_eq!(player.midi().map(Midi::device), Some("Keystation"));
    }

    #[test]
    fn test_defaults() {
        let player: Player = Config::builder()
            .add_source(File::from_str("library: samples", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(player.audio().device(), "default");
        assert_eq!(player.audio().sample_rate(), 44100);
        assert_eq!(player.audio().channels(), 2);
        assert_eq!(player.audio().block_size(), 256);
        assert!(player.midi().is_none());
    }

    #[test]
    fn test_new() {
        let player = Player::new(
            Some(PathBuf::from("/samples/piano")),
            Audio::new("UltraLite-mk5"),
            Some(Midi::new("Keystation")),
        );

        assert_eq!(player.library(), Some(Path::new("/samples/piano")));
        assert_eq!(player.audio().device(), "UltraLite-mk5");
        assert_eq!(player.audio().sample_rate(), 44100);
        assert_eq!(player.audio().block_size(), 256);
        assert_eq!(player.midi().map(Midi::device), Some("Keystation"));
    }

    #[test]
    fn test_relative_library_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rrsampler.yaml");
        fs::write(&path, "library: samples/piano\n").unwrap();

        let player = Player::deserialize(&path).unwrap();
        assert_eq!(
            player.library(),
            Some(dir.path().join("samples/piano").as_path())
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Player::deserialize(&dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
