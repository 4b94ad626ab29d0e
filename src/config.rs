use std::fs;
use std::path::{Path, PathBuf};
use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formats::bytes::save_atomic;
use crate::model::tileset::{Descriptor, Terrain};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("bad registry file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainEntry {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetEntry {
    pub label: String,
    pub basepath: PathBuf,
    pub terrains: Vec<TerrainEntry>,
}

impl TilesetEntry {
    pub fn to_descriptor(&self) -> Descriptor {
        Descriptor {
            label: self.label.clone(),
            basepath: self.basepath.clone(),
            terrains: self
                .terrains
                .iter()
                .map(|t| Terrain {
                    label: t.label.clone(),
                    path: t.path.clone(),
                })
                .collect(),
        }
    }
}

/// The configured tilesets, kept in a plain json file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetRegistry {
    pub tilesets: Vec<TilesetEntry>,
}

impl TilesetRegistry {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        trace!("TilesetRegistry::load {}", path.display());
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Saves through the temp-then-rename protocol, like every other file
    /// this crate writes.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        save_atomic(path, text.as_bytes())?;
        Ok(())
    }

    pub fn find(&self, label: &str) -> Option<&TilesetEntry> {
        self.tilesets.iter().find(|t| t.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TilesetRegistry {
        TilesetRegistry {
            tilesets: vec![TilesetEntry {
                label: "URBAN".into(),
                basepath: "data/urban".into(),
                terrains: vec![
                    TerrainEntry { label: "ROADS".into(), path: "TERRAIN".into() },
                    TerrainEntry { label: "FRNITURE".into(), path: "TERRAIN".into() },
                ],
            }],
        }
    }

    #[test]
    fn roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let registry = sample();
        registry.save(&path).unwrap();
        assert_eq!(TilesetRegistry::load(&path).unwrap(), registry);
    }

    #[test]
    fn entry_becomes_a_descriptor() {
        let registry = sample();
        let descriptor = registry.find("URBAN").unwrap().to_descriptor();

        assert_eq!(descriptor.label, "URBAN");
        assert_eq!(descriptor.terrains.len(), 2);
        assert_eq!(descriptor.terrains[1].label, "FRNITURE");
        assert!(registry.find("MARS").is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            TilesetRegistry::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
