use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use log::{info, trace, warn};
use thiserror::Error;

use crate::formats::bytes::save_atomic;
use crate::formats::mcd::{self, McdError, PartRecord, MCD_RECORD_SIZE};
use crate::formats::pck::{Sprite, SpriteError, Spriteset};
use crate::model::parts::Tilepart;

/// Part-index bytes in a MAP file are `set_id + 2`; values 0 and 1 are the
/// reserved blank slots, which caps a catalog at 253 usable parts.
pub const MAP_BLANK_SLOTS: usize = 2;
pub const MAX_CATALOG_PARTS: usize = u8::MAX as usize - MAP_BLANK_SLOTS;

/// One terrain contributing parts to a tileset: a label naming its
/// MCD/PCK/TAB triple and the directory holding them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terrain {
    pub label: String,
    pub path: PathBuf,
}

/// A tileset: label, base path and the ordered terrain list. Building it
/// produces the combined part catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub label: String,
    pub basepath: PathBuf,
    pub terrains: Vec<Terrain>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("{}: {len} bytes is not a multiple of {MCD_RECORD_SIZE}-byte records", .path.display())]
    CorruptFile { path: PathBuf, len: usize },

    #[error("terrain {terrain}: {source}")]
    Sprite {
        terrain: String,
        source: SpriteError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Non-fatal conditions noticed while building a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogWarning {
    #[error("catalog holds {total} parts, only {MAX_CATALOG_PARTS} fit the map index byte")]
    RecordCountExceeded { total: usize },
}

/// Everything an open tileset owns: one spriteset per terrain and the
/// combined part catalog. Built when the tileset is opened, dropped when it
/// is closed or reloaded; the owner hands it to every operation explicitly.
pub struct TilesetData {
    pub descriptor: Descriptor,
    spritesets: Vec<Spriteset>,
    parts: Vec<Tilepart>,
    warnings: Vec<CatalogWarning>,
}

impl TilesetData {
    pub fn build(descriptor: Descriptor) -> Result<Self, CatalogError> {
        trace!("TilesetData::build {}", descriptor.label);

        let mut spritesets = Vec::with_capacity(descriptor.terrains.len());
        let mut parts = Vec::new();

        for (terrain_index, terrain) in descriptor.terrains.iter().enumerate() {
            let dir = descriptor.basepath.join(&terrain.path);

            let mcd_path = dir.join(format!("{}.MCD", terrain.label));
            let bytes = fs::read(&mcd_path).map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    CatalogError::FileNotFound { path: mcd_path.clone() }
                } else {
                    CatalogError::Io(e)
                }
            })?;
            let records = mcd::read_records(&bytes, &terrain.label).map_err(|e| match e {
                McdError::CorruptFile { len } => CatalogError::CorruptFile {
                    path: mcd_path.clone(),
                    len,
                },
                McdError::Io(io) => CatalogError::Io(io),
            })?;

            let spriteset = Spriteset::read(&dir, &terrain.label).map_err(|e| match e {
                SpriteError::Io(io) if io.kind() == ErrorKind::NotFound => {
                    CatalogError::FileNotFound {
                        path: dir.join(format!("{}.PCK", terrain.label)),
                    }
                }
                source => CatalogError::Sprite {
                    terrain: terrain.label.clone(),
                    source,
                },
            })?;

            bind_parts(&mut parts, &records, terrain_index);
            spritesets.push(spriteset);
        }

        let mut warnings = Vec::new();
        if parts.len() > MAX_CATALOG_PARTS {
            let warning = CatalogWarning::RecordCountExceeded { total: parts.len() };
            warn!("{}: {warning}", descriptor.label);
            warnings.push(warning);
        }

        info!(
            "tileset {}: {} terrains, {} parts",
            descriptor.label,
            descriptor.terrains.len(),
            parts.len()
        );

        Ok(TilesetData {
            descriptor,
            spritesets,
            parts,
            warnings,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    #[inline]
    pub fn part(&self, set_id: usize) -> Option<&Tilepart> {
        self.parts.get(set_id)
    }

    #[inline]
    pub fn parts(&self) -> &[Tilepart] {
        &self.parts
    }

    /// The catalog as a mutable sequence, for the integrity operations.
    #[inline]
    pub fn parts_mut(&mut self) -> &mut Vec<Tilepart> {
        &mut self.parts
    }

    #[inline]
    pub fn spriteset(&self, terrain: usize) -> Option<&Spriteset> {
        self.spritesets.get(terrain)
    }

    #[inline]
    pub fn warnings(&self) -> &[CatalogWarning] {
        &self.warnings
    }

    /// Resolves one animation phase of a part to its sprite.
    pub fn sprite(&self, part: &Tilepart, phase: usize) -> Option<&Sprite> {
        let sprite_id = *part.record.sprites.get(phase)?;
        self.spritesets.get(part.terrain)?.get(sprite_id as usize)
    }

    /// Writes one terrain's records back to its MCD file, re-encoding the
    /// death/alternate references first. The file is replaced atomically.
    pub fn save_terrain(&mut self, terrain_index: usize) -> Result<(), CatalogError> {
        let terrain = self
            .descriptor
            .terrains
            .get(terrain_index)
            .ok_or_else(|| CatalogError::FileNotFound {
                path: self.descriptor.basepath.clone(),
            })?
            .clone();

        let terrain_base = self
            .parts
            .iter()
            .position(|p| p.terrain == terrain_index)
            .unwrap_or(self.parts.len());
        let terrain_len = self
            .parts
            .iter()
            .filter(|p| p.terrain == terrain_index)
            .count();

        let mut records = Vec::with_capacity(terrain_len);
        for part in &mut self.parts {
            if part.terrain == terrain_index {
                part.sync_record(terrain_base, terrain_len);
                records.push(part.record.clone());
            }
        }

        let dir = self.descriptor.basepath.join(&terrain.path);
        let path = dir.join(format!("{}.MCD", terrain.label));
        save_atomic(&path, &mcd::write_records(&records))?;
        Ok(())
    }
}

/// Appends one terrain's records to the catalog, assigning ids and resolving
/// the 1-based terrain-local death/alternate bytes to catalog positions.
fn bind_parts(parts: &mut Vec<Tilepart>, records: &[PartRecord], terrain_index: usize) {
    let terrain_base = parts.len();

    for (ter_id, record) in records.iter().enumerate() {
        let set_id = terrain_base + ter_id;
        let mut part = Tilepart::new(record.clone(), terrain_index, ter_id, set_id);
        part.dead_ref = resolve_ref(record.die_tile, terrain_base, records.len(), set_id, "death");
        part.alt_ref = resolve_ref(record.alt_tile, terrain_base, records.len(), set_id, "alternate");
        parts.push(part);
    }
}

fn resolve_ref(
    byte: u8,
    terrain_base: usize,
    terrain_len: usize,
    set_id: usize,
    what: &str,
) -> Option<usize> {
    match byte {
        0 => None,
        v => {
            let local = v as usize - 1;
            if local < terrain_len {
                Some(terrain_base + local)
            } else {
                warn!("part {set_id}: {what} reference {v} outside its terrain, dropped");
                None
            }
        }
    }
}
