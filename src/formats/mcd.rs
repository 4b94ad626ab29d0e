use std::io::Read;
use log::warn;
use thiserror::Error;

use crate::formats::bytes::{read_i8, read_u16, read_u8};

/// Fixed on-disk size of one part record.
pub const MCD_RECORD_SIZE: usize = 62;

pub const SPRITE_PHASES: usize = 8;
pub const LOFT_LAYERS: usize = 12;

#[derive(Debug, Error)]
pub enum McdError {
    #[error("record data of {len} bytes is not a multiple of {MCD_RECORD_SIZE}")]
    CorruptFile { len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which quadrant of a tile cell a part occupies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PartType {
    Floor = 0,
    WestWall = 1,
    NorthWall = 2,
    Content = 3,
}

impl PartType {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(PartType::Floor),
            1 => Some(PartType::WestWall),
            2 => Some(PartType::NorthWall),
            3 => Some(PartType::Content),
            _ => None,
        }
    }
}

/// Mission-level classification of a part.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpecialType {
    None = 0,
    EntryPoint = 1,
    PowerSource = 2,
    Navigation = 3,
    Construction = 4,
    Food = 5,
    Reproduction = 6,
    Entertainment = 7,
    Surgery = 8,
    Examination = 9,
    Alloys = 10,
    Habitat = 11,
    DeadTile = 12,
    ExitPoint = 13,
    MustDestroy = 14,
}

impl SpecialType {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(SpecialType::None),
            1 => Some(SpecialType::EntryPoint),
            2 => Some(SpecialType::PowerSource),
            3 => Some(SpecialType::Navigation),
            4 => Some(SpecialType::Construction),
            5 => Some(SpecialType::Food),
            6 => Some(SpecialType::Reproduction),
            7 => Some(SpecialType::Entertainment),
            8 => Some(SpecialType::Surgery),
            9 => Some(SpecialType::Examination),
            10 => Some(SpecialType::Alloys),
            11 => Some(SpecialType::Habitat),
            12 => Some(SpecialType::DeadTile),
            13 => Some(SpecialType::ExitPoint),
            14 => Some(SpecialType::MustDestroy),
            _ => None,
        }
    }
}

/// One 62-byte part record. Unknown filler bytes are kept so a loaded file
/// saves back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    pub sprites: [u8; SPRITE_PHASES],
    pub loft: [u8; LOFT_LAYERS],
    pub scang: u16,
    pub unknown22: [u8; 8],
    pub slide_door: bool,
    pub block_los: bool,
    pub no_floor: bool,
    pub big_wall: bool,
    pub grav_lift: bool,
    pub hinge_door: bool,
    pub block_fire: bool,
    pub block_smoke: bool,
    pub start_phase: u8,
    pub tu_walk: u8,
    pub tu_slide: u8,
    pub tu_fly: u8,
    pub armor: u8,
    pub explosive_block: u8,
    pub die_tile: u8,
    pub flammable: u8,
    pub alt_tile: u8,
    pub unknown47: u8,
    pub terrain_offset: i8,
    pub sprite_offset: u8,
    pub unknown50: u8,
    pub light_block: u8,
    pub footstep: u8,
    pub part_type: PartType,
    pub explosive_type: u8,
    pub explosive_strength: u8,
    pub smoke_block: u8,
    pub fuel: u8,
    pub light_source: u8,
    pub special: SpecialType,
    pub base_object: bool,
    pub unknown61: u8,
}

impl Default for PartRecord {
    fn default() -> Self {
        PartRecord {
            sprites: [0; SPRITE_PHASES],
            loft: [0; LOFT_LAYERS],
            scang: 0,
            unknown22: [0; 8],
            slide_door: false,
            block_los: false,
            no_floor: false,
            big_wall: false,
            grav_lift: false,
            hinge_door: false,
            block_fire: false,
            block_smoke: false,
            start_phase: 0,
            tu_walk: 0,
            tu_slide: 0,
            tu_fly: 0,
            armor: 0,
            explosive_block: 0,
            die_tile: 0,
            flammable: 0,
            alt_tile: 0,
            unknown47: 0,
            terrain_offset: 0,
            sprite_offset: 0,
            unknown50: 0,
            light_block: 0,
            footstep: 0,
            part_type: PartType::Floor,
            explosive_type: 0,
            explosive_strength: 0,
            smoke_block: 0,
            fuel: 0,
            light_source: 0,
            special: SpecialType::None,
            base_object: false,
            unknown61: 0,
        }
    }
}

impl PartRecord {
    fn read<R: Read>(reader: &mut R, label: &str, index: usize) -> Result<Self, McdError> {
        let mut sprites = [0; SPRITE_PHASES];
        reader.read_exact(&mut sprites)?;
        let mut loft = [0; LOFT_LAYERS];
        reader.read_exact(&mut loft)?;
        let scang = read_u16(reader)?;
        let mut unknown22 = [0; 8];
        reader.read_exact(&mut unknown22)?;

        let record = PartRecord {
            sprites,
            loft,
            scang,
            unknown22,
            slide_door: read_u8(reader)? != 0,
            block_los: read_u8(reader)? != 0,
            no_floor: read_u8(reader)? != 0,
            big_wall: read_u8(reader)? != 0,
            grav_lift: read_u8(reader)? != 0,
            hinge_door: read_u8(reader)? != 0,
            block_fire: read_u8(reader)? != 0,
            block_smoke: read_u8(reader)? != 0,
            start_phase: read_u8(reader)?,
            tu_walk: read_u8(reader)?,
            tu_slide: read_u8(reader)?,
            tu_fly: read_u8(reader)?,
            armor: read_u8(reader)?,
            explosive_block: read_u8(reader)?,
            die_tile: read_u8(reader)?,
            flammable: read_u8(reader)?,
            alt_tile: read_u8(reader)?,
            unknown47: read_u8(reader)?,
            terrain_offset: read_i8(reader)?,
            sprite_offset: read_u8(reader)?,
            unknown50: read_u8(reader)?,
            light_block: read_u8(reader)?,
            footstep: read_u8(reader)?,
            part_type: {
                let raw = read_u8(reader)?;
                PartType::from_byte(raw).unwrap_or_else(|| {
                    warn!("{label} record {index}: part type {raw} treated as floor");
                    PartType::Floor
                })
            },
            explosive_type: read_u8(reader)?,
            explosive_strength: read_u8(reader)?,
            smoke_block: read_u8(reader)?,
            fuel: read_u8(reader)?,
            light_source: read_u8(reader)?,
            special: {
                let raw = read_u8(reader)?;
                SpecialType::from_byte(raw).unwrap_or_else(|| {
                    warn!("{label} record {index}: special type {raw} treated as none");
                    SpecialType::None
                })
            },
            base_object: read_u8(reader)? != 0,
            unknown61: read_u8(reader)?,
        };

        Ok(record)
    }

    pub fn to_bytes(&self) -> [u8; MCD_RECORD_SIZE] {
        let mut raw = [0u8; MCD_RECORD_SIZE];
        raw[0..8].copy_from_slice(&self.sprites);
        raw[8..20].copy_from_slice(&self.loft);
        raw[20..22].copy_from_slice(&self.scang.to_le_bytes());
        raw[22..30].copy_from_slice(&self.unknown22);
        raw[30] = self.slide_door as u8;
        raw[31] = self.block_los as u8;
        raw[32] = self.no_floor as u8;
        raw[33] = self.big_wall as u8;
        raw[34] = self.grav_lift as u8;
        raw[35] = self.hinge_door as u8;
        raw[36] = self.block_fire as u8;
        raw[37] = self.block_smoke as u8;
        raw[38] = self.start_phase;
        raw[39] = self.tu_walk;
        raw[40] = self.tu_slide;
        raw[41] = self.tu_fly;
        raw[42] = self.armor;
        raw[43] = self.explosive_block;
        raw[44] = self.die_tile;
        raw[45] = self.flammable;
        raw[46] = self.alt_tile;
        raw[47] = self.unknown47;
        raw[48] = self.terrain_offset as u8;
        raw[49] = self.sprite_offset;
        raw[50] = self.unknown50;
        raw[51] = self.light_block;
        raw[52] = self.footstep;
        raw[53] = self.part_type as u8;
        raw[54] = self.explosive_type;
        raw[55] = self.explosive_strength;
        raw[56] = self.smoke_block;
        raw[57] = self.fuel;
        raw[58] = self.light_source;
        raw[59] = self.special as u8;
        raw[60] = self.base_object as u8;
        raw[61] = self.unknown61;
        raw
    }
}

/// Parses a whole record file. The length must be an exact multiple of the
/// record size.
pub fn read_records(bytes: &[u8], label: &str) -> Result<Vec<PartRecord>, McdError> {
    if bytes.len() % MCD_RECORD_SIZE != 0 {
        return Err(McdError::CorruptFile { len: bytes.len() });
    }

    let count = bytes.len() / MCD_RECORD_SIZE;
    let reader = &mut &bytes[..];
    let mut records = Vec::with_capacity(count);
    for index in 0..count {
        records.push(PartRecord::read(reader, label, index)?);
    }
    Ok(records)
}

pub fn write_records(records: &[PartRecord]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(records.len() * MCD_RECORD_SIZE);
    for record in records {
        bytes.extend_from_slice(&record.to_bytes());
    }
    bytes
}
