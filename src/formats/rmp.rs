use std::io::Read;
use thiserror::Error;

use crate::formats::bytes::read_u8;

/// Fixed on-disk size of one route-node record.
pub const RMP_RECORD_SIZE: usize = 24;

/// Link slots per node.
pub const NODE_LINKS: usize = 5;

// link destination bytes above the node range are sentinels
pub const LINK_EXIT_NORTH: u8 = 251;
pub const LINK_EXIT_EAST: u8 = 252;
pub const LINK_EXIT_SOUTH: u8 = 253;
pub const LINK_EXIT_WEST: u8 = 254;
pub const LINK_NOT_USED: u8 = 255;

/// Highest addressable node count with 1-byte link destinations.
pub const MAX_NODES: usize = LINK_EXIT_NORTH as usize;

#[derive(Debug, Error)]
pub enum RmpFileError {
    #[error("route data of {len} bytes is not a multiple of {RMP_RECORD_SIZE}")]
    CorruptFile { len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Raw 24-byte route-node record: position, five 3-byte link slots, then
/// unit type, rank and the spawn/patrol/attack weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRecord {
    pub row: u8,
    pub col: u8,
    pub lev: u8,
    pub unknown3: u8,
    pub links: [[u8; 3]; NODE_LINKS], // destination, distance, passability
    pub unit: u8,
    pub rank: u8,
    pub patrol: u8,
    pub attack: u8,
    pub spawn: u8,
}

impl NodeRecord {
    fn read<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let row = read_u8(reader)?;
        let col = read_u8(reader)?;
        let lev = read_u8(reader)?;
        let unknown3 = read_u8(reader)?;

        let mut links = [[0u8; 3]; NODE_LINKS];
        for link in &mut links {
            reader.read_exact(link)?;
        }

        Ok(NodeRecord {
            row,
            col,
            lev,
            unknown3,
            links,
            unit: read_u8(reader)?,
            rank: read_u8(reader)?,
            patrol: read_u8(reader)?,
            attack: read_u8(reader)?,
            spawn: read_u8(reader)?,
        })
    }

    pub fn to_bytes(&self) -> [u8; RMP_RECORD_SIZE] {
        let mut raw = [0u8; RMP_RECORD_SIZE];
        raw[0] = self.row;
        raw[1] = self.col;
        raw[2] = self.lev;
        raw[3] = self.unknown3;
        for (slot, link) in self.links.iter().enumerate() {
            let base = 4 + slot * 3;
            raw[base..base + 3].copy_from_slice(link);
        }
        raw[19] = self.unit;
        raw[20] = self.rank;
        raw[21] = self.patrol;
        raw[22] = self.attack;
        raw[23] = self.spawn;
        raw
    }
}

pub fn read_records(bytes: &[u8]) -> Result<Vec<NodeRecord>, RmpFileError> {
    if bytes.len() % RMP_RECORD_SIZE != 0 {
        return Err(RmpFileError::CorruptFile { len: bytes.len() });
    }

    let count = bytes.len() / RMP_RECORD_SIZE;
    let reader = &mut &bytes[..];
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(NodeRecord::read(reader)?);
    }
    Ok(records)
}

pub fn write_records(records: &[NodeRecord]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(records.len() * RMP_RECORD_SIZE);
    for record in records {
        bytes.extend_from_slice(&record.to_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_records() {
        let mut record = NodeRecord {
            row: 3,
            col: 7,
            lev: 1,
            unknown3: 0,
            links: [[LINK_NOT_USED, 0, 0]; NODE_LINKS],
            unit: 2,
            rank: 4,
            patrol: 5,
            attack: 1,
            spawn: 9,
        };
        record.links[0] = [1, 3, 0];
        record.links[1] = [LINK_EXIT_WEST, 0, 0];

        let bytes = write_records(&[record]);
        assert_eq!(bytes.len(), RMP_RECORD_SIZE);
        assert_eq!(read_records(&bytes).unwrap(), vec![record]);
    }

    #[test]
    fn rejects_partial_record() {
        let bytes = vec![0u8; RMP_RECORD_SIZE + 5];
        assert!(matches!(
            read_records(&bytes),
            Err(RmpFileError::CorruptFile { .. })
        ));
    }
}
