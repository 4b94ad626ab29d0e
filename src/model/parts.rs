use log::warn;

use crate::formats::mcd::PartRecord;

/// One terrain part bound into an open tileset: the raw record, the terrain
/// it came from, its position inside that terrain (`ter_id`) and inside the
/// combined catalog (`set_id`), and the death/alternate cross-references as
/// resolved catalog positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tilepart {
    pub record: PartRecord,
    pub terrain: usize,
    pub ter_id: usize,
    pub set_id: usize,
    pub dead_ref: Option<usize>,
    pub alt_ref: Option<usize>,
}

impl Tilepart {
    pub fn new(record: PartRecord, terrain: usize, ter_id: usize, set_id: usize) -> Self {
        Tilepart {
            record,
            terrain,
            ter_id,
            set_id,
            dead_ref: None,
            alt_ref: None,
        }
    }

    /// Pushes the resolved references back into the record's terrain-local
    /// 1-based bytes before a record save. A reference that edits moved
    /// outside this part's own terrain has no byte encoding and is written
    /// as none.
    pub fn sync_record(&mut self, terrain_base: usize, terrain_len: usize) {
        self.record.die_tile = encode_ref(self.dead_ref, terrain_base, terrain_len, self.set_id, "death");
        self.record.alt_tile = encode_ref(self.alt_ref, terrain_base, terrain_len, self.set_id, "alternate");
    }
}

fn encode_ref(
    reference: Option<usize>,
    terrain_base: usize,
    terrain_len: usize,
    set_id: usize,
    what: &str,
) -> u8 {
    match reference {
        None => 0,
        Some(r) if r >= terrain_base && r < terrain_base + terrain_len => {
            let local = r - terrain_base + 1;
            if local > u8::MAX as usize {
                warn!("part {set_id}: {what} reference {r} exceeds the record byte, dropped");
                0
            } else {
                local as u8
            }
        }
        Some(r) => {
            warn!("part {set_id}: {what} reference {r} left its terrain, dropped");
            0
        }
    }
}
