use log::{trace, warn};
use thiserror::Error;

use crate::formats::map::{MapFile, MapFileError};
use crate::model::tileset::MAP_BLANK_SLOTS;

pub const MAX_DIMENSION: usize = u8::MAX as usize;

#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    File(#[from] MapFileError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A cell coordinate. Levels are stored top-down: level 0 is the ceiling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GridLocation {
    pub row: usize,
    pub col: usize,
    pub lev: usize,
}

impl GridLocation {
    pub fn new(row: usize, col: usize, lev: usize) -> Self {
        GridLocation { row, col, lev }
    }
}

/// The four part slots of a cell, in on-disk quad order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PartSlot {
    Floor,
    West,
    North,
    Content,
}

pub const PART_SLOTS: [PartSlot; 4] = [
    PartSlot::Floor,
    PartSlot::West,
    PartSlot::North,
    PartSlot::Content,
];

/// One grid cell: up to four catalog part references, the derived occultation
/// flag and the back-reference to a route node occupying the cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileCell {
    pub floor: Option<usize>,
    pub west: Option<usize>,
    pub north: Option<usize>,
    pub content: Option<usize>,
    pub occulted: bool,
    pub node: Option<usize>,
}

impl TileCell {
    #[inline]
    pub fn part(&self, slot: PartSlot) -> Option<usize> {
        match slot {
            PartSlot::Floor => self.floor,
            PartSlot::West => self.west,
            PartSlot::North => self.north,
            PartSlot::Content => self.content,
        }
    }

    #[inline]
    pub fn set_part(&mut self, slot: PartSlot, part: Option<usize>) {
        match slot {
            PartSlot::Floor => self.floor = part,
            PartSlot::West => self.west = part,
            PartSlot::North => self.north = part,
            PartSlot::Content => self.content = part,
        }
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.floor.is_none() && self.west.is_none() && self.north.is_none() && self.content.is_none()
    }
}

/// Result of a resize: the rebuilt grid and the number of levels existing
/// content moved down by (nonzero only when the ceiling grew).
pub struct ResizeOutcome {
    pub grid: MapGrid,
    pub lev_shift: usize,
}

/// The tile grid of one map, level-major, row-major, column-major.
pub struct MapGrid {
    rows: usize,
    cols: usize,
    levs: usize,
    cells: Vec<TileCell>,
    changed: bool,
}

impl MapGrid {
    pub fn blank(rows: usize, cols: usize, levs: usize) -> Self {
        MapGrid {
            rows,
            cols,
            levs,
            cells: vec![TileCell::default(); rows * cols * levs],
            changed: false,
        }
    }

    /// Decodes MAP bytes against a catalog of `catalog_len` parts. Part
    /// bytes that do not resolve are clamped to blank and the grid is
    /// flagged changed so the next save persists the repair.
    pub fn load(bytes: &[u8], catalog_len: usize) -> Result<Self, MapError> {
        let file = MapFile::read(bytes)?;
        trace!(
            "MapGrid::load {}x{}x{}",
            file.rows,
            file.cols,
            file.levs
        );

        let mut grid = MapGrid::blank(file.rows as usize, file.cols as usize, file.levs as usize);

        let mut clamped = 0usize;
        for (cell, quad) in grid.cells.iter_mut().zip(&file.quads) {
            cell.floor = decode_part_byte(quad[0], catalog_len, &mut clamped);
            cell.west = decode_part_byte(quad[1], catalog_len, &mut clamped);
            cell.north = decode_part_byte(quad[2], catalog_len, &mut clamped);
            cell.content = decode_part_byte(quad[3], catalog_len, &mut clamped);
        }

        if clamped != 0 {
            warn!("{clamped} part references outside the catalog were cleared");
            grid.changed = true;
        }

        Ok(grid)
    }

    /// Encodes the grid back to MAP bytes. A part whose index no longer fits
    /// the on-disk byte is written blank; the loss is logged, not repaired.
    pub fn save(&self) -> Vec<u8> {
        let mut overflowed = 0usize;
        let quads = self
            .cells
            .iter()
            .map(|cell| {
                [
                    encode_part_byte(cell.floor, &mut overflowed),
                    encode_part_byte(cell.west, &mut overflowed),
                    encode_part_byte(cell.north, &mut overflowed),
                    encode_part_byte(cell.content, &mut overflowed),
                ]
            })
            .collect();

        if overflowed != 0 {
            warn!("{overflowed} parts past the index byte written as blank");
        }

        MapFile {
            rows: self.rows as u8,
            cols: self.cols as u8,
            levs: self.levs as u8,
            quads,
        }
        .write()
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn levs(&self) -> usize {
        self.levs
    }

    #[inline]
    pub fn contains(&self, loc: GridLocation) -> bool {
        loc.row < self.rows && loc.col < self.cols && loc.lev < self.levs
    }

    #[inline]
    fn index(&self, loc: GridLocation) -> usize {
        (loc.lev * self.rows + loc.row) * self.cols + loc.col
    }

    #[inline]
    pub fn cell(&self, loc: GridLocation) -> &TileCell {
        &self.cells[self.index(loc)]
    }

    #[inline]
    pub fn cell_mut(&mut self, loc: GridLocation) -> &mut TileCell {
        let index = self.index(loc);
        &mut self.cells[index]
    }

    #[inline]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    #[inline]
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Places (or clears) one part slot, reporting the touched cells.
    pub fn set_part(
        &mut self,
        loc: GridLocation,
        slot: PartSlot,
        part: Option<usize>,
    ) -> Vec<GridLocation> {
        if !self.contains(loc) {
            return Vec::new();
        }
        let cell = self.cell_mut(loc);
        if cell.part(slot) == part {
            return Vec::new();
        }
        cell.set_part(slot, part);
        self.changed = true;
        vec![loc]
    }

    /// Blanks all four part slots of a cell, reporting the touched cells.
    pub fn clear_cell(&mut self, loc: GridLocation) -> Vec<GridLocation> {
        if !self.contains(loc) {
            return Vec::new();
        }
        let cell = self.cell_mut(loc);
        if cell.is_blank() {
            return Vec::new();
        }
        for slot in PART_SLOTS {
            cell.set_part(slot, None);
        }
        self.changed = true;
        vec![loc]
    }

    /// Rebuilds the grid at the new dimensions, keeping content at matching
    /// coordinates. Growing levels with `grow_ceiling` prepends the new
    /// empty levels instead, pushing existing content down in index space;
    /// the reported shift must then be applied to every route node's level.
    pub fn resize(
        &self,
        rows: usize,
        cols: usize,
        levs: usize,
        grow_ceiling: bool,
    ) -> Option<ResizeOutcome> {
        for dim in [rows, cols, levs] {
            if dim == 0 || dim > MAX_DIMENSION {
                return None;
            }
        }

        let lev_shift = if grow_ceiling && levs > self.levs {
            levs - self.levs
        } else {
            0
        };

        let mut grid = MapGrid::blank(rows, cols, levs);
        for lev in 0..levs {
            let src_lev = match lev.checked_sub(lev_shift) {
                Some(src) if src < self.levs => src,
                _ => continue,
            };
            for row in 0..rows.min(self.rows) {
                for col in 0..cols.min(self.cols) {
                    *grid.cell_mut(GridLocation::new(row, col, lev)) =
                        self.cell(GridLocation::new(row, col, src_lev)).clone();
                }
            }
        }
        grid.changed = true;

        Some(ResizeOutcome { grid, lev_shift })
    }

    /// Recomputes the occultation flags: a cell is hidden when the level
    /// below carries a complete 3x3 floor patch anchored at it. The two
    /// highest rows and columns are never evaluated and stay visible;
    /// viewers depend on that boundary.
    pub fn calculate_occultation(&mut self, force_visible: bool) {
        for cell in &mut self.cells {
            cell.occulted = false;
        }
        if force_visible {
            return;
        }

        for lev in (1..self.levs).rev() {
            for row in 0..self.rows.saturating_sub(2) {
                for col in 0..self.cols.saturating_sub(2) {
                    let mut occulted = true;
                    'patch: for dr in 0..3 {
                        for dc in 0..3 {
                            if !self.floor_present(row + dr, col + dc, lev - 1) {
                                occulted = false;
                                break 'patch;
                            }
                        }
                    }
                    self.cell_mut(GridLocation::new(row, col, lev)).occulted = occulted;
                }
            }
        }
    }

    #[inline]
    fn floor_present(&self, row: usize, col: usize, lev: usize) -> bool {
        self.cell(GridLocation::new(row, col, lev)).floor.is_some()
    }
}

#[inline]
fn decode_part_byte(byte: u8, catalog_len: usize, clamped: &mut usize) -> Option<usize> {
    match byte as usize {
        0 => None,
        v if v >= MAP_BLANK_SLOTS && v - MAP_BLANK_SLOTS < catalog_len => Some(v - MAP_BLANK_SLOTS),
        _ => {
            *clamped += 1;
            None
        }
    }
}

#[inline]
fn encode_part_byte(part: Option<usize>, overflowed: &mut usize) -> u8 {
    match part {
        None => 0,
        Some(id) => {
            let value = id + MAP_BLANK_SLOTS;
            if value > u8::MAX as usize {
                *overflowed += 1;
                0
            } else {
                value as u8
            }
        }
    }
}
