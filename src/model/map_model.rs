use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use log::{info, trace};
use thiserror::Error;

use crate::formats::bytes::save_atomic;
use crate::model::grid::{GridLocation, MapError, MapGrid, PartSlot, ResizeOutcome};
use crate::model::routes::{RouteError, RouteGraph};
use crate::model::tileset::TilesetData;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

/// One open map: the tileset it draws parts from, the tile grid and the
/// route graph, plus the file paths they persist to. This handle owns the
/// whole lifetime; closing the map is dropping it.
pub struct MapModel {
    pub tileset: TilesetData,
    pub grid: MapGrid,
    pub routes: RouteGraph,
    map_path: PathBuf,
    route_path: PathBuf,
}

impl MapModel {
    /// Loads the grid and routes against an already-built tileset. A map
    /// without a route file gets an empty graph. Cell back-references are
    /// wired here; occultation starts computed.
    pub fn open(
        tileset: TilesetData,
        map_path: &Path,
        route_path: &Path,
    ) -> Result<Self, ModelError> {
        trace!("MapModel::open {}", map_path.display());

        let map_bytes = fs::read(map_path).map_err(MapError::Io)?;
        let mut grid = MapGrid::load(&map_bytes, tileset.len())?;

        let routes = match fs::read(route_path) {
            Ok(bytes) => RouteGraph::load(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => RouteGraph::default(),
            Err(e) => return Err(RouteError::Io(e).into()),
        };

        wire_node_refs(&mut grid, &routes);
        grid.calculate_occultation(false);

        Ok(MapModel {
            tileset,
            grid,
            routes,
            map_path: map_path.to_owned(),
            route_path: route_path.to_owned(),
        })
    }

    #[inline]
    pub fn is_changed(&self) -> bool {
        self.grid.is_changed() || self.routes.is_changed()
    }

    /// Persists the grid and the route graph. Both files go through the
    /// temp-then-rename protocol, so a failed write leaves the originals
    /// as they were.
    pub fn save(&mut self) -> Result<(), ModelError> {
        save_atomic(&self.map_path, &self.grid.save()).map_err(MapError::Io)?;
        save_atomic(&self.route_path, &self.routes.save()).map_err(RouteError::Io)?;

        self.grid.clear_changed();
        self.routes.clear_changed();
        info!("saved {}", self.map_path.display());
        Ok(())
    }

    /// Places a part, keeping the derived occultation current. Returns the
    /// cells a viewer must repaint.
    pub fn set_part(
        &mut self,
        loc: GridLocation,
        slot: PartSlot,
        part: Option<usize>,
    ) -> Vec<GridLocation> {
        let changed = self.grid.set_part(loc, slot, part);
        if !changed.is_empty() && slot == PartSlot::Floor {
            self.grid.calculate_occultation(false);
        }
        changed
    }

    /// Resizes the grid. Ceiling growth shifts every route node down with
    /// the content. Returns the ids of nodes a shrink left outside the new
    /// bounds; deciding their removal is the caller's business, the grid is
    /// committed either way.
    pub fn resize(
        &mut self,
        rows: usize,
        cols: usize,
        levs: usize,
        grow_ceiling: bool,
    ) -> Option<Vec<usize>> {
        let ResizeOutcome { mut grid, lev_shift } = self.grid.resize(rows, cols, levs, grow_ceiling)?;

        self.routes.shift_levels(lev_shift);
        let dangling = self.routes.check_bounds(&grid);

        wire_node_refs(&mut grid, &self.routes);
        grid.calculate_occultation(false);
        self.grid = grid;

        if !dangling.is_empty() {
            info!("resize left {} route nodes out of bounds", dangling.len());
        }
        Some(dangling)
    }

    pub fn add_node(&mut self, loc: GridLocation) -> Option<usize> {
        self.routes.add_node(&mut self.grid, loc)
    }

    pub fn delete_node(&mut self, id: usize) -> bool {
        self.routes.delete_node(&mut self.grid, id)
    }

    /// Deletes a batch of nodes, typically `resize`'s dangling list.
    pub fn remove_nodes(&mut self, ids: &[usize]) {
        let mut sorted: Vec<usize> = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for id in sorted.into_iter().rev() {
            self.routes.delete_node(&mut self.grid, id);
        }
    }
}

/// Rebuilds every cell's node back-reference from the graph.
fn wire_node_refs(grid: &mut MapGrid, routes: &RouteGraph) {
    for lev in 0..grid.levs() {
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                grid.cell_mut(GridLocation::new(row, col, lev)).node = None;
            }
        }
    }
    for (id, node) in routes.iter().enumerate() {
        let loc = node.location();
        if grid.contains(loc) {
            grid.cell_mut(loc).node = Some(id);
        }
    }
}
