use log::{trace, warn};
use thiserror::Error;

use crate::formats::rmp::{
    self, NodeRecord, RmpFileError, LINK_EXIT_EAST, LINK_EXIT_NORTH, LINK_EXIT_SOUTH,
    LINK_EXIT_WEST, LINK_NOT_USED, MAX_NODES, NODE_LINKS,
};
use crate::model::grid::{GridLocation, MapGrid};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    File(#[from] RmpFileError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where a link slot leads. The four exits are level-scoped hints drawn only
/// on the node's own level; they never resolve to a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkDest {
    Node(usize),
    ExitNorth,
    ExitEast,
    ExitSouth,
    ExitWest,
    NotUsed,
}

impl LinkDest {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            LINK_EXIT_NORTH => LinkDest::ExitNorth,
            LINK_EXIT_EAST => LinkDest::ExitEast,
            LINK_EXIT_SOUTH => LinkDest::ExitSouth,
            LINK_EXIT_WEST => LinkDest::ExitWest,
            LINK_NOT_USED => LinkDest::NotUsed,
            node => LinkDest::Node(node as usize),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            LinkDest::Node(id) => id as u8,
            LinkDest::ExitNorth => LINK_EXIT_NORTH,
            LinkDest::ExitEast => LINK_EXIT_EAST,
            LinkDest::ExitSouth => LINK_EXIT_SOUTH,
            LinkDest::ExitWest => LINK_EXIT_WEST,
            LinkDest::NotUsed => LINK_NOT_USED,
        }
    }

    /// The target node index, when the slot points at one.
    #[inline]
    pub fn node(self) -> Option<usize> {
        match self {
            LinkDest::Node(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn is_exit(self) -> bool {
        matches!(
            self,
            LinkDest::ExitNorth | LinkDest::ExitEast | LinkDest::ExitSouth | LinkDest::ExitWest
        )
    }
}

/// One outgoing connection of a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Link {
    pub dest: LinkDest,
    pub distance: u8,
    pub passage: u8,
}

impl Link {
    pub fn unused() -> Self {
        Link {
            dest: LinkDest::NotUsed,
            distance: 0,
            passage: 0,
        }
    }
}

/// A pathing graph vertex: grid position, five link slots and the spawn
/// metadata bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNode {
    pub row: u8,
    pub col: u8,
    pub lev: u8,
    pub links: [Link; NODE_LINKS],
    pub unit: u8,
    pub rank: u8,
    pub patrol: u8,
    pub attack: u8,
    pub spawn: u8,
}

impl RouteNode {
    pub fn at(loc: GridLocation) -> Self {
        RouteNode {
            row: loc.row as u8,
            col: loc.col as u8,
            lev: loc.lev as u8,
            links: [Link::unused(); NODE_LINKS],
            unit: 0,
            rank: 0,
            patrol: 0,
            attack: 0,
            spawn: 0,
        }
    }

    #[inline]
    pub fn location(&self) -> GridLocation {
        GridLocation::new(self.row as usize, self.col as usize, self.lev as usize)
    }

    fn from_record(record: &NodeRecord) -> Self {
        let mut links = [Link::unused(); NODE_LINKS];
        for (link, raw) in links.iter_mut().zip(&record.links) {
            *link = Link {
                dest: LinkDest::from_byte(raw[0]),
                distance: raw[1],
                passage: raw[2],
            };
        }

        RouteNode {
            row: record.row,
            col: record.col,
            lev: record.lev,
            links,
            unit: record.unit,
            rank: record.rank,
            patrol: record.patrol,
            attack: record.attack,
            spawn: record.spawn,
        }
    }

    fn to_record(&self) -> NodeRecord {
        let mut links = [[0u8; 3]; NODE_LINKS];
        for (raw, link) in links.iter_mut().zip(&self.links) {
            *raw = [link.dest.to_byte(), link.distance, link.passage];
        }

        NodeRecord {
            row: self.row,
            col: self.col,
            lev: self.lev,
            unknown3: 0,
            links,
            unit: self.unit,
            rank: self.rank,
            patrol: self.patrol,
            attack: self.attack,
            spawn: self.spawn,
        }
    }
}

/// The route graph of one map: an ordered node sequence addressed by index.
#[derive(Default)]
pub struct RouteGraph {
    nodes: Vec<RouteNode>,
    changed: bool,
}

impl RouteGraph {
    pub fn load(bytes: &[u8]) -> Result<Self, RouteError> {
        let records = rmp::read_records(bytes)?;
        trace!("RouteGraph::load {} nodes", records.len());

        if records.len() > MAX_NODES {
            warn!(
                "route file holds {} nodes, links can only address {MAX_NODES}",
                records.len()
            );
        }

        Ok(RouteGraph {
            nodes: records.iter().map(RouteNode::from_record).collect(),
            changed: false,
        })
    }

    pub fn save(&self) -> Vec<u8> {
        let records: Vec<NodeRecord> = self.nodes.iter().map(RouteNode::to_record).collect();
        rmp::write_records(&records)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: usize) -> Option<&RouteNode> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn node_mut(&mut self, id: usize) -> Option<&mut RouteNode> {
        if id < self.nodes.len() {
            self.changed = true;
        }
        self.nodes.get_mut(id)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, RouteNode> {
        self.nodes.iter()
    }

    #[inline]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    #[inline]
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Appends a node at the cell and wires the cell's back-reference.
    /// Refuses when the graph is full or the location is off the grid.
    pub fn add_node(&mut self, grid: &mut MapGrid, loc: GridLocation) -> Option<usize> {
        if self.nodes.len() >= MAX_NODES || !grid.contains(loc) {
            return None;
        }

        let id = self.nodes.len();
        self.nodes.push(RouteNode::at(loc));
        grid.cell_mut(loc).node = Some(id);
        self.changed = true;
        Some(id)
    }

    /// Removes a node: every link slot that targeted it goes unused, link
    /// destinations above it slide down with the node order, and the grid
    /// back-references are rewired.
    pub fn delete_node(&mut self, grid: &mut MapGrid, id: usize) -> bool {
        if id >= self.nodes.len() {
            return false;
        }

        let removed = self.nodes.remove(id);
        if grid.contains(removed.location()) {
            grid.cell_mut(removed.location()).node = None;
        }

        for node in &mut self.nodes {
            for link in &mut node.links {
                match link.dest.node() {
                    Some(target) if target == id => *link = Link::unused(),
                    Some(target) if target > id => link.dest = LinkDest::Node(target - 1),
                    _ => {}
                }
            }
        }

        for (new_id, node) in self.nodes.iter().enumerate().skip(id) {
            let loc = node.location();
            if grid.contains(loc) {
                grid.cell_mut(loc).node = Some(new_id);
            }
        }

        self.changed = true;
        true
    }

    /// Every node lying outside the grid's current dimensions, after a
    /// shrinking resize. Deleting them is the caller's decision.
    pub fn check_bounds(&self, grid: &MapGrid) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !grid.contains(node.location()))
            .map(|(id, _)| id)
            .collect()
    }

    /// Moves every node down by `delta` levels after the ceiling grew.
    pub fn shift_levels(&mut self, delta: usize) {
        if delta == 0 {
            return;
        }
        for node in &mut self.nodes {
            node.lev = node.lev.saturating_add(delta as u8);
        }
        self.changed = true;
    }
}
