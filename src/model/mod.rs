pub mod parts;
pub mod tileset;
pub mod grid;
pub mod routes;
pub mod integrity;
pub mod geometry;
pub mod map_model;

pub use parts::Tilepart;
pub use tileset::{CatalogError, CatalogWarning, Descriptor, Terrain, TilesetData};
pub use grid::{GridLocation, MapError, MapGrid, PartSlot, TileCell};
pub use routes::{Link, LinkDest, RouteError, RouteGraph, RouteNode};
pub use map_model::{MapModel, ModelError};
