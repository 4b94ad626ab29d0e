pub mod config;
pub mod formats;
pub mod model;

pub use config::TilesetRegistry;
pub use model::{MapModel, TilesetData};
