pub mod bytes;
pub mod pck;
pub mod mcd;
pub mod map;
pub mod rmp;

pub use pck::{Sprite, SpriteError, Spriteset, TabwordLength};
pub use mcd::{PartRecord, PartType, SpecialType};
pub use map::MapFile;
pub use rmp::NodeRecord;
