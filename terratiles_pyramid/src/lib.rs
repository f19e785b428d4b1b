//! Tile pyramids: levels bound to storage, best-level selection and the
//! level reader that turns a world-space region into a lazy mosaic.

mod level;
mod pyramid;
mod reader;
mod write_back;

pub use level::{Level, PathScheme, RenderMode};
pub use pyramid::Pyramid;
pub use reader::{fetch_tile, read_region};
pub use write_back::WriteBackGuard;
