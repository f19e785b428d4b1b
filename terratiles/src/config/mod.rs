//! Descriptor deserialisation.
//!
//! The server is driven by one YAML document with sections for the HTTP
//! server, the service switches, tile matrix sets, styles, pyramids and
//! layers. Everything here is plain serde structs; cross-references are
//! resolved later by the catalogue builder.

mod layer;
mod main;
mod pyramid;
mod server;
mod services;
mod style;
mod tms;

pub use layer::{LayerConfig, LayerServices};
pub use main::Config;
pub use pyramid::{LevelConfig, PyramidConfig, StorageConfig, StorageKind};
pub use server::ServerConfig;
pub use services::{ServicesConfig, WmsLimits};
pub use style::{PaletteStopConfig, StyleConfig, TransformConfig};
pub use tms::{TileMatrixConfig, TileMatrixSetConfig};
