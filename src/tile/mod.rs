//! The tile pipeline: decoded-tile caching, drawing surfaces and the grid
//! painter that composites tiles into regions.

pub mod cache;
pub mod grid;
pub mod surface;

pub use cache::{TileCache, TileKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use grid::TileGrid;
pub use surface::{ImageSurface, TileView};
