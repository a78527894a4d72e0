//! Minecraft world conversion
//!
//! `extract → map → convert → spawn`: region files become block CSVs, block
//! ids are matched to Hytale ids, the CSVs are rewritten with the matches and
//! finally placed through a [`spawner::BlockSink`].

pub mod converter;
pub mod csv;
pub mod mapper;
pub mod nbt;
pub mod region;
pub mod spawner;
pub mod tokens;

pub use converter::{ConvertSummary, RegionConverter};
pub use mapper::{BlockMapper, MapResult};
pub use region::{ExtractOptions, ExtractSummary, RegionExtractor};
pub use spawner::{BlockSink, RegionSpawner, SpawnSummary, TallySink};
