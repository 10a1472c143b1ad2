pub mod biome;
pub mod climate;
pub mod config;
pub mod erosion;
pub mod error;
pub mod faction;
pub mod faults;
pub mod generator;
pub mod grid;
pub mod heightmap;
pub mod noise;
pub mod query;
pub mod registry;
pub mod snapshot;
pub mod territory;
pub mod volcano;

pub use biome::{Biome, BiomeId, BiomeTable};
pub use config::{GenerationSettings, TerritorySettings, TerritoryStrategy};
pub use error::{GenError, Result};
pub use faction::{Faction, Race, RaceTable};
pub use generator::{GenerationState, Overworld, OverworldGenerator, Stage, generate};
pub use grid::{Cell, Channel, Grid};
pub use query::{Rect, SpawnStats};
pub use registry::Registry;
pub use snapshot::Snapshot;
