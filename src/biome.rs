use crate::error::{GenError, Result};
use crate::grid::Grid;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// 1-based позиция биома в таблице; 0 зарезервирован за «не назначен»
pub type BiomeId = u8;

pub const UNSET_BIOME: BiomeId = 0;

/// Имя биома, которым вулканы выжигают окрестности
pub const WASTE: &str = "Waste";

/// Описание биома: центроид в пространстве (температура, осадки, высота) и данные для локальной генерации
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biome {
    pub name: String,
    pub temperature: f32,
    pub rainfall: f32,
    pub elevation: f32,
    pub color: [u8; 3],
    /// Верхний слой почвы при генерации локальной карты
    #[serde(default)]
    pub surface_layer: String,
    #[serde(default)]
    pub vegetation: Vec<String>,
    #[serde(default)]
    pub fauna: Vec<String>,
}

impl Biome {
    /// L1-расстояние до центроида
    #[must_use]
    pub fn distance(&self, temperature: f32, rainfall: f32, elevation: f32) -> f32 {
        (self.temperature - temperature).abs()
            + (self.rainfall - rainfall).abs()
            + (self.elevation - elevation).abs()
    }
}

/// Неизменяемая таблица биомов
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Biome>", into = "Vec<Biome>")]
pub struct BiomeTable {
    biomes: Vec<Biome>,
}

impl TryFrom<Vec<Biome>> for BiomeTable {
    type Error = GenError;

    fn try_from(biomes: Vec<Biome>) -> Result<Self> {
        Self::new(biomes)
    }
}

impl From<BiomeTable> for Vec<Biome> {
    fn from(table: BiomeTable) -> Self {
        table.biomes
    }
}

fn biome(
    name: &str,
    (temperature, rainfall, elevation): (f32, f32, f32),
    color: [u8; 3],
    surface_layer: &str,
    vegetation: &[&str],
    fauna: &[&str],
) -> Biome {
    Biome {
        name: name.to_string(),
        temperature,
        rainfall,
        elevation,
        color,
        surface_layer: surface_layer.to_string(),
        vegetation: vegetation.iter().map(ToString::to_string).collect(),
        fauna: fauna.iter().map(ToString::to_string).collect(),
    }
}

impl BiomeTable {
    /// Проверяет таблицу: не пустая, не больше 255 записей, имена уникальны.
    pub fn new(biomes: Vec<Biome>) -> Result<Self> {
        if biomes.is_empty() {
            return Err(GenError::InvalidSettings("biome table is empty".into()));
        }
        if biomes.len() > usize::from(u8::MAX) {
            return Err(GenError::InvalidSettings(format!(
                "biome table holds {} entries, at most 255 fit into a cell",
                biomes.len()
            )));
        }
        for (i, b) in biomes.iter().enumerate() {
            if biomes[..i].iter().any(|other| other.name == b.name) {
                return Err(GenError::InvalidSettings(format!(
                    "duplicate biome '{}'",
                    b.name
                )));
            }
        }
        Ok(Self { biomes })
    }

    /// Встроенная таблица биомов
    #[must_use]
    pub fn builtin() -> Self {
        let biomes = vec![
            biome("Ocean", (0.5, 0.5, 0.05), [0, 64, 128], "Sand", &[], &["Fish"]),
            biome("Beach", (0.6, 0.3, 0.2), [230, 215, 150], "Sand", &["Palm"], &["Crab"]),
            biome("Grassland", (0.5, 0.3, 0.35), [150, 200, 100], "Grass", &["Shrub", "Pine"], &["Deer", "Bird"]),
            biome("Forest", (0.5, 0.6, 0.4), [60, 120, 60], "Grass", &["Oak", "Birch", "Mushroom"], &["Deer", "Bear"]),
            biome("Taiga", (0.25, 0.5, 0.45), [100, 150, 100], "Dirt", &["Pine", "Snow Pine"], &["Wolf", "Elk"]),
            biome("Tundra", (0.1, 0.2, 0.4), [200, 220, 180], "Frost", &["Frost Shrub"], &["Snow Hare"]),
            biome("Jungle", (0.85, 0.9, 0.35), [30, 100, 30], "Jungle Grass", &["Palm", "Vine", "Fern"], &["Snake", "Bird"]),
            biome("Savanna", (0.75, 0.3, 0.35), [200, 180, 100], "Dry Grass", &["Acacia"], &["Elephant"]),
            biome("Desert", (0.85, 0.05, 0.35), [200, 180, 120], "Sand", &["Cactus"], &["Scorpion"]),
            biome("Swamp", (0.6, 0.9, 0.22), [80, 100, 60], "Mud", &["Mangrove", "Reed"], &["Frog"]),
            biome("Highlands", (0.3, 0.4, 0.8), [150, 150, 150], "Stone", &["Shrub"], &["Goat"]),
            biome("Glacier", (0.05, 0.5, 0.9), [220, 220, 255], "Ice", &[], &["Snow Hare"]),
            biome(WASTE, (0.9, 0.0, 0.95), [70, 40, 40], "Ash", &["Dead Tree"], &[]),
        ];
        Self { biomes }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.biomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.biomes.is_empty()
    }

    /// Биом по его 1-based идентификатору
    #[must_use]
    pub fn get(&self, id: BiomeId) -> Option<&Biome> {
        usize::from(id)
            .checked_sub(1)
            .and_then(|i| self.biomes.get(i))
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<BiomeId> {
        self.biomes
            .iter()
            .position(|b| b.name == name)
            .map(|i| (i + 1) as BiomeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BiomeId, &Biome)> {
        self.biomes
            .iter()
            .enumerate()
            .map(|(i, b)| ((i + 1) as BiomeId, b))
    }

    /// Ближайший биом по L1-расстоянию; при равенстве побеждает первый в таблице.
    #[must_use]
    pub fn classify(&self, temperature: f32, rainfall: f32, elevation: f32) -> BiomeId {
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (i, b) in self.biomes.iter().enumerate() {
            let d = b.distance(temperature, rainfall, elevation);
            if d < best_distance {
                best_distance = d;
                best = i;
            }
        }
        (best + 1) as BiomeId
    }
}

/// Назначает биом каждой клетке по её температуре, осадкам и высоте
pub fn assign_biomes(grid: &mut Grid, table: &BiomeTable) {
    #[cfg(feature = "parallel")]
    let cells = grid.cells.par_iter_mut();
    #[cfg(not(feature = "parallel"))]
    let cells = grid.cells.iter_mut();

    cells.for_each(|cell| {
        cell.biome = table.classify(cell.temperature, cell.rainfall, cell.elevation);
    });
}
