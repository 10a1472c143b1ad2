//! Снимок оверворлда в RGBA-изображении
//!
//! Формат пикселя:
//!
//! | канал | значение                   |
//! |-------|----------------------------|
//! | R     | `round(elevation × 255)`   |
//! | G     | номер фракции              |
//! | B     | идентификатор биома        |
//! | A     | всегда 255                 |
//!
//! Температура и осадки не хранятся: при чтении они берутся из центроида биома,
//! поэтому после круга запись → чтение они в общем случае отличаются от исходных.

use crate::biome::{BiomeTable, UNSET_BIOME};
use crate::config::GenerationSettings;
use crate::error::{GenError, Result};
use crate::faction::Faction;
use crate::generator::Overworld;
use crate::grid::{Cell, Grid};
use crate::registry::Registry;
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    image: RgbaImage,
}

fn encode_cell(cell: &Cell) -> Rgba<u8> {
    Rgba([
        (cell.elevation.clamp(0.0, 1.0) * 255.0).round() as u8,
        cell.faction,
        cell.biome,
        255,
    ])
}

impl Snapshot {
    #[must_use]
    pub fn encode(grid: &Grid) -> Self {
        let image = RgbaImage::from_fn(grid.width, grid.height, |x, y| {
            encode_cell(&grid.cells[grid.index(x, y)])
        });
        Self { image }
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Восстанавливает сетку. Биом 0 даёт нулевой климат,
    /// неизвестный таблице биом — ошибку.
    pub fn decode(&self, biomes: &BiomeTable) -> Result<Grid> {
        let mut grid = Grid::new(self.width(), self.height());
        for (x, y, pixel) in self.image.enumerate_pixels() {
            let [r, g, b, _] = pixel.0;
            let idx = grid.index(x, y);
            let cell = &mut grid.cells[idx];
            cell.elevation = f32::from(r) / 255.0;
            cell.faction = g;
            cell.biome = b;
            if b != UNSET_BIOME {
                let biome = biomes.get(b).ok_or(GenError::UnknownBiome(b))?;
                cell.temperature = biome.temperature;
                cell.rainfall = biome.rainfall;
            }
        }
        Ok(grid)
    }

    /// Сохраняет снимок в PNG-файл
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }

    pub fn load_png(path: impl AsRef<Path>) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self { image })
    }
}

impl Overworld {
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::encode(&self.grid)
    }

    /// Собирает оверворлд из сохранённого снимка. Размер снимка должен совпадать с настройками.
    pub fn from_snapshot(
        settings: GenerationSettings,
        registry: Arc<Registry>,
        factions: Vec<Faction>,
        snapshot: &Snapshot,
    ) -> Result<Self> {
        if snapshot.width() != settings.width || snapshot.height() != settings.height {
            return Err(GenError::SnapshotSize {
                width: settings.width,
                height: settings.height,
                actual_width: snapshot.width(),
                actual_height: snapshot.height(),
            });
        }
        let grid = snapshot.decode(&registry.biomes)?;
        if let Some(cell) = grid
            .cells
            .iter()
            .find(|c| usize::from(c.faction) > factions.len())
        {
            return Err(GenError::InvalidSettings(format!(
                "snapshot references faction {} but only {} are loaded",
                cell.faction,
                factions.len()
            )));
        }
        Ok(Self {
            settings,
            grid,
            factions,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid(table: &BiomeTable) -> Grid {
        let mut grid = Grid::new(6, 5);
        for (i, cell) in grid.cells.iter_mut().enumerate() {
            cell.elevation = i as f32 / 29.0;
            cell.faction = (i % 3) as u8;
            cell.biome = (i % table.len()) as u8 + 1;
            cell.temperature = 0.123;
            cell.rainfall = 0.987;
        }
        grid
    }

    #[test]
    fn pixel_layout() {
        let mut grid = Grid::new(4, 4);
        let idx = grid.index(2, 1);
        grid.cells[idx] = Cell {
            elevation: 0.5,
            faction: 7,
            biome: 3,
            ..Cell::default()
        };
        let snapshot = Snapshot::encode(&grid);
        assert_eq!(snapshot.image().get_pixel(2, 1).0, [128, 7, 3, 255]);
        assert_eq!(snapshot.image().get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn round_trip_keeps_ids_and_loses_climate() {
        let table = BiomeTable::builtin();
        let grid = sample_grid(&table);
        let decoded = Snapshot::encode(&grid).decode(&table).unwrap();

        for (before, after) in grid.cells.iter().zip(&decoded.cells) {
            assert!((before.elevation - after.elevation).abs() <= 0.5 / 255.0 + f32::EPSILON);
            assert_eq!(before.faction, after.faction);
            assert_eq!(before.biome, after.biome);
            let centroid = table.get(after.biome).unwrap();
            assert_eq!(after.temperature, centroid.temperature);
            assert_eq!(after.rainfall, centroid.rainfall);
        }
        // Климат восстанавливается из таблицы, а не из исходных клеток
        assert!(
            grid.cells
                .iter()
                .zip(&decoded.cells)
                .any(|(a, b)| a.temperature != b.temperature)
        );
    }

    #[test]
    fn decoding_twice_is_stable() {
        let table = BiomeTable::builtin();
        let once = Snapshot::encode(&sample_grid(&table)).decode(&table).unwrap();
        let twice = Snapshot::encode(&once).decode(&table).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_biome_rejected() {
        let mut grid = Grid::new(4, 4);
        grid.cells[5].biome = 200;
        let err = Snapshot::encode(&grid).decode(&BiomeTable::builtin());
        assert!(matches!(err, Err(GenError::UnknownBiome(200))));
    }

    #[test]
    fn unset_biome_has_zero_climate() {
        let grid = Snapshot::encode(&Grid::new(4, 4))
            .decode(&BiomeTable::builtin())
            .unwrap();
        assert!(grid.cells.iter().all(|c| c.temperature == 0.0 && c.rainfall == 0.0));
    }

    #[test]
    fn size_mismatch_rejected() {
        let registry = Arc::new(Registry::builtin());
        let snapshot = Snapshot::encode(&Grid::new(8, 8));
        let settings = GenerationSettings {
            width: 16,
            height: 8,
            ..GenerationSettings::default()
        };
        assert!(matches!(
            Overworld::from_snapshot(settings, registry, Vec::new(), &snapshot),
            Err(GenError::SnapshotSize {
                width: 16,
                actual_width: 8,
                ..
            })
        ));
    }
}
