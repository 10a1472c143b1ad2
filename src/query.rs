//! Запросы к готовому оверворлду со стороны интерфейса и локального генератора

use crate::biome::BiomeId;
use crate::error::GenError;
use crate::faction::UNCLAIMED;
use crate::generator::Overworld;
use crate::noise::{Distortion, salt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Прямоугольник в клетках сетки; может выходить за карту
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Разбирает `x,y,w,h`
impl FromStr for Rect {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || GenError::InvalidSettings(format!("expected rectangle as x,y,w,h, got '{s}'"));
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(bad());
        };
        Ok(Self {
            x: x.parse().map_err(|_| bad())?,
            y: y.parse().map_err(|_| bad())?,
            width: w.parse().map_err(|_| bad())?,
            height: h.parse().map_err(|_| bad())?,
        })
    }
}

/// Сводка по области для выбора места высадки
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnStats {
    /// Биомы области по возрастанию идентификатора
    pub biomes: Vec<BiomeId>,
    /// Фракция, владеющая большинством клеток; `None`, если больше всего ничьих
    pub owner: Option<u8>,
    /// Клеток после обрезки по карте
    pub cells: usize,
}

impl Overworld {
    /// Биомы и владелец прямоугольной области.
    ///
    /// Область обрезается по карте; полностью внешняя область даёт пустую сводку.
    /// При равном числе клеток побеждает меньший номер (ничьи — номер 0).
    #[must_use]
    pub fn spawn_stats(&self, rect: Rect) -> SpawnStats {
        let grid = &self.grid;
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.x.saturating_add(i64::from(rect.width)).min(i64::from(grid.width));
        let y1 = rect.y.saturating_add(i64::from(rect.height)).min(i64::from(grid.height));
        if x0 >= x1 || y0 >= y1 {
            return SpawnStats::default();
        }

        let mut biomes = BTreeSet::new();
        let mut owners = [0usize; 256];
        for y in y0..y1 {
            for x in x0..x1 {
                let cell = &grid.cells[grid.index(x as u32, y as u32)];
                biomes.insert(cell.biome);
                owners[usize::from(cell.faction)] += 1;
            }
        }

        let mut best = UNCLAIMED;
        for (id, &count) in owners.iter().enumerate() {
            if count > owners[usize::from(best)] {
                best = id as u8;
            }
        }

        SpawnStats {
            biomes: biomes.into_iter().collect(),
            owner: (best != UNCLAIMED).then_some(best),
            cells: ((x1 - x0) * (y1 - y0)) as usize,
        }
    }

    /// Биом под мировой позицией `[x, y, z]` локальной карты.
    ///
    /// `grid_origin` — клетка сетки, с которой начинается локальная карта. Горизонтальная
    /// позиция делится на масштаб мира и сдвигается шумом смешивания. Затем биомы четырёх
    /// ближайших клеток взвешиваются билинейно от их центров, побеждает наибольший вес
    /// (при равенстве — более ранний угол). Позиция вне сетки даёт `None`.
    #[must_use]
    pub fn biome_at(&self, world_position: [f32; 3], grid_origin: [f32; 2]) -> Option<BiomeId> {
        let lookup = &self.settings.biome_lookup;
        let gx = world_position[0] / lookup.world_scale + grid_origin[0];
        let gy = world_position[2] / lookup.world_scale + grid_origin[1];
        if !self.grid.contains(gx.floor() as i64, gy.floor() as i64) {
            return None;
        }

        let blend = Distortion::new(
            self.settings.seed.wrapping_add(salt::BIOME_BLEND),
            lookup.blend_amplitude,
            lookup.blend_frequency,
        );
        let (bx, by) = blend.warp(gx, gy);
        // Центр клетки `i` лежит в `i + 0.5`
        let (sx, sy) = (bx - 0.5, by - 0.5);
        let (x0, y0) = (sx.floor() as i64, sy.floor() as i64);

        let mut best: Option<(BiomeId, f32)> = None;
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let biome = self.grid.get_clamped(x0 + dx, y0 + dy).biome;
            if best.is_some_and(|(b, _)| b == biome) {
                continue;
            }
            let weight = self
                .grid
                .sample_by(sx, sy, |c| f32::from(u8::from(c.biome == biome)));
            if best.is_none_or(|(_, w)| weight > w) {
                best = Some((biome, weight));
            }
        }
        best.map(|(biome, _)| biome)
    }
}
