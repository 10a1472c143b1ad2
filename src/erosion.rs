use crate::config::GenerationSettings;
use crate::error::Result;
use crate::generator::StageProgress;
use crate::grid::{Channel, Grid, NEIGHBORS_8, bilinear};
use rand::Rng;

/// Множитель эрозии на каждый шаг капли
pub const EROSION_RATE: f32 = 0.9;

const GRADIENT_WEIGHT: f32 = 0.1;
const INERTIA: f32 = 0.7;
const JITTER_WEIGHT: f32 = 0.2;

/// Уклон ниже этого порога считается нулевым: капля застаивается
const GRADIENT_EPSILON: f32 = 1e-6;

/// Как часто (в каплях) обновляется прогресс и проверяется отмена
const CHECKPOINT_INTERVAL: usize = 256;

/// Итоги гидравлической эрозии
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErosionStats {
    /// Всего шагов, на которых капля размывала клетку
    pub eroded_steps: usize,
    /// Капли, дошедшие до моря
    pub reached_sea: usize,
    /// Капли, застрявшие в локальном минимуме или на плато
    pub pooled: usize,
}

/// Направление к самому низкому из 8 соседей, умноженное на перепад высоты.
///
/// Возвращает нулевой вектор, если ни один сосед не ниже текущей позиции.
#[must_use]
pub fn min_neighbor_gradient(buffer: &[f32], width: u32, height: u32, x: f32, y: f32) -> (f32, f32) {
    let here = bilinear(buffer, width, height, x, y);
    let mut lowest = here;
    let mut direction = (0.0, 0.0);

    for &(dx, dy) in &NEIGHBORS_8 {
        let (fx, fy) = (dx as f32, dy as f32);
        let h = bilinear(buffer, width, height, x + fx, y + fy);
        if h < lowest {
            lowest = h;
            let len = fx.hypot(fy);
            direction = (fx / len, fy / len);
        }
    }

    let drop = here - lowest;
    (direction.0 * drop, direction.1 * drop)
}

fn random_unit_in_circle<R: Rng>(rng: &mut R) -> (f32, f32) {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let radius = rng.gen_range(0.0f32..1.0).sqrt();
    (angle.cos() * radius, angle.sin() * radius)
}

/// Выбирает старт капли: из `samples` случайных внутренних точек берётся самая высокая.
fn rain_origin<R: Rng>(rng: &mut R, buffer: &[f32], width: u32, height: u32, samples: usize) -> (f32, f32) {
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let mut best = (1.0, 1.0);
    let mut best_height = f32::NEG_INFINITY;
    for _ in 0..samples {
        let x = rng.gen_range(1.0..max_x);
        let y = rng.gen_range(1.0..max_y);
        let h = bilinear(buffer, width, height, x, y);
        if h > best_height {
            best_height = h;
            best = (x, y);
        }
    }
    best
}

/// Применяет гидрологическую эрозию к полю `erosion`.
///
/// Буфер высот — копия текущей высоты (база × разломы), он не меняется во время стадии.
/// Каждый шаг капли понижает эрозию клетки по правилу `min(e, 0.9 × e)`, поэтому поле
/// только убывает. После стадии вызывающий обязан пересобрать высоту.
pub fn erode<R: Rng>(
    grid: &mut Grid,
    settings: &GenerationSettings,
    rng: &mut R,
    progress: &StageProgress<'_>,
) -> Result<ErosionStats> {
    let width = grid.width;
    let height = grid.height;
    let buffer = grid.channel(Channel::Elevation);
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let mut stats = ErosionStats::default();

    for i in 0..settings.num_rains {
        if i % CHECKPOINT_INTERVAL == 0 {
            progress.checkpoint(i as f32 / settings.num_rains as f32)?;
        }

        let (mut x, mut y) = rain_origin(rng, &buffer, width, height, settings.num_rain_samples);
        let mut velocity = (0.0f32, 0.0f32);

        for _ in 0..settings.rain_length {
            let h = bilinear(&buffer, width, height, x, y);
            if h < settings.sea_level {
                stats.reached_sea += 1;
                break;
            }
            let gradient = min_neighbor_gradient(&buffer, width, height, x, y);
            if gradient.0.hypot(gradient.1) < GRADIENT_EPSILON {
                stats.pooled += 1;
                break;
            }

            let idx = grid.index(x.round() as u32, y.round() as u32);
            let erosion = &mut grid.cells[idx].erosion;
            *erosion = erosion.min(EROSION_RATE * *erosion).max(0.0);
            stats.eroded_steps += 1;

            let jitter = random_unit_in_circle(rng);
            velocity = (
                GRADIENT_WEIGHT * gradient.0 + INERTIA * velocity.0 + JITTER_WEIGHT * jitter.0,
                GRADIENT_WEIGHT * gradient.1 + INERTIA * velocity.1 + JITTER_WEIGHT * jitter.1,
            );
            x = (x + velocity.0).clamp(0.0, max_x);
            y = (y + velocity.1).clamp(0.0, max_y);
        }
    }

    progress.report(1.0);
    Ok(stats)
}
