use crate::grid::{Channel, Grid, NEIGHBORS_4};
use crate::noise::{fractal, salt, sample01, simplex};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Высота одной ступени террас
pub const CLIFF_HEIGHT: f32 = 0.1;

/// Базовый подъём суши после сложения октав
const BASE_LIFT: f32 = 0.4;

/// Частоты шумов заданы для карты этой ширины; меньшие карты читают шум с шагом побольше,
/// чтобы форма материков не зависела от разрешения.
const REFERENCE_WIDTH: f32 = 512.0;

const MOUNTAIN_FREQUENCY: f32 = 0.01;
const MOUNTAIN_POWER: f32 = 1.2;
const CONTINENT_FREQUENCY: f32 = 0.003;
const HILL_FREQUENCY: f32 = 0.03;
const HILL_AMPLITUDE: f32 = 0.1;
const SMALL_FREQUENCY: f32 = 0.1;
const SMALL_AMPLITUDE: f32 = 0.02;

/// Генерирует таблицу базовых высот из четырёх октав шума с террасированием.
///
/// Результат не записывается в клетки: все последующие пересборки высоты
/// читают эту таблицу повторно.
#[must_use]
pub fn generate_height_lookup(seed: u64, width: u32, height: u32) -> Vec<f32> {
    let mountain = fractal(seed.wrapping_add(salt::MOUNTAIN), MOUNTAIN_FREQUENCY, 3);
    let continent = fractal(seed.wrapping_add(salt::CONTINENT), CONTINENT_FREQUENCY, 4);
    let hill = simplex(seed.wrapping_add(salt::HILL), HILL_FREQUENCY);
    let small = simplex(seed.wrapping_add(salt::SMALL), SMALL_FREQUENCY);

    let scale = REFERENCE_WIDTH / width as f32;
    let total = width as usize * height as usize;

    #[cfg(feature = "parallel")]
    let indices = (0..total).into_par_iter();
    #[cfg(not(feature = "parallel"))]
    let indices = 0..total;

    indices
        .map(|i| {
            let x = (i % width as usize) as f32 * scale;
            let y = (i / width as usize) as f32 * scale;

            let m = sample01(&mountain, x, y).powf(MOUNTAIN_POWER);
            let c = sample01(&continent, x, y);
            let hl = sample01(&hill, x, y) * HILL_AMPLITUDE;
            let sn = small.get_noise_2d(x, y) * SMALL_AMPLITUDE;

            let mut h = (c * m + hl).clamp(0.0, 1.0);
            h += sn;
            h += BASE_LIFT;
            terrace(h)
        })
        .collect()
}

/// Ступенчатое квантование высоты
#[must_use]
pub fn terrace(h: f32) -> f32 {
    (h / CLIFF_HEIGHT).floor() * CLIFF_HEIGHT
}

/// Пересобирает высоту каждой клетки из трёх источников:
/// `clamp((lookup × faults + weathering) × erosion, 0, 1)`.
///
/// Высота никогда не накапливается: функция вызывается после каждого изменения
/// разломов, выветривания или эрозии.
pub fn rebuild_height(grid: &mut Grid, lookup: &[f32]) {
    debug_assert_eq!(lookup.len(), grid.cells.len());

    #[cfg(feature = "parallel")]
    let cells = grid.cells.par_iter_mut().zip(lookup.par_iter());
    #[cfg(not(feature = "parallel"))]
    let cells = grid.cells.iter_mut().zip(lookup.iter());

    cells.for_each(|(cell, &base)| {
        cell.elevation = ((base * cell.faults + cell.weathering) * cell.erosion).clamp(0.0, 1.0);
    });
}

/// Один проход выветривания: каждая клетка смещается к среднему своих 4 соседей.
///
/// Поправка копится в поле `weathering`, после чего высота пересобирается.
pub fn weather(grid: &mut Grid, lookup: &[f32], rate: f32) {
    let width = grid.width as usize;
    let elevation = grid.channel(Channel::Elevation);
    let w = i64::from(grid.width);
    let h = i64::from(grid.height);

    #[cfg(feature = "parallel")]
    let rows = grid.cells.par_chunks_mut(width);
    #[cfg(not(feature = "parallel"))]
    let rows = grid.cells.chunks_mut(width);

    rows.enumerate().for_each(|(y, row)| {
        for (x, cell) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for &(dx, dy) in &NEIGHBORS_4 {
                let nx = (x as i64 + i64::from(dx)).clamp(0, w - 1) as usize;
                let ny = (y as i64 + i64::from(dy)).clamp(0, h - 1) as usize;
                sum += elevation[ny * width + nx];
            }
            let mean = sum / NEIGHBORS_4.len() as f32;
            cell.weathering += rate * (mean - elevation[y * width + x]);
        }
    });

    rebuild_height(grid, lookup);
}

/// Сглаживание через среднее (3×3, 5×5 и т.д.), края зажимаются
pub fn smooth_field(data: &mut [f32], width: usize, height: usize, radius: usize) {
    if radius == 0 || width == 0 || height == 0 {
        return;
    }

    let r = radius as i64;
    let count = (2 * r + 1) as f32;
    let mut temp = vec![0.0; data.len()];

    // 1. Горизонтальный проход
    for y in 0..height {
        let row_offset = y * width;
        let mut window_sum = 0.0;

        for dx in -r..=r {
            let x = dx.clamp(0, width as i64 - 1) as usize;
            window_sum += data[row_offset + x];
        }

        for x in 0..width {
            temp[row_offset + x] = window_sum / count;

            // Сдвигаем окно: убираем левый пиксель, добавляем правый
            let left = (x as i64 - r).clamp(0, width as i64 - 1) as usize;
            let right = (x as i64 + r + 1).clamp(0, width as i64 - 1) as usize;

            window_sum = window_sum - data[row_offset + left] + data[row_offset + right];
        }
    }

    // 2. Вертикальный проход
    for x in 0..width {
        let mut window_sum = 0.0;

        for dy in -r..=r {
            let y = dy.clamp(0, height as i64 - 1) as usize;
            window_sum += temp[y * width + x];
        }

        for y in 0..height {
            data[y * width + x] = window_sum / count;

            let top = (y as i64 - r).clamp(0, height as i64 - 1) as usize;
            let bottom = (y as i64 + r + 1).clamp(0, height as i64 - 1) as usize;

            window_sum = window_sum - temp[top * width + x] + temp[bottom * width + x];
        }
    }
}

/// Размывает только поле эрозии.
pub fn blur_erosion(grid: &mut Grid, radius: usize) {
    let mut erosion = grid.channel(Channel::Erosion);
    smooth_field(
        &mut erosion,
        grid.width as usize,
        grid.height as usize,
        radius,
    );
    for (cell, v) in grid.cells.iter_mut().zip(erosion) {
        cell.erosion = v.clamp(0.0, 1.0);
    }
}
