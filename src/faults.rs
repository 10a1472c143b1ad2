//! Поле тектонических разломов
//!
//! Разлом — ломаная из нескольких отрезков, начинающаяся на краю карты.
//! Значение поля растёт с расстоянием до ближайшего разлома; после нормализации
//! поле умножается на базовую высоту и прорезает долины вдоль линий разломов.

use crate::grid::Grid;
use crate::noise::{Distortion, salt};
use rand::Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Число отрезков в одной линии разлома
pub const SEGMENTS_PER_FAULT: usize = 4;

/// Длина шага случайного блуждания в долях ширины карты
const STEP_FRACTION: f32 = 0.5;

const DISTANCE_SCALE: f32 = 1e-2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl Segment {
    /// Расстояние от точки до отрезка
    #[must_use]
    pub fn distance_to(&self, p: (f32, f32)) -> f32 {
        let (ax, ay) = self.start;
        let (bx, by) = self.end;
        let (dx, dy) = (bx - ax, by - ay);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq > 0.0 {
            (((p.0 - ax) * dx + (p.1 - ay) * dy) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (cx, cy) = (ax + t * dx, ay + t * dy);
        ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
    }
}

/// Точка на случайной стороне карты
fn random_edge_point<R: Rng>(rng: &mut R, width: f32, height: f32) -> (f32, f32) {
    match rng.gen_range(0..4) {
        0 => (rng.gen_range(0.0..width), 0.0),
        1 => (rng.gen_range(0.0..width), height - 1.0),
        2 => (0.0, rng.gen_range(0.0..height)),
        _ => (width - 1.0, rng.gen_range(0.0..height)),
    }
}

/// Генерирует `num_faults` ломаных по [`SEGMENTS_PER_FAULT`] отрезков каждая.
pub fn generate_fault_lines<R: Rng>(
    rng: &mut R,
    num_faults: usize,
    width: u32,
    height: u32,
) -> Vec<Segment> {
    let w = width as f32;
    let h = height as f32;
    let step = STEP_FRACTION * w;
    let mut segments = Vec::with_capacity(num_faults * SEGMENTS_PER_FAULT);

    for _ in 0..num_faults {
        let mut current = random_edge_point(rng, w, h);
        for _ in 0..SEGMENTS_PER_FAULT {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let next = (current.0 + angle.cos() * step, current.1 + angle.sin() * step);
            segments.push(Segment {
                start: current,
                end: next,
            });
            current = next;
        }
    }
    segments
}

/// Растеризует поле разломов: `1e-2 × min_distance / width`, затем нормализует.
#[must_use]
pub fn rasterize_faults(segments: &[Segment], width: u32, height: u32) -> Vec<f32> {
    let total = width as usize * height as usize;
    if segments.is_empty() {
        return vec![1.0; total];
    }
    let w = width as f32;

    #[cfg(feature = "parallel")]
    let indices = (0..total).into_par_iter();
    #[cfg(not(feature = "parallel"))]
    let indices = 0..total;

    let mut field: Vec<f32> = indices
        .map(|i| {
            let p = ((i % width as usize) as f32, (i / width as usize) as f32);
            let min_dist = segments
                .iter()
                .map(|s| s.distance_to(p))
                .fold(f32::INFINITY, f32::min);
            DISTANCE_SCALE * min_dist / w
        })
        .collect();

    rescale(&mut field);
    field
}

/// Нормализует поле в 0..1 и инвертирует его, если среднее ниже 0.5.
pub fn rescale(field: &mut [f32]) {
    let min = field.iter().copied().fold(f32::INFINITY, f32::min);
    let max = field.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max <= min {
        field.iter_mut().for_each(|v| *v = 1.0);
        return;
    }

    let range = max - min;
    let mut sum = 0.0f64;
    for v in field.iter_mut() {
        *v = (*v - min) / range;
        sum += f64::from(*v);
    }
    let mean = sum / field.len() as f64;

    if mean < 0.5 {
        for v in field.iter_mut() {
            *v = 1.0 - *v;
        }
    }
}

/// Амплитуда и частота искажения разломов (зависят от ширины карты)
fn fault_distortion(seed: u64, width: u32) -> Distortion {
    let w = width as f32;
    Distortion::new(seed.wrapping_add(salt::FAULT_WARP), w * 0.04, 8.0 / w)
}

/// Стадия разломов: строит линии, растеризует, искажает и записывает поле в клетки.
///
/// Возвращает сгенерированные отрезки для диагностики.
pub fn apply_faults<R: Rng>(grid: &mut Grid, rng: &mut R, seed: u64, num_faults: usize) -> Vec<Segment> {
    let segments = generate_fault_lines(rng, num_faults, grid.width, grid.height);
    let field = rasterize_faults(&segments, grid.width, grid.height);
    let warped = if segments.is_empty() {
        field
    } else {
        fault_distortion(seed, grid.width).apply(&field, grid.width, grid.height)
    };

    for (cell, v) in grid.cells.iter_mut().zip(warped) {
        cell.faults = v.clamp(0.0, 1.0);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn segment_distance() {
        let s = Segment {
            start: (0.0, 0.0),
            end: (10.0, 0.0),
        };
        assert!((s.distance_to((5.0, 3.0)) - 3.0).abs() < 1e-6);
        assert!((s.distance_to((13.0, 4.0)) - 5.0).abs() < 1e-6);
        let point = Segment {
            start: (1.0, 1.0),
            end: (1.0, 1.0),
        };
        assert!((point.distance_to((4.0, 5.0)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn fault_lines_are_connected_chains() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let segments = generate_fault_lines(&mut rng, 3, 64, 64);
        assert_eq!(segments.len(), 3 * SEGMENTS_PER_FAULT);
        for chain in segments.chunks(SEGMENTS_PER_FAULT) {
            for pair in chain.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
            let (x, y) = chain[0].start;
            let on_edge = x == 0.0 || y == 0.0 || x == 63.0 || y == 63.0;
            assert!(on_edge, "chain starts inside the map at ({x}, {y})");
        }
    }

    #[test]
    fn rescale_normalizes_and_inverts() {
        // Среднее после нормализации 0.25 < 0.5 → инверсия
        let mut field = vec![0.0, 0.0, 0.0, 3.0];
        rescale(&mut field);
        assert_eq!(field, vec![1.0, 1.0, 1.0, 0.0]);

        let mut high = vec![3.0, 3.0, 3.0, 0.0];
        rescale(&mut high);
        assert_eq!(high, vec![1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn constant_field_becomes_neutral() {
        let mut field = vec![0.25; 8];
        rescale(&mut field);
        assert!(field.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn no_faults_means_no_masking() {
        let mut grid = Grid::new(8, 8);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let segments = apply_faults(&mut grid, &mut rng, 1, 0);
        assert!(segments.is_empty());
        assert!(grid.cells.iter().all(|c| c.faults == 1.0));
    }

    #[test]
    fn fault_field_in_unit_range() {
        let mut grid = Grid::new(32, 32);
        let mut rng = ChaCha8Rng::seed_from_u64(77);
        apply_faults(&mut grid, &mut rng, 77, 3);
        assert!(grid.cells.iter().all(|c| (0.0..=1.0).contains(&c.faults)));
    }
}
