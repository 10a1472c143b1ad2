//! Когерентный шум и доменное искажение полей

use crate::grid::bilinear;
use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Сдвиги сидов для независимых шумов одного запуска
pub mod salt {
    pub const MOUNTAIN: u64 = 1_000;
    pub const CONTINENT: u64 = 2_000;
    pub const HILL: u64 = 3_000;
    pub const SMALL: u64 = 4_000;
    pub const FAULT_WARP: u64 = 5_000;
    pub const TEMPERATURE_WARP: u64 = 6_000;
    pub const RAINFALL_WARP: u64 = 7_000;
    pub const BIOME_BLEND: u64 = 8_000;
}

/// Создаёт генератор OpenSimplex2-шума с заданными сидом и частотой.
#[must_use]
pub fn simplex(seed: u64, frequency: f32) -> FastNoiseLite {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(seed as i32));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(frequency));
    noise
}

/// То же, что [`simplex`], но с FBm-фракталом из `octaves` октав.
#[must_use]
pub fn fractal(seed: u64, frequency: f32, octaves: i32) -> FastNoiseLite {
    let mut noise = simplex(seed, frequency);
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(octaves));
    noise
}

/// Шум в диапазоне 0.0..=1.0
#[must_use]
pub fn sample01(noise: &FastNoiseLite, x: f32, y: f32) -> f32 {
    ((noise.get_noise_2d(x, y) + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Доменное искажение: поле читается со смещением, заданным парой шумов.
///
/// Искажение работает как косвенное чтение: каждая клетка результата читает
/// исходное поле билинейно в позиции `(x, y) + amplitude * (n_x, n_y)`.
/// Исходное поле при этом не изменяется.
pub struct Distortion {
    amplitude: f32,
    offset_x: FastNoiseLite,
    offset_y: FastNoiseLite,
}

impl Distortion {
    #[must_use]
    pub fn new(seed: u64, amplitude: f32, frequency: f32) -> Self {
        Self {
            amplitude,
            offset_x: simplex(seed, frequency),
            offset_y: simplex(seed.wrapping_add(1), frequency),
        }
    }

    /// Позиция, из которой читается клетка `(x, y)`
    #[must_use]
    pub fn warp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x + self.offset_x.get_noise_2d(x, y) * self.amplitude,
            y + self.offset_y.get_noise_2d(x, y) * self.amplitude,
        )
    }

    /// Искажённое чтение всего поля.
    #[must_use]
    pub fn apply(&self, source: &[f32], width: u32, height: u32) -> Vec<f32> {
        let w = width as usize;
        let mut out = vec![0.0; source.len()];

        #[cfg(feature = "parallel")]
        let rows = out.par_chunks_mut(w);
        #[cfg(not(feature = "parallel"))]
        let rows = out.chunks_mut(w);

        rows.enumerate().for_each(|(y, row)| {
            for (x, v) in row.iter_mut().enumerate() {
                let (sx, sy) = self.warp(x as f32, y as f32);
                *v = bilinear(source, width, height, sx, sy);
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amplitude_is_identity() {
        let source: Vec<f32> = (0..64).map(|i| i as f32 * 0.1).collect();
        let warped = Distortion::new(9, 0.0, 0.1).apply(&source, 8, 8);
        for (a, b) in source.iter().zip(&warped) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn distortion_keeps_source_range() {
        let source: Vec<f32> = (0..256).map(|i| (i % 16) as f32 / 15.0).collect();
        let warped = Distortion::new(3, 5.0, 0.2).apply(&source, 16, 16);
        assert!(warped.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn noise_is_deterministic() {
        let a = simplex(42, 0.05);
        let b = simplex(42, 0.05);
        assert_eq!(a.get_noise_2d(3.5, 7.25), b.get_noise_2d(3.5, 7.25));
        let v = sample01(&a, 10.0, 20.0);
        assert!((0.0..=1.0).contains(&v));
    }
}
