use crate::config::GenerationSettings;
use crate::grid::{Channel, Grid};
use crate::noise::{Distortion, salt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const TEMPERATURE_WARP_AMPLITUDE: f32 = 30.0;
const TEMPERATURE_WARP_FREQUENCY: f32 = 0.005;
const RAINFALL_WARP_AMPLITUDE: f32 = 5.0;
const RAINFALL_WARP_FREQUENCY: f32 = 0.03;

/// Осадки над водой фиксированы
const SEA_RAINFALL: f32 = 0.5;

/// Генерирует температуру: широтный градиент, искажённый шумом и зажатый в 0..1.
#[must_use]
pub fn temperature_field(seed: u64, width: u32, height: u32, temperature_scale: f32) -> Vec<f32> {
    let h = height as f32;
    let latitude: Vec<f32> = (0..width as usize * height as usize)
        .map(|i| (i / width as usize) as f32 / h * temperature_scale)
        .collect();

    let warp = Distortion::new(
        seed.wrapping_add(salt::TEMPERATURE_WARP),
        TEMPERATURE_WARP_AMPLITUDE,
        TEMPERATURE_WARP_FREQUENCY,
    );
    let mut temperature = warp.apply(&latitude, width, height);
    for t in &mut temperature {
        *t = t.clamp(0.0, 1.0);
    }
    temperature
}

/// Переносит влагу слева направо по одной строке.
///
/// Над водой воздух насыщается влагой, над сушей отдаёт её осадками. Состояние
/// `moisture` протягивается вдоль строки, поэтому столбцы внутри строки зависимы.
fn advect_row<R: Rng>(
    rng: &mut R,
    elevation: &[f32],
    rainfall: &mut [f32],
    settings: &GenerationSettings,
) {
    let scale = settings.rainfall_scale;
    let width = settings.width as f32;
    let max_moisture = scale * 20.0;
    let mut moisture = scale * 10.0;

    for (h, rain) in elevation.iter().zip(rainfall.iter_mut()) {
        if *h < settings.sea_level {
            // Океан насыщает воздух влагой
            moisture = (moisture + rng.gen_range(0.1..0.3)).min(max_moisture);
            *rain = SEA_RAINFALL;
        } else {
            // Суша забирает влагу, выше — сильнее
            let amount = moisture * 0.017 * h + moisture * 0.0006;
            moisture -= amount;
            // Испарение
            moisture += rng.gen_range(0.01..0.02);
            *rain = amount * scale * width * 0.015;
        }
    }
}

/// Генерирует осадки построчным сканированием с последующим искажением.
///
/// Каждая строка получает собственный поток ГСЧ, поэтому строки независимы и
/// результат не зависит от числа потоков.
#[must_use]
pub fn rainfall_field(elevation: &[f32], settings: &GenerationSettings) -> Vec<f32> {
    let width = settings.width as usize;
    let mut rainfall = vec![0.0; elevation.len()];

    #[cfg(feature = "parallel")]
    let rows = rainfall.par_chunks_mut(width);
    #[cfg(not(feature = "parallel"))]
    let rows = rainfall.chunks_mut(width);

    rows.enumerate().for_each(|(y, row)| {
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed.wrapping_add(salt::RAINFALL_WARP));
        rng.set_stream(y as u64);
        advect_row(&mut rng, &elevation[y * width..(y + 1) * width], row, settings);
    });

    let warp = Distortion::new(
        settings.seed.wrapping_add(salt::RAINFALL_WARP),
        RAINFALL_WARP_AMPLITUDE,
        RAINFALL_WARP_FREQUENCY,
    );
    let mut warped = warp.apply(&rainfall, settings.width, settings.height);
    for r in &mut warped {
        *r = r.max(0.0);
    }
    warped
}

/// Записывает температуру в клетки
pub fn apply_temperature(grid: &mut Grid, settings: &GenerationSettings) {
    let temperature = temperature_field(
        settings.seed,
        grid.width,
        grid.height,
        settings.temperature_scale,
    );
    grid.set_channel(Channel::Temperature, &temperature);
}

/// Записывает осадки в клетки (по текущей высоте)
pub fn apply_rainfall(grid: &mut Grid, settings: &GenerationSettings) {
    let elevation = grid.channel(Channel::Elevation);
    let rainfall = rainfall_field(&elevation, settings);
    grid.set_channel(Channel::Rainfall, &rainfall);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GenerationSettings {
        GenerationSettings {
            width: 32,
            height: 16,
            seed: 11,
            ..GenerationSettings::default()
        }
    }

    #[test]
    fn temperature_in_unit_range_and_rising_southward() {
        let t = temperature_field(3, 64, 64, 1.0);
        assert!(t.iter().all(|v| (0.0..=1.0).contains(v)));
        let row_mean = |y: usize| t[y * 64..(y + 1) * 64].iter().sum::<f32>() / 64.0;
        assert!(row_mean(60) > row_mean(3));
    }

    #[test]
    fn sea_cells_get_fixed_rain_before_warp() {
        let s = settings();
        let elevation = vec![0.0; 32];
        let mut rain = vec![0.0; 32];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        advect_row(&mut rng, &elevation, &mut rain, &s);
        assert!(rain.iter().all(|&r| r == SEA_RAINFALL));
    }

    #[test]
    fn land_dries_out_downwind() {
        let s = GenerationSettings {
            width: 200,
            ..settings()
        };
        let elevation = vec![0.9; 200];
        let mut rain = vec![0.0; 200];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        advect_row(&mut rng, &elevation, &mut rain, &s);
        assert!(rain[0] > rain[199]);
        assert!(rain.iter().all(|&r| r >= 0.0));
    }

    #[test]
    fn first_land_cell_matches_formula() {
        let s = settings();
        let elevation = vec![0.5; 32];
        let mut rain = vec![0.0; 32];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        advect_row(&mut rng, &elevation, &mut rain, &s);
        let moisture = 10.0;
        let amount = moisture * 0.017 * 0.5 + moisture * 0.0006;
        let expected = amount * 1.0 * 32.0 * 0.015;
        assert!((rain[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn rainfall_is_deterministic_and_non_negative() {
        let s = settings();
        let elevation: Vec<f32> = (0..32 * 16).map(|i| (i % 32) as f32 / 31.0).collect();
        let a = rainfall_field(&elevation, &s);
        let b = rainfall_field(&elevation, &s);
        assert_eq!(a, b);
        assert!(a.iter().all(|&r| r >= 0.0));
    }
}
