// src/config.rs
//! Конфигурация генерации оверворлда
//!
//! Этот модуль определяет все параметры, управляющие генерацией карты мира:
//! - Размеры сетки и сид
//! - Параметры эрозии (число капель, длина следа)
//! - Климатические коэффициенты и уровень моря
//! - Число разломов, вулканов и цивилизаций
//! - Стратегию роста территорий фракций
//!
//! Все структуры поддерживают сериализацию в TOML/JSON. Параметры неизменны на протяжении одного запуска.

use crate::error::{GenError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Минимальная сторона карты: билинейная выборка и копирование краёв требуют хотя бы двух внутренних клеток.
pub const MIN_DIMENSION: u32 = 4;

/// Стратегия роста территорий
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TerritoryStrategy {
    /// Прямая заливка по клеткам сетки (по умолчанию)
    #[default]
    FloodFill,
    /// Рост по регионам: набор клеток квадратного блока захватывается целиком
    CellSet,
}

/// Настройки роста территорий фракций
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerritorySettings {
    #[serde(default)]
    pub strategy: TerritoryStrategy,

    /// Верхняя граница числа итераций роста (заливка не обязана сходиться)
    #[serde(default = "default_territory_iterations")]
    pub iterations: usize,

    /// Сторона блока-региона в клетках для стратегии `CellSet`
    #[serde(default = "default_region_size")]
    pub region_size: u32,
}

fn default_territory_iterations() -> usize {
    64
}
fn default_region_size() -> u32 {
    4
}

impl Default for TerritorySettings {
    fn default() -> Self {
        Self {
            strategy: TerritoryStrategy::FloodFill,
            iterations: 64,
            region_size: 4,
        }
    }
}

/// Настройки выветривания и размытия эрозии
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatheringSettings {
    /// Число проходов выветривания (после каждого высота пересчитывается заново)
    #[serde(default = "default_weathering_passes")]
    pub passes: usize,

    /// Доля разницы со средним соседей, уходящая в выветривание за проход
    #[serde(default = "default_weathering_rate")]
    pub rate: f32,

    /// Радиус размытия поля эрозии (0 = без размытия)
    #[serde(default = "default_blur_radius")]
    pub blur_radius: usize,
}

fn default_weathering_passes() -> usize {
    2
}
fn default_weathering_rate() -> f32 {
    0.25
}
fn default_blur_radius() -> usize {
    1
}

impl Default for WeatheringSettings {
    fn default() -> Self {
        Self {
            passes: 2,
            rate: 0.25,
            blur_radius: 1,
        }
    }
}

/// Настройки перевода мировых координат воксельного мира в клетки оверворлда
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiomeLookupSettings {
    /// Сколько мировых единиц приходится на одну клетку оверворлда
    #[serde(default = "default_world_scale")]
    pub world_scale: f32,

    /// Амплитуда шумового сдвига на границах клеток (в клетках)
    #[serde(default = "default_blend_amplitude")]
    pub blend_amplitude: f32,

    /// Частота шума смешивания; шум читается в координатах сетки, а не мира
    #[serde(default = "default_blend_frequency")]
    pub blend_frequency: f32,
}

fn default_world_scale() -> f32 {
    16.0
}
fn default_blend_amplitude() -> f32 {
    0.35
}
fn default_blend_frequency() -> f32 {
    0.05
}

impl Default for BiomeLookupSettings {
    fn default() -> Self {
        Self {
            world_scale: 16.0,
            blend_amplitude: 0.35,
            blend_frequency: 0.05,
        }
    }
}

/// Основные параметры генерации оверворлда
///
/// Полная конфигурация одного запуска. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    /// Сид генератора случайных чисел (детерминированная генерация)
    #[serde(default)]
    pub seed: u64,

    /// Ширина карты в клетках
    #[serde(default = "default_width")]
    pub width: u32,

    /// Высота карты в клетках
    #[serde(default = "default_height")]
    pub height: u32,

    /// Число капель дождя в гидравлической эрозии
    #[serde(default = "default_num_rains")]
    pub num_rains: usize,

    /// Максимальная длина следа одной капли
    #[serde(default = "default_rain_length")]
    pub rain_length: usize,

    /// Сколько случайных точек пробуется для старта капли (берётся самая высокая)
    #[serde(default = "default_num_rain_samples")]
    pub num_rain_samples: usize,

    /// Масштаб осадков
    #[serde(default = "default_rainfall_scale")]
    pub rainfall_scale: f32,

    /// Уровень моря (0.0..1.0)
    #[serde(default = "default_sea_level")]
    pub sea_level: f32,

    /// Масштаб широтного градиента температуры
    #[serde(default = "default_temperature_scale")]
    pub temperature_scale: f32,

    /// Число линий разломов
    #[serde(default = "default_num_faults")]
    pub num_faults: usize,

    /// Число вулканов
    #[serde(default = "default_num_volcanoes")]
    pub num_volcanoes: usize,

    /// Число интерактивных цивилизаций (без родины игрока)
    #[serde(default = "default_num_civilizations")]
    pub num_civilizations: usize,

    #[serde(default)]
    pub territory: TerritorySettings,

    #[serde(default)]
    pub weathering: WeatheringSettings,

    #[serde(default)]
    pub biome_lookup: BiomeLookupSettings,
}

fn default_width() -> u32 {
    512
}
fn default_height() -> u32 {
    512
}
fn default_num_rains() -> usize {
    10_000
}
fn default_rain_length() -> usize {
    250
}
fn default_num_rain_samples() -> usize {
    3
}
fn default_rainfall_scale() -> f32 {
    1.0
}
fn default_sea_level() -> f32 {
    0.17
}
fn default_temperature_scale() -> f32 {
    1.0
}
fn default_num_faults() -> usize {
    3
}
fn default_num_volcanoes() -> usize {
    3
}
fn default_num_civilizations() -> usize {
    5
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 512,
            height: 512,
            num_rains: 10_000,
            rain_length: 250,
            num_rain_samples: 3,
            rainfall_scale: 1.0,
            sea_level: 0.17,
            temperature_scale: 1.0,
            num_faults: 3,
            num_volcanoes: 3,
            num_civilizations: 5,
            territory: TerritorySettings::default(),
            weathering: WeatheringSettings::default(),
            biome_lookup: BiomeLookupSettings::default(),
        }
    }
}

impl GenerationSettings {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # overworld.toml
    /// seed = 42
    /// width = 256
    /// height = 256
    /// num_civilizations = 3
    ///
    /// [territory]
    /// strategy = "CellSet"
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Число клеток сетки
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Проверяет параметры до запуска генерации.
    pub fn validate(&self) -> Result<()> {
        if self.width < MIN_DIMENSION || self.height < MIN_DIMENSION {
            return Err(GenError::InvalidSettings(format!(
                "map must be at least {MIN_DIMENSION}x{MIN_DIMENSION}, got {}x{}",
                self.width, self.height
            )));
        }
        if self.num_rain_samples == 0 {
            return Err(GenError::InvalidSettings(
                "num_rain_samples must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sea_level) {
            return Err(GenError::InvalidSettings(format!(
                "sea_level must lie in [0, 1], got {}",
                self.sea_level
            )));
        }
        for (name, value) in [
            ("rainfall_scale", self.rainfall_scale),
            ("temperature_scale", self.temperature_scale),
            ("weathering.rate", self.weathering.rate),
            ("biome_lookup.world_scale", self.biome_lookup.world_scale),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GenError::InvalidSettings(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.biome_lookup.world_scale == 0.0 {
            return Err(GenError::InvalidSettings(
                "biome_lookup.world_scale must be positive".into(),
            ));
        }
        if self.territory.region_size == 0 {
            return Err(GenError::InvalidSettings(
                "territory.region_size must be at least 1".into(),
            ));
        }
        // +1 за родину игрока
        if self.num_civilizations >= usize::from(u8::MAX) {
            return Err(GenError::TooManyFactions(
                self.num_civilizations.saturating_add(1),
            ));
        }
        Ok(())
    }
}
