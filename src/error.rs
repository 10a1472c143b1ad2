//! Ошибки генерации оверворлда

use thiserror::Error;

/// Все ошибки, которые может вернуть генератор, загрузка конфигурации или снимка.
#[derive(Error, Debug)]
pub enum GenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid generation settings: {0}")]
    InvalidSettings(String),

    /// `faction_id` хранится в байте: больше 255 фракций не представимо.
    #[error("{0} factions requested, at most 255 fit into a cell")]
    TooManyFactions(usize),

    #[error("unknown biome id {0}")]
    UnknownBiome(u8),

    #[error("unknown biome name '{0}'")]
    UnknownBiomeName(String),

    #[error("unknown race '{0}'")]
    UnknownRace(String),

    #[error("snapshot is {actual_width}x{actual_height}, expected {width}x{height}")]
    SnapshotSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("generation aborted")]
    Aborted,

    #[error("generation is already running")]
    AlreadyRunning,

    #[error("generation has not been started")]
    NotStarted,

    #[error("generation worker panicked: {0}")]
    WorkerPanicked(String),
}

pub type Result<T> = std::result::Result<T, GenError>;
