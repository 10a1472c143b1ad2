//! Статический реестр контента: таблица биомов и таблица рас.
//!
//! Реестр создаётся один раз на процесс и передаётся генератору явно
//! (обычно как `Arc<Registry>`), во время генерации он только читается.

use crate::biome::{BiomeId, BiomeTable, WASTE};
use crate::error::{GenError, Result};
use crate::faction::RaceTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub biomes: BiomeTable,
    pub races: RaceTable,
}

impl Registry {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            biomes: BiomeTable::builtin(),
            races: RaceTable::builtin(),
        }
    }

    /// Загружает реестр из TOML-файла с массивами `[[biomes]]` и `[[races]]`
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let registry: Self = toml::from_str(contents)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Все замены биомов у рас должны ссылаться на существующие биомы,
    /// а биом выжженной земли обязан присутствовать.
    pub fn validate(&self) -> Result<()> {
        self.waste_biome()?;
        for race in self.races.iter() {
            race.resolve_substitutions(&self.biomes)?;
        }
        Ok(())
    }

    pub fn waste_biome(&self) -> Result<BiomeId> {
        self.biomes
            .id_of(WASTE)
            .ok_or_else(|| GenError::UnknownBiomeName(WASTE.to_string()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_is_valid() {
        let registry = Registry::builtin();
        assert!(registry.validate().is_ok());
        assert!(registry.waste_biome().is_ok());
    }

    #[test]
    fn survives_toml_round_trip() {
        let registry = Registry::builtin();
        let text = toml::to_string(&registry).unwrap();
        let parsed = Registry::from_toml_str(&text).unwrap();
        assert_eq!(parsed, registry);
    }

    #[test]
    fn missing_waste_is_rejected() {
        let text = r#"
            [[biomes]]
            name = "Plain"
            temperature = 0.5
            rainfall = 0.5
            elevation = 0.5
            color = [1, 2, 3]

            [[races]]
            name = "Elf"
            color = [4, 5, 6]
        "#;
        assert!(matches!(
            Registry::from_toml_str(text),
            Err(GenError::UnknownBiomeName(name)) if name == WASTE
        ));
    }
}
