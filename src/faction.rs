//! Расы и фракции
//!
//! Расы — статические данные: цвет, слоги для названий и предпочтения по биомам.
//! Фракции порождаются из рас в начале генерации (или загружаются вызывающим).
//! Номер фракции в клетке — её 1-based позиция в списке.

use crate::biome::{BiomeId, BiomeTable};
use crate::error::{GenError, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 0 = клетка ничья
pub const UNCLAIMED: u8 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub name: String,
    pub color: [u8; 3],
    /// Раса игрока: её фракция — родина-корпорация, а не соседняя цивилизация
    #[serde(default)]
    pub motherland: bool,
    #[serde(default)]
    pub name_prefixes: Vec<String>,
    #[serde(default)]
    pub name_suffixes: Vec<String>,
    /// Замена биома на захваченной земле: имя текущего биома → имя предпочитаемого
    #[serde(default)]
    pub biome_substitutions: BTreeMap<String, String>,
}

impl Race {
    /// Переводит замены биомов из имён в идентификаторы таблицы.
    pub fn resolve_substitutions(&self, biomes: &BiomeTable) -> Result<BTreeMap<BiomeId, BiomeId>> {
        self.biome_substitutions
            .iter()
            .map(|(from, to)| {
                let from_id = biomes
                    .id_of(from)
                    .ok_or_else(|| GenError::UnknownBiomeName(from.clone()))?;
                let to_id = biomes
                    .id_of(to)
                    .ok_or_else(|| GenError::UnknownBiomeName(to.clone()))?;
                Ok((from_id, to_id))
            })
            .collect()
    }

    fn faction_name<R: Rng>(&self, rng: &mut R, ordinal: usize) -> String {
        match (
            self.name_prefixes.choose(rng),
            self.name_suffixes.choose(rng),
        ) {
            (Some(prefix), Some(suffix)) => format!("{prefix}{suffix}"),
            _ => format!("{} Clan {}", self.name, ordinal),
        }
    }
}

fn race(
    name: &str,
    color: [u8; 3],
    motherland: bool,
    substitutions: &[(&str, &str)],
    prefixes: &[&str],
    suffixes: &[&str],
) -> Race {
    Race {
        name: name.to_string(),
        color,
        motherland,
        name_prefixes: prefixes.iter().map(ToString::to_string).collect(),
        name_suffixes: suffixes.iter().map(ToString::to_string).collect(),
        biome_substitutions: substitutions
            .iter()
            .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
            .collect(),
    }
}

/// Таблица рас
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceTable {
    races: Vec<Race>,
}

impl RaceTable {
    #[must_use]
    pub fn new(races: Vec<Race>) -> Self {
        Self { races }
    }

    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            race(
                "Dwarf",
                [200, 120, 40],
                true,
                &[],
                &["Iron", "Stone", "Deep", "Gold"],
                &["forge Holdings", "hammer Corp", "delve Inc"],
            ),
            race(
                "Elf",
                [90, 200, 120],
                false,
                &[("Grassland", "Forest"), ("Savanna", "Jungle")],
                &["Sil", "Ael", "Lor", "Thal"],
                &["wen", "oria", "adel", "indor"],
            ),
            race(
                "Goblin",
                [120, 160, 40],
                false,
                &[("Forest", "Swamp"), ("Grassland", "Savanna")],
                &["Grub", "Snag", "Muk", "Zog"],
                &["nik", "gash", "rot", "tooth"],
            ),
            race(
                "Undead",
                [110, 90, 130],
                false,
                &[("Grassland", "Waste"), ("Forest", "Waste"), ("Taiga", "Tundra")],
                &["Mor", "Necr", "Gol", "Vex"],
                &["grave", "thul", "bane", "moor"],
            ),
            race(
                "Molemen",
                [150, 110, 90],
                false,
                &[("Forest", "Grassland"), ("Jungle", "Swamp")],
                &["Dig", "Bur", "Tun", "Loam"],
                &["row", "nel", "mole", "pit"],
            ),
        ])
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Race> {
        self.races.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Race> {
        self.races.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.races.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub name: String,
    pub race: String,
    pub color: [u8; 3],
    /// Отношение к игроку (-1.0..1.0)
    pub goodwill: f32,
    /// Фракция участвует в дипломатии и растит территорию
    pub interactive: bool,
    /// Корпорация-родина игрока
    pub motherland: bool,
}

impl Faction {
    /// Только такие фракции получают клетку-зародыш на карте
    #[must_use]
    pub fn claims_territory(&self) -> bool {
        self.interactive && !self.motherland
    }
}

/// Порождает список фракций: первой идёт родина игрока, затем `num_civilizations`
/// интерактивных цивилизаций, расы которых чередуются по таблице.
pub fn generate_factions<R: Rng>(
    races: &RaceTable,
    num_civilizations: usize,
    rng: &mut R,
) -> Result<Vec<Faction>> {
    let total = num_civilizations + 1;
    if total > usize::from(u8::MAX) {
        return Err(GenError::TooManyFactions(total));
    }

    let mut factions = Vec::with_capacity(total);

    if let Some(home) = races.iter().find(|r| r.motherland) {
        factions.push(Faction {
            name: home.faction_name(rng, 0),
            race: home.name.clone(),
            color: home.color,
            goodwill: 1.0,
            interactive: false,
            motherland: true,
        });
    }

    let civilized: Vec<&Race> = races.iter().filter(|r| !r.motherland).collect();
    if civilized.is_empty() && num_civilizations > 0 {
        return Err(GenError::InvalidSettings(
            "race table has no non-motherland races to build civilizations from".into(),
        ));
    }

    for i in 0..num_civilizations {
        let race = civilized[i % civilized.len()];
        factions.push(Faction {
            name: race.faction_name(rng, i + 1),
            race: race.name.clone(),
            color: race.color,
            goodwill: rng.gen_range(-1.0..=1.0),
            interactive: true,
            motherland: false,
        });
    }

    Ok(factions)
}

/// Проверяет, что список фракций помещается в байт клетки
pub fn check_faction_count(factions: &[Faction]) -> Result<()> {
    if factions.len() > usize::from(u8::MAX) {
        return Err(GenError::TooManyFactions(factions.len()));
    }
    Ok(())
}
