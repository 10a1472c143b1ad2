//! Рост территорий фракций
//!
//! Каждая интерактивная фракция получает клетку-зародыш на суше, после чего
//! территории растут одной из двух моделей ([`TerritoryStrategy`]):
//!
//! - **FloodFill** — поклеточная заливка, каждая занятая клетка тянется к самому низкому
//!   свободному соседу
//! - **CellSet** — суша режется на квадратные блоки-регионы, которые связываются в граф
//!   смежности и захватываются целиком
//!
//! Обе модели ограничены числом итераций.

use crate::biome::BiomeId;
use crate::config::{GenerationSettings, TerritoryStrategy};
use crate::error::{GenError, Result};
use crate::faction::{Faction, UNCLAIMED};
use crate::generator::StageProgress;
use crate::grid::{Grid, NEIGHBORS_4};
use crate::registry::Registry;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Поправка в знаменателе шанса роста, чтобы низины не давали деление на ноль
const GROWTH_EPSILON: f32 = 1e-2;

/// Шанс захвата клетки (или региона) высоты `h`; на низкой ровной земле рост быстрее.
#[must_use]
pub fn growth_chance(h: f32) -> f64 {
    f64::from(0.25 / (h.max(0.0) + GROWTH_EPSILON)).min(1.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerritoryStats {
    /// Фракций, получивших зародыш
    pub seeded: usize,
    /// Клеток, захваченных ростом (без зародышей)
    pub claimed: usize,
    /// Выполненных проходов роста
    pub iterations: usize,
}

/// Замены биомов по номеру фракции (1-based)
type Substitutions = Vec<BTreeMap<BiomeId, BiomeId>>;

fn resolve_all(factions: &[Faction], registry: &Registry) -> Result<Substitutions> {
    factions
        .iter()
        .map(|f| match registry.races.get(&f.race) {
            Some(race) => race.resolve_substitutions(&registry.biomes),
            None => Err(GenError::UnknownRace(f.race.clone())),
        })
        .collect()
}

fn claim(grid: &mut Grid, idx: usize, faction: u8, substitutions: &Substitutions) {
    let cell = &mut grid.cells[idx];
    cell.faction = faction;
    if let Some(&preferred) = substitutions[usize::from(faction) - 1].get(&cell.biome) {
        cell.biome = preferred;
    }
}

fn is_land(grid: &Grid, idx: usize, sea_level: f32) -> bool {
    grid.cells[idx].elevation > sea_level
}

/// Ставит по одной клетке-зародышу на каждую фракцию, растящую территорию.
///
/// Кандидаты — свободные внутренние клетки суши. Если суши не осталось,
/// фракция остаётся без территории. Возвращает пары (номер фракции, индекс клетки).
pub fn seed_factions<R: Rng>(
    grid: &mut Grid,
    factions: &[Faction],
    sea_level: f32,
    rng: &mut R,
) -> Vec<(u8, usize)> {
    let (w, h) = (grid.width, grid.height);
    let mut candidates: Vec<usize> = (1..h.saturating_sub(1))
        .flat_map(|y| (1..w.saturating_sub(1)).map(move |x| (x, y)))
        .map(|(x, y)| grid.index(x, y))
        .filter(|&i| is_land(grid, i, sea_level) && !grid.cells[i].is_claimed())
        .collect();

    let mut seeds = Vec::new();
    for (i, faction) in factions.iter().enumerate() {
        if !faction.claims_territory() {
            continue;
        }
        let id = (i + 1) as u8;
        if candidates.is_empty() {
            tracing::warn!(target: "overworld::territory", faction = %faction.name, "seed.skipped_no_land");
            continue;
        }
        let pick = rng.gen_range(0..candidates.len());
        let idx = candidates.swap_remove(pick);
        grid.cells[idx].faction = id;
        seeds.push((id, idx));
    }
    seeds
}

/// Свободный сосед суши с наименьшей высотой; при равенстве побеждает первый
/// по порядку запад, восток, север, юг.
fn lowest_free_neighbor(grid: &Grid, x: u32, y: u32, sea_level: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (dx, dy) in NEIGHBORS_4 {
        let (nx, ny) = (i64::from(x) + i64::from(dx), i64::from(y) + i64::from(dy));
        if !grid.contains(nx, ny) {
            continue;
        }
        let idx = grid.index(nx as u32, ny as u32);
        let cell = &grid.cells[idx];
        if cell.is_claimed() || cell.elevation <= sea_level {
            continue;
        }
        if best.is_none_or(|(_, h)| cell.elevation < h) {
            best = Some((idx, cell.elevation));
        }
    }
    best.map(|(idx, _)| idx)
}

fn flood_fill<R: Rng>(
    grid: &mut Grid,
    substitutions: &Substitutions,
    settings: &GenerationSettings,
    rng: &mut R,
    progress: &StageProgress<'_>,
) -> Result<TerritoryStats> {
    let sea_level = settings.sea_level;
    let iterations = settings.territory.iterations;
    let mut stats = TerritoryStats::default();

    for iteration in 0..iterations {
        progress.checkpoint(iteration as f32 / iterations as f32)?;

        // Сначала собираем попытки роста, затем применяем: первая заявка на клетку побеждает
        let mut frontier = false;
        let mut events: Vec<(usize, u8)> = Vec::new();
        for y in 0..grid.height {
            for x in 0..grid.width {
                let cell = &grid.cells[grid.index(x, y)];
                if !cell.is_claimed() || cell.elevation <= sea_level {
                    continue;
                }
                let faction = cell.faction;
                if let Some(target) = lowest_free_neighbor(grid, x, y, sea_level) {
                    frontier = true;
                    if rng.gen_bool(growth_chance(grid.cells[target].elevation)) {
                        events.push((target, faction));
                    }
                }
            }
        }

        stats.iterations = iteration + 1;
        for (idx, faction) in events {
            if grid.cells[idx].faction == UNCLAIMED {
                claim(grid, idx, faction, substitutions);
                stats.claimed += 1;
            }
        }
        if !frontier {
            break;
        }
    }
    Ok(stats)
}

/// Регион модели CellSet: клетки суши одного квадратного блока
#[derive(Debug, Clone)]
pub struct Region {
    pub cells: Vec<usize>,
    pub mean_elevation: f32,
    pub owner: u8,
}

/// Строит граф смежности регионов. Узлы добавляются в порядке обхода блоков.
pub fn build_region_graph(
    grid: &Grid,
    region_size: u32,
    sea_level: f32,
) -> (UnGraph<Region, ()>, Vec<Option<NodeIndex>>) {
    let size = region_size.max(1);
    let blocks_x = grid.width.div_ceil(size);
    let block_of = |x: u32, y: u32| (y / size * blocks_x + x / size) as usize;

    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for y in 0..grid.height {
        for x in 0..grid.width {
            let idx = grid.index(x, y);
            if is_land(grid, idx, sea_level) {
                members.entry(block_of(x, y)).or_default().push(idx);
            }
        }
    }

    let mut graph = UnGraph::new_undirected();
    let mut block_to_node = HashMap::new();
    for (block, cells) in members {
        let mean_elevation =
            cells.iter().map(|&i| grid.cells[i].elevation).sum::<f32>() / cells.len() as f32;
        let node = graph.add_node(Region {
            cells,
            mean_elevation,
            owner: UNCLAIMED,
        });
        block_to_node.insert(block, node);
    }

    let mut cell_to_node = vec![None; grid.len()];
    for y in 0..grid.height {
        for x in 0..grid.width {
            let idx = grid.index(x, y);
            if is_land(grid, idx, sea_level) {
                cell_to_node[idx] = block_to_node.get(&block_of(x, y)).copied();
            }
        }
    }

    let mut edges = HashSet::new();
    for y in 0..grid.height {
        for x in 0..grid.width {
            let Some(a) = cell_to_node[grid.index(x, y)] else {
                continue;
            };
            for (dx, dy) in NEIGHBORS_4 {
                let (nx, ny) = (i64::from(x) + i64::from(dx), i64::from(y) + i64::from(dy));
                if !grid.contains(nx, ny) {
                    continue;
                }
                let Some(b) = cell_to_node[grid.index(nx as u32, ny as u32)] else {
                    continue;
                };
                if a != b {
                    let key = if a < b { (a, b) } else { (b, a) };
                    if edges.insert(key) {
                        graph.add_edge(key.0, key.1, ());
                    }
                }
            }
        }
    }
    (graph, cell_to_node)
}

fn claim_region(
    grid: &mut Grid,
    region: &mut Region,
    faction: u8,
    substitutions: &Substitutions,
) -> usize {
    region.owner = faction;
    let mut claimed = 0;
    for &idx in &region.cells {
        // Чужие зародыши внутри региона остаются за своими фракциями
        if grid.cells[idx].faction == UNCLAIMED {
            claim(grid, idx, faction, substitutions);
            claimed += 1;
        }
    }
    claimed
}

fn cell_set<R: Rng>(
    grid: &mut Grid,
    seeds: &[(u8, usize)],
    substitutions: &Substitutions,
    settings: &GenerationSettings,
    rng: &mut R,
    progress: &StageProgress<'_>,
) -> Result<TerritoryStats> {
    let (mut graph, cell_to_node) =
        build_region_graph(grid, settings.territory.region_size, settings.sea_level);
    let mut stats = TerritoryStats::default();

    for &(faction, idx) in seeds {
        if let Some(node) = cell_to_node[idx]
            && graph[node].owner == UNCLAIMED
        {
            stats.claimed += claim_region(grid, &mut graph[node], faction, substitutions);
        }
    }

    let iterations = settings.territory.iterations;
    for iteration in 0..iterations {
        progress.checkpoint(iteration as f32 / iterations as f32)?;

        let mut events: Vec<(NodeIndex, u8)> = Vec::new();
        for node in graph.node_indices() {
            let owner = graph[node].owner;
            if owner == UNCLAIMED {
                continue;
            }
            let target = graph
                .neighbors(node)
                .filter(|&n| graph[n].owner == UNCLAIMED)
                .min_by(|&a, &b| {
                    graph[a]
                        .mean_elevation
                        .total_cmp(&graph[b].mean_elevation)
                        .then(a.cmp(&b))
                });
            if let Some(target) = target
                && rng.gen_bool(growth_chance(graph[target].mean_elevation))
            {
                events.push((target, owner));
            }
        }

        stats.iterations = iteration + 1;
        let mut changed = 0;
        for (node, faction) in events {
            if graph[node].owner == UNCLAIMED {
                stats.claimed += claim_region(grid, &mut graph[node], faction, substitutions);
                changed += 1;
            }
        }
        if changed == 0 {
            break;
        }
    }
    tracing::debug!(target: "overworld::territory", regions = graph.node_count(), edges = graph.edge_count(), "cell_set.graph");
    Ok(stats)
}

/// Сажает зародыши и растит территории выбранной моделью
pub fn grow_territories<R: Rng>(
    grid: &mut Grid,
    factions: &[Faction],
    registry: &Registry,
    settings: &GenerationSettings,
    rng: &mut R,
    progress: &StageProgress<'_>,
) -> Result<TerritoryStats> {
    let substitutions = resolve_all(factions, registry)?;
    let seeds = seed_factions(grid, factions, settings.sea_level, rng);

    let mut stats = match settings.territory.strategy {
        TerritoryStrategy::FloodFill => flood_fill(grid, &substitutions, settings, rng, progress)?,
        TerritoryStrategy::CellSet => cell_set(grid, &seeds, &substitutions, settings, rng, progress)?,
    };
    stats.seeded = seeds.len();

    if tracing::enabled!(target: "overworld::territory", tracing::Level::DEBUG) {
        let mut per_faction = vec![0usize; factions.len() + 1];
        for cell in &grid.cells {
            per_faction[usize::from(cell.faction)] += 1;
        }
        for (i, faction) in factions.iter().enumerate() {
            tracing::debug!(
                target: "overworld::territory",
                faction = %faction.name,
                cells = per_faction[i + 1],
                "territory.size"
            );
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerritorySettings;
    use crate::faction::RaceTable;
    use crate::grid::Cell;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn civ(race: &str) -> Faction {
        Faction {
            name: format!("{race} test"),
            race: race.into(),
            color: [0, 0, 0],
            goodwill: 0.0,
            interactive: true,
            motherland: false,
        }
    }

    fn home() -> Faction {
        Faction {
            motherland: true,
            interactive: false,
            ..civ("Dwarf")
        }
    }

    fn land(size: u32, h: f32, biome: BiomeId) -> Grid {
        let mut grid = Grid::new(size, size);
        for cell in &mut grid.cells {
            cell.elevation = h;
            cell.biome = biome;
        }
        grid
    }

    fn settings(strategy: TerritoryStrategy, iterations: usize) -> GenerationSettings {
        GenerationSettings {
            width: 16,
            height: 16,
            territory: TerritorySettings {
                strategy,
                iterations,
                region_size: 4,
            },
            ..GenerationSettings::default()
        }
    }

    #[test]
    fn chance_is_capped() {
        assert_eq!(growth_chance(0.0), 1.0);
        assert_eq!(growth_chance(0.24), 1.0);
        assert!(growth_chance(0.9) < 0.3);
    }

    #[test]
    fn only_interactive_civilizations_get_seeds() {
        let mut grid = land(16, 0.5, 1);
        let factions = vec![home(), civ("Elf"), civ("Goblin")];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let seeds = seed_factions(&mut grid, &factions, 0.17, &mut rng);
        assert_eq!(seeds.iter().map(|s| s.0).collect::<Vec<_>>(), vec![2, 3]);
        for (id, idx) in seeds {
            assert_eq!(grid.cells[idx].faction, id);
            let (x, y) = (idx as u32 % 16, idx as u32 / 16);
            assert!((1..15).contains(&x) && (1..15).contains(&y));
        }
    }

    #[test]
    fn seeding_skips_when_no_land() {
        let mut grid = land(16, 0.0, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(seed_factions(&mut grid, &[civ("Elf")], 0.17, &mut rng).is_empty());
        assert!(grid.cells.iter().all(|c| !c.is_claimed()));
    }

    /// Рост опирается на фиксированный порядок направлений: запад выигрывает у востока при равной высоте.
    #[test]
    fn neighbor_ties_prefer_fixed_direction_order() {
        let mut grid = land(5, 0.5, 1);
        let center = grid.index(2, 2);
        grid.cells[center].faction = 1;
        assert_eq!(lowest_free_neighbor(&grid, 2, 2, 0.17), Some(grid.index(1, 2)));

        let west = grid.index(1, 2);
        grid.cells[west].faction = 2;
        assert_eq!(lowest_free_neighbor(&grid, 2, 2, 0.17), Some(grid.index(3, 2)));

        let south = grid.index(2, 3);
        grid.cells[south].elevation = 0.3;
        assert_eq!(lowest_free_neighbor(&grid, 2, 2, 0.17), Some(south));
    }

    #[test]
    fn neighbor_search_ignores_water() {
        let mut grid = land(3, 0.1, 1);
        let center = grid.index(1, 1);
        grid.cells[center].elevation = 0.5;
        assert_eq!(lowest_free_neighbor(&grid, 1, 1, 0.17), None);
    }

    #[test]
    fn flood_fill_covers_flat_lowland() {
        // На высоте 0.2 шанс роста равен 1, так что заливка детерминирована по форме
        let registry = Registry::builtin();
        let mut grid = land(16, 0.2, 1);
        let factions = vec![civ("Molemen")];
        let s = settings(TerritoryStrategy::FloodFill, 200);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let stats =
            grow_territories(&mut grid, &factions, &registry, &s, &mut rng, &StageProgress::detached())
                .unwrap();
        assert_eq!(stats.seeded, 1);
        assert!(grid.cells.iter().all(|c| c.faction == 1));
        assert_eq!(stats.claimed, 16 * 16 - 1);
        assert!(stats.iterations < 200);
    }

    #[test]
    fn claimed_cells_adopt_race_biome() {
        let registry = Registry::builtin();
        let grass = registry.biomes.id_of("Grassland").unwrap();
        let forest = registry.biomes.id_of("Forest").unwrap();
        let mut grid = land(12, 0.2, grass);
        let s = settings(TerritoryStrategy::FloodFill, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        grow_territories(&mut grid, &[civ("Elf")], &registry, &s, &mut rng, &StageProgress::detached())
            .unwrap();
        for cell in &grid.cells {
            match cell.faction {
                // Клетка-зародыш биом не меняет
                1 if cell.biome == grass => {}
                1 => assert_eq!(cell.biome, forest),
                _ => assert_eq!(cell.biome, grass),
            }
        }
        assert!(grid.cells.iter().any(|c| c.biome == forest));
    }

    #[test]
    fn growth_is_bounded_by_iterations() {
        let registry = Registry::builtin();
        let mut grid = land(32, 0.2, 1);
        let s = settings(TerritoryStrategy::FloodFill, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let stats =
            grow_territories(&mut grid, &[civ("Elf")], &registry, &s, &mut rng, &StageProgress::detached())
                .unwrap();
        assert_eq!(stats.iterations, 2);
        // За два прохода из одной клетки не вырасти дальше ромба радиуса 2
        assert!(grid.cells.iter().filter(|c| c.is_claimed()).count() <= 13);
    }

    #[test]
    fn region_graph_links_adjacent_blocks() {
        let grid = land(8, 0.5, 1);
        let (graph, cell_to_node) = build_region_graph(&grid, 4, 0.17);
        assert_eq!(graph.node_count(), 4);
        // Блоки 2×2 связаны по сторонам, диагонали не соседи
        assert_eq!(graph.edge_count(), 4);
        assert!(cell_to_node.iter().all(Option::is_some));
        assert!(graph.node_weights().all(|r| r.cells.len() == 16));
    }

    #[test]
    fn region_graph_skips_water_blocks() {
        let mut grid = land(8, 0.5, 1);
        for y in 0..8 {
            for x in 4..8 {
                let idx = grid.index(x, y);
                grid.cells[idx].elevation = 0.0;
            }
        }
        let (graph, cell_to_node) = build_region_graph(&grid, 4, 0.17);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(cell_to_node[grid.index(5, 5)].is_none());
    }

    #[test]
    fn cell_set_claims_whole_regions() {
        let registry = Registry::builtin();
        let mut grid = land(16, 0.2, 1);
        let factions = vec![civ("Elf"), civ("Goblin")];
        let s = settings(TerritoryStrategy::CellSet, 64);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let stats =
            grow_territories(&mut grid, &factions, &registry, &s, &mut rng, &StageProgress::detached())
                .unwrap();
        assert_eq!(stats.seeded, 2);
        assert!(grid.cells.iter().all(Cell::is_claimed));
        for id in 1..=2u8 {
            assert!(grid.cells.iter().any(|c| c.faction == id));
        }
        // Каждый блок 4×4 принадлежит одной фракции, кроме чужих зародышей
        let mut foreign_seeds = 0;
        for by in 0..4 {
            for bx in 0..4 {
                let mut counts = [0usize; 3];
                for y in by * 4..by * 4 + 4 {
                    for x in bx * 4..bx * 4 + 4 {
                        counts[usize::from(grid.cells[y * 16 + x].faction)] += 1;
                    }
                }
                foreign_seeds += 16 - counts.iter().max().copied().unwrap_or(0);
            }
        }
        assert!(foreign_seeds <= 2);
    }

    #[test]
    fn unknown_race_is_an_error() {
        let registry = Registry {
            races: RaceTable::new(Vec::new()),
            ..Registry::builtin()
        };
        let mut grid = land(8, 0.5, 1);
        let s = settings(TerritoryStrategy::FloodFill, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(
            grow_territories(&mut grid, &[civ("Elf")], &registry, &s, &mut rng, &StageProgress::detached())
                .is_err()
        );
    }
}
