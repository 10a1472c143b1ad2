use crate::biome::BiomeId;
use crate::grid::Grid;
use rand::Rng;

/// Радиус влияния одного вулкана в клетках
pub const VOLCANO_RADIUS: i64 = 11;
/// Высота дна кратера
pub const CRATER_FLOOR: f32 = 0.1;
const CRATER_RADIUS: f32 = 2.0;
/// Сколько дополнительных точек проверяется в поисках самой высокой
const EXTRA_CANDIDATES: usize = 4;

fn random_point<R: Rng>(grid: &Grid, rng: &mut R) -> (u32, u32) {
    (rng.gen_range(0..grid.width), rng.gen_range(0..grid.height))
}

/// Выбирает центр вулкана: случайная точка и ещё несколько кандидатов,
/// побеждает самый высокий (первый при равенстве).
fn pick_center<R: Rng>(grid: &Grid, rng: &mut R) -> (u32, u32) {
    let mut best = random_point(grid, rng);
    let mut best_h = grid.cells[grid.index(best.0, best.1)].elevation;
    for _ in 0..EXTRA_CANDIDATES {
        let candidate = random_point(grid, rng);
        let h = grid.cells[grid.index(candidate.0, candidate.1)].elevation;
        if h > best_h {
            best = candidate;
            best_h = h;
        }
    }
    best
}

/// Высота, добавляемая конусом на расстоянии `offset` от центра
#[must_use]
pub fn cone_lift(dx: f32, dy: f32) -> f32 {
    let f_dist = (dx / 3.0).hypot(dy / 3.0);
    (f_dist.sin().powi(3) + 1.0) * 0.2
}

/// Поднимает весь квадрат `±VOLCANO_RADIUS` вокруг центра; пустошью становится
/// только круг строго внутри радиуса.
fn stamp(grid: &mut Grid, (cx, cy): (u32, u32), waste: BiomeId) {
    let r = VOLCANO_RADIUS;
    for dy in -r..=r {
        for dx in -r..=r {
            let (x, y) = (i64::from(cx) + dx, i64::from(cy) + dy);
            if !grid.contains(x, y) {
                continue;
            }
            let dist = (dx as f32).hypot(dy as f32);
            let idx = grid.index(x as u32, y as u32);
            let cell = &mut grid.cells[idx];
            cell.elevation += cone_lift(dx as f32, dy as f32);
            if dist <= CRATER_RADIUS {
                cell.elevation = CRATER_FLOOR;
            }
            if dist < r as f32 {
                cell.biome = waste;
            }
            cell.elevation = cell.elevation.clamp(0.0, 1.0);
        }
    }
}

/// Ставит `count` вулканов по очереди: поздние могут перекрыть ранние кратеры.
///
/// Возвращает центры в порядке размещения.
pub fn carve_volcanoes<R: Rng>(
    grid: &mut Grid,
    rng: &mut R,
    count: usize,
    waste: BiomeId,
) -> Vec<(u32, u32)> {
    let mut centers = Vec::with_capacity(count);
    for _ in 0..count {
        let center = pick_center(grid, rng);
        stamp(grid, center, waste);
        tracing::debug!(target: "overworld::volcano", x = center.0, y = center.1, "volcano.placed");
        centers.push(center);
    }
    centers
}
