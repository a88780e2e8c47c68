//! Area clear: pick the most valuable region of the board and wipe it.

use crate::config::AreaClearConfig;
use crate::engine::{Grid, Move, Position, Tile};

/// Result of one area clear.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaClear {
    pub region: Vec<Position>,
    pub cleared: Vec<Tile>,
    pub score: u64,
}

/// Every 2×2 block followed by the configured fixed shapes.
///
/// Shape cells that fall off the board are dropped.
pub fn candidate_regions(size: usize, cfg: &AreaClearConfig) -> Vec<Vec<Position>> {
    let mut regions = Vec::new();
    for y in 0..size.saturating_sub(1) {
        for x in 0..size.saturating_sub(1) {
            regions.push(vec![
                Position::new(x, y),
                Position::new(x + 1, y),
                Position::new(x, y + 1),
                Position::new(x + 1, y + 1),
            ]);
        }
    }
    for shape in &cfg.extra_shapes {
        let cells: Vec<Position> = shape
            .iter()
            .filter(|&&(x, y)| x < size && y < size)
            .map(|&(x, y)| Position::new(x, y))
            .collect();
        if !cells.is_empty() {
            regions.push(cells);
        }
    }
    regions
}

/// A tile is blocking when enough of its orthogonal neighbours share its value.
pub fn is_blocking(grid: &Grid, pos: Position, cfg: &AreaClearConfig) -> bool {
    let Some(tile) = grid.tile(pos) else { return false };
    let equal = Move::ALL
        .iter()
        .filter_map(|&d| pos.step(d, grid.size()))
        .filter(|&n| grid.value_at(n) == tile.value)
        .count();
    equal >= cfg.blocking_neighbors
}

/// `Σ value + w_high·Σ(high values) + w_block·Σ(blocking values)`.
pub fn region_score(grid: &Grid, region: &[Position], cfg: &AreaClearConfig) -> f64 {
    region
        .iter()
        .filter_map(|&p| grid.tile(p).map(|t| (p, t.value as f64)))
        .map(|(p, v)| {
            let mut s = v;
            if v >= cfg.high_value_threshold as f64 {
                s += cfg.high_value_weight * v;
            }
            if is_blocking(grid, p, cfg) {
                s += cfg.blocking_weight * v;
            }
            s
        })
        .sum()
}

/// Highest-scoring candidate that holds at least one tile; the center 2×2
/// when every candidate is empty. Ties keep the earliest candidate.
pub fn select_region(grid: &Grid, cfg: &AreaClearConfig) -> Vec<Position> {
    let mut best: Option<(f64, Vec<Position>)> = None;
    for region in candidate_regions(grid.size(), cfg) {
        if !region.iter().any(|&p| grid.tile(p).is_some()) {
            continue;
        }
        let score = region_score(grid, &region, cfg);
        if best.as_ref().map_or(true, |(b, _)| score > *b) {
            best = Some((score, region));
        }
    }
    best.map(|(_, r)| r).unwrap_or_else(|| center_block(grid.size()))
}

fn center_block(size: usize) -> Vec<Position> {
    let c = (size / 2).saturating_sub(1);
    vec![
        Position::new(c, c),
        Position::new(c + 1, c),
        Position::new(c, c + 1),
        Position::new(c + 1, c + 1),
    ]
}

/// Clear the selected region and credit `Σ + bonus·count (+ combo bonus)`.
pub fn clear_area(grid: &mut Grid, cfg: &AreaClearConfig, combo: u32) -> AreaClear {
    let region = select_region(grid, cfg);
    let cleared: Vec<Tile> = region.iter().filter_map(|&p| grid.clear_cell(p)).collect();
    let sum: u64 = cleared.iter().map(|t| t.value as u64).sum();
    let mut score = sum + cfg.per_tile_bonus * cleared.len() as u64;
    if combo >= cfg.combo_bonus_threshold {
        score += (sum as f64 * cfg.combo_bonus_weight).round() as u64;
    }
    grid.add_score(score);
    AreaClear { region, cleared, score }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[[u32; 4]; 4]) -> Grid {
        let rows: Vec<Vec<u32>> = rows.iter().map(|r| r.to_vec()).collect();
        Grid::from_rows(&rows).unwrap()
    }

    #[test]
    fn enumerates_blocks_and_shapes() {
        let cfg = AreaClearConfig::default();
        let regions = candidate_regions(4, &cfg);
        assert_eq!(regions.len(), 9 + 2);
        assert!(regions[..9].iter().all(|r| r.len() == 4));
        assert_eq!(regions[9].len(), 5);
        // the cross hangs off a 2×2 board
        let small = candidate_regions(2, &cfg);
        assert_eq!(small.len(), 1 + 2);
        assert_eq!(small[1], vec![Position::new(1, 0), Position::new(0, 1), Position::new(1, 1)]);
    }

    #[test]
    fn high_values_and_blocking_raise_scores() {
        let cfg = AreaClearConfig::default();
        let g = grid(&[[128, 0, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(region_score(&g, &[Position::new(0, 0)], &cfg), 192.0);

        let g = grid(&[[0, 4, 0, 0], [4, 4, 4, 0], [0; 4], [0; 4]]);
        assert!(is_blocking(&g, Position::new(1, 1), &cfg));
        assert!(!is_blocking(&g, Position::new(0, 1), &cfg));
        let s = region_score(&g, &[Position::new(1, 1)], &cfg);
        assert!((s - 5.2).abs() < 1e-9);
    }

    #[test]
    fn picks_the_heaviest_region() {
        let cfg = AreaClearConfig::default();
        let g = grid(&[[2, 2, 0, 0], [0; 4], [0, 0, 64, 32], [0, 0, 16, 8]]);
        let region = select_region(&g, &cfg);
        assert_eq!(
            region,
            vec![Position::new(2, 2), Position::new(3, 2), Position::new(2, 3), Position::new(3, 3)]
        );
    }

    #[test]
    fn empty_board_defaults_to_center() {
        let cfg = AreaClearConfig::default();
        let mut g = Grid::default();
        let clear = clear_area(&mut g, &cfg, 0);
        assert_eq!(clear.region, center_block(4));
        assert!(clear.cleared.is_empty());
        assert_eq!(clear.score, 0);
    }

    #[test]
    fn clear_scores_with_and_without_combo() {
        let cfg = AreaClearConfig::default();
        let rows = [[0; 4], [0; 4], [0, 0, 64, 32], [0, 0, 16, 8]];

        let mut g = grid(&rows);
        let clear = clear_area(&mut g, &cfg, 4);
        assert_eq!(clear.cleared.len(), 4);
        assert_eq!(clear.score, 120 + 80);
        assert_eq!(g.score(), 200);
        assert!(g.tiles().next().is_none());

        let mut g = grid(&rows);
        let clear = clear_area(&mut g, &cfg, 5);
        assert_eq!(clear.score, 120 + 80 + 60);
    }
}
