//! Pattern detection for the chain clear.
//!
//! Four detectors run over the whole board, in this order:
//! - progressions: runs of doubling values along a row or column
//! - clusters: orthogonally connected groups of one value
//! - center symmetry: cells equal to their point reflection through the center
//! - axis symmetry: cells equal to their mirror across the vertical axis
//!
//! Matches are applied in the order found. A tile consumed by an earlier
//! pattern is not counted again by a later one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::engine::{Grid, Move, Position, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    Progression,
    Cluster,
    CenterSymmetry,
    AxisSymmetry,
}

/// A detected arrangement. Lives only for one chain clear.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub tiles: Vec<Tile>,
    pub multiplier: f64,
}

/// What one pattern contributed to a chain clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub kind: PatternKind,
    pub multiplier: f64,
    pub cleared: usize,
    pub score: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainClear {
    pub patterns: Vec<PatternSummary>,
    pub cleared: Vec<Tile>,
    pub total_score: u64,
}

pub fn detect_patterns(grid: &Grid, cfg: &PatternConfig) -> Vec<Pattern> {
    let mut found = progressions(grid, cfg);
    found.extend(clusters(grid, cfg));
    found.extend(center_symmetry(grid, cfg));
    found.extend(axis_symmetry(grid, cfg));
    found
}

fn is_doubling(values: &[u32]) -> bool {
    values.iter().all(|&v| v != 0)
        && (values.windows(2).all(|w| w[0].checked_mul(2) == Some(w[1]))
            || values.windows(2).all(|w| w[1].checked_mul(2) == Some(w[0])))
}

fn progressions(grid: &Grid, cfg: &PatternConfig) -> Vec<Pattern> {
    let n = grid.size();
    let len = cfg.progression_len.max(2);
    if len > n {
        return Vec::new();
    }
    let mut found = Vec::new();
    let mut scan = |cells: Vec<Position>| {
        let values: Vec<u32> = cells.iter().map(|&p| grid.value_at(p)).collect();
        if is_doubling(&values) {
            found.push(Pattern {
                kind: PatternKind::Progression,
                tiles: cells.iter().filter_map(|&p| grid.tile(p).copied()).collect(),
                multiplier: cfg.progression_multiplier,
            });
        }
    };
    for y in 0..n {
        for x in 0..=n - len {
            scan((x..x + len).map(|x| Position::new(x, y)).collect());
        }
    }
    for x in 0..n {
        for y in 0..=n - len {
            scan((y..y + len).map(|y| Position::new(x, y)).collect());
        }
    }
    found
}

/// Flood fill with an explicit stack; tiles are listed in discovery order.
fn clusters(grid: &Grid, cfg: &PatternConfig) -> Vec<Pattern> {
    let n = grid.size();
    let mut visited = vec![false; n * n];
    let mut found = Vec::new();
    for start in grid.tiles().map(|t| t.position()) {
        if visited[start.y * n + start.x] {
            continue;
        }
        let value = grid.value_at(start);
        let mut group = Vec::new();
        let mut stack = vec![start];
        visited[start.y * n + start.x] = true;
        while let Some(pos) = stack.pop() {
            if let Some(tile) = grid.tile(pos) {
                group.push(*tile);
            }
            for next in Move::ALL.iter().filter_map(|&d| pos.step(d, n)) {
                let idx = next.y * n + next.x;
                if !visited[idx] && grid.value_at(next) == value {
                    visited[idx] = true;
                    stack.push(next);
                }
            }
        }
        if group.len() >= cfg.cluster_min_size {
            let extra = (group.len() - cfg.cluster_min_size) as f64;
            found.push(Pattern {
                kind: PatternKind::Cluster,
                tiles: group,
                multiplier: cfg.cluster_base_multiplier + cfg.cluster_step_multiplier * extra,
            });
        }
    }
    found
}

fn mirrored_pairs(
    grid: &Grid,
    kind: PatternKind,
    multiplier: f64,
    min_pairs: usize,
    pairs: impl Iterator<Item = (Position, Position)>,
) -> Option<Pattern> {
    let mut tiles = Vec::new();
    let mut matched = 0;
    for (a, b) in pairs {
        if let (Some(ta), Some(tb)) = (grid.tile(a), grid.tile(b)) {
            if ta.value == tb.value {
                matched += 1;
                tiles.push(*ta);
                tiles.push(*tb);
            }
        }
    }
    (matched >= min_pairs.max(1)).then_some(Pattern { kind, tiles, multiplier })
}

fn center_symmetry(grid: &Grid, cfg: &PatternConfig) -> Option<Pattern> {
    let n = grid.size();
    // each cell paired once with its reflection; an odd board's center pairs with itself and is skipped
    let pairs = (0..n * n / 2).map(move |i| {
        let a = Position::new(i % n, i / n);
        (a, Position::new(n - 1 - a.x, n - 1 - a.y))
    });
    mirrored_pairs(grid, PatternKind::CenterSymmetry, cfg.center_symmetry_multiplier, cfg.symmetry_min_pairs, pairs)
}

fn axis_symmetry(grid: &Grid, cfg: &PatternConfig) -> Option<Pattern> {
    let n = grid.size();
    let pairs = (0..n).flat_map(move |y| (0..n / 2).map(move |x| (Position::new(x, y), Position::new(n - 1 - x, y))));
    mirrored_pairs(grid, PatternKind::AxisSymmetry, cfg.axis_symmetry_multiplier, cfg.symmetry_min_pairs, pairs)
}

/// Clear each pattern in order and credit `Σ value × multiplier` for the
/// tiles it actually removed.
pub fn apply_chain(grid: &mut Grid, patterns: &[Pattern]) -> ChainClear {
    let mut seen: HashSet<Position> = HashSet::new();
    let mut chain = ChainClear { patterns: Vec::with_capacity(patterns.len()), cleared: Vec::new(), total_score: 0 };
    for pattern in patterns {
        let mut sum = 0u64;
        let mut count = 0;
        for tile in &pattern.tiles {
            if !seen.insert(tile.position()) {
                continue;
            }
            if let Some(removed) = grid.clear_cell(tile.position()) {
                sum += removed.value as u64;
                count += 1;
                chain.cleared.push(removed);
            }
        }
        let score = (sum as f64 * pattern.multiplier).round() as u64;
        grid.add_score(score);
        chain.total_score = chain.total_score.saturating_add(score);
        chain.patterns.push(PatternSummary { kind: pattern.kind, multiplier: pattern.multiplier, cleared: count, score });
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[[u32; 4]; 4]) -> Grid {
        let rows: Vec<Vec<u32>> = rows.iter().map(|r| r.to_vec()).collect();
        Grid::from_rows(&rows).unwrap()
    }

    fn kinds(patterns: &[Pattern]) -> Vec<PatternKind> { patterns.iter().map(|p| p.kind).collect() }

    #[test]
    fn finds_row_and_column_progressions() {
        let cfg = PatternConfig::default();
        let g = grid(&[[2, 4, 8, 0], [0, 0, 0, 0], [0, 0, 0, 32], [0, 0, 0, 16]]);
        let found = progressions(&g, &cfg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tiles.iter().map(|t| t.value).collect::<Vec<_>>(), vec![2, 4, 8]);

        let g = grid(&[[0, 0, 0, 64], [0, 0, 0, 32], [0, 0, 0, 16], [0; 4]]);
        let found = progressions(&g, &cfg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tiles[0].position(), Position::new(3, 0));
    }

    #[test]
    fn doubling_check_survives_huge_values() {
        assert!(is_doubling(&[1 << 29, 1 << 30, 1 << 31]));
        assert!(is_doubling(&[1 << 31, 1 << 30, 1 << 29]));
        assert!(!is_doubling(&[u32::MAX, 1 << 31]));
        assert!(!is_doubling(&[1 << 31, 1 << 31, 1 << 31]));
    }

    #[test]
    fn gaps_break_progressions() {
        let cfg = PatternConfig::default();
        let g = grid(&[[2, 0, 4, 8], [2, 4, 16, 0], [0; 4], [0; 4]]);
        assert!(progressions(&g, &cfg).is_empty());
    }

    #[test]
    fn clusters_need_four_connected_tiles() {
        let cfg = PatternConfig::default();
        let g = grid(&[[4, 4, 0, 2], [4, 0, 0, 2], [4, 0, 2, 0], [0, 0, 0, 0]]);
        let found = clusters(&g, &cfg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tiles.len(), 4);
        assert!(found[0].tiles.iter().all(|t| t.value == 4));
        assert!((found[0].multiplier - 1.5).abs() < 1e-9);

        let g = grid(&[[8, 8, 8, 0], [8, 8, 8, 0], [0; 4], [0; 4]]);
        let found = clusters(&g, &cfg);
        assert!((found[0].multiplier - 1.9).abs() < 1e-9);
    }

    #[test]
    fn detects_symmetries() {
        let cfg = PatternConfig::default();
        let center = grid(&[[2, 4, 8, 16], [0, 0, 0, 0], [0, 0, 0, 0], [16, 8, 4, 2]]);
        let c = center_symmetry(&center, &cfg).unwrap();
        assert_eq!(c.tiles.len(), 8);
        assert!(axis_symmetry(&center, &cfg).is_none());

        let axis = grid(&[[2, 0, 0, 2], [4, 0, 0, 4], [8, 0, 0, 8], [16, 0, 0, 16]]);
        let a = axis_symmetry(&axis, &cfg).unwrap();
        assert_eq!(a.tiles.len(), 8);
        assert!((a.multiplier - 2.5).abs() < 1e-9);
        assert!(center_symmetry(&axis, &cfg).is_none());
    }

    #[test]
    fn detection_order_is_fixed() {
        let cfg = PatternConfig::default();
        let g = grid(&[[2, 4, 8, 0], [2, 2, 2, 2], [0; 4], [0; 4]]);
        assert_eq!(kinds(&detect_patterns(&g, &cfg)), vec![PatternKind::Progression, PatternKind::Cluster]);
    }

    #[test]
    fn chain_does_not_double_count_shared_tiles() {
        let cfg = PatternConfig::default();
        // 2,4,8 run and the 2-cluster share the top-left 2
        let mut g = grid(&[[2, 4, 8, 0], [2, 0, 0, 0], [2, 0, 0, 0], [2, 0, 0, 0]]);
        let patterns = detect_patterns(&g, &cfg);
        assert_eq!(kinds(&patterns), vec![PatternKind::Progression, PatternKind::Cluster]);
        let chain = apply_chain(&mut g, &patterns);
        assert_eq!(chain.patterns[0].cleared, 3);
        assert_eq!(chain.patterns[0].score, 28);
        assert_eq!(chain.patterns[1].cleared, 3);
        assert_eq!(chain.patterns[1].score, 9);
        assert_eq!(chain.total_score, 37);
        assert_eq!(chain.cleared.len(), 6);
        assert_eq!(g.score(), 37);
        assert!(g.tiles().next().is_none());
    }

    #[test]
    fn quiet_board_has_no_patterns() {
        let cfg = PatternConfig::default();
        let g = grid(&[[2, 8, 2, 0], [0; 4], [0; 4], [0; 4]]);
        assert!(detect_patterns(&g, &cfg).is_empty());
        assert!(detect_patterns(&Grid::default(), &cfg).is_empty());
    }
}
