//! One-ply greedy move chooser for the runner binaries and benches.

use crate::abilities::{AbilityId, TriggerKind};
use crate::engine::{Grid, Move};
use crate::game::{Game, GameEvent};

/// Evaluation order; earlier entries win ties.
pub const MOVE_ORDER: [Move; 4] = [Move::Up, Move::Left, Move::Right, Move::Down];

/// Evaluation weights. Defaults favour open boards over raw score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreedyConfig {
    pub empty_weight: f64,
    pub merge_weight: f64,
}

impl Default for GreedyConfig {
    fn default() -> Self { Self { empty_weight: 10.0, merge_weight: 4.0 } }
}

/// Per-direction evaluation, `legal = false` when the move changes nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy {
    cfg: GreedyConfig,
}

impl Greedy {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(cfg: GreedyConfig) -> Self { Self { cfg } }

    /// Evaluations in [`MOVE_ORDER`].
    pub fn branch_evals(&self, grid: &Grid) -> [BranchEval; 4] {
        MOVE_ORDER.map(|dir| {
            let mut next = grid.clone();
            let result = next.move_tiles(dir);
            if !result.moved {
                return BranchEval { dir, ev: 0.0, legal: false };
            }
            let ev = result.score as f64
                + self.cfg.empty_weight * next.empty_cells().len() as f64
                + self.cfg.merge_weight * adjacent_equal_pairs(&next) as f64;
            BranchEval { dir, ev, legal: true }
        })
    }

    /// Best legal move, or `None` when nothing moves.
    ///
    /// ```
    /// use nezha_2048::engine::{Grid, Move};
    /// use nezha_2048::policy::Greedy;
    /// let g = Grid::from_rows(&[vec![0, 0, 2, 2], vec![0; 4], vec![0; 4], vec![0; 4]]).unwrap();
    /// assert_eq!(Greedy::new().best_move(&g), Some(Move::Left));
    /// ```
    pub fn best_move(&self, grid: &Grid) -> Option<Move> {
        let mut best: Option<BranchEval> = None;
        for branch in self.branch_evals(grid).into_iter().filter(|b| b.legal) {
            if best.map_or(true, |b| branch.ev > b.ev) {
                best = Some(branch);
            }
        }
        best.map(|b| b.dir)
    }
}

/// [`Greedy::best_move`] with default weights.
pub fn greedy_move(grid: &Grid) -> Option<Move> { Greedy::new().best_move(grid) }

/// Orthogonally adjacent pairs of equal tiles.
pub fn adjacent_equal_pairs(grid: &Grid) -> usize {
    let n = grid.size();
    grid.tiles()
        .map(|t| {
            let p = t.position();
            [Move::Right, Move::Down]
                .iter()
                .filter_map(|&d| p.step(d, n))
                .filter(|&q| grid.value_at(q) == t.value)
                .count()
        })
        .sum()
}

/// One automated turn: fire every ready manual ability, play the greedy
/// move, then advance the clock by `tick_ms`. `None` once no move is left.
pub fn autoplay_turn(game: &mut Game, greedy: &Greedy, tick_ms: u64) -> Option<Vec<GameEvent>> {
    if game.is_over() {
        return None;
    }
    let mut events = Vec::new();
    for id in AbilityId::ALL {
        let abilities = game.abilities();
        if abilities.definition(id).trigger == TriggerKind::Manual && abilities.check_trigger(id).is_ok() {
            if let Ok(fired) = game.trigger_ability(id.as_str()) {
                events.extend(fired);
            }
        }
    }
    let dir = greedy.best_move(game.grid())?;
    events.extend(game.play_turn(dir));
    events.extend(game.tick(tick_ms));
    Some(events)
}
