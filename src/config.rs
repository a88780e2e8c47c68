//! Tunable knobs for the grid and the ability layer.
//!
//! Every field has a default, so a JSON config only needs to name what it
//! changes:
//!
//! ```
//! use nezha_2048::config::GameConfig;
//! let cfg = GameConfig::from_json_str(r#"{ "win_value": 512, "abilities": { "score_multiplier": 2.0 } }"#).unwrap();
//! assert_eq!(cfg.win_value, 512);
//! assert_eq!(cfg.board_size, 4);
//! assert_eq!(cfg.abilities.score_multiplier, 2.0);
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityDefinition, AbilityId};
use crate::engine::{Grid, DEFAULT_FOUR_PROBABILITY, DEFAULT_SIZE, DEFAULT_WIN_VALUE};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Session-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Side length of the square board.
    pub board_size: usize,
    /// Tile value that counts as a win.
    pub win_value: u32,
    /// Chance that a random spawn is a 4.
    pub four_probability: f64,
    /// Tiles spawned when a new game starts.
    pub start_tiles: usize,
    /// RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    pub abilities: AbilityConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_SIZE,
            win_value: DEFAULT_WIN_VALUE,
            four_probability: DEFAULT_FOUR_PROBABILITY,
            start_tiles: 2,
            seed: None,
            abilities: AbilityConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> { Ok(serde_json::from_str(s)?) }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// An empty board shaped by this config.
    pub fn new_grid(&self) -> Grid {
        Grid::new(self.board_size)
            .with_win_value(self.win_value)
            .with_four_probability(self.four_probability)
    }
}

/// Ability roster and effect tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityConfig {
    /// Per-ability overrides; abilities missing here keep their defaults.
    pub definitions: Vec<AbilityDefinition>,
    /// Idle time after which the consecutive-merge counter drops to 0.
    pub combo_idle_reset_ms: u64,
    /// Merge score multiplier while the score buff is active.
    pub score_multiplier: f64,
    pub area: AreaClearConfig,
    pub pattern: PatternConfig,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            definitions: AbilityId::ALL.iter().map(|&id| AbilityDefinition::default_for(id)).collect(),
            combo_idle_reset_ms: 3_000,
            score_multiplier: 1.5,
            area: AreaClearConfig::default(),
            pattern: PatternConfig::default(),
        }
    }
}

impl AbilityConfig {
    /// Definition for `id`, falling back to the built-in one.
    pub fn definition(&self, id: AbilityId) -> AbilityDefinition {
        self.definitions
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .unwrap_or_else(|| AbilityDefinition::default_for(id))
    }
}

/// Weights for choosing and scoring the area-clear region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaClearConfig {
    /// Tiles at or above this value earn the high-value weight.
    pub high_value_threshold: u32,
    pub high_value_weight: f64,
    pub blocking_weight: f64,
    /// Equal-valued orthogonal neighbours needed for a tile to count as blocking.
    pub blocking_neighbors: usize,
    /// Flat points per cleared tile.
    pub per_tile_bonus: u64,
    /// Combo length from which the combo bonus applies.
    pub combo_bonus_threshold: u32,
    pub combo_bonus_weight: f64,
    /// Fixed candidate shapes besides the 2×2 blocks, as `(x, y)` cells.
    pub extra_shapes: Vec<Vec<(usize, usize)>>,
}

impl Default for AreaClearConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: 128,
            high_value_weight: 0.5,
            blocking_weight: 0.3,
            blocking_neighbors: 2,
            per_tile_bonus: 20,
            combo_bonus_threshold: 5,
            combo_bonus_weight: 0.5,
            extra_shapes: vec![
                // cross
                vec![(1, 0), (0, 1), (1, 1), (2, 1), (1, 2)],
                // L
                vec![(0, 0), (0, 1), (0, 2), (1, 2)],
            ],
        }
    }
}

/// Detection thresholds and score multipliers for the chain clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub progression_len: usize,
    pub progression_multiplier: f64,
    pub cluster_min_size: usize,
    pub cluster_base_multiplier: f64,
    /// Added to the cluster multiplier per tile beyond `cluster_min_size`.
    pub cluster_step_multiplier: f64,
    pub center_symmetry_multiplier: f64,
    pub axis_symmetry_multiplier: f64,
    /// Matching mirrored pairs needed for a symmetry pattern.
    pub symmetry_min_pairs: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            progression_len: 3,
            progression_multiplier: 2.0,
            cluster_min_size: 4,
            cluster_base_multiplier: 1.5,
            cluster_step_multiplier: 0.2,
            center_symmetry_multiplier: 3.0,
            axis_symmetry_multiplier: 2.5,
            symmetry_min_pairs: 4,
        }
    }
}
