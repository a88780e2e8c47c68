//! One play session: the grid, the ability controller, the RNG and the turn
//! bookkeeping, driven by moves and clock ticks from a presentation layer.
//!
//! A turn walks `MoveResolved -> SpawnPending -> SpawnComplete`.
//! [`Game::apply_move`] slides (and merges) and leaves the turn in
//! [`TurnPhase::MoveResolved`]. [`Game::begin_spawn`] marks the slide
//! animation as done, and [`Game::complete_spawn`] drops the new tile and
//! checks for win and game over. Renderers that animate the slide call them
//! separately, everyone else calls [`Game::play_turn`].
//!
//! ```
//! use nezha_2048::config::GameConfig;
//! use nezha_2048::engine::Move;
//! use nezha_2048::game::Game;
//!
//! let mut game = Game::new(GameConfig { seed: Some(3), ..GameConfig::default() });
//! assert_eq!(game.grid().tiles().count(), 2);
//! let moved = Move::ALL.into_iter().any(|m| !game.play_turn(m).is_empty());
//! assert!(moved);
//! assert_eq!(game.moves(), 1);
//! ```

use std::path::Path;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityController, AbilityEvent, TriggerRejection};
use crate::config::GameConfig;
use crate::engine::{GridStats, Grid, MergeEvent, Move, ParseMoveError, Tile};
use crate::save::{self, SaveBlob, SaveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    MoveResolved,
    SpawnPending,
    SpawnComplete,
}

/// Everything a renderer or audio layer needs to react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    /// Tiles slid. `extra` lists the additional directions of a multi-direction turn.
    #[serde(rename_all = "camelCase")]
    Moved { direction: Move, extra: Vec<Move>, score: u64, merged: Vec<MergeEvent>, grid_snapshot: Vec<Vec<u32>> },
    TileSpawned { tile: Tile },
    #[serde(rename_all = "camelCase")]
    Won { score: u64, max_tile: u32 },
    #[serde(rename_all = "camelCase")]
    GameOver { score: u64, moves: u64, max_tile: u32, is_new_record: bool },
    Ability { event: AbilityEvent },
}

#[derive(Debug, Clone)]
pub struct Game {
    config: GameConfig,
    grid: Grid,
    abilities: AbilityController,
    rng: StdRng,
    phase: TurnPhase,
    moves: u64,
    play_time_ms: u64,
    best_score: u64,
    paused: bool,
    won_announced: bool,
    over: bool,
}

impl Game {
    /// Fresh session with `config.start_tiles` tiles on the board.
    pub fn new(config: GameConfig) -> Self {
        let mut game = Self::empty(config);
        game.spawn_start_tiles();
        game
    }

    fn empty(config: GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            grid: config.new_grid(),
            abilities: AbilityController::new(config.abilities.clone()),
            rng,
            phase: TurnPhase::SpawnComplete,
            moves: 0,
            play_time_ms: 0,
            best_score: 0,
            paused: false,
            won_announced: false,
            over: false,
            config,
        }
    }

    fn spawn_start_tiles(&mut self) {
        for _ in 0..self.config.start_tiles {
            self.grid.add_random_tile(&mut self.rng, None);
        }
    }

    /// Rehydrate a session from a save. Bad fields are repaired, see [`SaveBlob::repair`].
    pub fn restore(config: GameConfig, blob: &SaveBlob) -> Self {
        let repaired = blob.repair(&config);
        let mut game = Self::empty(config);
        game.abilities.restore(repaired.grid.score(), &repaired.cooldowns, repaired.consecutive_merges);
        game.grid = repaired.grid;
        game.moves = repaired.moves;
        game.play_time_ms = repaired.play_time_ms;
        game.won_announced = game.grid.is_won();
        game.over = game.grid.is_game_over();
        if game.over {
            game.abilities.pause();
        }
        if repaired.nezha_level != game.nezha_level() {
            debug!("save level {} recomputed as {}", repaired.nezha_level, game.nezha_level());
        }
        game
    }

    /// Restore from `path`, or start fresh if it is missing or unreadable.
    pub fn load_or_new<P: AsRef<Path>>(config: GameConfig, path: P) -> Self {
        match save::read_blob(path.as_ref()) {
            Ok(blob) => Self::restore(config, &blob),
            Err(SaveError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::new(config),
            Err(e) => {
                warn!("discarding save {}: {}", path.as_ref().display(), e);
                Self::new(config)
            }
        }
    }

    pub fn to_save(&self) -> SaveBlob {
        SaveBlob {
            grid: Some(self.grid.to_rows()),
            score: self.grid.score(),
            moves: self.moves,
            play_time: self.play_time_ms,
            skill_cooldowns: self.abilities.cooldowns().into_iter().map(|(id, ms)| (id.to_string(), ms)).collect(),
            nezha_level: self.nezha_level(),
            consecutive_merges: self.abilities.consecutive_merges(),
        }
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveError> { save::write_blob(path, &self.to_save()) }

    /// Start over. The best score and the RNG stream carry on.
    pub fn new_game(&mut self) {
        self.best_score = self.best_score.max(self.grid.score());
        self.grid.clear();
        self.abilities.reset();
        self.phase = TurnPhase::SpawnComplete;
        self.moves = 0;
        self.play_time_ms = 0;
        self.paused = false;
        self.won_announced = false;
        self.over = false;
        self.spawn_start_tiles();
    }

    pub fn config(&self) -> &GameConfig { &self.config }

    pub fn grid(&self) -> &Grid { &self.grid }

    pub fn abilities(&self) -> &AbilityController { &self.abilities }

    pub fn score(&self) -> u64 { self.grid.score() }

    pub fn best_score(&self) -> u64 { self.best_score }

    /// Seed the session best, e.g. from a leaderboard.
    pub fn with_best_score(mut self, best: u64) -> Self {
        self.best_score = best;
        self
    }

    pub fn moves(&self) -> u64 { self.moves }

    pub fn play_time_ms(&self) -> u64 { self.play_time_ms }

    pub fn phase(&self) -> TurnPhase { self.phase }

    pub fn is_paused(&self) -> bool { self.paused }

    pub fn is_over(&self) -> bool { self.over }

    pub fn stats(&self) -> GridStats { self.grid.stats() }

    /// 1 plus the number of unlocked abilities.
    pub fn nezha_level(&self) -> u32 { 1 + self.abilities.unlocked_count() as u32 }

    pub fn last_rejection(&self) -> Option<&TriggerRejection> { self.abilities.last_rejection() }

    pub fn pause(&mut self) {
        self.paused = true;
        self.abilities.pause();
    }

    pub fn resume(&mut self) {
        self.paused = false;
        if !self.over {
            self.abilities.resume();
        }
    }

    /// Resolve the slide for `dir` and leave the turn in
    /// [`TurnPhase::MoveResolved`]. A blocked move returns no events and
    /// leaves the turn untouched; a spawn still owed by the previous turn is
    /// completed first.
    pub fn apply_move(&mut self, dir: Move) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.paused || self.over {
            return events;
        }
        if self.phase != TurnPhase::SpawnComplete {
            events.extend(self.complete_spawn());
            if self.over {
                return events;
            }
        }

        let mut result = self.grid.move_tiles(dir);
        if !result.moved {
            return events;
        }
        let mut extra = Vec::new();
        if self.abilities.multi_direction_active() {
            for side in [dir.rotate_cw(), dir.rotate_ccw()] {
                if self.grid.can_move(side) {
                    result.absorb(self.grid.move_tiles(side));
                    extra.push(side);
                }
            }
        }

        self.moves = self.moves.saturating_add(1);
        self.phase = TurnPhase::MoveResolved;
        self.abilities.on_merge(&result);
        events.push(GameEvent::Moved {
            direction: dir,
            extra,
            score: self.grid.score(),
            merged: result.merged,
            grid_snapshot: self.grid.to_rows(),
        });
        events
    }

    /// Move a resolved turn on to [`TurnPhase::SpawnPending`]. Returns false
    /// in any other phase.
    pub fn begin_spawn(&mut self) -> bool {
        if self.phase != TurnPhase::MoveResolved {
            return false;
        }
        self.phase = TurnPhase::SpawnPending;
        true
    }

    /// Spawn the turn's new tile, then check for win and game over.
    /// Skips [`TurnPhase::SpawnPending`] when called straight after the move.
    pub fn complete_spawn(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.phase == TurnPhase::SpawnComplete {
            return events;
        }
        if let Some(tile) = self.grid.add_random_tile(&mut self.rng, None) {
            events.push(GameEvent::TileSpawned { tile });
        }
        self.phase = TurnPhase::SpawnComplete;

        if !self.won_announced && self.grid.is_won() {
            self.won_announced = true;
            info!("reached {} with score {}", self.grid.win_value(), self.grid.score());
            events.push(GameEvent::Won { score: self.grid.score(), max_tile: self.grid.max_tile_value() });
        }
        if self.grid.is_game_over() {
            events.push(self.finish());
        }
        events
    }

    /// Move and spawn in one go.
    pub fn play_turn(&mut self, dir: Move) -> Vec<GameEvent> {
        let mut events = self.apply_move(dir);
        if self.begin_spawn() {
            events.extend(self.complete_spawn());
        }
        events
    }

    /// [`Self::play_turn`] for a direction name such as `"left"`.
    pub fn move_named(&mut self, name: &str) -> Result<Vec<GameEvent>, ParseMoveError> {
        let dir: Move = name.parse()?;
        Ok(self.play_turn(dir))
    }

    /// Advance the clock. Drives ability timers and auto-triggers.
    pub fn tick(&mut self, delta_ms: u64) -> Vec<GameEvent> {
        if self.paused || self.over {
            return Vec::new();
        }
        self.play_time_ms = self.play_time_ms.saturating_add(delta_ms);
        self.abilities.update(delta_ms, &mut self.grid).into_iter().map(|event| GameEvent::Ability { event }).collect()
    }

    /// Fire a manual ability by id, e.g. `"fire_spear"`.
    pub fn trigger_ability(&mut self, name: &str) -> Result<Vec<GameEvent>, TriggerRejection> {
        let events = self.abilities.trigger_named(name, &mut self.grid)?;
        Ok(events.into_iter().map(|event| GameEvent::Ability { event }).collect())
    }

    fn finish(&mut self) -> GameEvent {
        self.over = true;
        self.abilities.pause();
        let score = self.grid.score();
        let is_new_record = score > self.best_score;
        self.best_score = self.best_score.max(score);
        info!("game over after {} moves: score {}, max tile {}", self.moves, score, self.grid.max_tile_value());
        GameEvent::GameOver { score, moves: self.moves, max_tile: self.grid.max_tile_value(), is_new_record }
    }
}
