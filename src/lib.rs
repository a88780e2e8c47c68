//! nezha-2048: a 2048 grid engine with a cooldown-gated ability layer
//!
//! This crate provides:
//! - A `Grid` engine with deterministic sliding/merging (`engine` module)
//! - Four themed abilities with unlocks, cooldowns, combos and pattern
//!   detection (`abilities` module)
//! - A `Game` session facade that drives turns, ticks, pause and save/restore
//!   (`game`, `save` modules)
//! - A greedy move chooser used by the runner binaries (`policy` module)
//!
//! Quick start:
//! ```
//! use nezha_2048::config::GameConfig;
//! use nezha_2048::engine::Move;
//! use nezha_2048::game::{Game, GameEvent};
//!
//! // Seeded sessions replay identically
//! let mut game = Game::new(GameConfig { seed: Some(42), ..GameConfig::default() });
//! let mut last = 0;
//! for dir in [Move::Left, Move::Up, Move::Right, Move::Down] {
//!     for event in game.play_turn(dir) {
//!         if let GameEvent::Moved { score, .. } = event {
//!             assert!(score >= last);
//!             last = score;
//!         }
//!     }
//!     game.tick(16);
//! }
//! assert!(game.moves() > 0);
//! ```
//!
//! The engine is usable on its own:
//! ```
//! use nezha_2048::engine::{Grid, Move};
//! let mut g = Grid::from_rows(&[vec![2, 2, 4, 4], vec![0; 4], vec![0; 4], vec![0; 4]]).unwrap();
//! let r = g.move_tiles(Move::Left);
//! assert_eq!(g.to_rows()[0], vec![4, 8, 0, 0]);
//! assert_eq!(r.score, 12);
//! ```
//!
pub mod abilities;
pub mod config;
pub mod engine;
pub mod game;
pub mod policy;
pub mod save;
