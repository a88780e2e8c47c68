use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use nezha_2048::abilities::AbilityEvent;
use nezha_2048::config::GameConfig;
use nezha_2048::game::{Game, GameEvent};
use nezha_2048::policy::{self, Greedy};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "simulate", about = "Play seeded nezha-2048 games in parallel with the greedy policy")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 100)]
    games: u64,

    /// Seed of the first game; game i uses seed + i
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// JSON config file (defaults apply to missing fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop each game after this many moves
    #[arg(long, default_value_t = 10_000)]
    max_moves: u64,

    /// Simulated milliseconds between turns
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// Write one JSON summary per game to this file
    #[arg(long)]
    out: Option<PathBuf>,

    /// Suppress the progress bar and the final report
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Serialize)]
struct GameSummary {
    seed: u64,
    score: u64,
    moves: u64,
    max_tile: u32,
    won: bool,
    abilities_used: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let base = match &args.config {
        Some(path) => GameConfig::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => GameConfig::default(),
    };

    let pb = if args.quiet { ProgressBar::hidden() } else { ProgressBar::new(args.games) };
    pb.set_style(
        ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:40}] {pos}/{len} games | {msg}")?
            .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let summaries: Vec<GameSummary> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let summary = play_one(&base, args.seed.wrapping_add(i), args.max_moves, args.tick_ms);
            pb.inc(1);
            pb.set_message(format!("last score: {}", summary.score));
            summary
        })
        .collect();
    pb.finish_and_clear();

    if let Some(out) = &args.out {
        let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
        let mut w = BufWriter::new(file);
        for s in &summaries {
            serde_json::to_writer(&mut w, s)?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
    }

    if !args.quiet && !summaries.is_empty() {
        let n = summaries.len() as f64;
        let mean_score = summaries.iter().map(|s| s.score as f64).sum::<f64>() / n;
        let mean_moves = summaries.iter().map(|s| s.moves as f64).sum::<f64>() / n;
        let wins = summaries.iter().filter(|s| s.won).count();
        let best = summaries.iter().map(|s| s.max_tile).max().unwrap_or(0);
        println!(
            "Games: {} | mean score: {:.1} | mean moves: {:.1} | wins: {} | best tile: {} | {:.2}s",
            summaries.len(),
            mean_score,
            mean_moves,
            wins,
            best,
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

fn play_one(base: &GameConfig, seed: u64, max_moves: u64, tick_ms: u64) -> GameSummary {
    let mut game = Game::new(GameConfig { seed: Some(seed), ..base.clone() });
    let greedy = Greedy::new();
    let mut won = false;
    let mut abilities_used = 0;
    while let Some(events) = policy::autoplay_turn(&mut game, &greedy, tick_ms) {
        for event in &events {
            match event {
                GameEvent::Won { .. } => won = true,
                GameEvent::Ability { event: AbilityEvent::Activated { .. } } => abilities_used += 1,
                _ => {}
            }
        }
        if game.moves() >= max_moves {
            break;
        }
    }
    GameSummary {
        seed,
        score: game.score(),
        moves: game.moves(),
        max_tile: game.grid().max_tile_value(),
        won,
        abilities_used,
    }
}
