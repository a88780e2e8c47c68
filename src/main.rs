use nezha_2048::config::GameConfig;
use nezha_2048::game::{Game, GameEvent};
use nezha_2048::policy::{self, Greedy};

const MAX_MOVES: u64 = 10_000;

fn main() {
    env_logger::init();
    let seed = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(42);
    let mut game = Game::new(GameConfig { seed: Some(seed), ..GameConfig::default() });
    let greedy = Greedy::new();
    println!("{}", game.grid());
    while let Some(events) = policy::autoplay_turn(&mut game, &greedy, 250) {
        for event in &events {
            if let GameEvent::Ability { event } = event {
                println!("ability: {:?}", event);
            }
        }
        println!("{}", game.grid());
        if game.moves() >= MAX_MOVES {
            break;
        }
    }
    let stats = game.stats();
    println!(
        "Moves made: {}, Score: {}, Max tile: {}, Nezha level: {}",
        game.moves(),
        game.score(),
        stats.max_tile,
        game.nezha_level()
    )
}
