//! Housie simulator
//!
//! Runs one auto-play game end to end against the in-memory store and
//! prints every broadcast event.

use clap::Parser;
use housie::{
    config::generate_sample_config, ConfigLoader, EngineFactory, GameEvent, GameRule, GameSettings,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "housie-sim")]
#[command(about = "Simulate an auto-play housie game", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a default configuration file and exit
    #[arg(long)]
    generate_config: Option<PathBuf>,

    /// Number of players
    #[arg(long, default_value = "5")]
    players: u32,

    /// Tickets bought by each player
    #[arg(long, default_value = "2")]
    tickets_per_player: u32,

    /// Milliseconds between draws (defaults to the configured interval)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// End the game as soon as every rule has a winner
    #[arg(long)]
    stop_when_won: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(path) = args.generate_config {
        generate_sample_config(&path.to_string_lossy())?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .init();

    let interval_ms = args.interval_ms.unwrap_or(config.scheduler.default_interval_ms);
    let services = EngineFactory::create(config)?;

    let settings = GameSettings {
        auto_play: true,
        auto_play_interval_ms: interval_ms,
        max_tickets: services.config.tickets.default_max_tickets.max(args.players * args.tickets_per_player),
        max_tickets_per_user: services.config.tickets.default_max_tickets_per_user.max(args.tickets_per_player),
    };
    let game = services
        .games
        .create_game("Simulated game", GameRule::standard_set(), settings)
        .await?;
    let game_id = game.id.clone();

    println!("🎱 Housie simulation");
    println!("   game: {}", game_id);
    println!("   players: {} x {} tickets, draw every {}ms", args.players, args.tickets_per_player, interval_ms);

    for player in 1..=args.players {
        let user_id = format!("player-{}", player);
        let user_name = format!("Player {}", player);
        let tickets = services
            .tickets
            .purchase(&game_id, &user_id, &user_name, args.tickets_per_player)
            .await?;
        for ticket in tickets {
            services.tickets.confirm(&ticket.id).await?;
        }
    }

    let mut rx = services.events.subscribe();
    let watched = game_id.clone();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.game_id() != watched => continue,
                Ok(event) => {
                    let payload = event.payload().unwrap_or_default();
                    println!("{:<16} {}", event.name(), payload);
                    if matches!(event, GameEvent::GameEnded(_)) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    services.games.start_game(&game_id).await?;

    let poll = Duration::from_millis(interval_ms.max(10));
    while services.scheduler.is_running(&game_id) {
        tokio::time::sleep(poll).await;
        if args.stop_when_won && services.games.game(&game_id).await?.all_rules_completed() {
            info!(game_id = %game_id, "every rule won, ending early");
            break;
        }
    }

    let finished = services.games.end_game(&game_id).await?;
    if let Err(e) = printer.await {
        warn!("event printer failed: {}", e);
    }
    services.shutdown().await;

    println!();
    println!("Drawn {} numbers", finished.drawn_numbers.len());
    println!("Winners:");
    println!("{}", serde_json::to_string_pretty(&finished.winners)?);
    println!("Metrics:");
    println!("{}", serde_json::to_string_pretty(&services.metrics.snapshot())?);

    Ok(())
}
