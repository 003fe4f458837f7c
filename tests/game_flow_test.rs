//! A full auto-play game from ticket sales to the last rule

use housie::{
    EngineFactory, GameEvent, GameRule, GameSettings, GameStatus, GameStore, HousieConfig, TicketStatus,
};
use std::collections::HashSet;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_auto_play_game_awards_every_rule_once() {
    let services = EngineFactory::create(HousieConfig::default()).expect("engine builds");
    let settings = GameSettings {
        auto_play: true,
        auto_play_interval_ms: 100,
        ..GameSettings::from(&services.config)
    };
    let game = services
        .games
        .create_game("Friday Night", GameRule::standard_set(), settings)
        .await
        .unwrap();

    let mut ticket_ids = Vec::new();
    for player in 1..=5 {
        let user_id = format!("player-{}", player);
        let tickets = services
            .tickets
            .purchase(&game.id, &user_id, &format!("Player {}", player), 2)
            .await
            .unwrap();
        for ticket in tickets {
            services.tickets.confirm(&ticket.id).await.unwrap();
            ticket_ids.push(ticket.id);
        }
    }
    // one unconfirmed ticket never plays
    let idle = services
        .tickets
        .purchase(&game.id, "spectator", "Spectator", 1)
        .await
        .unwrap()
        .remove(0);

    let mut rx = services.events.subscribe();
    services.games.start_game(&game.id).await.unwrap();

    let mut elapsed = 0;
    while services.scheduler.is_running(&game.id) && elapsed < 20_000 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        elapsed += 100;
    }
    assert!(!services.scheduler.is_running(&game.id));

    let played = services.games.game(&game.id).await.unwrap();
    assert_eq!(played.drawn_numbers.len(), 90);
    assert!(played.all_rules_completed());
    assert_eq!(played.winners.len(), 6);
    assert_eq!(played.winners.iter().map(|w| w.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);

    let rule_ids: HashSet<&str> = played.winners.iter().map(|w| w.rule_id.as_str()).collect();
    assert_eq!(rule_ids.len(), 6);

    for winner in &played.winners {
        let ticket = services.store.load_ticket(&winner.ticket_id).await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::Won);
        assert!(ticket.winner_info.is_some());
        assert!(ticket.marked_numbers.iter().all(|n| played.drawn_numbers.contains(n)));
    }

    let idle = services.store.load_ticket(&idle.id).await.unwrap().unwrap();
    assert_eq!(idle.status, TicketStatus::Pending);
    assert!(idle.marked_numbers.is_empty());

    let mut drawn_events = 0;
    let mut completed_events = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            GameEvent::NumberDrawn(_) => drawn_events += 1,
            GameEvent::RuleCompleted(e) => {
                assert!(e.rule.winner.claimed_at <= chrono::Utc::now());
                completed_events += 1;
            }
            _ => {}
        }
    }
    assert_eq!(drawn_events, 90);
    assert_eq!(completed_events, 6);

    let ended = services.games.end_game(&game.id).await.unwrap();
    assert_eq!(ended.status, GameStatus::Completed);

    let metrics = services.metrics.snapshot();
    assert_eq!(metrics.scheduled_draws, 90);
    assert_eq!(metrics.rules_completed, 6);
    assert!(ticket_ids.len() >= 10);
}

#[tokio::test]
async fn test_manual_game_with_late_confirmation() {
    let services = EngineFactory::create(HousieConfig::default()).expect("engine builds");
    let game = services
        .games
        .create_game(
            "Manual",
            vec![GameRule::new("early_five", "Early Five", 1, 25.0)],
            GameSettings::from(&services.config),
        )
        .await
        .unwrap();

    let ticket = services
        .tickets
        .purchase(&game.id, "u1", "Alice", 1)
        .await
        .unwrap()
        .remove(0);
    services.games.start_game(&game.id).await.unwrap();

    // draw four of the ticket's numbers before it is confirmed
    let numbers = ticket.numbers.numbers();
    for &n in &numbers[..4] {
        let report = services.games.draw_number(&game.id, n).await.unwrap();
        assert!(report.completed.is_empty());
    }

    services.tickets.confirm(&ticket.id).await.unwrap();
    let report = services.games.draw_number(&game.id, numbers[4]).await.unwrap();
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].winner.user_id, "u1");

    let won = services.store.load_ticket(&ticket.id).await.unwrap().unwrap();
    assert_eq!(won.status, TicketStatus::Won);
    assert_eq!(won.marked_numbers, numbers[..5].to_vec());
}
