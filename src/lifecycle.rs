//! Game lifecycle control
//!
//! Status transitions go through the draw engine's per-game lock so they
//! cannot interleave with a draw. Auto-play follows the game: it is armed
//! when an auto-play game becomes active and disarmed when it leaves
//! `active`.

use crate::draw_engine::{DrawEngine, DrawReport};
use crate::errors::{DrawError, HousieError, HousieResult, LifecycleError};
use crate::events::GameEvent;
use crate::games::types::{Game, GameRule, GameSettings, GameStatus};
use crate::games::win_checker::WinPattern;
use crate::scheduler::DrawScheduler;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct GameController {
    engine: Arc<DrawEngine>,
    scheduler: Arc<DrawScheduler>,
}

impl GameController {
    pub fn new(engine: Arc<DrawEngine>, scheduler: Arc<DrawScheduler>) -> Self {
        Self { engine, scheduler }
    }

    pub fn scheduler(&self) -> &Arc<DrawScheduler> {
        &self.scheduler
    }

    pub async fn game(&self, game_id: &str) -> HousieResult<Game> {
        self.engine
            .store()
            .load_game(game_id)
            .await?
            .ok_or_else(|| LifecycleError::GameNotFound(game_id.to_string()).into())
    }

    /// New waiting game. Rules are kept in prize order and must name a
    /// recognized pattern. The auto-play interval must be one the scheduler
    /// accepts.
    pub async fn create_game(
        &self,
        name: &str,
        mut rules: Vec<GameRule>,
        settings: GameSettings,
    ) -> HousieResult<Game> {
        self.scheduler.effective_interval(settings.auto_play_interval_ms)?;
        if let Some(bad) = rules.iter().find(|r| WinPattern::parse(&r.pattern).is_none()) {
            return Err(LifecycleError::InvalidRule(bad.pattern.clone()).into());
        }
        rules.sort_by_key(|r| r.order);

        let game = Game::new(name, rules, settings);
        self.engine.store().save_game(&game).await?;
        info!(game_id = %game.id, name, rules = game.rules.len(), "game created");
        Ok(game)
    }

    pub async fn start_game(&self, game_id: &str) -> HousieResult<Game> {
        let game = self
            .transition(game_id, GameStatus::Active, |g| {
                g.started_at = Some(Utc::now());
            })
            .await?;

        self.engine.events().emit(GameEvent::game_started(game_id)).await?;
        self.arm_if_enabled(&game)?;
        Ok(game)
    }

    pub async fn pause_game(&self, game_id: &str) -> HousieResult<Game> {
        let game = self.transition(game_id, GameStatus::Paused, |_| {}).await?;
        self.scheduler.stop(game_id);
        Ok(game)
    }

    pub async fn resume_game(&self, game_id: &str) -> HousieResult<Game> {
        let game = self.transition(game_id, GameStatus::Active, |_| {}).await?;
        self.arm_if_enabled(&game)?;
        Ok(game)
    }

    pub async fn end_game(&self, game_id: &str) -> HousieResult<Game> {
        self.close(game_id, GameStatus::Completed).await
    }

    pub async fn cancel_game(&self, game_id: &str) -> HousieResult<Game> {
        self.close(game_id, GameStatus::Cancelled).await
    }

    /// Turn auto-play on, arming the scheduler right away if the game is
    /// active. `interval_ms` of `None` keeps the game's current interval.
    pub async fn enable_auto_play(&self, game_id: &str, interval_ms: Option<u64>) -> HousieResult<Game> {
        let scheduler = &self.scheduler;
        let game = self
            .update(game_id, move |g| {
                if g.status.is_terminal() {
                    return Err(LifecycleError::GameClosed(g.status).into());
                }
                let requested = interval_ms.unwrap_or(g.settings.auto_play_interval_ms);
                g.settings.auto_play_interval_ms = scheduler.effective_interval(requested)?;
                g.settings.auto_play = true;
                Ok(())
            })
            .await?;

        self.arm_if_enabled(&game)?;
        Ok(game)
    }

    pub async fn disable_auto_play(&self, game_id: &str) -> HousieResult<Game> {
        let game = self
            .update(game_id, |g| {
                g.settings.auto_play = false;
                Ok(())
            })
            .await?;
        self.scheduler.stop(game_id);
        Ok(game)
    }

    pub async fn draw_number(&self, game_id: &str, number: u8) -> HousieResult<DrawReport> {
        self.engine.draw_number(game_id, number).await
    }

    pub async fn draw_next(&self, game_id: &str) -> HousieResult<DrawReport> {
        self.engine.draw_next(game_id).await
    }

    async fn close(&self, game_id: &str, to: GameStatus) -> HousieResult<Game> {
        let game = self
            .transition(game_id, to, |g| {
                g.ended_at = Some(Utc::now());
            })
            .await?;

        self.scheduler.stop(game_id);
        self.engine.events().emit(GameEvent::game_ended(game_id)).await?;
        info!(game_id, status = %to, winners = game.winners.len(), "game closed");
        Ok(game)
    }

    fn arm_if_enabled(&self, game: &Game) -> HousieResult<()> {
        if game.status == GameStatus::Active && game.settings.auto_play {
            let interval = self.scheduler.effective_interval(game.settings.auto_play_interval_ms)?;
            self.scheduler.start(&game.id, interval)?;
        }
        Ok(())
    }

    async fn transition<F>(&self, game_id: &str, to: GameStatus, stamp: F) -> HousieResult<Game>
    where
        F: FnOnce(&mut Game) + Send,
    {
        let scheduler = &self.scheduler;
        let game = self
            .update(game_id, move |g| {
                if !g.status.can_transition_to(to) {
                    return Err(LifecycleError::InvalidTransition { from: g.status, to }.into());
                }
                // an auto-play game must be armable before it goes live
                if to == GameStatus::Active && g.settings.auto_play {
                    scheduler.effective_interval(g.settings.auto_play_interval_ms)?;
                }
                g.status = to;
                stamp(g);
                Ok(())
            })
            .await?;

        info!(game_id, status = %to, "game status changed");
        Ok(game)
    }

    async fn update<F>(&self, game_id: &str, apply: F) -> HousieResult<Game>
    where
        F: FnOnce(&mut Game) -> HousieResult<()> + Send,
    {
        self.engine
            .update_game(game_id, apply)
            .await
            .map_err(|e| match e {
                HousieError::Draw(DrawError::GameNotFound(id)) => LifecycleError::GameNotFound(id).into(),
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::errors::SchedulerError;
    use crate::events::{BroadcastEventSink, TracingErrorSink};
    use crate::game_store::InMemoryGameStore;
    use std::time::Duration;

    fn controller() -> (GameController, Arc<BroadcastEventSink>) {
        let store = Arc::new(InMemoryGameStore::new());
        let sink = Arc::new(BroadcastEventSink::new(256));
        let engine = Arc::new(DrawEngine::new(store, sink.clone()));
        let scheduler = Arc::new(DrawScheduler::new(
            engine.clone(),
            Arc::new(TracingErrorSink),
            &SchedulerConfig::default(),
        ));
        (GameController::new(engine, scheduler), sink)
    }

    fn auto_settings(interval_ms: u64) -> GameSettings {
        GameSettings {
            auto_play: true,
            auto_play_interval_ms: interval_ms,
            ..GameSettings::default()
        }
    }

    #[tokio::test]
    async fn test_create_game_orders_and_validates_rules() {
        let (ctl, _) = controller();
        let game = ctl
            .create_game(
                "evening",
                vec![
                    GameRule::new("full_house", "Full House", 3, 100.0),
                    GameRule::new("early_five", "Early Five", 1, 10.0),
                ],
                GameSettings::default(),
            )
            .await
            .unwrap();
        assert_eq!(game.status, GameStatus::Waiting);
        assert_eq!(game.rules[0].pattern, "early_five");

        let bad = ctl
            .create_game("bad", vec![GameRule::new("diagonal", "Diagonal", 1, 5.0)], GameSettings::default())
            .await;
        assert!(matches!(bad, Err(HousieError::Lifecycle(LifecycleError::InvalidRule(_)))));
    }

    #[tokio::test]
    async fn test_full_lifecycle_emits_events() {
        let (ctl, sink) = controller();
        let mut rx = sink.subscribe();
        let game = ctl.create_game("g", GameRule::standard_set(), GameSettings::default()).await.unwrap();

        let started = ctl.start_game(&game.id).await.unwrap();
        assert!(started.started_at.is_some());
        assert_eq!(rx.try_recv().unwrap(), GameEvent::game_started(&game.id));

        ctl.pause_game(&game.id).await.unwrap();
        ctl.resume_game(&game.id).await.unwrap();
        ctl.draw_number(&game.id, 17).await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), GameEvent::number_drawn(&game.id, 17));

        let ended = ctl.end_game(&game.id).await.unwrap();
        assert_eq!(ended.status, GameStatus::Completed);
        assert!(ended.ended_at.is_some());
        assert_eq!(rx.try_recv().unwrap(), GameEvent::game_ended(&game.id));
    }

    #[tokio::test]
    async fn test_terminal_games_reject_transitions() {
        let (ctl, _) = controller();
        let game = ctl.create_game("g", vec![], GameSettings::default()).await.unwrap();
        ctl.cancel_game(&game.id).await.unwrap();

        for result in [
            ctl.start_game(&game.id).await,
            ctl.resume_game(&game.id).await,
            ctl.end_game(&game.id).await,
        ] {
            assert!(matches!(
                result,
                Err(HousieError::Lifecycle(LifecycleError::InvalidTransition {
                    from: GameStatus::Cancelled,
                    ..
                }))
            ));
        }

        let result = ctl.enable_auto_play(&game.id, Some(1000)).await;
        assert!(matches!(result, Err(HousieError::Lifecycle(LifecycleError::GameClosed(_)))));

        let result = ctl.pause_game("missing").await;
        assert!(matches!(result, Err(HousieError::Lifecycle(LifecycleError::GameNotFound(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_play_follows_game_status() {
        let (ctl, _) = controller();
        let game = ctl.create_game("g", vec![], auto_settings(1000)).await.unwrap();
        assert!(!ctl.scheduler().is_running(&game.id));

        ctl.start_game(&game.id).await.unwrap();
        assert!(ctl.scheduler().is_running(&game.id));

        ctl.pause_game(&game.id).await.unwrap();
        assert!(!ctl.scheduler().is_running(&game.id));

        ctl.resume_game(&game.id).await.unwrap();
        assert!(ctl.scheduler().is_running(&game.id));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(ctl.game(&game.id).await.unwrap().drawn_numbers.len(), 2);

        ctl.disable_auto_play(&game.id).await.unwrap();
        assert!(!ctl.scheduler().is_running(&game.id));

        ctl.enable_auto_play(&game.id, Some(500)).await.unwrap();
        assert!(ctl.scheduler().is_running(&game.id));
        assert_eq!(ctl.game(&game.id).await.unwrap().settings.auto_play_interval_ms, 500);

        ctl.end_game(&game.id).await.unwrap();
        assert!(!ctl.scheduler().is_running(&game.id));
    }

    fn is_invalid_interval(result: &HousieResult<Game>) -> bool {
        matches!(
            result,
            Err(HousieError::Scheduler(SchedulerError::InvalidInterval { interval_ms: 1, .. }))
        )
    }

    #[tokio::test]
    async fn test_rejected_interval_leaves_game_unchanged() {
        let (ctl, _) = controller();
        assert!(is_invalid_interval(&ctl.create_game("g", vec![], auto_settings(1)).await));

        let game = ctl.create_game("g", vec![], GameSettings::default()).await.unwrap();
        ctl.start_game(&game.id).await.unwrap();
        let before = ctl.game(&game.id).await.unwrap();

        assert!(is_invalid_interval(&ctl.enable_auto_play(&game.id, Some(1)).await));
        assert_eq!(ctl.game(&game.id).await.unwrap(), before);
        assert!(!ctl.scheduler().is_running(&game.id));
    }

    #[tokio::test]
    async fn test_start_with_bad_interval_stays_waiting() {
        let (ctl, sink) = controller();
        let game = ctl.create_game("g", vec![], GameSettings::default()).await.unwrap();

        // an interval that slipped into storage by another path
        ctl.engine
            .update_game(&game.id, |g| {
                g.settings.auto_play = true;
                g.settings.auto_play_interval_ms = 1;
                Ok(())
            })
            .await
            .unwrap();
        let mut rx = sink.subscribe();

        assert!(is_invalid_interval(&ctl.start_game(&game.id).await));
        let stored = ctl.game(&game.id).await.unwrap();
        assert_eq!(stored.status, GameStatus::Waiting);
        assert!(stored.started_at.is_none());
        assert!(rx.try_recv().is_err());
        assert!(!ctl.scheduler().is_running(&game.id));
    }
}
