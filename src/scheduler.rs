//! Per-game auto-play loops
//!
//! [`DrawScheduler`] owns at most one repeating draw task per game id. Ticks
//! run inside the task body, so a slow tick delays the next one instead of
//! overlapping it; missed fires are skipped. Every tick goes through
//! [`DrawEngine::auto_draw`] and therefore shares the per-game lock with
//! manual draws.

use crate::config::SchedulerConfig;
use crate::draw_engine::{DrawEngine, HaltReason, TickOutcome};
use crate::errors::{HousieError, HousieResult, SchedulerError};
use crate::events::{ErrorSink, GameEvent};
use crate::games::types::MAX_NUMBER;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Cancellation handle for one running loop
struct ScheduledTask {
    generation: u64,
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Future ticks see the flag before drawing; the notify ends the wait
    /// for the next fire.
    fn cancel(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

type TaskMap = Arc<DashMap<String, ScheduledTask>>;

pub struct DrawScheduler {
    engine: Arc<DrawEngine>,
    error_sink: Arc<dyn ErrorSink>,
    tasks: TaskMap,
    next_generation: AtomicU64,
    min_interval_ms: u64,
    default_interval_ms: u64,
}

impl DrawScheduler {
    pub fn new(engine: Arc<DrawEngine>, error_sink: Arc<dyn ErrorSink>, config: &SchedulerConfig) -> Self {
        Self {
            engine,
            error_sink,
            tasks: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(1),
            min_interval_ms: config.min_interval_ms,
            default_interval_ms: config.default_interval_ms,
        }
    }

    /// Interval a game's loop would run at. Zero means the configured
    /// default; anything below the minimum is rejected.
    pub fn effective_interval(&self, interval_ms: u64) -> HousieResult<u64> {
        let interval_ms = match interval_ms {
            0 => self.default_interval_ms,
            ms => ms,
        };
        if interval_ms < self.min_interval_ms {
            return Err(SchedulerError::InvalidInterval {
                interval_ms,
                min_ms: self.min_interval_ms,
            }
            .into());
        }
        Ok(interval_ms)
    }

    /// Arm a repeating draw for `game_id`, replacing any loop already
    /// running for it. The first draw fires one interval from now.
    pub fn start(&self, game_id: &str, interval_ms: u64) -> HousieResult<()> {
        if interval_ms < self.min_interval_ms {
            return Err(SchedulerError::InvalidInterval {
                interval_ms,
                min_ms: self.min_interval_ms,
            }
            .into());
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let stopped = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        // the shard stays locked until the new task is registered, so the
        // task cannot retire itself before it is visible
        let entry = self.tasks.entry(game_id.to_string());
        let handle = tokio::spawn(run_loop(DrawLoop {
            game_id: game_id.to_string(),
            generation,
            period: Duration::from_millis(interval_ms),
            stopped: stopped.clone(),
            wake: wake.clone(),
            engine: self.engine.clone(),
            error_sink: self.error_sink.clone(),
            tasks: self.tasks.clone(),
        }));
        let task = ScheduledTask {
            generation,
            stopped,
            wake,
            handle,
        };

        match entry {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(task);
                previous.cancel();
                info!(game_id, interval_ms, "auto-play restarted");
            }
            Entry::Vacant(vacant) => {
                vacant.insert(task);
                info!(game_id, interval_ms, "auto-play started");
            }
        }

        self.engine.metrics().record_scheduler_start();
        Ok(())
    }

    /// Disarm the loop for `game_id`. No draw for this game starts after
    /// this returns; a tick already drawing may finish. Returns whether a
    /// loop was running.
    pub fn stop(&self, game_id: &str) -> bool {
        match self.tasks.remove(game_id) {
            Some((_, task)) => {
                task.cancel();
                info!(game_id, "auto-play stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, game_id: &str) -> bool {
        self.tasks.contains_key(game_id)
    }

    pub fn running_games(&self) -> Vec<String> {
        self.tasks.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Cancel every loop and wait for in-flight ticks to finish
    pub async fn shutdown(&self) {
        let ids = self.running_games();
        let drained: Vec<(String, ScheduledTask)> = ids
            .into_iter()
            .filter_map(|id| self.tasks.remove(&id))
            .collect();

        for (_, task) in &drained {
            task.cancel();
        }

        let count = drained.len();
        for (game_id, task) in drained {
            if let Err(e) = task.handle.await {
                warn!(game_id = %game_id, "auto-play task ended abnormally: {}", e);
            }
        }

        info!(stopped = count, "scheduler shut down");
    }
}

/// Everything a loop needs, moved into its task
struct DrawLoop {
    game_id: String,
    generation: u64,
    period: Duration,
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
    engine: Arc<DrawEngine>,
    error_sink: Arc<dyn ErrorSink>,
    tasks: TaskMap,
}

impl DrawLoop {
    /// Remove this loop's registration unless a newer loop replaced it
    fn retire(&self) {
        let generation = self.generation;
        self.tasks
            .remove_if(&self.game_id, |_, task| task.generation == generation);
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn report_fault(&self, error: HousieError) {
        let fault: HousieError = SchedulerError::Fault {
            game_id: self.game_id.clone(),
            source: Box::new(error),
        }
        .into();

        self.engine.metrics().record_scheduler_fault();
        self.error_sink.report(&self.game_id, &fault);

        let notice = GameEvent::scheduler_fault(&self.game_id, fault.to_string());
        if let Err(e) = self.engine.events().emit(notice).await {
            warn!(game_id = %self.game_id, "could not broadcast scheduler fault: {}", e);
        }
    }
}

async fn run_loop(ctx: DrawLoop) {
    let mut ticker = time::interval_at(Instant::now() + ctx.period, ctx.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ctx.wake.notified() => break,
            _ = ticker.tick() => {}
        }
        if ctx.stopped.load(Ordering::SeqCst) {
            break;
        }

        match ctx.engine.auto_draw(&ctx.game_id, &ctx.stopped).await {
            Ok(TickOutcome::Drawn(report)) => {
                debug!(game_id = %ctx.game_id, number = report.number, "auto-play tick");
                if report.drawn_count >= MAX_NUMBER as usize {
                    info!(game_id = %ctx.game_id, "all numbers drawn, auto-play stopping");
                    ctx.retire();
                    break;
                }
            }
            Ok(TickOutcome::Halted(HaltReason::Stopped)) => break,
            Ok(TickOutcome::Halted(reason)) => {
                info!(game_id = %ctx.game_id, reason = ?reason, "auto-play stopping");
                ctx.retire();
                break;
            }
            Err(e) => {
                ctx.retire();
                ctx.report_fault(e).await;
                break;
            }
        }
    }

    ctx.engine.metrics().record_scheduler_stop();
    debug!(game_id = %ctx.game_id, generation = ctx.generation, "auto-play loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BroadcastEventSink, TracingErrorSink};
    use crate::game_store::{GameStore, InMemoryGameStore};
    use crate::games::types::{Game, GameSettings, GameStatus};

    async fn setup() -> (DrawScheduler, Arc<InMemoryGameStore>, String) {
        let store = Arc::new(InMemoryGameStore::new());
        let sink = Arc::new(BroadcastEventSink::new(256));
        let engine = Arc::new(DrawEngine::new(store.clone(), sink));

        let mut game = Game::new(
            "sched",
            vec![],
            GameSettings {
                auto_play: true,
                ..GameSettings::default()
            },
        );
        game.status = GameStatus::Active;
        store.save_game(&game).await.unwrap();

        let scheduler = DrawScheduler::new(engine, Arc::new(TracingErrorSink), &SchedulerConfig::default());
        (scheduler, store, game.id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_short_interval() {
        let (scheduler, _, game_id) = setup().await;
        let result = scheduler.start(&game_id, 1);
        assert!(matches!(
            result,
            Err(HousieError::Scheduler(SchedulerError::InvalidInterval { interval_ms: 1, .. }))
        ));
        assert!(!scheduler.is_running(&game_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_draw_waits_one_interval() {
        let (scheduler, store, game_id) = setup().await;
        scheduler.start(&game_id, 1000).unwrap();

        time::sleep(Duration::from_millis(900)).await;
        assert!(store.load_game(&game_id).await.unwrap().unwrap().drawn_numbers.is_empty());

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.load_game(&game_id).await.unwrap().unwrap().drawn_numbers.len(), 1);
        assert_eq!(scheduler.running_games(), vec![game_id.clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (scheduler, store, game_id) = setup().await;
        assert!(!scheduler.stop(&game_id));

        scheduler.start(&game_id, 100).unwrap();
        time::sleep(Duration::from_millis(250)).await;
        assert!(scheduler.stop(&game_id));
        assert!(!scheduler.stop(&game_id));

        let drawn = store.load_game(&game_id).await.unwrap().unwrap().drawn_numbers.len();
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(store.load_game(&game_id).await.unwrap().unwrap().drawn_numbers.len(), drawn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_all_loops() {
        let (scheduler, _, game_id) = setup().await;
        scheduler.start(&game_id, 100).unwrap();
        scheduler.start("other-game", 100).unwrap();
        assert_eq!(scheduler.running_games().len(), 2);

        scheduler.shutdown().await;
        assert!(scheduler.running_games().is_empty());
    }
}
