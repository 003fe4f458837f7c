//! The per-game draw critical section
//!
//! Manual draws, scheduler ticks and lifecycle updates all mutate a game
//! through [`DrawEngine`], which serializes them behind one async mutex per
//! game id. Nothing reads a "not yet drawn" snapshot outside that lock.

use crate::errors::{DrawError, HousieResult};
use crate::events::{EventSink, GameEvent};
use crate::game_store::GameStore;
use crate::games::processor::{CompletedRule, WinProcessor};
use crate::games::types::{Game, GameStatus, MAX_NUMBER};
use crate::metrics::DrawMetrics;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Who asked for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    Manual,
    Scheduled,
}

/// Result of one committed draw
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawReport {
    pub game_id: String,
    pub number: u8,
    /// Rules completed by this draw, in completion order
    pub completed: Vec<CompletedRule>,
    pub drawn_count: usize,
}

/// Why a scheduled draw declined to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The scheduler was stopped while the tick waited for the lock
    Stopped,
    GameMissing,
    NotActive(GameStatus),
    AutoPlayDisabled,
    /// All 90 numbers are out
    Exhausted,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Drawn(DrawReport),
    Halted(HaltReason),
}

pub struct DrawEngine {
    store: Arc<dyn GameStore>,
    events: Arc<dyn EventSink>,
    processor: WinProcessor,
    locks: DashMap<String, Arc<Mutex<()>>>,
    metrics: Arc<DrawMetrics>,
}

impl DrawEngine {
    pub fn new(store: Arc<dyn GameStore>, events: Arc<dyn EventSink>) -> Self {
        Self::with_metrics(store, events, Arc::new(DrawMetrics::new()))
    }

    pub fn with_metrics(store: Arc<dyn GameStore>, events: Arc<dyn EventSink>, metrics: Arc<DrawMetrics>) -> Self {
        Self {
            store,
            events,
            processor: WinProcessor::new(),
            locks: DashMap::new(),
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    pub fn metrics(&self) -> &Arc<DrawMetrics> {
        &self.metrics
    }

    /// Number of games with a live lock slot
    pub fn lock_slots(&self) -> usize {
        self.locks.len()
    }

    /// Draw a caller-chosen number
    pub async fn draw_number(&self, game_id: &str, number: u8) -> HousieResult<DrawReport> {
        if number == 0 || number > MAX_NUMBER {
            return Err(DrawError::OutOfRange(number).into());
        }

        self.locked::<HousieResult<DrawReport>, _>(game_id, async {
            let game = self.load_active(game_id).await?;
            if game.has_drawn(number) {
                debug!(game_id, number, "rejected repeated manual draw");
                return Err(DrawError::AlreadyDrawn(number).into());
            }

            self.commit(game, number, DrawSource::Manual).await
        })
        .await
    }

    /// Draw a random undrawn number on request
    pub async fn draw_next(&self, game_id: &str) -> HousieResult<DrawReport> {
        self.locked::<HousieResult<DrawReport>, _>(game_id, async {
            let game = self.load_active(game_id).await?;
            let number = pick_undrawn(&game).ok_or(DrawError::PoolExhausted)?;

            self.commit(game, number, DrawSource::Manual).await
        })
        .await
    }

    /// One scheduler tick. `stopped` is re-checked once the lock is held so
    /// a `stop` that lands while the tick waits wins.
    pub async fn auto_draw(&self, game_id: &str, stopped: &AtomicBool) -> HousieResult<TickOutcome> {
        self.locked::<HousieResult<TickOutcome>, _>(game_id, async {
            if stopped.load(Ordering::SeqCst) {
                return Ok(TickOutcome::Halted(HaltReason::Stopped));
            }

            let game = match self.store.load_game(game_id).await? {
                Some(game) => game,
                None => return Ok(TickOutcome::Halted(HaltReason::GameMissing)),
            };
            if game.status != GameStatus::Active {
                return Ok(TickOutcome::Halted(HaltReason::NotActive(game.status)));
            }
            if !game.settings.auto_play {
                return Ok(TickOutcome::Halted(HaltReason::AutoPlayDisabled));
            }

            let number = match pick_undrawn(&game) {
                Some(n) => n,
                None => return Ok(TickOutcome::Halted(HaltReason::Exhausted)),
            };

            let report = self.commit(game, number, DrawSource::Scheduled).await?;
            Ok(TickOutcome::Drawn(report))
        })
        .await
    }

    /// Run `work` while holding the game's draw lock. The slot is dropped
    /// again once no other caller holds or waits on it.
    pub async fn locked<T, Fut>(&self, game_id: &str, work: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        // slots are only cloned under the shard lock, so a count of one
        // after release means nobody can be holding or waiting on it
        let lock = self.locks.entry(game_id.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            work.await
        };
        drop(lock);
        self.locks.remove_if(game_id, |_, slot| Arc::strong_count(slot) == 1);
        result
    }

    /// Load, mutate and save a game under its draw lock
    pub async fn update_game<F>(&self, game_id: &str, apply: F) -> HousieResult<Game>
    where
        F: FnOnce(&mut Game) -> HousieResult<()> + Send,
    {
        self.locked::<HousieResult<Game>, _>(game_id, async move {
            let mut game = self
                .store
                .load_game(game_id)
                .await?
                .ok_or_else(|| DrawError::GameNotFound(game_id.to_string()))?;
            apply(&mut game)?;
            self.store.save_game(&game).await?;
            Ok(game)
        })
        .await
    }

    async fn load_active(&self, game_id: &str) -> HousieResult<Game> {
        let game = self
            .store
            .load_game(game_id)
            .await?
            .ok_or_else(|| DrawError::GameNotFound(game_id.to_string()))?;

        if game.status != GameStatus::Active {
            return Err(DrawError::GameNotActive {
                game_id: game_id.to_string(),
                status: game.status,
            }
            .into());
        }
        Ok(game)
    }

    /// Append, persist, broadcast, then award. Caller holds the game lock.
    async fn commit(&self, mut game: Game, number: u8, source: DrawSource) -> HousieResult<DrawReport> {
        game.record_draw(number)?;
        self.store.save_game(&game).await?;
        self.metrics.record_draw(source == DrawSource::Scheduled);

        info!(
            game_id = %game.id,
            number,
            drawn = game.drawn_numbers.len(),
            source = ?source,
            "number drawn"
        );
        self.events.emit(GameEvent::number_drawn(&game.id, number)).await?;

        let mut tickets = self.store.load_active_tickets(&game.id).await?;
        let outcome = self.processor.process(&mut game, &mut tickets, number)?;

        let changed: HashSet<&str> = outcome.marked_tickets.iter().map(String::as_str).collect();
        for ticket in tickets.iter().filter(|t| changed.contains(t.id.as_str())) {
            self.store.save_ticket(ticket).await?;
        }

        if outcome.has_winners() {
            self.store.save_game(&game).await?;
            self.metrics.record_rules_completed(outcome.completed.len() as u64);
        }

        for rule in &outcome.completed {
            self.events
                .emit(GameEvent::rule_completed(&game.id, rule.clone()))
                .await?;
        }

        Ok(DrawReport {
            game_id: game.id,
            number,
            completed: outcome.completed,
            drawn_count: game.drawn_numbers.len(),
        })
    }
}

/// Uniform choice over the undrawn pool
fn pick_undrawn(game: &Game) -> Option<u8> {
    game.undrawn_numbers().choose(&mut rand::thread_rng()).copied()
}
