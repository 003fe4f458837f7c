//! Wiring for a complete engine instance
//!
//! Builds the draw engine, scheduler, controller and ticket office around
//! one store and one broadcast sink so binaries and tests share a single
//! setup path.

use crate::{
    config::{ConfigLoader, HousieConfig},
    draw_engine::DrawEngine,
    errors::HousieResult,
    events::{BroadcastEventSink, ErrorSink, TracingErrorSink},
    game_store::{GameStore, InMemoryGameStore},
    games::{TicketGenerator, TicketOffice},
    lifecycle::GameController,
    metrics::DrawMetrics,
    scheduler::DrawScheduler,
};
use std::sync::Arc;
use tracing::info;

/// Handles to every service of one engine instance
pub struct HousieServices {
    pub config: HousieConfig,
    pub store: Arc<dyn GameStore>,
    pub events: Arc<BroadcastEventSink>,
    pub metrics: Arc<DrawMetrics>,
    pub engine: Arc<DrawEngine>,
    pub scheduler: Arc<DrawScheduler>,
    pub games: GameController,
    pub tickets: TicketOffice,
}

impl HousieServices {
    /// Stop every auto-play loop and wait for in-flight ticks
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}

pub struct EngineFactory;

impl EngineFactory {
    /// Engine over the in-memory store, errors reported through tracing
    pub fn create(config: HousieConfig) -> HousieResult<HousieServices> {
        Self::create_with(config, Arc::new(InMemoryGameStore::new()), Arc::new(TracingErrorSink))
    }

    /// Engine over caller-supplied collaborators
    pub fn create_with(
        config: HousieConfig,
        store: Arc<dyn GameStore>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> HousieResult<HousieServices> {
        ConfigLoader::new().validate(&config)?;

        let events = Arc::new(BroadcastEventSink::new(config.events.channel_capacity));
        let metrics = Arc::new(DrawMetrics::new());
        let engine = Arc::new(DrawEngine::with_metrics(store.clone(), events.clone(), metrics.clone()));
        let scheduler = Arc::new(DrawScheduler::new(engine.clone(), error_sink, &config.scheduler));
        let games = GameController::new(engine.clone(), scheduler.clone());
        let tickets = TicketOffice::new(engine.clone(), TicketGenerator::new(config.generator.max_attempts));

        info!(
            default_interval_ms = config.scheduler.default_interval_ms,
            channel_capacity = config.events.channel_capacity,
            "housie engine ready"
        );

        Ok(HousieServices {
            config,
            store,
            events,
            metrics,
            engine,
            scheduler,
            games,
            tickets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rejects_invalid_config() {
        let mut config = HousieConfig::default();
        config.events.channel_capacity = 0;
        assert!(EngineFactory::create(config).is_err());
    }

    #[tokio::test]
    async fn test_services_share_one_store() {
        let services = EngineFactory::create(HousieConfig::default()).unwrap();
        let settings = (&services.config).into();
        let game = services.games.create_game("shared", vec![], settings).await.unwrap();

        assert!(services.store.load_game(&game.id).await.unwrap().is_some());
        services.tickets.purchase(&game.id, "u1", "Alice", 2).await.unwrap();
        assert_eq!(services.store.load_game_tickets(&game.id).await.unwrap().len(), 2);
    }
}
