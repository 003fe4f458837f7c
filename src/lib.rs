//! Housie - draw engine for numbers-drawing ticket games
//!
//! Generates 3x9 tickets, evaluates win patterns against drawn numbers and
//! runs one auto-play draw loop per game. Persistence and broadcast are
//! collaborator traits; in-memory and tokio broadcast implementations ship
//! with the crate.

pub mod config;
pub mod draw_engine;
pub mod errors;
pub mod events;
pub mod factory;
pub mod game_store;
pub mod games;
pub mod lifecycle;
pub mod metrics;
pub mod scheduler;

pub use config::{ConfigLoader, HousieConfig};
pub use draw_engine::{DrawEngine, DrawReport, DrawSource, HaltReason, TickOutcome};
pub use errors::{HousieError, HousieResult};
pub use events::{BroadcastEventSink, ErrorSink, EventSink, GameEvent, TracingErrorSink};
pub use factory::{EngineFactory, HousieServices};
pub use game_store::{GameStore, InMemoryGameStore};
pub use games::{
    check_win, CompletedRule, Game, GameRule, GameSettings, GameStatus, Ticket, TicketGenerator, TicketGrid,
    TicketOffice, TicketStatus, WinPattern, WinProcessor,
};
pub use lifecycle::GameController;
pub use metrics::{DrawMetrics, MetricsSnapshot};
pub use scheduler::DrawScheduler;
