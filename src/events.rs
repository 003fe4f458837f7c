//! Game events and the broadcast/error collaborators
//!
//! Events carry the payload shapes clients rely on; how they reach clients is
//! the sink's business. [`BroadcastEventSink`] fans them out over a tokio
//! broadcast channel.

use crate::errors::{EventError, HousieError, HousieResult};
use crate::games::processor::CompletedRule;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error};

/// `{ gameId, number }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NumberDrawn {
    pub game_id: String,
    pub number: u8,
}

/// `{ gameId, rule: { id, pattern, name, prizeAmount, winner } }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleCompleted {
    pub game_id: String,
    pub rule: CompletedRule,
}

/// `{ gameId }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameTransition {
    pub game_id: String,
}

/// `{ gameId, message }`, the degraded-state notice for connected clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerFaulted {
    pub game_id: String,
    pub message: String,
}

/// `{ gameId, ticketId, userId }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketConfirmed {
    pub game_id: String,
    pub ticket_id: String,
    pub user_id: String,
}

/// Everything the core hands to the broadcast collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum GameEvent {
    NumberDrawn(NumberDrawn),
    RuleCompleted(RuleCompleted),
    GameStarted(GameTransition),
    GameEnded(GameTransition),
    SchedulerFault(SchedulerFaulted),
    TicketConfirmed(TicketConfirmed),
}

impl GameEvent {
    pub fn number_drawn(game_id: &str, number: u8) -> Self {
        GameEvent::NumberDrawn(NumberDrawn {
            game_id: game_id.to_string(),
            number,
        })
    }

    pub fn rule_completed(game_id: &str, rule: CompletedRule) -> Self {
        GameEvent::RuleCompleted(RuleCompleted {
            game_id: game_id.to_string(),
            rule,
        })
    }

    pub fn game_started(game_id: &str) -> Self {
        GameEvent::GameStarted(GameTransition {
            game_id: game_id.to_string(),
        })
    }

    pub fn game_ended(game_id: &str) -> Self {
        GameEvent::GameEnded(GameTransition {
            game_id: game_id.to_string(),
        })
    }

    pub fn scheduler_fault(game_id: &str, message: impl Into<String>) -> Self {
        GameEvent::SchedulerFault(SchedulerFaulted {
            game_id: game_id.to_string(),
            message: message.into(),
        })
    }

    pub fn ticket_confirmed(game_id: &str, ticket_id: &str, user_id: &str) -> Self {
        GameEvent::TicketConfirmed(TicketConfirmed {
            game_id: game_id.to_string(),
            ticket_id: ticket_id.to_string(),
            user_id: user_id.to_string(),
        })
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::NumberDrawn(_) => "number-drawn",
            GameEvent::RuleCompleted(_) => "rule-completed",
            GameEvent::GameStarted(_) => "game-started",
            GameEvent::GameEnded(_) => "game-ended",
            GameEvent::SchedulerFault(_) => "scheduler-fault",
            GameEvent::TicketConfirmed(_) => "ticket-confirmed",
        }
    }

    pub fn game_id(&self) -> &str {
        match self {
            GameEvent::NumberDrawn(e) => &e.game_id,
            GameEvent::RuleCompleted(e) => &e.game_id,
            GameEvent::GameStarted(e) | GameEvent::GameEnded(e) => &e.game_id,
            GameEvent::SchedulerFault(e) => &e.game_id,
            GameEvent::TicketConfirmed(e) => &e.game_id,
        }
    }

    /// Payload as JSON, without the event name
    pub fn payload(&self) -> HousieResult<serde_json::Value> {
        let value = match self {
            GameEvent::NumberDrawn(e) => serde_json::to_value(e),
            GameEvent::RuleCompleted(e) => serde_json::to_value(e),
            GameEvent::GameStarted(e) | GameEvent::GameEnded(e) => serde_json::to_value(e),
            GameEvent::SchedulerFault(e) => serde_json::to_value(e),
            GameEvent::TicketConfirmed(e) => serde_json::to_value(e),
        };
        value.map_err(|e| {
            EventError::SerializationFailed {
                event: self.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Broadcast collaborator
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: GameEvent) -> HousieResult<()>;
}

/// Operational error collaborator
pub trait ErrorSink: Send + Sync {
    fn report(&self, game_id: &str, error: &HousieError);
}

/// Fans events out to every subscriber of a tokio broadcast channel
#[derive(Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<GameEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(&self, event: GameEvent) -> HousieResult<()> {
        let name = event.name();
        let game_id = event.game_id().to_string();
        if let Err(e) = self.tx.send(event) {
            // nobody listening is fine
            debug!(game_id = %game_id, event = name, "no subscribers for event: {}", e);
        }
        Ok(())
    }
}

/// Logs reported errors at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, game_id: &str, error: &HousieError) {
        error!(game_id, degraded = error.is_degraded(), "{}", error);
    }
}
