//! Persistence seam for game and ticket records.
//!
//! The draw engine only sees [`GameStore`]; [`InMemoryGameStore`] is the
//! bundled implementation used by the simulator and the tests.

use crate::{
    errors::HousieResult,
    games::types::{Game, Ticket, TicketStatus},
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// Load/save collaborator for games and tickets
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Fetch the current game record
    async fn load_game(&self, game_id: &str) -> HousieResult<Option<Game>>;

    /// Persist a game record, replacing the previous version
    async fn save_game(&self, game: &Game) -> HousieResult<()>;

    /// Tickets eligible to win, in the order the win processor should visit them
    async fn load_active_tickets(&self, game_id: &str) -> HousieResult<Vec<Ticket>>;

    /// Persist a ticket record, replacing the previous version
    async fn save_ticket(&self, ticket: &Ticket) -> HousieResult<()>;

    /// Fetch a single ticket
    async fn load_ticket(&self, ticket_id: &str) -> HousieResult<Option<Ticket>>;

    /// Every ticket of a game regardless of status, by ticket number
    async fn load_game_tickets(&self, game_id: &str) -> HousieResult<Vec<Ticket>>;

    /// Persist a batch of freshly issued tickets
    async fn insert_tickets(&self, tickets: &[Ticket]) -> HousieResult<()> {
        for ticket in tickets {
            self.save_ticket(ticket).await?;
        }
        Ok(())
    }
}

/// DashMap-backed store
#[derive(Clone, Default)]
pub struct InMemoryGameStore {
    games: Arc<DashMap<String, Game>>,
    tickets: Arc<DashMap<String, Ticket>>,
}

impl InMemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    fn tickets_where(&self, game_id: &str, keep: impl Fn(&Ticket) -> bool) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|entry| entry.game_id == game_id && keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        // ascending ticket number is the win tie-break order
        tickets.sort_by_key(|t| t.ticket_number);
        tickets
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn load_game(&self, game_id: &str) -> HousieResult<Option<Game>> {
        Ok(self.games.get(game_id).map(|g| g.value().clone()))
    }

    async fn save_game(&self, game: &Game) -> HousieResult<()> {
        trace!(game_id = %game.id, drawn = game.drawn_numbers.len(), "saving game");
        self.games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    async fn load_active_tickets(&self, game_id: &str) -> HousieResult<Vec<Ticket>> {
        Ok(self.tickets_where(game_id, |t| t.status == TicketStatus::Active))
    }

    async fn save_ticket(&self, ticket: &Ticket) -> HousieResult<()> {
        self.tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn load_ticket(&self, ticket_id: &str) -> HousieResult<Option<Ticket>> {
        Ok(self.tickets.get(ticket_id).map(|t| t.value().clone()))
    }

    async fn load_game_tickets(&self, game_id: &str) -> HousieResult<Vec<Ticket>> {
        Ok(self.tickets_where(game_id, |_| true))
    }
}
