//! Ticket sales, confirmation and cancellation
//!
//! Sales are serialized with draws and lifecycle changes through the draw
//! engine's per-game lock, so capacity checks never race.

use crate::draw_engine::DrawEngine;
use crate::errors::{HousieResult, LifecycleError};
use crate::events::GameEvent;
use crate::games::ticket_generator::TicketGenerator;
use crate::games::types::{GameStatus, Ticket, TicketStatus};
use std::sync::Arc;
use tracing::info;

pub struct TicketOffice {
    engine: Arc<DrawEngine>,
    generator: TicketGenerator,
}

impl TicketOffice {
    pub fn new(engine: Arc<DrawEngine>, generator: TicketGenerator) -> Self {
        Self { engine, generator }
    }

    /// Issue `quantity` pending tickets to a player
    pub async fn purchase(
        &self,
        game_id: &str,
        user_id: &str,
        user_name: &str,
        quantity: u32,
    ) -> HousieResult<Vec<Ticket>> {
        if quantity == 0 {
            return Err(LifecycleError::InvalidQuantity.into());
        }

        self.engine
            .locked(game_id, self.issue(game_id, user_id, user_name, quantity))
            .await
    }

    async fn issue(&self, game_id: &str, user_id: &str, user_name: &str, quantity: u32) -> HousieResult<Vec<Ticket>> {
        let store = self.engine.store();
        let game = store
            .load_game(game_id)
            .await?
            .ok_or_else(|| LifecycleError::GameNotFound(game_id.to_string()))?;
        if game.status != GameStatus::Waiting {
            return Err(LifecycleError::BookingClosed(game.status).into());
        }

        let existing = store.load_game_tickets(game_id).await?;
        let live = |t: &&Ticket| matches!(t.status, TicketStatus::Pending | TicketStatus::Active);

        let held = existing.iter().filter(live).filter(|t| t.user_id == user_id).count() as u32;
        let per_user = game.settings.max_tickets_per_user;
        if held.checked_add(quantity).map_or(true, |total| total > per_user) {
            return Err(LifecycleError::PurchaseLimitExceeded {
                remaining: per_user.saturating_sub(held),
            }
            .into());
        }

        let sold = existing.iter().filter(live).count() as u32;
        let capacity = game.settings.max_tickets;
        if sold.checked_add(quantity).map_or(true, |total| total > capacity) {
            return Err(LifecycleError::GameFull {
                remaining: capacity.saturating_sub(sold),
            }
            .into());
        }

        // numbering continues past cancelled tickets
        let first = existing.iter().map(|t| t.ticket_number).max().unwrap_or(0) + 1;
        let mut tickets = Vec::with_capacity(quantity as usize);
        for ticket_number in (first..).take(quantity as usize) {
            let grid = self.generator.generate()?;
            tickets.push(Ticket::new(game_id, user_id, user_name, ticket_number, grid));
        }

        store.insert_tickets(&tickets).await?;
        info!(game_id, user_id, quantity, first_ticket = first, "tickets issued");
        Ok(tickets)
    }

    /// Pending ticket becomes active and eligible to win
    pub async fn confirm(&self, ticket_id: &str) -> HousieResult<Ticket> {
        let ticket = self
            .transition(ticket_id, TicketStatus::Active, |from| from == TicketStatus::Pending)
            .await?;

        self.engine
            .events()
            .emit(GameEvent::ticket_confirmed(&ticket.game_id, &ticket.id, &ticket.user_id))
            .await?;
        Ok(ticket)
    }

    /// Withdraw a ticket that has not won
    pub async fn cancel(&self, ticket_id: &str) -> HousieResult<Ticket> {
        self.transition(ticket_id, TicketStatus::Cancelled, |from| {
            matches!(from, TicketStatus::Pending | TicketStatus::Active)
        })
        .await
    }

    pub async fn tickets_for_user(&self, game_id: &str, user_id: &str) -> HousieResult<Vec<Ticket>> {
        let tickets = self.engine.store().load_game_tickets(game_id).await?;
        Ok(tickets.into_iter().filter(|t| t.user_id == user_id).collect())
    }

    async fn transition(
        &self,
        ticket_id: &str,
        to: TicketStatus,
        allowed: impl Fn(TicketStatus) -> bool + Send + Sync,
    ) -> HousieResult<Ticket> {
        let game_id = self.load(ticket_id).await?.game_id;
        self.engine
            .locked(&game_id, self.apply_transition(ticket_id, to, allowed))
            .await
    }

    async fn apply_transition(
        &self,
        ticket_id: &str,
        to: TicketStatus,
        allowed: impl Fn(TicketStatus) -> bool + Send + Sync,
    ) -> HousieResult<Ticket> {
        // reload under the lock, a draw may have moved it to won
        let mut ticket = self.load(ticket_id).await?;
        if !allowed(ticket.status) {
            return Err(LifecycleError::InvalidTicketTransition {
                ticket_id: ticket_id.to_string(),
                from: ticket.status,
                to,
            }
            .into());
        }

        ticket.status = to;
        self.engine.store().save_ticket(&ticket).await?;
        info!(ticket_id, game_id = %ticket.game_id, status = %to, "ticket status changed");
        Ok(ticket)
    }

    async fn load(&self, ticket_id: &str) -> HousieResult<Ticket> {
        self.engine
            .store()
            .load_ticket(ticket_id)
            .await?
            .ok_or_else(|| LifecycleError::TicketNotFound(ticket_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HousieError;
    use crate::events::BroadcastEventSink;
    use crate::game_store::{GameStore, InMemoryGameStore};
    use crate::games::types::{Game, GameSettings};

    struct Fixture {
        office: TicketOffice,
        store: Arc<InMemoryGameStore>,
        sink: Arc<BroadcastEventSink>,
        game: Game,
    }

    async fn fixture(max_tickets: u32, per_user: u32) -> Fixture {
        let store = Arc::new(InMemoryGameStore::new());
        let sink = Arc::new(BroadcastEventSink::new(64));
        let engine = Arc::new(DrawEngine::new(store.clone(), sink.clone()));
        let game = Game::new(
            "sales",
            vec![],
            GameSettings {
                max_tickets,
                max_tickets_per_user: per_user,
                ..GameSettings::default()
            },
        );
        store.save_game(&game).await.unwrap();

        Fixture {
            office: TicketOffice::new(engine, TicketGenerator::default()),
            store,
            sink,
            game,
        }
    }

    #[tokio::test]
    async fn test_purchase_issues_sequential_pending_tickets() {
        let fx = fixture(100, 6).await;
        let first = fx.office.purchase(&fx.game.id, "u1", "Alice", 2).await.unwrap();
        let second = fx.office.purchase(&fx.game.id, "u2", "Bob", 3).await.unwrap();

        let numbers: Vec<u32> = first.iter().chain(&second).map(|t| t.ticket_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(first.iter().all(|t| t.status == TicketStatus::Pending));
        assert!(second.iter().all(|t| t.numbers.validate().is_ok()));
        assert_eq!(fx.store.ticket_count(), 5);
    }

    #[tokio::test]
    async fn test_purchase_limits() {
        let fx = fixture(5, 3).await;

        let result = fx.office.purchase(&fx.game.id, "u1", "Alice", 0).await;
        assert!(matches!(result, Err(HousieError::Lifecycle(LifecycleError::InvalidQuantity))));

        fx.office.purchase(&fx.game.id, "u1", "Alice", 2).await.unwrap();
        let result = fx.office.purchase(&fx.game.id, "u1", "Alice", 2).await;
        assert!(matches!(
            result,
            Err(HousieError::Lifecycle(LifecycleError::PurchaseLimitExceeded { remaining: 1 }))
        ));

        fx.office.purchase(&fx.game.id, "u2", "Bob", 3).await.unwrap();
        let result = fx.office.purchase(&fx.game.id, "u3", "Cara", 1).await;
        assert!(matches!(
            result,
            Err(HousieError::Lifecycle(LifecycleError::GameFull { remaining: 0 }))
        ));
    }

    #[tokio::test]
    async fn test_huge_quantity_is_rejected_not_overflowed() {
        let fx = fixture(u32::MAX, u32::MAX).await;
        fx.office.purchase(&fx.game.id, "u1", "Alice", 1).await.unwrap();

        let result = fx.office.purchase(&fx.game.id, "u1", "Alice", u32::MAX).await;
        assert!(matches!(
            result,
            Err(HousieError::Lifecycle(LifecycleError::PurchaseLimitExceeded { remaining })) if remaining == u32::MAX - 1
        ));
        let result = fx.office.purchase(&fx.game.id, "u2", "Bob", u32::MAX).await;
        assert!(matches!(
            result,
            Err(HousieError::Lifecycle(LifecycleError::GameFull { remaining })) if remaining == u32::MAX - 1
        ));

        let fx = fixture(2, 6).await;
        fx.office.purchase(&fx.game.id, "u1", "Alice", 1).await.unwrap();
        let result = fx.office.purchase(&fx.game.id, "u1", "Alice", u32::MAX).await;
        assert!(matches!(
            result,
            Err(HousieError::Lifecycle(LifecycleError::PurchaseLimitExceeded { remaining: 5 }))
        ));

        let result = fx.office.purchase(&fx.game.id, "u2", "Bob", u32::MAX).await;
        assert!(matches!(result, Err(HousieError::Lifecycle(LifecycleError::PurchaseLimitExceeded { .. }))));
        assert_eq!(fx.store.ticket_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_tickets_free_capacity() {
        let fx = fixture(2, 2).await;
        let tickets = fx.office.purchase(&fx.game.id, "u1", "Alice", 2).await.unwrap();

        let cancelled = fx.office.cancel(&tickets[0].id).await.unwrap();
        assert_eq!(cancelled.status, TicketStatus::Cancelled);

        let more = fx.office.purchase(&fx.game.id, "u1", "Alice", 1).await.unwrap();
        assert_eq!(more[0].ticket_number, 3);
        assert_eq!(fx.office.tickets_for_user(&fx.game.id, "u1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_booking_closed_once_started() {
        let fx = fixture(10, 6).await;
        let mut game = fx.game.clone();
        game.status = GameStatus::Active;
        fx.store.save_game(&game).await.unwrap();

        let result = fx.office.purchase(&game.id, "u1", "Alice", 1).await;
        assert!(matches!(
            result,
            Err(HousieError::Lifecycle(LifecycleError::BookingClosed(GameStatus::Active)))
        ));
    }

    #[tokio::test]
    async fn test_confirm_emits_event_and_rejects_repeat() {
        let fx = fixture(10, 6).await;
        let ticket = fx.office.purchase(&fx.game.id, "u1", "Alice", 1).await.unwrap().remove(0);
        let mut rx = fx.sink.subscribe();

        let confirmed = fx.office.confirm(&ticket.id).await.unwrap();
        assert_eq!(confirmed.status, TicketStatus::Active);
        assert_eq!(
            rx.try_recv().unwrap(),
            GameEvent::ticket_confirmed(&fx.game.id, &ticket.id, "u1")
        );

        let again = fx.office.confirm(&ticket.id).await;
        assert!(matches!(
            again,
            Err(HousieError::Lifecycle(LifecycleError::InvalidTicketTransition {
                from: TicketStatus::Active,
                ..
            }))
        ));

        let missing = fx.office.cancel("nope").await;
        assert!(matches!(missing, Err(HousieError::Lifecycle(LifecycleError::TicketNotFound(_)))));
    }

    #[tokio::test]
    async fn test_won_ticket_cannot_be_cancelled() {
        let fx = fixture(10, 6).await;
        let mut ticket = fx.office.purchase(&fx.game.id, "u1", "Alice", 1).await.unwrap().remove(0);
        ticket.status = TicketStatus::Won;
        fx.store.save_ticket(&ticket).await.unwrap();

        let result = fx.office.cancel(&ticket.id).await;
        assert!(matches!(
            result,
            Err(HousieError::Lifecycle(LifecycleError::InvalidTicketTransition {
                from: TicketStatus::Won,
                ..
            }))
        ));
    }
}
