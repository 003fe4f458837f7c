use crate::errors::DrawError;
use crate::games::types::{Game, RuleWinner, Ticket, TicketStatus, Winner, WinnerInfo};
use crate::games::win_checker::check_win;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A rule completed during a processing pass, shaped for the
/// `rule-completed` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRule {
    pub id: String,
    pub pattern: String,
    pub name: String,
    pub prize_amount: f64,
    pub winner: RuleWinner,
}

/// One evaluation of an open rule against a ticket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCheck {
    pub rule_id: String,
    pub ticket_id: String,
    pub satisfied: bool,
}

/// Result of processing one drawn number
#[derive(Debug, Clone, Default)]
pub struct WinOutcome {
    pub number: u8,
    /// Tickets whose marks changed, in iteration order
    pub marked_tickets: Vec<String>,
    pub checks: Vec<RuleCheck>,
    /// Newly completed rules, in completion order
    pub completed: Vec<CompletedRule>,
}

impl WinOutcome {
    fn new(number: u8) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    pub fn has_winners(&self) -> bool {
        !self.completed.is_empty()
    }
}

/// Marks tickets for a drawn number and awards open rules.
///
/// Tickets are visited in slice order and the first ticket to satisfy an
/// open rule takes it; later tickets in the same pass cannot claim it again.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinProcessor;

impl WinProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Process a number already appended to the game's history
    pub fn process(&self, game: &mut Game, tickets: &mut [Ticket], number: u8) -> Result<WinOutcome, DrawError> {
        self.process_at(game, tickets, number, Utc::now())
    }

    /// Same as [`process`](Self::process) with an explicit claim time
    pub fn process_at(
        &self,
        game: &mut Game,
        tickets: &mut [Ticket],
        number: u8,
        now: DateTime<Utc>,
    ) -> Result<WinOutcome, DrawError> {
        if !game.has_drawn(number) {
            return Err(DrawError::NumberNotDrawn(number));
        }

        let mut outcome = WinOutcome::new(number);

        for ticket in tickets.iter_mut() {
            if ticket.status != TicketStatus::Active || ticket.game_id != game.id {
                continue;
            }

            // marks come from the game's history, never from the ticket alone
            if ticket.sync_marks(&game.drawn_numbers) == 0 {
                continue;
            }
            outcome.marked_tickets.push(ticket.id.clone());

            for index in 0..game.rules.len() {
                if game.rules[index].is_completed {
                    continue;
                }

                let satisfied = check_win(&ticket.numbers, &ticket.marked_numbers, &game.rules[index].pattern);
                outcome.checks.push(RuleCheck {
                    rule_id: game.rules[index].id.clone(),
                    ticket_id: ticket.id.clone(),
                    satisfied,
                });

                if satisfied {
                    outcome.completed.push(award_rule(game, index, ticket, now));
                }
            }
        }

        debug!(
            game_id = %game.id,
            number,
            marked = outcome.marked_tickets.len(),
            completed = outcome.completed.len(),
            "processed drawn number"
        );

        Ok(outcome)
    }
}

/// Close a rule for a ticket and record the winner on both records
fn award_rule(game: &mut Game, index: usize, ticket: &mut Ticket, now: DateTime<Utc>) -> CompletedRule {
    let winner = RuleWinner {
        user_id: ticket.user_id.clone(),
        user_name: ticket.user_name.clone(),
        ticket_id: ticket.id.clone(),
        claimed_at: now,
    };

    let rule = &mut game.rules[index];
    rule.is_completed = true;
    rule.winner = Some(winner.clone());
    let completed = CompletedRule {
        id: rule.id.clone(),
        pattern: rule.pattern.clone(),
        name: rule.name.clone(),
        prize_amount: rule.prize_amount,
        winner: winner.clone(),
    };

    let rank = game.winners.len() as u32 + 1;
    game.winners.push(Winner {
        rank,
        rule_id: completed.id.clone(),
        user_id: winner.user_id,
        user_name: winner.user_name,
        ticket_id: winner.ticket_id,
        pattern: completed.pattern.clone(),
        prize_amount: completed.prize_amount,
        claimed_at: now,
    });

    ticket.status = TicketStatus::Won;
    ticket.winner_info = Some(WinnerInfo {
        position: rank,
        game_name: game.name.clone(),
        rule_name: completed.name.clone(),
        pattern: completed.pattern.clone(),
        prize_amount: completed.prize_amount,
        won_at: now,
    });

    info!(
        game_id = %game.id,
        rule = %completed.name,
        ticket_id = %ticket.id,
        user = %ticket.user_name,
        rank,
        "rule completed"
    );

    completed
}
