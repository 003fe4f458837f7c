use crate::errors::{DrawError, LayoutError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Highest number in the pool
pub const MAX_NUMBER: u8 = 90;
pub const ROWS: usize = 3;
pub const COLUMNS: usize = 9;
pub const NUMBERS_PER_TICKET: usize = 15;
pub const NUMBERS_PER_ROW: usize = 5;
pub const MAX_PER_COLUMN: usize = 3;

/// Inclusive value range for a ticket column.
///
/// Decade layout: column 0 holds 1-9, columns 1-7 hold 10c..10c+9 and the
/// last column is widened to 80-90.
pub fn column_range(column: usize) -> (u8, u8) {
    match column {
        0 => (1, 9),
        8 => (80, MAX_NUMBER),
        c => (c as u8 * 10, c as u8 * 10 + 9),
    }
}

/// Column a number belongs to
pub fn column_of(number: u8) -> usize {
    match number {
        0..=9 => 0,
        80..=u8::MAX => 8,
        n => (n / 10) as usize,
    }
}

/// 3x9 ticket matrix, 0 marks a blank cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TicketGrid {
    cells: [[u8; COLUMNS]; ROWS],
}

impl TicketGrid {
    pub fn new(cells: [[u8; COLUMNS]; ROWS]) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[[u8; COLUMNS]; ROWS] {
        &self.cells
    }

    /// `None` outside the 3x9 grid
    pub fn cell(&self, row: usize, column: usize) -> Option<u8> {
        self.cells.get(row)?.get(column).copied()
    }

    /// All non-blank numbers, row by row
    pub fn numbers(&self) -> Vec<u8> {
        self.cells
            .iter()
            .flat_map(|row| row.iter().copied())
            .filter(|&n| n != 0)
            .collect()
    }

    /// Non-blank numbers of one row, left to right. Empty past the last row.
    pub fn row_numbers(&self, row: usize) -> Vec<u8> {
        self.cells
            .get(row)
            .map(|r| r.iter().copied().filter(|&n| n != 0).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, number: u8) -> bool {
        number != 0 && self.cells.iter().any(|row| row.contains(&number))
    }

    /// Check every structural rule of a playable ticket
    pub fn validate(&self) -> Result<(), LayoutError> {
        let numbers = self.numbers();
        if numbers.len() != NUMBERS_PER_TICKET {
            return Err(LayoutError::WrongTotal { count: numbers.len() });
        }

        for row in 0..ROWS {
            let count = self.row_numbers(row).len();
            if count != NUMBERS_PER_ROW {
                return Err(LayoutError::RowCount { row, count });
            }
        }

        for column in 0..COLUMNS {
            let (min, max) = column_range(column);
            let mut previous: Option<u8> = None;
            let mut count = 0;

            for row in 0..ROWS {
                let value = self.cells[row][column];
                if value == 0 {
                    continue;
                }
                if value < min || value > max {
                    return Err(LayoutError::OutOfRange { row, column, value });
                }
                if previous.is_some_and(|p| p >= value) {
                    return Err(LayoutError::NotIncreasing { column });
                }
                previous = Some(value);
                count += 1;
            }

            if count == 0 {
                return Err(LayoutError::EmptyColumn { column });
            }
            if count > MAX_PER_COLUMN {
                return Err(LayoutError::ColumnOverfull { column });
            }
        }

        let mut seen = [false; MAX_NUMBER as usize + 1];
        for n in numbers {
            if seen[n as usize] {
                return Err(LayoutError::Duplicate(n));
            }
            seen[n as usize] = true;
        }

        Ok(())
    }
}

/// Game lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl GameStatus {
    /// Allowed moves: waiting -> active -> (paused <-> active) -> completed | cancelled
    pub fn can_transition_to(self, next: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, next),
            (Waiting, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Paused, Completed)
                | (Waiting, Cancelled)
                | (Active, Cancelled)
                | (Paused, Cancelled)
        )
    }

    /// Completed and cancelled games are read-only
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Cancelled)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Waiting => write!(f, "waiting"),
            GameStatus::Active => write!(f, "active"),
            GameStatus::Paused => write!(f, "paused"),
            GameStatus::Completed => write!(f, "completed"),
            GameStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Ticket lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Active,
    Won,
    Cancelled,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Pending => write!(f, "pending"),
            TicketStatus::Active => write!(f, "active"),
            TicketStatus::Won => write!(f, "won"),
            TicketStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Who claimed a rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleWinner {
    pub user_id: String,
    pub user_name: String,
    pub ticket_id: String,
    pub claimed_at: DateTime<Utc>,
}

/// A prize bound to a win pattern, completable once per game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameRule {
    pub id: String,
    pub pattern: String,
    pub name: String,
    pub order: u32,
    pub prize_amount: f64,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<RuleWinner>,
}

impl GameRule {
    /// Create an open rule with a fresh id
    pub fn new(pattern: impl Into<String>, name: impl Into<String>, order: u32, prize_amount: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pattern: pattern.into(),
            name: name.into(),
            order,
            prize_amount,
            is_completed: false,
            winner: None,
        }
    }

    /// The six rules of a standard game
    pub fn standard_set() -> Vec<Self> {
        vec![
            Self::new("early_five", "Early Five", 1, 100.0),
            Self::new("top_line", "Top Line", 2, 200.0),
            Self::new("middle_line", "Middle Line", 3, 200.0),
            Self::new("bottom_line", "Bottom Line", 4, 200.0),
            Self::new("corners", "Four Corners", 5, 300.0),
            Self::new("full_house", "Full House", 6, 1000.0),
        ]
    }
}

/// Per-game settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub auto_play: bool,
    pub auto_play_interval_ms: u64,
    pub max_tickets: u32,
    pub max_tickets_per_user: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            auto_play: false,
            auto_play_interval_ms: 5000,
            max_tickets: 100,
            max_tickets_per_user: 6,
        }
    }
}

/// Entry in the game's ordered winners list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub rank: u32,
    pub rule_id: String,
    pub user_id: String,
    pub user_name: String,
    pub ticket_id: String,
    pub pattern: String,
    pub prize_amount: f64,
    pub claimed_at: DateTime<Utc>,
}

/// Game record handed in by the persistence collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub name: String,
    pub status: GameStatus,
    pub drawn_numbers: Vec<u8>,
    pub rules: Vec<GameRule>,
    pub settings: GameSettings,
    pub winners: Vec<Winner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Game {
    /// New game in the waiting state
    pub fn new(name: impl Into<String>, rules: Vec<GameRule>, settings: GameSettings) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            status: GameStatus::Waiting,
            drawn_numbers: Vec::new(),
            rules,
            settings,
            winners: Vec::new(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn has_drawn(&self, number: u8) -> bool {
        self.drawn_numbers.contains(&number)
    }

    pub fn is_exhausted(&self) -> bool {
        self.drawn_numbers.len() >= MAX_NUMBER as usize
    }

    /// Numbers in 1..=90 not yet drawn, ascending
    pub fn undrawn_numbers(&self) -> Vec<u8> {
        let mut drawn = [false; MAX_NUMBER as usize + 1];
        for &n in &self.drawn_numbers {
            if let Some(slot) = drawn.get_mut(n as usize) {
                *slot = true;
            }
        }
        (1..=MAX_NUMBER).filter(|&n| !drawn[n as usize]).collect()
    }

    /// Append a number to the history.
    ///
    /// Callers validate first; a repeat here means two writers raced.
    pub fn record_draw(&mut self, number: u8) -> Result<(), DrawError> {
        if number == 0 || number > MAX_NUMBER {
            return Err(DrawError::OutOfRange(number));
        }
        if self.has_drawn(number) {
            return Err(DrawError::DuplicateDraw(number));
        }
        if self.is_exhausted() {
            return Err(DrawError::PoolExhausted);
        }
        self.drawn_numbers.push(number);
        Ok(())
    }

    pub fn open_rules(&self) -> impl Iterator<Item = &GameRule> {
        self.rules.iter().filter(|r| !r.is_completed)
    }

    pub fn all_rules_completed(&self) -> bool {
        self.rules.iter().all(|r| r.is_completed)
    }
}

/// Denormalized win summary stored on the ticket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WinnerInfo {
    pub position: u32,
    pub game_name: String,
    pub rule_name: String,
    pub pattern: String,
    pub prize_amount: f64,
    pub won_at: DateTime<Utc>,
}

/// A player's ticket for one game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub game_id: String,
    pub user_id: String,
    pub user_name: String,
    pub ticket_number: u32,
    pub numbers: TicketGrid,
    pub marked_numbers: Vec<u8>,
    pub status: TicketStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_info: Option<WinnerInfo>,
}

impl Ticket {
    /// Pending ticket awaiting confirmation
    pub fn new(
        game_id: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        ticket_number: u32,
        numbers: TicketGrid,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            game_id: game_id.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            ticket_number,
            numbers,
            marked_numbers: Vec::new(),
            status: TicketStatus::Pending,
            winner_info: None,
        }
    }

    pub fn is_marked(&self, number: u8) -> bool {
        self.marked_numbers.contains(&number)
    }

    /// Mark every grid number present in `drawn` that is not yet marked,
    /// in draw order. Returns how many marks were added.
    pub fn sync_marks(&mut self, drawn: &[u8]) -> usize {
        let before = self.marked_numbers.len();
        for &n in drawn {
            if self.numbers.contains(n) && !self.is_marked(n) {
                self.marked_numbers.push(n);
            }
        }
        self.marked_numbers.len() - before
    }
}
