//! Error types for the housie draw engine
//!
//! One enum per concern, rolled up into [`HousieError`]. Generation and
//! evaluation problems stay local to their caller; scheduler faults halt a
//! single game's loop and are reported upward.

use crate::games::types::{GameStatus, TicketStatus};

/// Root error type for all housie operations
#[derive(Debug, thiserror::Error)]
pub enum HousieError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Ticket layout generation errors
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Draw and win processing errors
    #[error("Draw error: {0}")]
    Draw(#[from] DrawError),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Game and ticket lifecycle errors
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Persistence collaborator errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Broadcast collaborator errors
    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

impl HousieError {
    /// Whether the caller may retry the failed operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HousieError::Generation(GenerationError::Exhausted { .. })
                | HousieError::Storage(StorageError::Unavailable(_))
        )
    }

    /// Whether the error leaves a game's auto-play in a degraded state
    pub fn is_degraded(&self) -> bool {
        matches!(self, HousieError::Scheduler(SchedulerError::Fault { .. }))
    }
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Structural violations of the 3x9 ticket layout
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("ticket holds {count} numbers, expected 15")]
    WrongTotal { count: usize },

    #[error("row {row} holds {count} numbers, expected 5")]
    RowCount { row: usize, count: usize },

    #[error("value {value} at row {row}, column {column} is outside the column range")]
    OutOfRange { row: usize, column: usize, value: u8 },

    #[error("column {column} is not strictly increasing top to bottom")]
    NotIncreasing { column: usize },

    #[error("column {column} is empty")]
    EmptyColumn { column: usize },

    #[error("column {column} holds more than 3 numbers")]
    ColumnOverfull { column: usize },

    #[error("value {0} appears more than once")]
    Duplicate(u8),
}

/// Ticket generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// No valid row assignment was found within the retry budget
    #[error("no valid row assignment found after {attempts} attempts")]
    Exhausted { attempts: usize },

    #[error("generated layout is invalid: {0}")]
    Layout(#[from] LayoutError),
}

/// Draw and win processing errors
#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error("game {0} not found")]
    GameNotFound(String),

    #[error("game {game_id} is {status}, draws require an active game")]
    GameNotActive { game_id: String, status: GameStatus },

    #[error("number {0} is outside 1..=90")]
    OutOfRange(u8),

    /// Externally requested number is already in the history
    #[error("number {0} has already been drawn")]
    AlreadyDrawn(u8),

    /// Internal append saw a repeated number; a concurrency bug if ever observed
    #[error("invariant violated: number {0} appended twice to the drawn history")]
    DuplicateDraw(u8),

    #[error("all 90 numbers have been drawn")]
    PoolExhausted,

    #[error("number {0} is not in the drawn history")]
    NumberNotDrawn(u8),
}

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("interval {interval_ms}ms is below the minimum of {min_ms}ms")]
    InvalidInterval { interval_ms: u64, min_ms: u64 },

    /// A tick failed; the game's loop has been halted
    #[error("auto-play for game {game_id} halted: {source}")]
    Fault {
        game_id: String,
        #[source]
        source: Box<HousieError>,
    },
}

/// Game status and ticket office errors
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("game {0} not found")]
    GameNotFound(String),

    #[error("ticket {0} not found")]
    TicketNotFound(String),

    #[error("cannot move game from {from} to {to}")]
    InvalidTransition { from: GameStatus, to: GameStatus },

    #[error("cannot move ticket {ticket_id} from {from} to {to}")]
    InvalidTicketTransition {
        ticket_id: String,
        from: TicketStatus,
        to: TicketStatus,
    },

    #[error("game is {0} and can no longer be changed")]
    GameClosed(GameStatus),

    #[error("rule uses unrecognized win pattern '{0}'")]
    InvalidRule(String),

    #[error("ticket quantity must be at least 1")]
    InvalidQuantity,

    #[error("tickets can only be booked while the game is waiting (game is {0})")]
    BookingClosed(GameStatus),

    #[error("purchase limit exceeded, {remaining} more ticket(s) allowed")]
    PurchaseLimitExceeded { remaining: u32 },

    #[error("game is full, {remaining} seat(s) left")]
    GameFull { remaining: u32 },
}

/// Persistence collaborator errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Broadcast collaborator errors
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Failed to deliver {event}: {reason}")]
    DeliveryFailed { event: String, reason: String },

    #[error("Failed to serialize {event}: {reason}")]
    SerializationFailed { event: String, reason: String },
}

impl From<serde_json::Error> for HousieError {
    fn from(e: serde_json::Error) -> Self {
        HousieError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

// Convenience type alias for Results
pub type HousieResult<T> = Result<T, HousieError>;
