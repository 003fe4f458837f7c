pub mod types;
pub mod ticket_generator;
pub mod win_checker;
pub mod processor;
pub mod ticket_office;

pub use types::*;
pub use ticket_generator::TicketGenerator;
pub use win_checker::{check_win, has_all_numbers, WinPattern};
pub use processor::{CompletedRule, WinOutcome, WinProcessor};
pub use ticket_office::TicketOffice;
