//! Win pattern evaluation
//!
//! Pure checks over a ticket grid and a list of marked numbers. Only marks
//! that are actually on the grid count; duplicates and stray numbers in the
//! marked list are ignored.

use crate::games::types::{TicketGrid, ROWS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, warn};

/// Marks needed for an early five
const EARLY_FIVE_COUNT: usize = 5;

/// Recognized win patterns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WinPattern {
    FullHouse,
    TopLine,
    MiddleLine,
    BottomLine,
    Corners,
    EarlyFive,
}

impl WinPattern {
    pub const ALL: [WinPattern; 6] = [
        WinPattern::FullHouse,
        WinPattern::TopLine,
        WinPattern::MiddleLine,
        WinPattern::BottomLine,
        WinPattern::Corners,
        WinPattern::EarlyFive,
    ];

    /// Parse a pattern name, accepting the row aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "full_house" => Some(WinPattern::FullHouse),
            "top_line" | "first_row" => Some(WinPattern::TopLine),
            "middle_line" | "second_row" => Some(WinPattern::MiddleLine),
            "bottom_line" | "third_row" => Some(WinPattern::BottomLine),
            "corners" => Some(WinPattern::Corners),
            "early_five" => Some(WinPattern::EarlyFive),
            _ => None,
        }
    }

    pub fn is_satisfied(self, grid: &TicketGrid, marked: &[u8]) -> bool {
        match self {
            WinPattern::FullHouse => has_all_numbers(&grid.numbers(), marked),
            WinPattern::TopLine => has_all_numbers(&grid.row_numbers(0), marked),
            WinPattern::MiddleLine => has_all_numbers(&grid.row_numbers(1), marked),
            WinPattern::BottomLine => has_all_numbers(&grid.row_numbers(2), marked),
            WinPattern::Corners => corners(grid)
                .map(|c| has_all_numbers(&c, marked))
                .unwrap_or(false),
            WinPattern::EarlyFive => marked_on_grid(grid, marked) >= EARLY_FIVE_COUNT,
        }
    }
}

impl fmt::Display for WinPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WinPattern::FullHouse => "full_house",
            WinPattern::TopLine => "top_line",
            WinPattern::MiddleLine => "middle_line",
            WinPattern::BottomLine => "bottom_line",
            WinPattern::Corners => "corners",
            WinPattern::EarlyFive => "early_five",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for WinPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown win pattern '{}'", s))
    }
}

/// Evaluate a named pattern. Unknown names are logged and never satisfied.
pub fn check_win(grid: &TicketGrid, marked: &[u8], pattern: &str) -> bool {
    match WinPattern::parse(pattern) {
        Some(p) => p.is_satisfied(grid, marked),
        None => {
            warn!(pattern, "unknown win pattern, treating as not satisfied");
            false
        }
    }
}

/// True when every target number appears in `marked`. An empty target
/// set, such as a blank row on a malformed grid, is never satisfied.
pub fn has_all_numbers(targets: &[u8], marked: &[u8]) -> bool {
    !targets.is_empty() && targets.iter().all(|n| marked.contains(n))
}

/// Distinct marked numbers that are present on the grid
fn marked_on_grid(grid: &TicketGrid, marked: &[u8]) -> usize {
    grid.numbers().iter().filter(|n| marked.contains(n)).count()
}

/// First and last numbers of the top and bottom rows
fn corners(grid: &TicketGrid) -> Option<[u8; 4]> {
    let top = grid.row_numbers(0);
    let bottom = grid.row_numbers(ROWS - 1);

    debug_assert!(
        top.len() >= 2 && bottom.len() >= 2,
        "corner rows need at least two numbers"
    );
    if top.len() < 2 || bottom.len() < 2 {
        error!(
            top = top.len(),
            bottom = bottom.len(),
            "corner rows hold fewer than two numbers"
        );
        return None;
    }

    Some([top[0], top[top.len() - 1], bottom[0], bottom[bottom.len() - 1]])
}
