//! Ticket matrix generation
//!
//! Builds one 3x9 layout in three phases: spread 15 numbers over the nine
//! columns, sample each column's values, then place them into rows so every
//! row ends with exactly five. Only the last phase can dead-end, so only the
//! last phase is retried.

use crate::errors::GenerationError;
use crate::games::types::{
    column_range, TicketGrid, COLUMNS, MAX_PER_COLUMN, NUMBERS_PER_ROW, NUMBERS_PER_TICKET, ROWS,
};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use tracing::{debug, trace, warn};

/// Default row-assignment retry budget
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;

/// Stateless, randomized ticket layout generator
#[derive(Debug, Clone, Copy)]
pub struct TicketGenerator {
    max_attempts: usize,
}

impl TicketGenerator {
    /// Create a generator with a row-assignment retry budget
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Generate a ticket using the thread-local RNG
    pub fn generate(&self) -> Result<TicketGrid, GenerationError> {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Generate a ticket from the supplied RNG
    pub fn generate_with<R: Rng>(&self, rng: &mut R) -> Result<TicketGrid, GenerationError> {
        let counts = distribute_counts(rng);
        let columns = sample_columns(&counts, rng);

        for attempt in 1..=self.max_attempts {
            if let Some(grid) = assign_rows(&columns, rng) {
                grid.validate()?;
                debug!(attempt, "ticket layout generated");
                return Ok(grid);
            }
            trace!(attempt, "row assignment dead-ended, retrying");
        }

        warn!(attempts = self.max_attempts, "ticket generation exhausted its retry budget");
        Err(GenerationError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for TicketGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Every column starts at one number; extra numbers land on random columns
/// that still have room until the total reaches 15.
fn distribute_counts<R: Rng>(rng: &mut R) -> [usize; COLUMNS] {
    let mut counts = [1usize; COLUMNS];
    let mut remaining = NUMBERS_PER_TICKET - COLUMNS;

    while remaining > 0 {
        let column = rng.gen_range(0..COLUMNS);
        if counts[column] < MAX_PER_COLUMN {
            counts[column] += 1;
            remaining -= 1;
        }
    }

    counts
}

/// Distinct values per column, ascending
fn sample_columns<R: Rng>(counts: &[usize; COLUMNS], rng: &mut R) -> [Vec<u8>; COLUMNS] {
    std::array::from_fn(|column| {
        let (min, max) = column_range(column);
        let span = (max - min + 1) as usize;
        let mut values: Vec<u8> = index::sample(rng, span, counts[column])
            .into_iter()
            .map(|offset| min + offset as u8)
            .collect();
        values.sort_unstable();
        values
    })
}

/// One randomized placement pass. Returns `None` when a column finds fewer
/// open rows than it has numbers.
fn assign_rows<R: Rng>(columns: &[Vec<u8>; COLUMNS], rng: &mut R) -> Option<TicketGrid> {
    let mut cells = [[0u8; COLUMNS]; ROWS];
    let mut row_counts = [0usize; ROWS];

    for (column, values) in columns.iter().enumerate() {
        if values.len() == ROWS {
            for (row, &value) in values.iter().enumerate() {
                cells[row][column] = value;
                row_counts[row] += 1;
            }
        }
    }

    let mut order: Vec<usize> = (0..COLUMNS).filter(|&c| columns[c].len() < ROWS).collect();
    order.shuffle(rng);

    for column in order {
        let values = &columns[column];
        let open: Vec<usize> = (0..ROWS)
            .filter(|&row| row_counts[row] < NUMBERS_PER_ROW)
            .collect();
        if open.len() < values.len() {
            return None;
        }

        let mut rows: Vec<usize> = index::sample(rng, open.len(), values.len())
            .into_iter()
            .map(|i| open[i])
            .collect();
        // ascending values go to ascending rows
        rows.sort_unstable();

        for (&row, &value) in rows.iter().zip(values) {
            cells[row][column] = value;
            row_counts[row] += 1;
        }
    }

    if row_counts.iter().all(|&count| count == NUMBERS_PER_ROW) {
        Some(TicketGrid::new(cells))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_tickets_are_valid() {
        let generator = TicketGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let grid = generator.generate_with(&mut rng).expect("generation failed");
            assert_eq!(grid.validate(), Ok(()));
        }
    }

    #[test]
    fn test_distribution_sums_to_fifteen() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let counts = distribute_counts(&mut rng);
            assert_eq!(counts.iter().sum::<usize>(), NUMBERS_PER_TICKET);
            assert!(counts.iter().all(|&c| (1..=MAX_PER_COLUMN).contains(&c)));
        }
    }

    #[test]
    fn test_column_samples_are_sorted_and_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let counts = [3, 3, 3, 1, 1, 1, 1, 1, 1];
        let columns = sample_columns(&counts, &mut rng);

        for (column, values) in columns.iter().enumerate() {
            let (min, max) = column_range(column);
            assert_eq!(values.len(), counts[column]);
            assert!(values.windows(2).all(|w| w[0] < w[1]));
            assert!(values.iter().all(|&v| v >= min && v <= max));
        }
    }

    #[test]
    fn test_zero_budget_reports_exhaustion() {
        let generator = TicketGenerator::new(0);
        match generator.generate() {
            Err(GenerationError::Exhausted { attempts }) => assert_eq!(attempts, 0),
            other => panic!("Expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_full_columns_fill_every_row() {
        let mut rng = StdRng::seed_from_u64(11);
        let counts = [3, 3, 3, 1, 1, 1, 1, 1, 1];
        let columns = sample_columns(&counts, &mut rng);

        let grid = (0..DEFAULT_MAX_ATTEMPTS)
            .find_map(|_| assign_rows(&columns, &mut rng))
            .expect("a placement exists");
        for column in 0..3 {
            assert!((0..ROWS).all(|row| grid.cell(row, column) != Some(0)));
        }
    }
}
