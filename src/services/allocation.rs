//! allocation.rs
//!
//! Chooses which free seats satisfy a booking request. Pure: it works on a
//! snapshot of free seats and never touches the store.
//!
//! Priority, first success wins:
//! 1. **Single row**: the lowest-numbered row with enough free seats gives its
//!    lowest-numbered seats.
//! 2. **Row span**: windows of adjacent rows are filled greedily front to
//!    back; the window with the smallest row span wins, ties go to the
//!    earliest starting row.
//! 3. **Nearest**: the first free seats in (row, seat) order, ignoring rows.

use crate::error::BookingError;
use crate::models::{RowAvailability, SeatId, SeatLocation};

/// Which rule produced an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SingleRow,
    RowSpan { span: i32 },
    Nearest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub strategy: Strategy,
    /// Ordered by (row, seat).
    pub seats: Vec<SeatLocation>,
}

impl Allocation {
    pub fn seat_ids(&self) -> Vec<SeatId> {
        self.seats.iter().map(|seat| seat.id).collect()
    }
}

/// Picks `requested` seats out of `rows`.
///
/// Rows and seats may arrive in any order and empty rows are ignored, so the
/// result depends only on the set of free seats.
pub fn allocate(rows: &[RowAvailability], requested: usize) -> Result<Allocation, BookingError> {
    if requested == 0 {
        return Err(BookingError::InvalidRequest("at least one seat must be requested".to_string()));
    }

    let rows = normalize(rows);
    let available: usize = rows.iter().map(|row| row.len()).sum();
    if available < requested {
        return Err(BookingError::NotEnoughSeats { requested, available });
    }

    if let Some(seats) = single_row(&rows, requested) {
        return Ok(Allocation { strategy: Strategy::SingleRow, seats });
    }

    if let Some((span, seats)) = min_span(&rows, requested) {
        return Ok(Allocation { strategy: Strategy::RowSpan { span }, seats });
    }

    Ok(Allocation {
        strategy: Strategy::Nearest,
        seats: nearest(&rows, requested),
    })
}

/// Non-empty rows ascending by row number, seats ascending by seat number.
fn normalize(rows: &[RowAvailability]) -> Vec<Vec<SeatLocation>> {
    let mut seats: Vec<SeatLocation> = rows.iter().flat_map(|row| row.seats.iter().copied()).collect();
    seats.sort_by_key(SeatLocation::sort_key);
    seats.dedup_by_key(|seat| seat.id);

    let mut grouped: Vec<Vec<SeatLocation>> = Vec::new();
    for seat in seats {
        match grouped.last_mut() {
            Some(row) if row[0].row_number == seat.row_number => row.push(seat),
            _ => grouped.push(vec![seat]),
        }
    }
    grouped
}

fn single_row(rows: &[Vec<SeatLocation>], requested: usize) -> Option<Vec<SeatLocation>> {
    rows.iter()
        .find(|row| row.len() >= requested)
        .map(|row| row[..requested].to_vec())
}

fn min_span(rows: &[Vec<SeatLocation>], requested: usize) -> Option<(i32, Vec<SeatLocation>)> {
    let mut best: Option<(i32, Vec<SeatLocation>)> = None;

    for start in 0..rows.len() {
        let first_row = rows[start][0].row_number;
        let mut taken: Vec<SeatLocation> = Vec::with_capacity(requested);
        let mut previous_row = first_row;

        for row in &rows[start..] {
            let row_number = row[0].row_number;
            // a window only covers physically adjacent rows
            if row_number != first_row && row_number != previous_row + 1 {
                break;
            }
            let needed = requested - taken.len();
            taken.extend(row.iter().take(needed).copied());
            previous_row = row_number;

            if taken.len() == requested {
                let span = row_number - first_row;
                if best.as_ref().map_or(true, |(best_span, _)| span < *best_span) {
                    best = Some((span, taken.clone()));
                }
                break;
            }
        }

        // single_row already failed, so no window can beat a span of 1
        if matches!(best, Some((1, _))) {
            break;
        }
    }

    best
}

fn nearest(rows: &[Vec<SeatLocation>], requested: usize) -> Vec<SeatLocation> {
    rows.iter().flatten().take(requested).copied().collect()
}
