use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct SeatId(pub i64);

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A seat together with its booked flag, as shown on the seat map.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub row_number: i32,
    pub seat_number: i32,
    pub is_booked: bool,
}

impl Seat {
    pub fn location(&self) -> SeatLocation {
        SeatLocation {
            id: self.id,
            row_number: self.row_number,
            seat_number: self.seat_number,
        }
    }
}

/// Where a seat is, without its booking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SeatLocation {
    pub id: SeatId,
    pub row_number: i32,
    pub seat_number: i32,
}

impl SeatLocation {
    pub fn sort_key(&self) -> (i32, i32) {
        (self.row_number, self.seat_number)
    }
}

/// Free seats of one row, ordered by seat number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowAvailability {
    pub row_number: i32,
    pub seats: Vec<SeatLocation>,
}

/// Groups free seats by row. Output rows ascend by row number and each row's
/// seats ascend by seat number, whatever the input order.
pub fn group_by_row(mut seats: Vec<SeatLocation>) -> Vec<RowAvailability> {
    seats.sort_by_key(SeatLocation::sort_key);

    let mut rows: Vec<RowAvailability> = Vec::new();
    for seat in seats {
        match rows.last_mut() {
            Some(row) if row.row_number == seat.row_number => row.seats.push(seat),
            _ => rows.push(RowAvailability {
                row_number: seat.row_number,
                seats: vec![seat],
            }),
        }
    }
    rows
}

/// Shape of the seat inventory: how many seats each row holds, front to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatLayout {
    rows: Vec<u32>,
}

impl SeatLayout {
    pub fn from_rows(rows: Vec<u32>) -> Self {
        Self {
            rows: rows.into_iter().filter(|count| *count > 0).collect(),
        }
    }

    /// `total` seats packed `per_row` to a row; the last row takes the remainder.
    pub fn uniform(total: u32, per_row: u32) -> Self {
        if per_row == 0 {
            return Self { rows: Vec::new() };
        }
        let mut rows = vec![per_row; (total / per_row) as usize];
        if total % per_row != 0 {
            rows.push(total % per_row);
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    pub fn total_seats(&self) -> u32 {
        self.rows.iter().sum()
    }

    /// `(row_number, seat_number)` for every seat. Seat numbers run globally
    /// from 1 across the whole inventory.
    pub fn positions(&self) -> Vec<(i32, i32)> {
        let mut positions = Vec::with_capacity(self.total_seats() as usize);
        let mut seat_number = 0;
        for (index, count) in self.rows.iter().enumerate() {
            let row_number = index as i32 + 1;
            for _ in 0..*count {
                seat_number += 1;
                positions.push((row_number, seat_number));
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(id: i64, row: i32, number: i32) -> SeatLocation {
        SeatLocation { id: SeatId(id), row_number: row, seat_number: number }
    }

    #[test]
    fn uniform_layout_puts_remainder_in_last_row() {
        let layout = SeatLayout::uniform(80, 7);
        assert_eq!(layout.rows().len(), 12);
        assert_eq!(layout.rows()[11], 3);
        assert_eq!(layout.total_seats(), 80);
    }

    #[test]
    fn uniform_layout_without_remainder() {
        let layout = SeatLayout::uniform(14, 7);
        assert_eq!(layout.rows(), &[7, 7]);
    }

    #[test]
    fn positions_number_seats_globally() {
        let layout = SeatLayout::from_rows(vec![2, 0, 3]);
        assert_eq!(
            layout.positions(),
            vec![(1, 1), (1, 2), (2, 3), (2, 4), (2, 5)]
        );
    }

    #[test]
    fn group_by_row_sorts_rows_and_seats() {
        let rows = group_by_row(vec![loc(5, 2, 9), loc(1, 1, 2), loc(4, 2, 8), loc(2, 1, 1)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[0].seats, vec![loc(2, 1, 1), loc(1, 1, 2)]);
        assert_eq!(rows[1].seats, vec![loc(4, 2, 8), loc(5, 2, 9)]);
    }
}
