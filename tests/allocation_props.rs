use std::collections::HashSet;

use proptest::prelude::*;
use seat_booking::error::BookingError;
use seat_booking::models::{group_by_row, RowAvailability, SeatId, SeatLocation};
use seat_booking::services::allocation::{allocate, Strategy as Rule};

/// A hall where each row has up to 7 seats and each seat is free or not.
/// Seat numbers run globally from 1, the same way provisioning assigns them.
fn free_seats() -> impl Strategy<Value = Vec<SeatLocation>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), 1..=7), 1..=12).prop_map(|rows| {
        let mut seats = Vec::new();
        let mut number = 0;
        for (row_index, row) in rows.iter().enumerate() {
            for free in row {
                number += 1;
                if *free {
                    seats.push(SeatLocation {
                        id: SeatId(number as i64 * 10),
                        row_number: row_index as i32 + 1,
                        seat_number: number,
                    });
                }
            }
        }
        seats
    })
}

proptest! {
    #[test]
    fn picks_exactly_the_requested_free_seats(seats in free_seats(), requested in 1usize..=7) {
        let rows = group_by_row(seats.clone());
        match allocate(&rows, requested) {
            Ok(allocation) => {
                prop_assert_eq!(allocation.seats.len(), requested);

                let free: HashSet<SeatId> = seats.iter().map(|s| s.id).collect();
                let chosen: HashSet<SeatId> = allocation.seats.iter().map(|s| s.id).collect();
                prop_assert_eq!(chosen.len(), requested, "duplicate seat in allocation");
                prop_assert!(chosen.is_subset(&free));

                let keys: Vec<_> = allocation.seats.iter().map(SeatLocation::sort_key).collect();
                let mut sorted = keys.clone();
                sorted.sort();
                prop_assert_eq!(keys, sorted);
            }
            Err(BookingError::NotEnoughSeats { requested: r, available }) => {
                prop_assert_eq!(r, requested);
                prop_assert_eq!(available, seats.len());
                prop_assert!(seats.len() < requested);
            }
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
    }

    #[test]
    fn input_order_does_not_matter(seats in free_seats(), requested in 1usize..=7) {
        let ordered = allocate(&group_by_row(seats.clone()), requested);

        // one row per seat, in reverse order
        let scrambled: Vec<RowAvailability> = seats
            .iter()
            .rev()
            .map(|s| RowAvailability { row_number: s.row_number, seats: vec![*s] })
            .collect();
        let shuffled = allocate(&scrambled, requested);

        match (ordered, shuffled) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            (a, b) => prop_assert!(false, "diverged: {:?} vs {:?}", a.is_ok(), b.is_ok()),
        }
    }

    #[test]
    fn single_row_wins_whenever_a_row_fits(seats in free_seats(), requested in 1usize..=7) {
        let rows = group_by_row(seats);
        let fitting_row = rows.iter().find(|r| r.seats.len() >= requested).map(|r| r.row_number);

        if let Some(row_number) = fitting_row {
            let allocation = allocate(&rows, requested).unwrap();
            prop_assert_eq!(allocation.strategy, Rule::SingleRow);
            prop_assert!(allocation.seats.iter().all(|s| s.row_number == row_number));
        }
    }

    #[test]
    fn spans_cover_adjacent_rows_only(seats in free_seats(), requested in 2usize..=7) {
        let rows = group_by_row(seats);
        if let Ok(allocation) = allocate(&rows, requested) {
            if let Rule::RowSpan { span } = allocation.strategy {
                let first = allocation.seats.first().unwrap().row_number;
                let last = allocation.seats.last().unwrap().row_number;
                prop_assert_eq!(last - first, span);
                prop_assert!(span >= 1);

                let used: HashSet<i32> = allocation.seats.iter().map(|s| s.row_number).collect();
                prop_assert_eq!(used.len() as i32, span + 1, "window skipped a row");
            }
        }
    }
}
