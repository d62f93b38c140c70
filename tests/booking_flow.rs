//! Booking and cancellation through the coordinator, backed by the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;

use seat_booking::config::BookingConfig;
use seat_booking::error::BookingError;
use seat_booking::models::{BookingId, SeatId, SeatLayout, UserId};
use seat_booking::services::BookingService;
use seat_booking::store::{BookingStore, MemoryStore};

const ALICE: UserId = UserId(1);
const BOB: UserId = UserId(2);

async fn service(rows: Vec<u32>) -> BookingService {
    let store = MemoryStore::with_layout(&SeatLayout::from_rows(rows)).await;
    BookingService::new(Arc::new(store), &BookingConfig::default())
}

fn numbers(seats: &[seat_booking::models::SeatLocation]) -> Vec<i32> {
    seats.iter().map(|s| s.seat_number).collect()
}

async fn free_ids(service: &BookingService) -> HashSet<SeatId> {
    service.list_free_seats().await.unwrap().into_iter().map(|s| s.id).collect()
}

#[tokio::test]
async fn first_booking_takes_front_of_first_row() {
    let service = service(vec![7; 12]).await;

    let receipt = service.create_booking(ALICE, 3).await.unwrap();

    assert_eq!(numbers(&receipt.seats), vec![1, 2, 3]);
    assert!(receipt.seats.iter().all(|s| s.row_number == 1));
    assert_eq!(service.list_booked_seat_numbers().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn lower_row_preferred_when_several_rows_fit() {
    let service = service(vec![7, 7, 7]).await;
    service.create_booking(BOB, 7).await.unwrap();
    service.create_booking(BOB, 2).await.unwrap();

    // row 1: 0 free, row 2: 5 free, row 3: 7 free
    let receipt = service.create_booking(ALICE, 5).await.unwrap();

    assert!(receipt.seats.iter().all(|s| s.row_number == 2));
    assert_eq!(numbers(&receipt.seats), vec![10, 11, 12, 13, 14]);
}

#[tokio::test]
async fn spans_two_adjacent_rows_when_no_row_fits() {
    let service = service(vec![2, 2, 2]).await;

    let receipt = service.create_booking(ALICE, 4).await.unwrap();

    let rows: Vec<i32> = receipt.seats.iter().map(|s| s.row_number).collect();
    assert_eq!(rows, vec![1, 1, 2, 2]);
    assert_eq!(numbers(&receipt.seats), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn not_enough_seats_changes_nothing() {
    let service = service(vec![3]).await;
    let before = free_ids(&service).await;

    let err = service.create_booking(ALICE, 5).await.unwrap_err();

    assert!(matches!(err, BookingError::NotEnoughSeats { requested: 5, available: 3 }));
    assert_eq!(free_ids(&service).await, before);
    assert!(service.list_user_bookings(ALICE).await.unwrap().is_empty());
    assert!(service.list_booked_seat_numbers().await.unwrap().is_empty());
}

#[tokio::test]
async fn seat_count_must_be_between_one_and_seven() {
    let service = service(vec![7; 2]).await;

    for requested in [0, 8, 100] {
        let err = service.create_booking(ALICE, requested).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)), "{requested}");
    }
    assert_eq!(free_ids(&service).await.len(), 14);
}

#[tokio::test]
async fn cancel_returns_exact_seats_to_free_set() {
    let service = service(vec![7, 7]).await;
    service.create_booking(BOB, 2).await.unwrap();
    let before = free_ids(&service).await;

    let receipt = service.create_booking(ALICE, 3).await.unwrap();
    assert_eq!(free_ids(&service).await.len(), before.len() - 3);

    let released = service.cancel_booking(ALICE, receipt.booking_id).await.unwrap();

    assert_eq!(released, receipt.seats);
    assert_eq!(free_ids(&service).await, before);
    assert!(service.list_user_bookings(ALICE).await.unwrap().is_empty());
}

#[tokio::test]
async fn other_users_cannot_cancel() {
    let service = service(vec![7]).await;
    let receipt = service.create_booking(ALICE, 2).await.unwrap();

    let err = service.cancel_booking(BOB, receipt.booking_id).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFoundOrUnauthorized));

    let missing = service.cancel_booking(BOB, BookingId(999)).await.unwrap_err();
    assert!(matches!(missing, BookingError::NotFoundOrUnauthorized));

    let bookings = service.list_user_bookings(ALICE).await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(service.list_booked_seat_numbers().await.unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let service = service(vec![7]).await;
    let receipt = service.create_booking(ALICE, 1).await.unwrap();
    service.cancel_booking(ALICE, receipt.booking_id).await.unwrap();

    // someone else takes the freed seat meanwhile
    let bob = service.create_booking(BOB, 1).await.unwrap();
    assert_eq!(bob.seats, receipt.seats);

    let err = service.cancel_booking(ALICE, receipt.booking_id).await.unwrap_err();
    assert!(matches!(err, BookingError::AlreadyCancelled));
    // bob keeps his seat
    assert_eq!(service.list_booked_seat_numbers().await.unwrap(), vec![1]);
}

#[tokio::test]
async fn listings_ignore_cancelled_bookings() {
    let service = service(vec![7, 7]).await;
    let first = service.create_booking(ALICE, 2).await.unwrap();
    let second = service.create_booking(ALICE, 3).await.unwrap();
    service.cancel_booking(ALICE, first.booking_id).await.unwrap();

    assert_eq!(service.list_booked_seat_numbers().await.unwrap(), vec![3, 4, 5]);

    let bookings = service.list_user_bookings(ALICE).await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].id, second.booking_id);
    assert_eq!(numbers(&bookings[0].seats), vec![3, 4, 5]);
}

#[tokio::test]
async fn user_bookings_are_newest_first() {
    let service = service(vec![7, 7]).await;
    let ids = [
        service.create_booking(ALICE, 1).await.unwrap().booking_id,
        service.create_booking(BOB, 1).await.unwrap().booking_id,
        service.create_booking(ALICE, 2).await.unwrap().booking_id,
    ];

    let listed: Vec<BookingId> = service
        .list_user_bookings(ALICE)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();

    assert_eq!(listed, vec![ids[2], ids[0]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_bookers_never_share_a_seat() {
    let layout = SeatLayout::uniform(80, 7);
    let store = Arc::new(MemoryStore::with_layout(&layout).await);
    let service = BookingService::new(store.clone(), &BookingConfig::default());

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.create_booking(UserId(i % 5 + 1), (i % 7 + 1) as u32).await })
        })
        .collect();

    let mut claimed: Vec<SeatId> = Vec::new();
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(receipt) => claimed.extend(receipt.seats.iter().map(|s| s.id)),
            Err(err) => assert!(matches!(err, BookingError::NotEnoughSeats { .. }), "{err}"),
        }
    }

    let unique: HashSet<SeatId> = claimed.iter().copied().collect();
    assert_eq!(unique.len(), claimed.len(), "a seat was handed out twice");
    assert!(claimed.len() <= 80);

    let booked: Vec<SeatId> = store
        .list_seats()
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.is_booked)
        .map(|s| s.id)
        .collect();
    assert_eq!(booked.into_iter().collect::<HashSet<_>>(), unique);
    assert_eq!(store.list_booked_seat_numbers().await.unwrap().len(), claimed.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancel_and_book_keep_flags_consistent() {
    let store = Arc::new(MemoryStore::with_layout(&SeatLayout::from_rows(vec![4, 4])).await);
    let service = BookingService::new(store.clone(), &BookingConfig::default());
    let mut receipts = Vec::new();
    for user in 1..=4 {
        receipts.push(service.create_booking(UserId(user), 2).await.unwrap());
    }

    let mut handles = Vec::new();
    for (index, receipt) in receipts.iter().enumerate() {
        let cancel = service.clone();
        let user = UserId(index as i64 + 1);
        let booking = receipt.booking_id;
        handles.push(tokio::spawn(async move { cancel.cancel_booking(user, booking).await.map(|_| ()) }));

        let book = service.clone();
        handles.push(tokio::spawn(async move { book.create_booking(UserId(9), 1).await.map(|_| ()) }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(BookingError::NotEnoughSeats { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let booked_flags: HashSet<i32> = store
        .list_seats()
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.is_booked)
        .map(|s| s.seat_number)
        .collect();
    let held: HashSet<i32> = store.list_booked_seat_numbers().await.unwrap().into_iter().collect();
    assert_eq!(booked_flags, held);
    assert!(service.list_user_bookings(UserId(1)).await.unwrap().is_empty());
}
