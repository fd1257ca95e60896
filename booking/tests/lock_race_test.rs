//! Two customers racing for the same seats over one shared inventory

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use marquee_booking::types::{SeatCode, SeatStatus, ShowtimeId};
use marquee_booking::{
    BookingEnvironment, BookingFlow, FlowError, MemorySnapshotStore, NoticeLevel,
    RecordingNotifier, SeatInventory, SnapshotWriter,
};
use marquee_core::environment::Clock;
use marquee_testing::test_clock;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const SHOWTIME: ShowtimeId = ShowtimeId::new(1);

fn seat(raw: &str) -> SeatCode {
    SeatCode::parse(raw).expect("valid seat code")
}

async fn cinema() -> Arc<SeatInventory> {
    SeatInventory::demo(Arc::new(test_clock()), chrono::Duration::seconds(300)).await
}

fn customer(inventory: &Arc<SeatInventory>, session: &str) -> (BookingFlow, RecordingNotifier) {
    let clock: Arc<dyn Clock> = Arc::new(test_clock());
    let notices = RecordingNotifier::new();
    let environment = BookingEnvironment::new(
        Arc::new(inventory.session(session)),
        Arc::new(notices.clone()),
        SnapshotWriter::new(Arc::new(MemorySnapshotStore::new()), session),
        clock,
    );
    (BookingFlow::new(environment, Duration::from_secs(5)), notices)
}

async fn pick(flow: &BookingFlow, codes: &[&str]) {
    flow.open_showtime(SHOWTIME).await.unwrap();
    for code in codes {
        flow.toggle_seat(seat(code)).await.unwrap();
    }
}

#[tokio::test]
async fn exactly_one_customer_gets_a_contested_seat() {
    let inventory = cinema().await;
    let (alice, alice_notices) = customer(&inventory, "alice");
    let (bob, bob_notices) = customer(&inventory, "bob");
    pick(&alice, &["C5"]).await;
    pick(&bob, &["C5"]).await;

    let (alice_result, bob_result) =
        tokio::join!(alice.continue_to_snacks(), bob.continue_to_snacks());

    assert_ne!(
        alice_result.is_ok(),
        bob_result.is_ok(),
        "expected exactly one winner: {alice_result:?} / {bob_result:?}"
    );
    let (winner, loser, loser_result, loser_notices) = if alice_result.is_ok() {
        ("alice", &bob, bob_result, bob_notices)
    } else {
        ("bob", &alice, alice_result, alice_notices)
    };

    match loser_result {
        Err(FlowError::Rejected(message)) => {
            assert_eq!(message, "Seat C5 is being held by another customer");
        },
        other => panic!("loser should be rejected, got {other:?}"),
    }
    assert_eq!(
        inventory.lease_holder(SHOWTIME, &seat("C5")).await.as_deref(),
        Some(winner)
    );
    assert_eq!(loser.booking_state().await.step.name(), "SHOWTIME_SELECTED");
    assert_eq!(loser_notices.at_level(NoticeLevel::Error).len(), 1);
}

#[tokio::test]
async fn partial_overlap_locks_nothing_for_the_loser() {
    let inventory = cinema().await;
    let (alice, _) = customer(&inventory, "alice");
    let (bob, _) = customer(&inventory, "bob");
    pick(&alice, &["D2", "D3"]).await;
    pick(&bob, &["D3", "D4"]).await;

    alice.continue_to_snacks().await.unwrap();
    let result = bob.continue_to_snacks().await;

    assert!(matches!(result, Err(FlowError::Rejected(_))));
    assert_eq!(inventory.lease_holder(SHOWTIME, &seat("D4")).await, None);
    assert_eq!(
        inventory.seat_status(SHOWTIME, &seat("D4")).await,
        Some(SeatStatus::Available)
    );
}

#[tokio::test]
async fn released_seat_goes_to_the_next_customer() {
    let inventory = cinema().await;
    let (alice, _) = customer(&inventory, "alice");
    let (bob, _) = customer(&inventory, "bob");
    pick(&alice, &["B9"]).await;
    pick(&bob, &["B9"]).await;

    assert_ok!(alice.continue_to_snacks().await);
    assert_err!(bob.continue_to_snacks().await);

    alice.reset().await.unwrap();
    let lease = bob.continue_to_snacks().await.unwrap();

    assert_eq!(lease.seats, vec![seat("B9")]);
    assert_eq!(
        inventory.lease_holder(SHOWTIME, &seat("B9")).await.as_deref(),
        Some("bob")
    );
}

#[tokio::test]
async fn a_sold_seat_is_gone_for_everyone() {
    let inventory = cinema().await;
    let (alice, _) = customer(&inventory, "alice");
    let (bob, bob_notices) = customer(&inventory, "bob");
    pick(&alice, &["A9"]).await;
    alice.continue_to_snacks().await.unwrap();
    alice
        .pay(marquee_booking::types::PaymentMethod::BankTransfer)
        .await
        .unwrap();

    bob.open_showtime(SHOWTIME).await.unwrap();
    let selected = bob.toggle_seat(seat("A9")).await.unwrap();

    assert!(selected.is_empty());
    assert_eq!(
        bob_notices.at_level(NoticeLevel::Warning),
        vec!["Seat A9 is already booked".to_string()]
    );
}
