//! In-memory booking backend.
//!
//! A [`SeatInventory`] is the shared server-side state: showtimes, seat maps,
//! leases and sold seats. Each customer talks to it through an
//! [`InMemoryBookingApi`] handle bound to a session id, so two handles over
//! one inventory behave like two browsers racing for the same seats.
//!
//! Lock requests are all-or-nothing and run under a single mutex. A lease
//! expires `lease_ttl` after it was granted (or last renewed); an expired
//! lease is treated as if the seat were free.

use super::{BookingApi, BookingRequest, PaymentRequest};
use crate::error::ApiError;
use crate::types::{
    BookingConfirmation, Money, MovieId, MovieSummary, PaymentReceipt, Seat, SeatCode, SeatLease,
    SeatStatus, SeatType, Showtime, ShowtimeId,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marquee_core::environment::Clock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
struct Lease {
    session: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Screening {
    showtime: Showtime,
    /// Seat layout in display order; `status` here is only the base status
    seats: Vec<Seat>,
    leases: HashMap<SeatCode, Lease>,
    sold: HashSet<SeatCode>,
}

impl Screening {
    fn seat(&self, code: &SeatCode) -> Option<&Seat> {
        self.seats.iter().find(|s| &s.code == code)
    }

    fn active_lease(&self, code: &SeatCode, now: DateTime<Utc>) -> Option<&Lease> {
        self.leases.get(code).filter(|l| l.expires_at > now)
    }

    fn status_of(&self, seat: &Seat, now: DateTime<Utc>) -> SeatStatus {
        if self.sold.contains(&seat.code) || seat.status == SeatStatus::Booked {
            SeatStatus::Booked
        } else if self.active_lease(&seat.code, now).is_some() || seat.status == SeatStatus::Locked
        {
            SeatStatus::Locked
        } else {
            SeatStatus::Available
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        self.leases.retain(|_, lease| lease.expires_at > now);
    }
}

#[derive(Debug, Default)]
struct Ledger {
    screenings: HashMap<ShowtimeId, Screening>,
    payments: u64,
    bookings: u64,
    decline_payments: bool,
    reject_bookings: bool,
}

/// Shared server-side state of the in-memory backend
pub struct SeatInventory {
    clock: Arc<dyn Clock>,
    lease_ttl: Duration,
    ledger: Mutex<Ledger>,
}

impl std::fmt::Debug for SeatInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeatInventory")
            .field("lease_ttl", &self.lease_ttl)
            .finish_non_exhaustive()
    }
}

impl SeatInventory {
    /// Create an empty inventory
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, lease_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            clock,
            lease_ttl,
            ledger: Mutex::new(Ledger::default()),
        })
    }

    /// Inventory with one showtime (id 1) on a 5 × 10 standard hall
    ///
    /// Row E is couple seats; A5 and A6 are already sold.
    pub async fn demo(clock: Arc<dyn Clock>, lease_ttl: Duration) -> Arc<Self> {
        let start = clock.now() + Duration::hours(2);
        let inventory = Self::new(clock, lease_ttl);

        let showtime = Showtime {
            id: ShowtimeId::new(1),
            movie: MovieSummary {
                id: MovieId::new(42),
                title: "The Last Reel".to_string(),
                poster_url: None,
            },
            hall: "Hall 3".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(128),
            price: Money::new(90_000),
        };

        let seats = ["A", "B", "C", "D", "E"]
            .iter()
            .flat_map(|row| (1..=10).map(move |n| format!("{row}{n}")))
            .filter_map(|raw| SeatCode::parse(&raw).ok())
            .map(|code| {
                let mut seat = Seat::standard(code);
                if seat.row == "E" {
                    seat.seat_type = SeatType::Couple;
                }
                if matches!(seat.code.as_str(), "A5" | "A6") {
                    seat.status = SeatStatus::Booked;
                }
                seat
            })
            .collect();

        inventory.add_showtime(showtime, seats).await;
        inventory
    }

    /// Register a showtime and its seat layout
    pub async fn add_showtime(&self, showtime: Showtime, seats: Vec<Seat>) {
        let mut ledger = self.ledger.lock().await;
        ledger.screenings.insert(
            showtime.id,
            Screening {
                showtime,
                seats,
                leases: HashMap::new(),
                sold: HashSet::new(),
            },
        );
    }

    /// A handle that acts on behalf of `session`
    #[must_use]
    pub fn session(self: &Arc<Self>, session: impl Into<String>) -> InMemoryBookingApi {
        InMemoryBookingApi {
            inventory: Arc::clone(self),
            session: session.into(),
        }
    }

    /// Make every subsequent charge fail with 402
    pub async fn decline_payments(&self, decline: bool) {
        self.ledger.lock().await.decline_payments = decline;
    }

    /// Make every subsequent `POST /bookings` fail with 503
    pub async fn reject_bookings(&self, reject: bool) {
        self.ledger.lock().await.reject_bookings = reject;
    }

    /// Current status of one seat as customers see it
    pub async fn seat_status(
        &self,
        showtime_id: ShowtimeId,
        code: &SeatCode,
    ) -> Option<SeatStatus> {
        let now = self.clock.now();
        let ledger = self.ledger.lock().await;
        let screening = ledger.screenings.get(&showtime_id)?;
        screening.seat(code).map(|seat| screening.status_of(seat, now))
    }

    /// Session currently holding an unexpired lease on `code`
    pub async fn lease_holder(&self, showtime_id: ShowtimeId, code: &SeatCode) -> Option<String> {
        let now = self.clock.now();
        let ledger = self.ledger.lock().await;
        ledger
            .screenings
            .get(&showtime_id)?
            .active_lease(code, now)
            .map(|lease| lease.session.clone())
    }

    /// Number of bookings recorded so far
    pub async fn bookings_recorded(&self) -> u64 {
        self.ledger.lock().await.bookings
    }

    /// Number of successful charges so far
    pub async fn payments_recorded(&self) -> u64 {
        self.ledger.lock().await.payments
    }
}

fn showtime_not_found(id: ShowtimeId) -> ApiError {
    ApiError::NotFound(format!("Showtime {id} not found"))
}

const fn conflict(message: String) -> ApiError {
    ApiError::Rejected {
        status: 409,
        message,
    }
}

/// Session-scoped handle over a [`SeatInventory`]
#[derive(Clone, Debug)]
pub struct InMemoryBookingApi {
    inventory: Arc<SeatInventory>,
    session: String,
}

impl InMemoryBookingApi {
    /// Session this handle acts for
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    /// The shared inventory
    #[must_use]
    pub const fn inventory(&self) -> &Arc<SeatInventory> {
        &self.inventory
    }
}

#[async_trait]
impl BookingApi for InMemoryBookingApi {
    async fn showtime(&self, id: ShowtimeId) -> Result<Showtime, ApiError> {
        let ledger = self.inventory.ledger.lock().await;
        ledger
            .screenings
            .get(&id)
            .map(|s| s.showtime.clone())
            .ok_or_else(|| showtime_not_found(id))
    }

    async fn seats(&self, showtime_id: ShowtimeId) -> Result<Vec<Seat>, ApiError> {
        let now = self.inventory.clock.now();
        let ledger = self.inventory.ledger.lock().await;
        let screening = ledger
            .screenings
            .get(&showtime_id)
            .ok_or_else(|| showtime_not_found(showtime_id))?;

        Ok(screening
            .seats
            .iter()
            .map(|seat| Seat {
                status: screening.status_of(seat, now),
                ..seat.clone()
            })
            .collect())
    }

    async fn lock_seats(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatCode],
    ) -> Result<SeatLease, ApiError> {
        let now = self.inventory.clock.now();
        let expires_at = now + self.inventory.lease_ttl;
        let mut ledger = self.inventory.ledger.lock().await;
        let screening = ledger
            .screenings
            .get_mut(&showtime_id)
            .ok_or_else(|| showtime_not_found(showtime_id))?;

        if seats.is_empty() {
            return Err(ApiError::Rejected {
                status: 400,
                message: "No seats requested".to_string(),
            });
        }

        screening.prune(now);

        // Check every seat before touching any lease
        for code in seats {
            let Some(seat) = screening.seat(code) else {
                return Err(ApiError::Rejected {
                    status: 400,
                    message: format!("Seat {code} does not exist"),
                });
            };
            if screening.sold.contains(code) || seat.status == SeatStatus::Booked {
                return Err(conflict(format!("Seat {code} has already been booked")));
            }
            let held_elsewhere = seat.status == SeatStatus::Locked
                || screening
                    .leases
                    .get(code)
                    .is_some_and(|lease| lease.session != self.session);
            if held_elsewhere {
                return Err(conflict(format!("Seat {code} is being held by another customer")));
            }
        }

        for code in seats {
            screening.leases.insert(
                code.clone(),
                Lease {
                    session: self.session.clone(),
                    expires_at,
                },
            );
        }

        tracing::debug!(
            session = %self.session,
            %showtime_id,
            seats = seats.len(),
            %expires_at,
            "Seats leased"
        );

        Ok(SeatLease {
            seats: seats.to_vec(),
            expires_at: Some(expires_at),
        })
    }

    async fn unlock_seats(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatCode],
    ) -> Result<(), ApiError> {
        let mut ledger = self.inventory.ledger.lock().await;
        let screening = ledger
            .screenings
            .get_mut(&showtime_id)
            .ok_or_else(|| showtime_not_found(showtime_id))?;

        // Releasing a seat we do not hold is a no-op
        for code in seats {
            if screening
                .leases
                .get(code)
                .is_some_and(|lease| lease.session == self.session)
            {
                screening.leases.remove(code);
            }
        }

        Ok(())
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentReceipt, ApiError> {
        let now = self.inventory.clock.now();
        let mut ledger = self.inventory.ledger.lock().await;

        if ledger.decline_payments {
            return Err(ApiError::Rejected {
                status: 402,
                message: "Payment was declined".to_string(),
            });
        }
        if request.amount == Money::ZERO {
            return Err(ApiError::Rejected {
                status: 400,
                message: "Nothing to pay".to_string(),
            });
        }

        ledger.payments += 1;
        Ok(PaymentReceipt {
            transaction_id: format!("TX-{:06}", ledger.payments),
            amount: request.amount,
            method: request.method.clone(),
            paid_at: now,
        })
    }

    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, ApiError> {
        let now = self.inventory.clock.now();
        let mut ledger = self.inventory.ledger.lock().await;

        if ledger.reject_bookings {
            return Err(ApiError::Rejected {
                status: 503,
                message: "Booking service is temporarily unavailable".to_string(),
            });
        }

        let screening = ledger
            .screenings
            .get_mut(&request.showtime_id)
            .ok_or_else(|| showtime_not_found(request.showtime_id))?;

        for code in &request.seats {
            let ours = screening
                .active_lease(code, now)
                .is_some_and(|lease| lease.session == self.session);
            if !ours {
                return Err(conflict(format!("The hold on seat {code} has expired")));
            }
        }

        for code in &request.seats {
            screening.leases.remove(code);
            screening.sold.insert(code.clone());
        }

        ledger.bookings += 1;
        let booking_ref = format!("MQ-{:06}", ledger.bookings);
        tracing::info!(session = %self.session, %booking_ref, "Booking recorded");

        Ok(BookingConfirmation {
            booking_ref,
            booking_id: request.booking_id.clone(),
            seats: request.seats.clone(),
            total: request.total,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookingId, PaymentMethod};
    use marquee_testing::{ManualClock, test_epoch};

    fn code(raw: &str) -> SeatCode {
        SeatCode::parse(raw).unwrap_or_else(|e| unreachable!("{e}"))
    }

    const SHOW: ShowtimeId = ShowtimeId::new(1);

    async fn inventory() -> (Arc<SeatInventory>, ManualClock) {
        let clock = ManualClock::new(test_epoch());
        let inventory = SeatInventory::demo(Arc::new(clock.clone()), Duration::minutes(5)).await;
        (inventory, clock)
    }

    fn booking_request(seats: &[&str]) -> BookingRequest {
        BookingRequest {
            booking_id: BookingId::from_timestamp(test_epoch()),
            showtime_id: SHOW,
            seats: seats.iter().map(|s| code(s)).collect(),
            snacks: vec![],
            total: Money::new(90_000),
            transaction_id: "TX-1".to_string(),
        }
    }

    #[tokio::test]
    async fn lock_is_all_or_nothing() {
        let (inventory, _) = inventory().await;
        let alice = inventory.session("alice");
        let bob = inventory.session("bob");

        assert!(alice.lock_seats(SHOW, &[code("B2")]).await.is_ok());

        let result = bob.lock_seats(SHOW, &[code("B1"), code("B2")]).await;
        assert!(matches!(result, Err(ApiError::Rejected { status: 409, .. })));
        assert_eq!(inventory.lease_holder(SHOW, &code("B1")).await, None);
        assert_eq!(
            inventory.lease_holder(SHOW, &code("B2")).await.as_deref(),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn sold_and_unknown_seats_are_refused() {
        let (inventory, _) = inventory().await;
        let api = inventory.session("alice");

        assert!(matches!(
            api.lock_seats(SHOW, &[code("A5")]).await,
            Err(ApiError::Rejected { status: 409, .. })
        ));
        assert!(matches!(
            api.lock_seats(SHOW, &[code("Z9")]).await,
            Err(ApiError::Rejected { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn own_lease_shows_as_locked_and_can_be_renewed() {
        let (inventory, clock) = inventory().await;
        let api = inventory.session("alice");

        let first = api.lock_seats(SHOW, &[code("C3")]).await;
        clock.advance(Duration::minutes(3));
        let renewed = api.lock_seats(SHOW, &[code("C3")]).await;

        let (Ok(first), Ok(renewed)) = (first, renewed) else {
            unreachable!("both locks should succeed");
        };
        assert!(renewed.expires_at > first.expires_at);
        assert_eq!(
            inventory.seat_status(SHOW, &code("C3")).await,
            Some(SeatStatus::Locked)
        );
    }

    #[tokio::test]
    async fn lapsed_lease_frees_the_seat() {
        let (inventory, clock) = inventory().await;
        let alice = inventory.session("alice");
        let bob = inventory.session("bob");

        assert!(alice.lock_seats(SHOW, &[code("D4")]).await.is_ok());
        clock.advance(Duration::minutes(5));

        assert_eq!(
            inventory.seat_status(SHOW, &code("D4")).await,
            Some(SeatStatus::Available)
        );
        assert!(bob.lock_seats(SHOW, &[code("D4")]).await.is_ok());
    }

    #[tokio::test]
    async fn unlock_only_releases_own_leases() {
        let (inventory, _) = inventory().await;
        let alice = inventory.session("alice");
        let bob = inventory.session("bob");

        assert!(alice.lock_seats(SHOW, &[code("B7")]).await.is_ok());
        assert!(bob.unlock_seats(SHOW, &[code("B7")]).await.is_ok());
        assert_eq!(
            inventory.lease_holder(SHOW, &code("B7")).await.as_deref(),
            Some("alice")
        );

        assert!(alice.unlock_seats(SHOW, &[code("B7")]).await.is_ok());
        assert_eq!(inventory.lease_holder(SHOW, &code("B7")).await, None);
    }

    #[tokio::test]
    async fn booking_requires_a_live_lease() {
        let (inventory, clock) = inventory().await;
        let api = inventory.session("alice");

        assert!(api.lock_seats(SHOW, &[code("C1")]).await.is_ok());
        clock.advance(Duration::minutes(6));

        let result = api.create_booking(&booking_request(&["C1"])).await;
        assert!(matches!(result, Err(ApiError::Rejected { status: 409, .. })));
        assert_eq!(inventory.bookings_recorded().await, 0);
    }

    #[tokio::test]
    async fn booking_sells_the_seats() {
        let (inventory, _) = inventory().await;
        let api = inventory.session("alice");

        assert!(api.lock_seats(SHOW, &[code("C1"), code("C2")]).await.is_ok());
        let confirmation = api.create_booking(&booking_request(&["C1", "C2"])).await;
        let Ok(confirmation) = confirmation else {
            unreachable!("booking should succeed: {confirmation:?}");
        };

        assert_eq!(confirmation.booking_ref, "MQ-000001");
        assert_eq!(
            inventory.seat_status(SHOW, &code("C1")).await,
            Some(SeatStatus::Booked)
        );
    }

    #[tokio::test]
    async fn declined_payment_is_rejected() {
        let (inventory, _) = inventory().await;
        inventory.decline_payments(true).await;

        let request = PaymentRequest {
            booking_id: BookingId::from_timestamp(test_epoch()),
            amount: Money::new(90_000),
            method: PaymentMethod::BankTransfer,
            items: vec![],
        };
        let result = inventory.session("alice").process_payment(&request).await;
        assert!(matches!(result, Err(ApiError::Rejected { status: 402, .. })));
        assert_eq!(inventory.payments_recorded().await, 0);
    }
}
