//! REST backend used by the booking flow.
//!
//! The booking flow only ever talks to the backend through [`BookingApi`].
//! Production uses [`HttpBookingApi`]; the demo binary and the tests use the
//! in-memory [`SeatInventory`], which enforces seat leases the way the real
//! backend is expected to.

pub mod http;
pub mod memory;

pub use http::HttpBookingApi;
pub use memory::{InMemoryBookingApi, SeatInventory};

use crate::error::ApiError;
use crate::pricing::LineItem;
use crate::types::{
    BookingConfirmation, BookingId, Money, PaymentMethod, PaymentReceipt, Seat, SeatCode,
    SeatLease, Showtime, ShowtimeId, SnackSelection,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of `POST /seats/lock` and `POST /seats/unlock`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLockRequest {
    /// Showtime the seats belong to
    pub showtime_id: ShowtimeId,
    /// Seats to lock or release
    pub seats: Vec<SeatCode>,
}

/// Body of `POST /payments`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Client correlation token
    pub booking_id: BookingId,
    /// Amount to charge
    pub amount: Money,
    /// How to charge it
    pub method: PaymentMethod,
    /// What is being paid for
    pub items: Vec<LineItem>,
}

/// Body of `POST /bookings`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Client correlation token
    pub booking_id: BookingId,
    /// Showtime booked
    pub showtime_id: ShowtimeId,
    /// Seats booked (must be locked by this session)
    pub seats: Vec<SeatCode>,
    /// Concessions
    pub snacks: Vec<SnackSelection>,
    /// Total charged
    pub total: Money,
    /// Transaction that paid for it
    pub transaction_id: String,
}

/// The endpoints the booking flow consumes
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// `GET /showtimes/:id`
    async fn showtime(&self, id: ShowtimeId) -> Result<Showtime, ApiError>;

    /// `GET /showtimes/:id/seats`
    async fn seats(&self, showtime_id: ShowtimeId) -> Result<Vec<Seat>, ApiError>;

    /// `POST /seats/lock`
    ///
    /// All-or-nothing: either every seat is now held for this session or
    /// none is.
    async fn lock_seats(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatCode],
    ) -> Result<SeatLease, ApiError>;

    /// `POST /seats/unlock`
    async fn unlock_seats(&self, showtime_id: ShowtimeId, seats: &[SeatCode])
    -> Result<(), ApiError>;

    /// `POST /payments`
    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentReceipt, ApiError>;

    /// `POST /bookings`
    async fn create_booking(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingConfirmation, ApiError>;
}
