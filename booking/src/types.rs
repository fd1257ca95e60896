//! Domain types for the cinema booking flow.
//!
//! Value objects for money, seats and showtimes, plus the records the
//! backend returns for locks, payments and bookings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a server-issued identifier
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// The raw identifier
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Server identifier of a showtime
    ShowtimeId
);
numeric_id!(
    /// Server identifier of a movie
    MovieId
);
numeric_id!(
    /// Server identifier of a concession item
    SnackId
);

/// Client-generated correlation token for one pass through the wizard
///
/// Not a server identifier: it is derived from the wall clock when a showtime
/// is chosen and only ties the client's requests together.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    /// Build the token from a timestamp (`BK-<unix millis>`)
    #[must_use]
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(format!("BK-{}", at.timestamp_millis()))
    }

    /// The token as sent to the server
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// An amount in whole currency units (VND has no minor unit)
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Create an amount
    #[must_use]
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// The amount in whole units
    #[must_use]
    pub const fn units(self) -> u64 {
        self.0
    }

    /// Multiply by a quantity, saturating on overflow
    #[must_use]
    pub const fn multiply(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as u64))
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        write!(f, "{grouped} ₫")
    }
}

// ============================================================================
// Seats
// ============================================================================

/// Error parsing a seat code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid seat code {0:?}: expected row letters followed by a seat number, e.g. \"A1\"")]
pub struct InvalidSeatCode(pub String);

/// Seat identifier as printed on the ticket ("A1", "AA12")
///
/// Always upper case: one or more ASCII letters for the row, then a positive
/// seat number without leading zeros.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeatCode(String);

impl SeatCode {
    /// Parse and normalise a seat code
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSeatCode`] if the input is not row letters followed by a number.
    pub fn parse(raw: &str) -> Result<Self, InvalidSeatCode> {
        let code = raw.trim().to_ascii_uppercase();
        let split = code
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(code.len());
        let (row, number) = code.split_at(split);

        let valid = !row.is_empty()
            && !number.is_empty()
            && number.chars().all(|c| c.is_ascii_digit())
            && !number.starts_with('0');

        if valid {
            Ok(Self(code))
        } else {
            Err(InvalidSeatCode(raw.to_string()))
        }
    }

    /// The code as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Row letters ("A" for "A12")
    #[must_use]
    pub fn row(&self) -> &str {
        let split = self
            .0
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(self.0.len());
        &self.0[..split]
    }

    /// Seat number within the row (12 for "A12")
    #[must_use]
    pub fn number(&self) -> u32 {
        self.0[self.row().len()..].parse().unwrap_or(0)
    }
}

impl FromStr for SeatCode {
    type Err = InvalidSeatCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SeatCode {
    type Error = InvalidSeatCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SeatCode> for String {
    fn from(code: SeatCode) -> Self {
        code.0
    }
}

impl fmt::Display for SeatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    /// Regular seat
    Standard,
    /// Premium seat
    Vip,
    /// Two-person seat
    Couple,
}

/// Availability as reported by the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// Free to select
    Available,
    /// Held by an in-progress checkout
    Locked,
    /// Sold
    Booked,
}

impl SeatStatus {
    /// Whether a customer may pick this seat
    #[must_use]
    pub const fn is_selectable(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// One seat of a showtime's seat map
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    /// Seat code ("A1")
    pub code: SeatCode,
    /// Row label
    pub row: String,
    /// Column number within the row
    pub column: u32,
    /// Seat kind
    #[serde(rename = "type")]
    pub seat_type: SeatType,
    /// Current status
    pub status: SeatStatus,
}

impl Seat {
    /// Build an available standard seat from its code
    #[must_use]
    pub fn standard(code: SeatCode) -> Self {
        Self {
            row: code.row().to_string(),
            column: code.number(),
            code,
            seat_type: SeatType::Standard,
            status: SeatStatus::Available,
        }
    }
}

// ============================================================================
// Catalogue
// ============================================================================

/// Snapshot of the movie a showtime belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    /// Movie id
    pub id: MovieId,
    /// Title
    pub title: String,
    /// Poster image URL
    #[serde(default)]
    pub poster_url: Option<String>,
}

/// A screening of a movie in a hall
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    /// Showtime id
    pub id: ShowtimeId,
    /// Movie being screened
    pub movie: MovieSummary,
    /// Hall name
    pub hall: String,
    /// Start of the screening
    pub start_time: DateTime<Utc>,
    /// End of the screening
    pub end_time: DateTime<Utc>,
    /// Base price per seat
    pub price: Money,
}

/// A concession line chosen by the customer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnackSelection {
    /// Concession item id
    pub id: SnackId,
    /// Display name
    pub name: String,
    /// How many
    pub quantity: u32,
    /// Unit price
    pub price: Money,
}

impl SnackSelection {
    /// Price times quantity
    #[must_use]
    pub const fn subtotal(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

// ============================================================================
// Locks, payments, bookings
// ============================================================================

/// Seats held for this session, as confirmed by the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLease {
    /// Seats now locked for us
    pub seats: Vec<SeatCode>,
    /// When the server will release the lock on its own, if it says
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SeatLease {
    /// Whether the lease has lapsed at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// How the customer pays
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Credit or debit card
    #[serde(rename_all = "camelCase")]
    Card {
        /// Last four digits, for the receipt
        last_four: String,
    },
    /// Wallet app (MoMo, ZaloPay, ...)
    #[serde(rename = "E_WALLET")]
    EWallet {
        /// Wallet provider
        provider: String,
    },
    /// Bank transfer
    BankTransfer,
}

/// Result of a successful charge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// Payment provider transaction id
    pub transaction_id: String,
    /// Amount charged
    pub amount: Money,
    /// Method used
    pub method: PaymentMethod,
    /// When the charge settled
    pub paid_at: DateTime<Utc>,
}

/// The server's record of a completed booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    /// Server booking reference
    pub booking_ref: String,
    /// Client correlation token the booking was created with
    pub booking_id: BookingId,
    /// Booked seats
    pub seats: Vec<SeatCode>,
    /// Total charged
    pub total: Money,
    /// When the server recorded it
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> SeatCode {
        match SeatCode::parse(raw) {
            Ok(code) => code,
            Err(e) => unreachable!("{e}"),
        }
    }

    #[test]
    fn seat_code_normalises_case() {
        let seat = code(" b12 ");
        assert_eq!(seat.as_str(), "B12");
        assert_eq!(seat.row(), "B");
        assert_eq!(seat.number(), 12);
    }

    #[test]
    fn seat_code_accepts_double_letter_rows() {
        let seat = code("AA3");
        assert_eq!(seat.row(), "AA");
        assert_eq!(seat.number(), 3);
    }

    #[test]
    fn seat_code_rejects_malformed_input() {
        for raw in ["", "A", "12", "A0", "A01", "1A", "A1B", "Ä1", "A-1"] {
            assert!(SeatCode::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn seat_code_deserialises_through_validation() {
        let parsed: Result<SeatCode, _> = serde_json::from_str("\"c7\"");
        assert_eq!(parsed.ok(), Some(code("C7")));
        let bad: Result<SeatCode, _> = serde_json::from_str("\"7C\"");
        assert!(bad.is_err());
    }

    #[test]
    fn seat_wire_format_uses_type_key() {
        let json = r#"{"code":"A1","row":"A","column":1,"type":"VIP","status":"LOCKED"}"#;
        let seat: Result<Seat, _> = serde_json::from_str(json);
        let Ok(seat) = seat else {
            unreachable!("seat should parse");
        };
        assert_eq!(seat.seat_type, SeatType::Vip);
        assert_eq!(seat.status, SeatStatus::Locked);
        assert!(!seat.status.is_selectable());
    }

    #[test]
    fn money_display_groups_thousands() {
        assert_eq!(Money::new(390_000).to_string(), "390,000 ₫");
        assert_eq!(Money::new(900).to_string(), "900 ₫");
        assert_eq!(Money::new(1_000_000).to_string(), "1,000,000 ₫");
    }

    #[test]
    fn money_multiply_saturates() {
        assert_eq!(Money::new(u64::MAX).multiply(2), Money::new(u64::MAX));
        assert_eq!(Money::new(60_000).multiply(2), Money::new(120_000));
    }

    #[test]
    fn booking_id_uses_millis() {
        let at = DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap_or_default();
        assert_eq!(BookingId::from_timestamp(at).as_str(), "BK-1700000000123");
    }

    #[test]
    fn lease_expiry() {
        let now = Utc::now();
        let open = SeatLease {
            seats: vec![],
            expires_at: None,
        };
        let lapsed = SeatLease {
            seats: vec![],
            expires_at: Some(now),
        };
        assert!(!open.is_expired(now));
        assert!(lapsed.is_expired(now));
    }

    #[test]
    fn payment_method_wire_format() {
        let json = serde_json::to_value(PaymentMethod::EWallet {
            provider: "MOMO".to_string(),
        })
        .unwrap_or_default();
        assert_eq!(json["type"], "E_WALLET");
        assert_eq!(json["provider"], "MOMO");
    }
}
