//! Booking wizard state.
//!
//! [`BookingStep`] is the source of truth: one variant per wizard position,
//! each carrying only what is known at that point. [`BookingData`] is the
//! flat, all-optional view the screens read and the snapshot stores; it
//! converts back into a step only if it is consistent.

use crate::error::InvalidBookingData;
use crate::pricing::calculate_total_amount;
use crate::types::{
    BookingConfirmation, BookingId, Money, MovieSummary, PaymentMethod, PaymentReceipt, SeatCode,
    SeatLease, Showtime, ShowtimeId, SnackSelection,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Flat view
// ============================================================================

/// Everything the customer has chosen so far, flattened
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingData {
    /// Movie of the chosen showtime
    pub movie: Option<MovieSummary>,
    /// Chosen showtime
    pub showtime: Option<Showtime>,
    /// Seats held (or booked, once confirmed)
    pub seats: Vec<SeatCode>,
    /// Concessions
    pub snacks: Vec<SnackSelection>,
    /// Per-seat price of the showtime
    pub ticket_price: Option<Money>,
    /// Client correlation token
    pub booking_id: Option<BookingId>,
    /// Method of a charge that is in flight
    pub payment_method: Option<PaymentMethod>,
    /// Receipt of a settled charge
    pub payment: Option<PaymentReceipt>,
    /// Server record of the finished booking
    pub confirmation: Option<BookingConfirmation>,
    /// When the server releases the held seats
    pub lock_expires_at: Option<DateTime<Utc>>,
    /// The customer went back from payment; `seats` are still held and
    /// should be re-selected on the seat page
    pub returning_from_payment: bool,
}

/// Partial update for [`BookingData::apply`]; `None` leaves a field alone
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(clippy::option_option)] // outer: "touch this field", inner: the new value
pub struct BookingDataPatch {
    /// Replace `movie`
    pub movie: Option<Option<MovieSummary>>,
    /// Replace `showtime`
    pub showtime: Option<Option<Showtime>>,
    /// Replace `seats`
    pub seats: Option<Vec<SeatCode>>,
    /// Replace `snacks`
    pub snacks: Option<Vec<SnackSelection>>,
    /// Replace `ticket_price`
    pub ticket_price: Option<Option<Money>>,
    /// Replace `booking_id`
    pub booking_id: Option<Option<BookingId>>,
    /// Replace `payment_method`
    pub payment_method: Option<Option<PaymentMethod>>,
    /// Replace `payment`
    pub payment: Option<Option<PaymentReceipt>>,
    /// Replace `confirmation`
    pub confirmation: Option<Option<BookingConfirmation>>,
    /// Replace `lock_expires_at`
    pub lock_expires_at: Option<Option<DateTime<Utc>>>,
    /// Replace `returning_from_payment`
    pub returning_from_payment: Option<bool>,
}

impl BookingData {
    /// Shallow-merge `patch` into this record, without any validation
    pub fn apply(&mut self, patch: BookingDataPatch) {
        let BookingDataPatch {
            movie,
            showtime,
            seats,
            snacks,
            ticket_price,
            booking_id,
            payment_method,
            payment,
            confirmation,
            lock_expires_at,
            returning_from_payment,
        } = patch;

        if let Some(movie) = movie {
            self.movie = movie;
        }
        if let Some(showtime) = showtime {
            self.showtime = showtime;
        }
        if let Some(seats) = seats {
            self.seats = seats;
        }
        if let Some(snacks) = snacks {
            self.snacks = snacks;
        }
        if let Some(ticket_price) = ticket_price {
            self.ticket_price = ticket_price;
        }
        if let Some(booking_id) = booking_id {
            self.booking_id = booking_id;
        }
        if let Some(payment_method) = payment_method {
            self.payment_method = payment_method;
        }
        if let Some(payment) = payment {
            self.payment = payment;
        }
        if let Some(confirmation) = confirmation {
            self.confirmation = confirmation;
        }
        if let Some(lock_expires_at) = lock_expires_at {
            self.lock_expires_at = lock_expires_at;
        }
        if let Some(returning) = returning_from_payment {
            self.returning_from_payment = returning;
        }
    }

    /// Amount due for the current selection
    #[must_use]
    pub fn total(&self) -> Money {
        calculate_total_amount(
            &self.seats,
            self.ticket_price.unwrap_or(Money::ZERO),
            &self.snacks,
        )
    }
}

// ============================================================================
// Typed steps
// ============================================================================

/// The showtime a booking is for, and its correlation token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingDraft {
    /// Chosen showtime (carries the movie and the ticket price)
    pub showtime: Showtime,
    /// Client correlation token
    pub booking_id: BookingId,
}

impl BookingDraft {
    /// Per-seat price
    #[must_use]
    pub const fn ticket_price(&self) -> Money {
        self.showtime.price
    }
}

/// Where the customer is in the wizard
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BookingStep {
    /// Nothing chosen yet
    #[default]
    Idle,

    /// A showtime is chosen; seats are being picked
    ShowtimeSelected {
        /// Booking under way
        draft: BookingDraft,
        /// Seats still held from before the customer came back from payment
        resume: Vec<SeatCode>,
    },

    /// The server holds the chosen seats for us
    SeatsLocked {
        /// Booking under way
        draft: BookingDraft,
        /// Held seats
        lease: SeatLease,
    },

    /// Concessions chosen (possibly none)
    SnacksChosen {
        /// Booking under way
        draft: BookingDraft,
        /// Held seats
        lease: SeatLease,
        /// Concessions
        snacks: Vec<SnackSelection>,
    },

    /// The charge has been sent and its outcome is not known yet
    PaymentPending {
        /// Booking under way
        draft: BookingDraft,
        /// Held seats
        lease: SeatLease,
        /// Concessions
        snacks: Vec<SnackSelection>,
        /// How the customer is paying
        method: PaymentMethod,
    },

    /// The customer has paid; the booking record is not created yet
    PaymentSettled {
        /// Booking under way
        draft: BookingDraft,
        /// Held seats
        lease: SeatLease,
        /// Concessions
        snacks: Vec<SnackSelection>,
        /// The charge
        receipt: PaymentReceipt,
    },

    /// Done
    Confirmed {
        /// Booking that was made
        draft: BookingDraft,
        /// Concessions
        snacks: Vec<SnackSelection>,
        /// The charge
        receipt: PaymentReceipt,
        /// Server record
        confirmation: BookingConfirmation,
    },
}

impl BookingStep {
    /// Wire-style name of the step (`SEATS_LOCKED`, ...)
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::ShowtimeSelected { .. } => "SHOWTIME_SELECTED",
            Self::SeatsLocked { .. } => "SEATS_LOCKED",
            Self::SnacksChosen { .. } => "SNACKS_CHOSEN",
            Self::PaymentPending { .. } => "PAYMENT_PENDING",
            Self::PaymentSettled { .. } => "PAYMENT_SETTLED",
            Self::Confirmed { .. } => "CONFIRMED",
        }
    }

    /// The booking under way, if any
    #[must_use]
    pub const fn draft(&self) -> Option<&BookingDraft> {
        match self {
            Self::Idle => None,
            Self::ShowtimeSelected { draft, .. }
            | Self::SeatsLocked { draft, .. }
            | Self::SnacksChosen { draft, .. }
            | Self::PaymentPending { draft, .. }
            | Self::PaymentSettled { draft, .. }
            | Self::Confirmed { draft, .. } => Some(draft),
        }
    }

    /// Chosen showtime, if any
    #[must_use]
    pub fn showtime(&self) -> Option<&Showtime> {
        self.draft().map(|d| &d.showtime)
    }

    /// Current seat lease, if the wizard holds one
    #[must_use]
    pub const fn lease(&self) -> Option<&SeatLease> {
        match self {
            Self::SeatsLocked { lease, .. }
            | Self::SnacksChosen { lease, .. }
            | Self::PaymentPending { lease, .. }
            | Self::PaymentSettled { lease, .. } => Some(lease),
            Self::Idle | Self::ShowtimeSelected { .. } | Self::Confirmed { .. } => None,
        }
    }

    /// Seats the server holds on our behalf and which showtime they are for
    ///
    /// Includes the resume set after going back from payment. Confirmed
    /// seats are sold, not held.
    #[must_use]
    pub fn held_seats(&self) -> Option<(ShowtimeId, &[SeatCode])> {
        let seats: &[SeatCode] = match self {
            Self::ShowtimeSelected { resume, .. } => resume,
            other => &other.lease()?.seats,
        };
        let showtime_id = self.showtime()?.id;
        (!seats.is_empty()).then_some((showtime_id, seats))
    }

    /// Concessions chosen so far
    #[must_use]
    pub fn snacks(&self) -> &[SnackSelection] {
        match self {
            Self::SnacksChosen { snacks, .. }
            | Self::PaymentPending { snacks, .. }
            | Self::PaymentSettled { snacks, .. }
            | Self::Confirmed { snacks, .. } => snacks,
            Self::Idle | Self::ShowtimeSelected { .. } | Self::SeatsLocked { .. } => &[],
        }
    }

    /// Settled charge, if any
    #[must_use]
    pub const fn receipt(&self) -> Option<&PaymentReceipt> {
        match self {
            Self::PaymentSettled { receipt, .. } | Self::Confirmed { receipt, .. } => Some(receipt),
            _ => None,
        }
    }

    /// Server booking record, once confirmed
    #[must_use]
    pub const fn confirmation(&self) -> Option<&BookingConfirmation> {
        match self {
            Self::Confirmed { confirmation, .. } => Some(confirmation),
            _ => None,
        }
    }

    /// Flatten into the all-optional view
    #[must_use]
    pub fn data(&self) -> BookingData {
        let Some(draft) = self.draft() else {
            return BookingData::default();
        };

        let mut data = BookingData {
            movie: Some(draft.showtime.movie.clone()),
            showtime: Some(draft.showtime.clone()),
            ticket_price: Some(draft.ticket_price()),
            booking_id: Some(draft.booking_id.clone()),
            snacks: self.snacks().to_vec(),
            payment: self.receipt().cloned(),
            confirmation: self.confirmation().cloned(),
            ..BookingData::default()
        };

        match self {
            Self::ShowtimeSelected { resume, .. } => {
                data.seats.clone_from(resume);
                data.returning_from_payment = !resume.is_empty();
            },
            Self::Confirmed { confirmation, .. } => {
                data.seats.clone_from(&confirmation.seats);
            },
            _ => {},
        }

        if let Some(lease) = self.lease() {
            data.seats.clone_from(&lease.seats);
            data.lock_expires_at = lease.expires_at;
        }
        if let Self::PaymentPending { method, .. } = self {
            data.payment_method = Some(method.clone());
        }

        data
    }
}

fn invalid(reason: impl Into<String>) -> InvalidBookingData {
    InvalidBookingData(reason.into())
}

impl TryFrom<BookingData> for BookingStep {
    type Error = InvalidBookingData;

    fn try_from(data: BookingData) -> Result<Self, Self::Error> {
        let Some(showtime) = data.showtime else {
            let empty = data.movie.is_none()
                && data.seats.is_empty()
                && data.snacks.is_empty()
                && data.ticket_price.is_none()
                && data.booking_id.is_none()
                && data.payment_method.is_none()
                && data.payment.is_none()
                && data.confirmation.is_none()
                && data.lock_expires_at.is_none()
                && !data.returning_from_payment;
            return if empty {
                Ok(Self::Idle)
            } else {
                Err(invalid("a booking needs a showtime before anything else"))
            };
        };

        if data.movie.as_ref().is_some_and(|m| *m != showtime.movie) {
            return Err(invalid("movie does not match the showtime"));
        }
        if data.ticket_price.is_some_and(|p| p != showtime.price) {
            return Err(invalid("ticket price does not match the showtime"));
        }
        let Some(booking_id) = data.booking_id else {
            return Err(invalid("booking id is missing"));
        };

        let mut unique = HashSet::new();
        if !data.seats.iter().all(|s| unique.insert(s)) {
            return Err(invalid("a seat is listed twice"));
        }
        if data.snacks.iter().any(|s| s.quantity == 0) {
            return Err(invalid("snack quantities must be positive"));
        }

        let draft = BookingDraft {
            showtime,
            booking_id,
        };
        let has_progress = !data.snacks.is_empty()
            || data.payment_method.is_some()
            || data.payment.is_some()
            || data.confirmation.is_some();

        if data.returning_from_payment || data.seats.is_empty() {
            if has_progress {
                return Err(invalid("snacks or payment without held seats"));
            }
            if data.returning_from_payment && data.seats.is_empty() {
                return Err(invalid("returning from payment without seats to resume"));
            }
            return Ok(Self::ShowtimeSelected {
                draft,
                resume: data.seats,
            });
        }

        let lease = SeatLease {
            seats: data.seats,
            expires_at: data.lock_expires_at,
        };
        let snacks = data.snacks;

        match (data.payment_method, data.payment, data.confirmation) {
            (None, None, None) if snacks.is_empty() => Ok(Self::SeatsLocked { draft, lease }),
            (None, None, None) => Ok(Self::SnacksChosen {
                draft,
                lease,
                snacks,
            }),
            (Some(method), None, None) => Ok(Self::PaymentPending {
                draft,
                lease,
                snacks,
                method,
            }),
            (None, Some(receipt), None) => Ok(Self::PaymentSettled {
                draft,
                lease,
                snacks,
                receipt,
            }),
            (None, Some(receipt), Some(confirmation)) => {
                if confirmation.seats != lease.seats {
                    return Err(invalid("confirmed seats differ from the booking"));
                }
                Ok(Self::Confirmed {
                    draft,
                    snacks,
                    receipt,
                    confirmation,
                })
            },
            (_, None, Some(_)) => Err(invalid("a confirmed booking needs a payment")),
            (Some(_), Some(_), _) => Err(invalid("a payment cannot be both pending and settled")),
        }
    }
}

// ============================================================================
// Wizard state
// ============================================================================

/// Wizard state held by the store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingState {
    /// Current step
    pub step: BookingStep,
    /// Why the last action was refused or failed, if it was
    pub last_error: Option<String>,
    /// Bumped on every accepted step change; orders snapshot writes
    pub revision: u64,
}

impl BookingState {
    /// Flat view of the current step
    #[must_use]
    pub fn data(&self) -> BookingData {
        self.step.data()
    }

    /// Total due for the current step
    #[must_use]
    pub fn total(&self) -> Money {
        self.step.draft().map_or(Money::ZERO, |draft| {
            let seats: &[SeatCode] = match &self.step {
                BookingStep::Confirmed { confirmation, .. } => &confirmation.seats,
                BookingStep::ShowtimeSelected { resume, .. } => resume,
                step => step.lease().map(|l| l.seats.as_slice()).unwrap_or_default(),
            };
            calculate_total_amount(seats, draft.ticket_price(), self.step.snacks())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::test_support::{seats, showtime};
    use crate::types::SnackId;
    use marquee_testing::test_epoch;

    fn draft() -> BookingDraft {
        BookingDraft {
            showtime: showtime(1),
            booking_id: BookingId::from_timestamp(test_epoch()),
        }
    }

    fn lease(codes: &[&str]) -> SeatLease {
        SeatLease {
            seats: seats(codes),
            expires_at: Some(test_epoch() + chrono::Duration::minutes(5)),
        }
    }

    fn combo(quantity: u32) -> SnackSelection {
        SnackSelection {
            id: SnackId::new(3),
            name: "Popcorn combo".to_string(),
            quantity,
            price: Money::new(60_000),
        }
    }

    fn receipt() -> PaymentReceipt {
        PaymentReceipt {
            transaction_id: "TX-000001".to_string(),
            amount: Money::new(300_000),
            method: PaymentMethod::BankTransfer,
            paid_at: test_epoch(),
        }
    }

    fn every_step() -> Vec<BookingStep> {
        vec![
            BookingStep::Idle,
            BookingStep::ShowtimeSelected {
                draft: draft(),
                resume: vec![],
            },
            BookingStep::ShowtimeSelected {
                draft: draft(),
                resume: seats(&["A1"]),
            },
            BookingStep::SeatsLocked {
                draft: draft(),
                lease: lease(&["A1", "A2"]),
            },
            BookingStep::SnacksChosen {
                draft: draft(),
                lease: lease(&["A1", "A2"]),
                snacks: vec![combo(2)],
            },
            BookingStep::PaymentPending {
                draft: draft(),
                lease: lease(&["A1", "A2"]),
                snacks: vec![combo(2)],
                method: PaymentMethod::BankTransfer,
            },
            BookingStep::PaymentSettled {
                draft: draft(),
                lease: lease(&["A1", "A2"]),
                snacks: vec![combo(2)],
                receipt: receipt(),
            },
            BookingStep::Confirmed {
                draft: draft(),
                snacks: vec![combo(2)],
                receipt: receipt(),
                confirmation: BookingConfirmation {
                    booking_ref: "MQ-000001".to_string(),
                    booking_id: draft().booking_id,
                    seats: seats(&["A1", "A2"]),
                    total: Money::new(300_000),
                    created_at: test_epoch(),
                },
            },
        ]
    }

    #[test]
    fn every_step_survives_flattening() {
        for step in every_step() {
            assert_eq!(
                BookingStep::try_from(step.data()),
                Ok(step.clone()),
                "{} should convert back",
                step.name()
            );
        }
    }

    #[test]
    fn flat_view_survives_json() {
        for step in every_step() {
            let json = serde_json::to_string(&step.data()).unwrap_or_default();
            let back: Result<BookingData, _> = serde_json::from_str(&json);
            assert_eq!(back.ok(), Some(step.data()));
        }
    }

    #[test]
    fn seats_without_showtime_are_rejected() {
        let data = BookingData {
            seats: seats(&["A1"]),
            ..BookingData::default()
        };
        assert!(BookingStep::try_from(data).is_err());
    }

    #[test]
    fn snacks_without_seats_are_rejected() {
        let mut data = BookingStep::ShowtimeSelected {
            draft: draft(),
            resume: vec![],
        }
        .data();
        data.snacks = vec![combo(1)];
        assert!(BookingStep::try_from(data).is_err());
    }

    #[test]
    fn mismatched_price_is_rejected() {
        let mut data = every_step()[3].data();
        data.ticket_price = Some(Money::new(1));
        assert!(BookingStep::try_from(data).is_err());
    }

    #[test]
    fn duplicate_seats_are_rejected() {
        let mut data = every_step()[3].data();
        data.seats = seats(&["A1", "A1"]);
        assert!(BookingStep::try_from(data).is_err());
    }

    #[test]
    fn apply_is_a_shallow_merge() {
        let mut data = every_step()[3].data();
        data.apply(BookingDataPatch {
            snacks: Some(vec![combo(1)]),
            lock_expires_at: Some(None),
            ..BookingDataPatch::default()
        });

        assert_eq!(data.snacks, vec![combo(1)]);
        assert_eq!(data.lock_expires_at, None);
        assert_eq!(data.seats, seats(&["A1", "A2"]));
        assert!(data.showtime.is_some());
    }

    #[test]
    fn apply_does_not_validate() {
        let mut data = BookingData::default();
        data.apply(BookingDataPatch {
            seats: Some(seats(&["C4"])),
            ..BookingDataPatch::default()
        });
        assert_eq!(data.seats, seats(&["C4"]));
        assert!(BookingStep::try_from(data).is_err());
    }

    #[test]
    fn held_seats_cover_resume_and_lease_but_not_sold_seats() {
        let steps = every_step();
        assert_eq!(steps[0].held_seats(), None);
        assert_eq!(steps[1].held_seats(), None);
        assert_eq!(
            steps[2].held_seats(),
            Some((ShowtimeId::new(1), seats(&["A1"]).as_slice()))
        );
        assert!(steps[6].held_seats().is_some());
        assert_eq!(steps[7].held_seats(), None);
    }

    #[test]
    fn total_counts_seats_and_snacks() {
        let state = BookingState {
            step: every_step()[4].clone(),
            ..BookingState::default()
        };
        assert_eq!(state.total(), Money::new(300_000));
        assert_eq!(state.data().total(), Money::new(300_000));
        assert_eq!(BookingState::default().total(), Money::ZERO);
    }

    #[test]
    fn total_agrees_with_the_flat_view() {
        for step in every_step() {
            let name = step.name();
            let state = BookingState {
                step,
                ..BookingState::default()
            };
            assert_eq!(state.total(), state.data().total(), "{name}");
        }

        let resuming = BookingState {
            step: every_step()[2].clone(),
            ..BookingState::default()
        };
        assert!(resuming.total() > Money::ZERO);
    }
}
