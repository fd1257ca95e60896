//! Wizard actions.

use super::state::{BookingData, BookingDataPatch};
use crate::types::{
    BookingConfirmation, PaymentMethod, PaymentReceipt, SeatLease, Showtime, ShowtimeId,
    SnackSelection,
};

/// Everything that can happen to a booking
///
/// Commands come from the customer; the `*Settled`, `*Created` and `*Failed`
/// variants are produced by effects and fed back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardAction {
    // ========== Commands ==========
    /// Start a booking for `showtime`, abandoning any booking under way
    SelectShowtime {
        /// The showtime chosen
        showtime: Showtime,
    },

    /// The seat page obtained a lease
    SeatsLocked {
        /// Showtime the lease is for
        showtime_id: ShowtimeId,
        /// Seats now held for us
        lease: SeatLease,
    },

    /// Concessions chosen; replaces any earlier choice
    SnacksChosen {
        /// Lines chosen; zero-quantity lines are dropped
        snacks: Vec<SnackSelection>,
    },

    /// Charge the customer
    ProcessPayment {
        /// How to charge
        method: PaymentMethod,
    },

    /// Try `POST /bookings` again after it failed, without charging again
    RetryBookingCreation,

    /// Go back to the seat page, keeping the held seats for re-selection
    ReturnToSeatSelection,

    /// Merge `patch` into the flat view, if the result is still consistent
    UpdateBookingData {
        /// Fields to replace
        patch: BookingDataPatch,
    },

    /// Throw the booking away
    Reset,

    /// The customer signed out; same as [`WizardAction::Reset`]
    Logout,

    /// Reload a persisted snapshot
    Restore {
        /// The snapshot
        data: BookingData,
    },

    // ========== Effect results ==========
    /// The charge went through
    PaymentSettled {
        /// Provider receipt
        receipt: PaymentReceipt,
    },

    /// The charge was refused or never reached the provider
    PaymentFailed {
        /// Reason to show the customer
        message: String,
    },

    /// The booking record exists
    BookingCreated {
        /// Server record
        confirmation: BookingConfirmation,
    },

    /// `POST /bookings` failed after a successful charge
    BookingCreationFailed {
        /// Reason to show the customer
        message: String,
    },

    /// The previous command was refused; the reason is in `last_error`
    Rejected {
        /// Why
        message: String,
    },
}

impl WizardAction {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectShowtime { .. } => "SelectShowtime",
            Self::SeatsLocked { .. } => "SeatsLocked",
            Self::SnacksChosen { .. } => "SnacksChosen",
            Self::ProcessPayment { .. } => "ProcessPayment",
            Self::RetryBookingCreation => "RetryBookingCreation",
            Self::ReturnToSeatSelection => "ReturnToSeatSelection",
            Self::UpdateBookingData { .. } => "UpdateBookingData",
            Self::Reset => "Reset",
            Self::Logout => "Logout",
            Self::Restore { .. } => "Restore",
            Self::PaymentSettled { .. } => "PaymentSettled",
            Self::PaymentFailed { .. } => "PaymentFailed",
            Self::BookingCreated { .. } => "BookingCreated",
            Self::BookingCreationFailed { .. } => "BookingCreationFailed",
            Self::Rejected { .. } => "Rejected",
        }
    }
}
