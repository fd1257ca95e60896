//! The booking wizard: showtime → seats → snacks → payment.
//!
//! State lives in [`BookingState`]; every transition goes through
//! [`WizardReducer`] as a [`WizardAction`].

pub mod actions;
pub mod reducer;
pub mod state;

pub use actions::WizardAction;
pub use reducer::WizardReducer;
pub use state::{BookingData, BookingDataPatch, BookingDraft, BookingState, BookingStep};
