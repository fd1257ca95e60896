//! The seat page: load the seat map, pick seats, lock them.

pub mod actions;
pub mod reducer;
pub mod state;

pub use actions::SeatAction;
pub use reducer::SeatSelectionReducer;
pub use state::{SeatPhase, SeatSelectionState};
