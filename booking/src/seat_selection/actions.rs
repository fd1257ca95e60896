//! Seat page actions.

use crate::types::{Seat, SeatCode, SeatLease, Showtime, ShowtimeId};

/// What can happen on the seat page
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeatAction {
    /// The page opens for a showtime
    Enter {
        /// Showtime to show
        showtime_id: ShowtimeId,
        /// Seats still held from before going to payment
        resume: Vec<SeatCode>,
    },

    /// Showtime and seat map fetched
    Loaded {
        /// Fetch this answers
        request: u64,
        /// Showtime details
        showtime: Showtime,
        /// Seat map
        seats: Vec<Seat>,
    },

    /// Showtime or seat map could not be fetched
    LoadFailed {
        /// Fetch this answers
        request: u64,
        /// Reason to show
        message: String,
    },

    /// The customer clicked a seat
    ToggleSeat {
        /// Seat clicked
        code: SeatCode,
    },

    /// The customer wants to move on; lock the selection
    Continue,

    /// The server holds the selection
    LockSucceeded {
        /// Showtime the lock is for
        showtime_id: ShowtimeId,
        /// Seats held
        lease: SeatLease,
    },

    /// The server refused the lock
    LockFailed {
        /// Server message
        message: String,
    },

    /// Re-fetch the seat map
    Refresh,

    /// Fresh seat map
    SeatsRefreshed {
        /// Fetch this answers
        request: u64,
        /// Seat map
        seats: Vec<Seat>,
    },

    /// Re-fetching the seat map failed
    RefreshFailed {
        /// Fetch this answers
        request: u64,
        /// Reason to show
        message: String,
    },

    /// The page closes
    Leave,

    /// The previous command was refused
    Rejected {
        /// Why
        message: String,
    },
}
