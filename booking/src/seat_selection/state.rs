//! Seat page state.

use crate::pricing::PricedSeat;
use crate::types::{Seat, SeatCode, SeatLease, Showtime, ShowtimeId};

/// Where the seat page is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeatPhase {
    /// Not showing any showtime
    #[default]
    Idle,
    /// Fetching the showtime and its seat map
    Loading,
    /// Seat map shown; the customer is choosing
    Ready,
    /// Lock request in flight
    Locking,
    /// The server holds the selection; the wizard owns it from here
    Locked,
    /// The seat map could not be loaded
    LoadFailed,
}

/// State of the seat page
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeatSelectionState {
    /// Current phase
    pub phase: SeatPhase,
    /// Showtime being shown
    pub showtime_id: Option<ShowtimeId>,
    /// Showtime details, once loaded
    pub showtime: Option<Showtime>,
    /// Seat map as last reported by the server
    pub seats: Vec<Seat>,
    /// Seats picked, in seat-map order
    pub selected: Vec<SeatCode>,
    /// Lease obtained on continue
    pub lease: Option<SeatLease>,
    /// Per-seat prices of the leased seats
    pub priced: Vec<PricedSeat>,
    /// Message of the last failure
    pub error: Option<String>,
    /// Seats to re-select once the map has loaded
    pub resume: Vec<SeatCode>,
    /// Id of the latest fetch; replies to older fetches are ignored
    pub request: u64,
}

impl SeatSelectionState {
    /// Seat map entry for `code`
    #[must_use]
    pub fn seat(&self, code: &SeatCode) -> Option<&Seat> {
        self.seats.iter().find(|s| &s.code == code)
    }

    /// Whether `code` is currently picked
    #[must_use]
    pub fn is_selected(&self, code: &SeatCode) -> bool {
        self.selected.contains(code)
    }

    /// Add `code` to the selection at its seat-map position
    pub(crate) fn select(&mut self, code: SeatCode) {
        let rank = |c: &SeatCode| self.seats.iter().position(|s| &s.code == c);
        let at = rank(&code);
        let index = self
            .selected
            .iter()
            .position(|c| rank(c) > at)
            .unwrap_or(self.selected.len());
        self.selected.insert(index, code);
    }
}
