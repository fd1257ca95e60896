//! Dependencies injected into the booking reducers.

use crate::api::BookingApi;
use crate::notify::Notifier;
use crate::snapshot::SnapshotWriter;
use marquee_core::environment::Clock;
use std::sync::Arc;

/// Default cap on seats per booking
pub const DEFAULT_MAX_SEATS: usize = 8;

/// Everything the wizard and seat-selection reducers reach outside themselves for
///
/// Cloned into every effect, so every field is cheap to clone.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Cinema backend
    pub api: Arc<dyn BookingApi>,
    /// Customer notices
    pub notifier: Arc<dyn Notifier>,
    /// Snapshot persistence for this session
    pub snapshots: SnapshotWriter,
    /// Time source for lease checks and booking tokens
    pub clock: Arc<dyn Clock>,
    /// Most seats one booking may hold
    pub max_seats: usize,
}

impl BookingEnvironment {
    /// Bundle the dependencies, with the default seat cap
    #[must_use]
    pub fn new(
        api: Arc<dyn BookingApi>,
        notifier: Arc<dyn Notifier>,
        snapshots: SnapshotWriter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            notifier,
            snapshots,
            clock,
            max_seats: DEFAULT_MAX_SEATS,
        }
    }

    /// Override the seat cap
    #[must_use]
    pub const fn with_max_seats(mut self, max_seats: usize) -> Self {
        self.max_seats = max_seats;
        self
    }
}

impl std::fmt::Debug for BookingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEnvironment")
            .field("snapshot_key", &self.snapshots.key())
            .field("max_seats", &self.max_seats)
            .finish_non_exhaustive()
    }
}
