//! Marquee - cinema booking flow
//!
//! A customer picks a showtime, chooses seats, adds snacks and pays. Seats
//! are a shared resource: they are locked on the server before payment, and
//! every path out of the flow releases the lock or leaves it to lapse.
//!
//! - **Two reducers**: the booking wizard and the seat page, each run by a
//!   `marquee_runtime::Store`
//! - **Typed steps**: a booking cannot hold snacks before seats, or seats
//!   before a showtime
//! - **Server-owned leases**: locks carry an expiry that payment respects
//! - **Snapshots**: the wizard persists its flat view after every step
//!
//! # Architecture
//!
//! ```text
//!        customer gestures
//!               │
//!               ▼
//!        ┌─────────────┐
//!        │ BookingFlow │
//!        └─────────────┘
//!          │         │
//!          ▼         ▼
//!   ┌──────────┐ ┌───────────┐
//!   │  Wizard  │ │ Seat page │   reducers + effects
//!   └──────────┘ └───────────┘
//!          │         │
//!          ▼         ▼
//!   ┌───────────────────────┐
//!   │      BookingApi       │   HTTP or in-memory
//!   └───────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod environment;
pub mod error;
pub mod flow;
pub mod notify;
pub mod pricing;
pub mod seat_selection;
pub mod snapshot;
pub mod types;
pub mod wizard;

pub use api::{BookingApi, HttpBookingApi, InMemoryBookingApi, SeatInventory};
pub use config::Config;
pub use environment::BookingEnvironment;
pub use error::{ApiError, ConfigError, FlowError, SnapshotError};
pub use flow::BookingFlow;
pub use notify::{Notice, NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, SnapshotWriter};
pub use wizard::{BookingData, BookingState, BookingStep, WizardAction};
