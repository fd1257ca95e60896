//! # Marquee Testing
//!
//! Testing utilities for the Marquee booking reducers.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - The `ReducerTest` Given-When-Then harness
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use marquee_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(SeatSelectionReducer::new())
//!     .with_env(test_environment())
//!     .given_state(ready_state())
//!     .when_action(SeatSelectionAction::ToggleSeat { code })
//!     .then_state(|state| assert_eq!(state.selected.len(), 1))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use marquee_core::environment::Clock;

pub mod reducer_test;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use marquee_testing::mocks::FixedClock;
    /// use marquee_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same time, so a test can hand one clone to the code
    /// under test and advance another (for example past a seat-lock lease).
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// The instant every test clock starts at (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }
}

/// Helper assertions for effects
pub mod assertions {
    use marquee_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if any effect other than `Effect::None` is present.
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// Parallel and sequential groups are searched too.
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            count_futures(effects) > 0,
            "Expected at least one Future effect, but none found"
        );
    }

    /// Count Future effects, descending into parallel and sequential groups
    #[must_use]
    pub fn count_futures<A>(effects: &[Effect<A>]) -> usize {
        effects
            .iter()
            .map(|effect| match effect {
                Effect::Future(_) => 1,
                Effect::Parallel(inner) | Effect::Sequential(inner) => count_futures(inner),
                Effect::None | Effect::Delay { .. } => 0,
            })
            .sum()
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock, test_epoch};
pub use reducer_test::ReducerTest;
