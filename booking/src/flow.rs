//! Coordinator driving the wizard and the seat page together.
//!
//! Each method is one customer gesture. It dispatches to the right store,
//! waits until the step has an outcome, and turns failures into
//! [`FlowError`]s. The stores stay the source of truth; `BookingFlow` holds no
//! state of its own.

use crate::environment::BookingEnvironment;
use crate::error::FlowError;
use crate::seat_selection::{SeatAction, SeatPhase, SeatSelectionReducer, SeatSelectionState};
use crate::types::{
    BookingConfirmation, PaymentMethod, SeatCode, SeatLease, Showtime, ShowtimeId, SnackSelection,
};
use crate::wizard::{BookingData, BookingState, BookingStep, WizardAction, WizardReducer};
use marquee_runtime::Store;
use std::time::Duration;

/// Store running the booking wizard
pub type WizardStore = Store<BookingState, WizardAction, BookingEnvironment, WizardReducer>;

/// Store running the seat page
pub type SeatStore =
    Store<SeatSelectionState, SeatAction, BookingEnvironment, SeatSelectionReducer>;

/// One customer's booking session
pub struct BookingFlow {
    wizard: WizardStore,
    seats: SeatStore,
    timeout: Duration,
}

impl std::fmt::Debug for BookingFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingFlow")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BookingFlow {
    /// Start a session with an empty booking
    #[must_use]
    pub fn new(environment: BookingEnvironment, timeout: Duration) -> Self {
        Self {
            wizard: Store::new(
                BookingState::default(),
                WizardReducer::new(),
                environment.clone(),
            ),
            seats: Store::new(
                SeatSelectionState::default(),
                SeatSelectionReducer::new(),
                environment,
            ),
            timeout,
        }
    }

    /// The wizard store
    #[must_use]
    pub const fn wizard(&self) -> &WizardStore {
        &self.wizard
    }

    /// The seat page store
    #[must_use]
    pub const fn seat_page(&self) -> &SeatStore {
        &self.seats
    }

    /// Send to the wizard and wait for the effects of that action to finish
    async fn dispatch(&self, action: WizardAction) -> Result<(), FlowError> {
        let mut handle = self.wizard.send(action).await?;
        handle.wait_with_timeout(self.timeout).await?;
        Ok(())
    }

    async fn dispatch_seats(&self, action: SeatAction) -> Result<(), FlowError> {
        let mut handle = self.seats.send(action).await?;
        handle.wait_with_timeout(self.timeout).await?;
        Ok(())
    }

    /// Fail with the wizard's last error unless `accepted` holds for its step
    async fn expect_step<F>(&self, accepted: F) -> Result<(), FlowError>
    where
        F: FnOnce(&BookingStep) -> bool,
    {
        self.wizard
            .state(|s| {
                if accepted(&s.step) {
                    Ok(())
                } else {
                    Err(FlowError::Rejected(
                        s.last_error
                            .clone()
                            .unwrap_or_else(|| "The booking is not at that step".to_string()),
                    ))
                }
            })
            .await
    }

    /// Open the seat page for a showtime and record it on the booking
    ///
    /// Coming back from payment for the same showtime resumes the seats that
    /// were held: they are released and re-selected if still free.
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] if the seat map cannot be loaded or the wizard
    /// refuses the showtime; [`FlowError::Store`] on timeout.
    pub async fn open_showtime(&self, showtime_id: ShowtimeId) -> Result<Showtime, FlowError> {
        let (resuming, resume) = self
            .wizard
            .state(|s| match &s.step {
                BookingStep::ShowtimeSelected { draft, resume }
                    if draft.showtime.id == showtime_id =>
                {
                    (true, resume.clone())
                },
                _ => (false, Vec::new()),
            })
            .await;

        let outcome = self
            .seats
            .send_and_wait_for(
                SeatAction::Enter {
                    showtime_id,
                    resume,
                },
                |a| {
                    matches!(a, SeatAction::Loaded { .. } | SeatAction::LoadFailed { .. })
                },
                self.timeout,
            )
            .await?;

        let showtime = match outcome {
            SeatAction::Loaded { showtime, .. } => showtime,
            SeatAction::LoadFailed { message, .. } => return Err(FlowError::Rejected(message)),
            other => {
                return Err(FlowError::Rejected(format!("Unexpected seat page reply: {other:?}")));
            },
        };

        if !resuming {
            self.dispatch(WizardAction::SelectShowtime {
                showtime: showtime.clone(),
            })
            .await?;
            self.expect_step(|step| matches!(step, BookingStep::ShowtimeSelected { .. }))
                .await?;
        }

        tracing::info!(%showtime_id, movie = %showtime.movie.title, "Showtime opened");
        Ok(showtime)
    }

    /// Click a seat; returns the selection afterwards
    ///
    /// # Errors
    ///
    /// [`FlowError::Store`] if the store is shutting down.
    pub async fn toggle_seat(&self, code: SeatCode) -> Result<Vec<SeatCode>, FlowError> {
        self.dispatch_seats(SeatAction::ToggleSeat { code }).await?;
        Ok(self.seats.state(|s| s.selected.clone()).await)
    }

    /// Lock the selection and hand it to the wizard
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] with the validation or server message when
    /// the lock is refused; [`FlowError::Store`] on timeout.
    pub async fn continue_to_snacks(&self) -> Result<SeatLease, FlowError> {
        let outcome = self
            .seats
            .send_and_wait_for(
                SeatAction::Continue,
                |a| {
                    matches!(
                        a,
                        SeatAction::LockSucceeded { .. }
                            | SeatAction::LockFailed { .. }
                            | SeatAction::Rejected { .. }
                    )
                },
                self.timeout,
            )
            .await?;

        let (showtime_id, lease) = match outcome {
            SeatAction::LockSucceeded { showtime_id, lease } => (showtime_id, lease),
            SeatAction::LockFailed { message } | SeatAction::Rejected { message } => {
                return Err(FlowError::Rejected(message));
            },
            other => {
                return Err(FlowError::Rejected(format!("Unexpected seat page reply: {other:?}")));
            },
        };

        self.dispatch(WizardAction::SeatsLocked {
            showtime_id,
            lease: lease.clone(),
        })
        .await?;
        self.expect_step(|step| matches!(step, BookingStep::SeatsLocked { .. }))
            .await?;
        Ok(lease)
    }

    /// Choose concessions (an empty list skips them)
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] if no seats are held yet.
    pub async fn choose_snacks(&self, snacks: Vec<SnackSelection>) -> Result<(), FlowError> {
        self.dispatch(WizardAction::SnacksChosen { snacks }).await?;
        self.expect_step(|step| matches!(step, BookingStep::SnacksChosen { .. }))
            .await
    }

    /// Charge the customer, then create the booking
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] if the payment is refused, the lease has
    /// expired, or the booking could not be created after the charge (the
    /// booking then stays at `PaymentSettled` and [`Self::retry_booking`]
    /// can finish it).
    pub async fn pay(&self, method: PaymentMethod) -> Result<BookingConfirmation, FlowError> {
        let outcome = self
            .wizard
            .send_and_wait_for(
                WizardAction::ProcessPayment { method },
                is_booking_outcome,
                self.timeout,
            )
            .await?;
        booking_outcome(outcome)
    }

    /// Re-issue `POST /bookings` after it failed, without charging again
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] if there is no paid booking or the retry fails.
    pub async fn retry_booking(&self) -> Result<BookingConfirmation, FlowError> {
        let outcome = self
            .wizard
            .send_and_wait_for(
                WizardAction::RetryBookingCreation,
                is_booking_outcome,
                self.timeout,
            )
            .await?;
        booking_outcome(outcome)
    }

    /// Go back from payment to the seat page, re-selecting the held seats
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] if the booking cannot go back from its step or
    /// the seat map fails to load.
    pub async fn back_to_seats(&self) -> Result<Vec<SeatCode>, FlowError> {
        self.dispatch(WizardAction::ReturnToSeatSelection).await?;
        self.expect_step(|step| matches!(step, BookingStep::ShowtimeSelected { .. }))
            .await?;

        let showtime_id = self
            .wizard
            .state(|s| s.step.showtime().map(|st| st.id))
            .await
            .ok_or_else(|| FlowError::Rejected("No showtime selected".to_string()))?;

        self.open_showtime(showtime_id).await?;
        Ok(self.seats.state(|s| s.selected.clone()).await)
    }

    /// Close the seat page, releasing a selection that was never handed over
    ///
    /// # Errors
    ///
    /// [`FlowError::Store`] if the release does not finish in time.
    pub async fn leave_seat_selection(&self) -> Result<(), FlowError> {
        self.dispatch_seats(SeatAction::Leave).await
    }

    /// Throw the booking away and release everything it held
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] while a payment is being charged, or
    /// [`FlowError::Store`] if the releases do not finish in time.
    pub async fn reset(&self) -> Result<(), FlowError> {
        self.discard(WizardAction::Reset).await
    }

    /// Sign out; same effect on the booking as [`Self::reset`]
    ///
    /// # Errors
    ///
    /// [`FlowError::Rejected`] while a payment is being charged, or
    /// [`FlowError::Store`] if the releases do not finish in time.
    pub async fn logout(&self) -> Result<(), FlowError> {
        self.discard(WizardAction::Logout).await
    }

    async fn discard(&self, action: WizardAction) -> Result<(), FlowError> {
        self.dispatch(action).await?;
        self.expect_step(|step| matches!(step, BookingStep::Idle)).await?;
        self.dispatch_seats(SeatAction::Leave).await
    }

    /// Reload the persisted snapshot for this session, if there is one
    ///
    /// # Errors
    ///
    /// [`FlowError::Snapshot`] if the snapshot cannot be read, or
    /// [`FlowError::Rejected`] if it is inconsistent.
    pub async fn restore_from_snapshot(&self) -> Result<Option<BookingData>, FlowError> {
        let snapshot = self.wizard.environment().snapshots.load().await?;

        let Some(data) = snapshot else {
            return Ok(None);
        };

        self.dispatch(WizardAction::Restore { data }).await?;
        let (error, step, data) = self
            .wizard
            .state(|s| (s.last_error.clone(), s.step.name(), s.data()))
            .await;
        if let Some(error) = error {
            return Err(FlowError::Rejected(error));
        }

        tracing::info!(step, "Booking restored");
        Ok(Some(data))
    }

    /// Flat view of the booking
    pub async fn booking_data(&self) -> BookingData {
        self.wizard.state(BookingState::data).await
    }

    /// Copy of the wizard state
    pub async fn booking_state(&self) -> BookingState {
        self.wizard.state(Clone::clone).await
    }

    /// Copy of the seat page state
    pub async fn seat_selection(&self) -> SeatSelectionState {
        self.seats.state(Clone::clone).await
    }

    /// Current phase of the seat page
    pub async fn seat_page_phase(&self) -> SeatPhase {
        self.seats.state(|s| s.phase).await
    }

    /// Stop accepting actions and wait for in-flight effects
    ///
    /// # Errors
    ///
    /// [`FlowError::Store`] if effects are still running after the timeout.
    pub async fn shutdown(&self) -> Result<(), FlowError> {
        self.seats.shutdown(self.timeout).await?;
        self.wizard.shutdown(self.timeout).await?;
        Ok(())
    }
}

fn is_booking_outcome(action: &WizardAction) -> bool {
    matches!(
        action,
        WizardAction::BookingCreated { .. }
            | WizardAction::BookingCreationFailed { .. }
            | WizardAction::PaymentFailed { .. }
            | WizardAction::Rejected { .. }
    )
}

fn booking_outcome(action: WizardAction) -> Result<BookingConfirmation, FlowError> {
    match action {
        WizardAction::BookingCreated { confirmation } => Ok(confirmation),
        WizardAction::BookingCreationFailed { message }
        | WizardAction::PaymentFailed { message }
        | WizardAction::Rejected { message } => Err(FlowError::Rejected(message)),
        other => Err(FlowError::Rejected(format!(
            "Unexpected booking reply: {}",
            other.name()
        ))),
    }
}
