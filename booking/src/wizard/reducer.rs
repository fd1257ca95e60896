//! Wizard reducer.
//!
//! Moves a booking through showtime → seats → snacks → payment. Seat leases
//! are the only server-side resource the wizard owns: whenever a transition
//! drops seats that were held, the reducer schedules a best-effort unlock.

use super::actions::WizardAction;
use super::state::{BookingData, BookingDraft, BookingState, BookingStep};
use crate::api::{BookingApi, BookingRequest, PaymentRequest};
use crate::environment::BookingEnvironment;
use crate::notify::Notice;
use crate::pricing::{calculate_total_amount, line_items};
use crate::types::{BookingId, PaymentReceipt, SeatCode, ShowtimeId};
use marquee_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use std::collections::HashSet;
use std::sync::Arc;

type Effects = SmallVec<[Effect<WizardAction>; 4]>;

const PAYMENT_IN_PROGRESS: &str = "A payment is in progress; wait for it to finish";

/// Reducer for the booking wizard
#[derive(Clone, Debug, Default)]
pub struct WizardReducer;

impl WizardReducer {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Refuse a command: record why, tell the customer, and announce it
    fn reject(state: &mut BookingState, env: &BookingEnvironment, message: String) -> Effects {
        tracing::warn!(step = state.step.name(), %message, "Booking action refused");
        state.last_error = Some(message.clone());
        env.notifier.notify(Notice::warning(message.clone()));
        smallvec![Effect::future(async move {
            Some(WizardAction::Rejected { message })
        })]
    }

    /// Accept a step change: bump the revision and persist the flat view
    fn commit(
        state: &mut BookingState,
        env: &BookingEnvironment,
        step: BookingStep,
    ) -> Effect<WizardAction> {
        tracing::debug!(from = state.step.name(), to = step.name(), "Booking step changed");
        state.step = step;
        state.revision += 1;
        Self::save_snapshot(state, env)
    }

    fn save_snapshot(state: &BookingState, env: &BookingEnvironment) -> Effect<WizardAction> {
        let writer = env.snapshots.clone();
        let revision = state.revision;
        let data = match state.step {
            BookingStep::Idle => None,
            ref step => Some(step.data()),
        };

        Effect::fire_and_forget(async move {
            if let Err(error) = writer.write(revision, data.as_ref()).await {
                tracing::warn!(%error, revision, "Could not persist booking snapshot");
            }
        })
    }

    /// Unlock whatever `before` held that `after` no longer holds
    fn release_dropped(
        before: &BookingStep,
        after: &BookingStep,
        env: &BookingEnvironment,
    ) -> Effect<WizardAction> {
        let Some((showtime_id, held)) = before.held_seats() else {
            return Effect::None;
        };
        let kept: HashSet<&SeatCode> = match after.held_seats() {
            Some((id, seats)) if id == showtime_id => seats.iter().collect(),
            _ => HashSet::new(),
        };
        let dropped: Vec<SeatCode> = held
            .iter()
            .filter(|s| !kept.contains(s))
            .cloned()
            .collect();

        if dropped.is_empty() {
            return Effect::None;
        }
        Self::unlock(Arc::clone(&env.api), showtime_id, dropped)
    }

    /// First seat `after` claims to hold that `before` never locked
    fn first_unheld<'a>(before: &BookingStep, after: &'a BookingStep) -> Option<&'a SeatCode> {
        let (showtime_id, wanted) = after.held_seats()?;
        let held: HashSet<&SeatCode> = match before.held_seats() {
            Some((id, seats)) if id == showtime_id => seats.iter().collect(),
            _ => HashSet::new(),
        };
        wanted.iter().find(|s| !held.contains(s))
    }

    fn unlock(
        api: Arc<dyn BookingApi>,
        showtime_id: ShowtimeId,
        seats: Vec<SeatCode>,
    ) -> Effect<WizardAction> {
        Effect::fire_and_forget(async move {
            match api.unlock_seats(showtime_id, &seats).await {
                Ok(()) => tracing::debug!(%showtime_id, seats = seats.len(), "Released seats"),
                Err(error) => {
                    tracing::warn!(
                        %error,
                        %showtime_id,
                        "Could not release seats; the lease will lapse"
                    );
                },
            }
        })
    }

    fn create_booking(env: &BookingEnvironment, request: BookingRequest) -> Effect<WizardAction> {
        let api = Arc::clone(&env.api);
        Effect::future(async move {
            match api.create_booking(&request).await {
                Ok(confirmation) => Some(WizardAction::BookingCreated { confirmation }),
                Err(error) => {
                    tracing::error!(
                        %error,
                        booking_id = %request.booking_id,
                        transaction_id = %request.transaction_id,
                        "Booking creation failed after payment"
                    );
                    Some(WizardAction::BookingCreationFailed {
                        message: error.user_message(),
                    })
                },
            }
        })
    }

    fn booking_request(
        draft: &BookingDraft,
        seats: &[SeatCode],
        snacks: &[crate::types::SnackSelection],
        receipt: &PaymentReceipt,
    ) -> BookingRequest {
        BookingRequest {
            booking_id: draft.booking_id.clone(),
            showtime_id: draft.showtime.id,
            seats: seats.to_vec(),
            snacks: snacks.to_vec(),
            total: receipt.amount,
            transaction_id: receipt.transaction_id.clone(),
        }
    }

    /// Replace the whole step after validating a flat record
    ///
    /// Seats can be dropped this way but never added: only a lock grants a
    /// lease. A restore into an empty wizard trusts the snapshot's lease.
    fn replace_from_data(
        state: &mut BookingState,
        env: &BookingEnvironment,
        data: BookingData,
        restoring: bool,
    ) -> Effects {
        if matches!(state.step, BookingStep::PaymentPending { .. }) {
            return Self::reject(state, env, PAYMENT_IN_PROGRESS.to_string());
        }

        let step = match BookingStep::try_from(data) {
            Ok(step) => step,
            Err(error) => return Self::reject(state, env, error.to_string()),
        };

        // A charge in flight when the snapshot was taken has no effect
        // attached any more; fall back to the step before it.
        let step = match step {
            BookingStep::PaymentPending {
                draft,
                lease,
                snacks,
                ..
            } if restoring => {
                env.notifier.notify(Notice::warning(
                    "A previous payment attempt did not finish; \
                     please check your statement before paying again",
                ));
                BookingStep::SnacksChosen {
                    draft,
                    lease,
                    snacks,
                }
            },
            step => step,
        };

        let trusted = restoring && matches!(state.step, BookingStep::Idle);
        let unheld = if trusted { None } else { Self::first_unheld(&state.step, &step) };
        if let Some(seat) = unheld {
            let message = format!("Seat {seat} is not held by this booking");
            return Self::reject(state, env, message);
        }

        let release = Self::release_dropped(&state.step, &step, env);
        state.last_error = None;
        let save = Self::commit(state, env, step);
        smallvec![release, save]
    }
}

impl Reducer for WizardReducer {
    type State = BookingState;
    type Action = WizardAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per wizard transition
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        tracing::debug!(
            action = action.name(),
            step = state.step.name(),
            "Reducing booking action"
        );

        match action {
            // ========== Showtime ==========
            WizardAction::SelectShowtime { showtime } => {
                if matches!(state.step, BookingStep::PaymentPending { .. }) {
                    return Self::reject(state, env, PAYMENT_IN_PROGRESS.to_string());
                }

                let step = BookingStep::ShowtimeSelected {
                    draft: BookingDraft {
                        showtime,
                        booking_id: BookingId::from_timestamp(env.clock.now()),
                    },
                    resume: Vec::new(),
                };
                let release = Self::release_dropped(&state.step, &step, env);
                state.last_error = None;
                let save = Self::commit(state, env, step);
                smallvec![release, save]
            },

            // ========== Seats ==========
            WizardAction::SeatsLocked { showtime_id, lease } => {
                let draft = match &state.step {
                    BookingStep::ShowtimeSelected { draft, .. }
                        if draft.showtime.id == showtime_id =>
                    {
                        draft.clone()
                    },
                    _ => {
                        // Nobody will ever pay for this lease; hand it back
                        let mut effects = Self::reject(
                            state,
                            env,
                            "These seats no longer belong to the booking in progress".to_string(),
                        );
                        effects.push(Self::unlock(Arc::clone(&env.api), showtime_id, lease.seats));
                        return effects;
                    },
                };

                if lease.seats.is_empty() {
                    return Self::reject(state, env, "Please select at least one seat".to_string());
                }
                let mut unique = HashSet::new();
                if !lease.seats.iter().all(|s| unique.insert(s)) {
                    return Self::reject(state, env, "A seat was selected twice".to_string());
                }

                state.last_error = None;
                let step = BookingStep::SeatsLocked { draft, lease };
                smallvec![Self::commit(state, env, step)]
            },

            // ========== Snacks ==========
            WizardAction::SnacksChosen { snacks } => {
                let (draft, lease) = match &state.step {
                    BookingStep::SeatsLocked { draft, lease }
                    | BookingStep::SnacksChosen { draft, lease, .. } => {
                        (draft.clone(), lease.clone())
                    },
                    _ => return Self::reject(state, env, "Choose your seats first".to_string()),
                };

                let snacks = snacks.into_iter().filter(|s| s.quantity > 0).collect();
                state.last_error = None;
                let step = BookingStep::SnacksChosen {
                    draft,
                    lease,
                    snacks,
                };
                smallvec![Self::commit(state, env, step)]
            },

            // ========== Payment ==========
            WizardAction::ProcessPayment { method } => {
                let (draft, lease, snacks) = match &state.step {
                    BookingStep::SeatsLocked { draft, lease } => {
                        (draft.clone(), lease.clone(), Vec::new())
                    },
                    BookingStep::SnacksChosen {
                        draft,
                        lease,
                        snacks,
                    } => (draft.clone(), lease.clone(), snacks.clone()),
                    _ => return Self::reject(state, env, "Nothing is ready to pay for".to_string()),
                };

                if lease.is_expired(env.clock.now()) {
                    return Self::reject(
                        state,
                        env,
                        "Your seat hold has expired; please choose your seats again".to_string(),
                    );
                }

                let request = PaymentRequest {
                    booking_id: draft.booking_id.clone(),
                    amount: calculate_total_amount(&lease.seats, draft.ticket_price(), &snacks),
                    method: method.clone(),
                    items: line_items(&lease.seats, draft.ticket_price(), &snacks),
                };
                tracing::info!(
                    booking_id = %request.booking_id,
                    amount = request.amount.units(),
                    "Charging customer"
                );

                state.last_error = None;
                let save = Self::commit(
                    state,
                    env,
                    BookingStep::PaymentPending {
                        draft,
                        lease,
                        snacks,
                        method,
                    },
                );

                let api = Arc::clone(&env.api);
                let charge = Effect::future(async move {
                    match api.process_payment(&request).await {
                        Ok(receipt) => Some(WizardAction::PaymentSettled { receipt }),
                        Err(error) => Some(WizardAction::PaymentFailed {
                            message: error.user_message(),
                        }),
                    }
                });
                smallvec![save, charge]
            },

            WizardAction::PaymentSettled { receipt } => {
                let BookingStep::PaymentPending {
                    draft,
                    lease,
                    snacks,
                    ..
                } = state.step.clone()
                else {
                    // Money moved but the booking it was for is gone
                    tracing::error!(
                        transaction_id = %receipt.transaction_id,
                        "Payment settled for an abandoned booking"
                    );
                    env.notifier.notify(Notice::error(format!(
                        "A payment ({}) was received for a booking that is no longer in progress; \
                         please contact support",
                        receipt.transaction_id
                    )));
                    return SmallVec::new();
                };

                let received = format!("Payment of {} received", receipt.amount);
                env.notifier.notify(Notice::info(received));
                let request = Self::booking_request(&draft, &lease.seats, &snacks, &receipt);
                let save = Self::commit(
                    state,
                    env,
                    BookingStep::PaymentSettled {
                        draft,
                        lease,
                        snacks,
                        receipt,
                    },
                );
                smallvec![save, Self::create_booking(env, request)]
            },

            WizardAction::PaymentFailed { message } => {
                let BookingStep::PaymentPending {
                    draft,
                    lease,
                    snacks,
                    ..
                } = &state.step
                else {
                    tracing::warn!(%message, "Ignoring payment failure outside of payment");
                    return SmallVec::new();
                };

                let step = BookingStep::SnacksChosen {
                    draft: draft.clone(),
                    lease: lease.clone(),
                    snacks: snacks.clone(),
                };
                tracing::warn!(%message, "Payment failed");
                env.notifier.notify(Notice::error(message.clone()));
                state.last_error = Some(message);
                smallvec![Self::commit(state, env, step)]
            },

            // ========== Booking record ==========
            WizardAction::BookingCreated { confirmation } => {
                let BookingStep::PaymentSettled {
                    draft,
                    snacks,
                    receipt,
                    ..
                } = &state.step
                else {
                    tracing::warn!(
                        booking_ref = %confirmation.booking_ref,
                        "Ignoring unexpected booking confirmation"
                    );
                    return SmallVec::new();
                };

                tracing::info!(booking_ref = %confirmation.booking_ref, "Booking confirmed");
                env.notifier.notify(Notice::info(format!(
                    "Booking {} confirmed",
                    confirmation.booking_ref
                )));
                let step = BookingStep::Confirmed {
                    draft: draft.clone(),
                    snacks: snacks.clone(),
                    receipt: receipt.clone(),
                    confirmation,
                };
                state.last_error = None;
                smallvec![Self::commit(state, env, step)]
            },

            WizardAction::BookingCreationFailed { message } => {
                if !matches!(state.step, BookingStep::PaymentSettled { .. }) {
                    tracing::warn!(%message, "Ignoring booking failure outside of payment");
                    return SmallVec::new();
                }

                // The charge stands; the customer can retry without paying again
                let message = format!(
                    "Your payment went through but the booking could not be saved: {message}"
                );
                env.notifier.notify(Notice::error(message.clone()));
                state.last_error = Some(message);
                SmallVec::new()
            },

            WizardAction::RetryBookingCreation => {
                let BookingStep::PaymentSettled {
                    draft,
                    lease,
                    snacks,
                    receipt,
                } = &state.step
                else {
                    let message = "There is no paid booking to retry".to_string();
                    return Self::reject(state, env, message);
                };

                tracing::info!(booking_id = %draft.booking_id, "Retrying booking creation");
                let request = Self::booking_request(draft, &lease.seats, snacks, receipt);
                state.last_error = None;
                smallvec![Self::create_booking(env, request)]
            },

            // ========== Navigation ==========
            WizardAction::ReturnToSeatSelection => {
                let (draft, lease) = match &state.step {
                    BookingStep::SeatsLocked { draft, lease }
                    | BookingStep::SnacksChosen { draft, lease, .. } => {
                        (draft.clone(), lease.clone())
                    },
                    _ => {
                        let message = "You cannot change seats at this point".to_string();
                        return Self::reject(state, env, message);
                    },
                };

                state.last_error = None;
                let step = BookingStep::ShowtimeSelected {
                    draft,
                    resume: lease.seats,
                };
                smallvec![Self::commit(state, env, step)]
            },

            WizardAction::UpdateBookingData { patch } => {
                let mut data = state.data();
                data.apply(patch);
                Self::replace_from_data(state, env, data, false)
            },

            WizardAction::Restore { data } => Self::replace_from_data(state, env, data, true),

            WizardAction::Reset | WizardAction::Logout => {
                if matches!(state.step, BookingStep::PaymentPending { .. }) {
                    return Self::reject(state, env, PAYMENT_IN_PROGRESS.to_string());
                }

                let release = Self::release_dropped(&state.step, &BookingStep::Idle, env);
                let revision = state.revision + 1;
                *state = BookingState {
                    revision,
                    ..BookingState::default()
                };
                tracing::info!("Booking reset");
                smallvec![release, Self::save_snapshot(state, env)]
            },

            WizardAction::Rejected { message } => {
                tracing::trace!(%message, "Rejection observed");
                SmallVec::new()
            },
        }
    }
}
