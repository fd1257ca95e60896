//! Seat page reducer.
//!
//! Selection is purely local until the customer continues; only then is a
//! lock requested. Once locked, the lease belongs to the wizard and leaving
//! the page no longer releases it.

use super::actions::SeatAction;
use super::state::{SeatPhase, SeatSelectionState};
use crate::environment::BookingEnvironment;
use crate::notify::Notice;
use crate::pricing::priced_seats;
use crate::types::{Money, SeatCode, SeatStatus, ShowtimeId};
use marquee_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use std::sync::Arc;

type Effects = SmallVec<[Effect<SeatAction>; 4]>;

/// Reducer for the seat page
#[derive(Clone, Debug, Default)]
pub struct SeatSelectionReducer;

impl SeatSelectionReducer {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(
        state: &mut SeatSelectionState,
        env: &BookingEnvironment,
        message: String,
    ) -> Effects {
        tracing::warn!(phase = ?state.phase, %message, "Seat action refused");
        state.error = Some(message.clone());
        env.notifier.notify(Notice::warning(message.clone()));
        smallvec![Effect::future(async move {
            Some(SeatAction::Rejected { message })
        })]
    }

    /// Fetch showtime and seat map together, releasing `unlock_first` beforehand
    fn load(
        env: &BookingEnvironment,
        showtime_id: ShowtimeId,
        request: u64,
        unlock_first: Vec<SeatCode>,
    ) -> Effect<SeatAction> {
        let api = Arc::clone(&env.api);
        Effect::future(async move {
            if !unlock_first.is_empty() {
                if let Err(error) = api.unlock_seats(showtime_id, &unlock_first).await {
                    tracing::warn!(%error, %showtime_id, "Could not release seats before resuming");
                }
            }

            match futures::try_join!(api.showtime(showtime_id), api.seats(showtime_id)) {
                Ok((showtime, seats)) => Some(SeatAction::Loaded {
                    request,
                    showtime,
                    seats,
                }),
                Err(error) => Some(SeatAction::LoadFailed {
                    request,
                    message: error.user_message(),
                }),
            }
        })
    }

    /// Drop selected seats the latest seat map no longer offers
    fn prune_unavailable(state: &mut SeatSelectionState, env: &BookingEnvironment) {
        let (kept, lost): (Vec<SeatCode>, Vec<SeatCode>) =
            std::mem::take(&mut state.selected).into_iter().partition(|code| {
                state
                    .seat(code)
                    .is_some_and(|seat| seat.status.is_selectable())
            });

        state.selected = kept;
        if !lost.is_empty() {
            let codes: Vec<&str> = lost.iter().map(SeatCode::as_str).collect();
            env.notifier.notify(Notice::warning(format!(
                "No longer available: {}",
                codes.join(", ")
            )));
        }
    }
}

impl Reducer for SeatSelectionReducer {
    type State = SeatSelectionState;
    type Action = SeatAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per page event
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        match action {
            // ========== Loading ==========
            SeatAction::Enter {
                showtime_id,
                resume,
            } => {
                let request = state.request + 1;
                *state = SeatSelectionState {
                    phase: SeatPhase::Loading,
                    showtime_id: Some(showtime_id),
                    resume: resume.clone(),
                    request,
                    ..SeatSelectionState::default()
                };
                tracing::debug!(%showtime_id, resume = resume.len(), "Loading seat map");
                smallvec![Self::load(env, showtime_id, request, resume)]
            },

            SeatAction::Loaded {
                request,
                showtime,
                seats,
            } => {
                if request != state.request || state.phase != SeatPhase::Loading {
                    tracing::debug!(request, "Ignoring stale seat map");
                    return SmallVec::new();
                }

                state.showtime = Some(showtime);
                state.seats = seats;
                state.phase = SeatPhase::Ready;
                state.error = None;
                state.selected = Vec::new();

                let mut lost = Vec::new();
                for code in std::mem::take(&mut state.resume) {
                    let available = state.seat(&code).is_some_and(|s| s.status.is_selectable());
                    if available && state.selected.len() < env.max_seats {
                        state.select(code);
                    } else {
                        lost.push(code.to_string());
                    }
                }
                if !lost.is_empty() {
                    env.notifier.notify(Notice::warning(format!(
                        "No longer available: {}",
                        lost.join(", ")
                    )));
                }
                SmallVec::new()
            },

            SeatAction::LoadFailed { request, message } => {
                if request != state.request {
                    return SmallVec::new();
                }
                tracing::warn!(%message, "Seat map failed to load");
                env.notifier.notify(Notice::error(message.clone()));
                state.phase = SeatPhase::LoadFailed;
                state.error = Some(message);
                SmallVec::new()
            },

            // ========== Selection ==========
            SeatAction::ToggleSeat { code } => {
                if state.phase != SeatPhase::Ready {
                    tracing::debug!(%code, phase = ?state.phase, "Ignoring seat click");
                    return SmallVec::new();
                }

                if let Some(index) = state.selected.iter().position(|c| c == &code) {
                    state.selected.remove(index);
                    return SmallVec::new();
                }

                let refusal = match state.seat(&code).map(|s| s.status) {
                    None => Some(format!("Seat {code} does not exist")),
                    Some(SeatStatus::Booked) => Some(format!("Seat {code} is already booked")),
                    Some(SeatStatus::Locked) => {
                        Some(format!("Seat {code} is being held by another customer"))
                    },
                    Some(SeatStatus::Available) if state.selected.len() >= env.max_seats => {
                        Some(format!("You can select at most {} seats", env.max_seats))
                    },
                    Some(SeatStatus::Available) => None,
                };

                if let Some(message) = refusal {
                    tracing::debug!(%code, %message, "Seat not selectable");
                    env.notifier.notify(Notice::warning(message));
                } else {
                    state.select(code);
                    state.error = None;
                }
                SmallVec::new()
            },

            // ========== Locking ==========
            SeatAction::Continue => {
                if state.phase != SeatPhase::Ready {
                    return Self::reject(state, env, "Seats are not ready yet".to_string());
                }
                let Some(showtime_id) = state.showtime_id else {
                    return Self::reject(state, env, "No showtime selected".to_string());
                };
                if state.selected.is_empty() {
                    return Self::reject(state, env, "Please select at least one seat".to_string());
                }

                state.phase = SeatPhase::Locking;
                state.error = None;
                let seats = state.selected.clone();
                let api = Arc::clone(&env.api);
                tracing::info!(%showtime_id, seats = seats.len(), "Locking seats");

                smallvec![Effect::future(async move {
                    match api.lock_seats(showtime_id, &seats).await {
                        Ok(lease) => Some(SeatAction::LockSucceeded { showtime_id, lease }),
                        Err(error) => Some(SeatAction::LockFailed {
                            message: error.user_message(),
                        }),
                    }
                })]
            },

            SeatAction::LockSucceeded { showtime_id, lease } => {
                if state.phase != SeatPhase::Locking || state.showtime_id != Some(showtime_id) {
                    // The page was left while the lock was in flight
                    tracing::info!(%showtime_id, "Releasing lock obtained after leaving");
                    let api = Arc::clone(&env.api);
                    return smallvec![Effect::fire_and_forget(async move {
                        if let Err(error) = api.unlock_seats(showtime_id, &lease.seats).await {
                            tracing::warn!(%error, "Could not release orphaned lock");
                        }
                    })];
                }

                let price = state.showtime.as_ref().map_or(Money::ZERO, |s| s.price);
                state.priced = priced_seats(&lease.seats, price);
                state.lease = Some(lease);
                state.phase = SeatPhase::Locked;
                SmallVec::new()
            },

            SeatAction::LockFailed { message } => {
                if state.phase != SeatPhase::Locking {
                    return SmallVec::new();
                }
                tracing::warn!(%message, "Seat lock refused");
                env.notifier.notify(Notice::error(message.clone()));
                state.phase = SeatPhase::Ready;
                state.error = Some(message);
                SmallVec::new()
            },

            // ========== Refresh ==========
            SeatAction::Refresh => match (state.phase, state.showtime_id) {
                (SeatPhase::LoadFailed, Some(showtime_id)) => {
                    state.request += 1;
                    state.phase = SeatPhase::Loading;
                    state.error = None;
                    smallvec![Self::load(env, showtime_id, state.request, Vec::new())]
                },
                (SeatPhase::Ready, Some(showtime_id)) => {
                    state.request += 1;
                    let request = state.request;
                    let api = Arc::clone(&env.api);
                    smallvec![Effect::future(async move {
                        match api.seats(showtime_id).await {
                            Ok(seats) => Some(SeatAction::SeatsRefreshed { request, seats }),
                            Err(error) => Some(SeatAction::RefreshFailed {
                                request,
                                message: error.user_message(),
                            }),
                        }
                    })]
                },
                _ => SmallVec::new(),
            },

            SeatAction::SeatsRefreshed { request, seats } => {
                if request != state.request || state.phase != SeatPhase::Ready {
                    return SmallVec::new();
                }
                state.seats = seats;
                Self::prune_unavailable(state, env);
                SmallVec::new()
            },

            SeatAction::RefreshFailed { request, message } => {
                if request == state.request {
                    env.notifier.notify(Notice::error(message.clone()));
                    state.error = Some(message);
                }
                SmallVec::new()
            },

            // ========== Leaving ==========
            SeatAction::Leave => {
                let release = match (state.phase, state.showtime_id) {
                    (SeatPhase::Locked, _) | (_, None) => None,
                    (_, Some(_)) if state.selected.is_empty() => None,
                    (_, Some(showtime_id)) => {
                        Some((showtime_id, std::mem::take(&mut state.selected)))
                    },
                };

                *state = SeatSelectionState {
                    request: state.request,
                    ..SeatSelectionState::default()
                };

                let Some((showtime_id, seats)) = release else {
                    return SmallVec::new();
                };
                let api = Arc::clone(&env.api);
                smallvec![Effect::fire_and_forget(async move {
                    if let Err(error) = api.unlock_seats(showtime_id, &seats).await {
                        tracing::warn!(%error, %showtime_id, "Could not release seats on leave");
                    }
                })]
            },

            SeatAction::Rejected { message } => {
                tracing::trace!(%message, "Rejection observed");
                SmallVec::new()
            },
        }
    }
}
