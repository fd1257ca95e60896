//! # Marquee Runtime
//!
//! The Store runtime that coordinates reducer execution and effect handling
//! for the booking wizard and the seat-selection screen.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, runs the reducer, executes effects
//! - **Effect Executor**: Spawns effect tasks and feeds produced actions back
//! - **Action Broadcast**: Lets callers wait for the reply to a request
//!   (`send_and_wait_for`) or observe every effect-produced action
//!
//! ## Example
//!
//! ```ignore
//! use marquee_runtime::Store;
//!
//! let store = Store::new(SeatSelectionState::default(), SeatSelectionReducer, env);
//!
//! store.send(SeatSelectionAction::ToggleSeat { code }).await?;
//! let selected = store.state(|s| s.selected.clone()).await;
//! ```

use marquee_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] so callers can wait until the effects
/// spawned directly by that action have finished. Actions fed back by
/// those effects get their own handles and are not tracked here.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Internal: effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Keeps the counter right even if the effect task panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, EffectTracking, Ordering, Reducer, RwLock, StoreError,
    };
    use tokio::sync::broadcast;

    /// Default capacity of the action broadcast channel
    const DEFAULT_BROADCAST_CAPACITY: usize = 64;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (booking rules)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Every action produced by an effect is broadcast here once it has
        /// been reduced, so request/response callers can wait for the reply
        /// and then read state that already reflects it.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Create a new Store with custom action broadcast capacity
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }
        }

        /// Access the injected environment
        #[must_use]
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Rejects new actions, then waits for in-flight effects (such as a
        /// best-effort seat unlock) to finish.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(20);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout");
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Spawns the returned effects
        ///
        /// Returns after the effects have been started, not completed.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.actions.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            Ok(handle)
        }

        /// Send an action and wait for a matching result action
        ///
        /// Subscribes to the action broadcast BEFORE sending, so a fast reply
        /// cannot be missed.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool,
        {
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to all actions produced by effects
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let seats = store.state(|s| s.selected.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        fn spawn_tracked<Fut>(&self, tracking: &EffectTracking, fut: Fut)
        where
            Fut: std::future::Future<Output = ()> + Send + 'static,
        {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
            let guard = DecrementGuard(tracking.clone());

            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                fut.await;
            });
        }

        /// Feed an effect-produced action back, then broadcast it
        async fn feed_back(&self, action: A)
        where
            R: Clone,
            E: Clone,
        {
            if let Err(error) = self.send(action.clone()).await {
                tracing::warn!(%error, "Dropped effect-produced action");
            }
            let _ = self.action_broadcast.send(action);
        }

        /// Execute an effect with tracking
        ///
        /// Effect failures never halt the store: booking effects catch their
        /// own errors and turn them into failure actions.
        #[tracing::instrument(skip(self, effect, tracking), name = "execute_effect")]
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let store = self.clone();
                    self.spawn_tracked(&tracking, async move {
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action");
                            store.feed_back(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let store = self.clone();
                    self.spawn_tracked(&tracking, async move {
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    });
                },
                Effect::Parallel(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "sequential")
                        .increment(1);
                    let store = self.clone();
                    self.spawn_tracked(&tracking, async move {
                        for effect in effects {
                            let (mut sub_handle, sub_tracking) = EffectHandle::new();
                            store.execute_effect(effect, sub_tracking);
                            sub_handle.wait().await;
                        }
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }

    impl<S, A, E, R> std::fmt::Debug for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
                .field("pending_effects", &self.pending_effects.load(Ordering::Relaxed))
                .finish_non_exhaustive()
        }
    }
}

pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};

    #[derive(Debug, Clone, Default)]
    struct HallState {
        held: i32,
    }

    #[derive(Debug, Clone)]
    enum HallAction {
        Hold,
        Release,
        HoldLater,
        HoldViaEffect,
        HoldThreeInParallel,
        HoldHoldRelease,
        Held,
    }

    #[derive(Debug, Clone)]
    struct HallEnv;

    #[derive(Debug, Clone)]
    struct HallReducer;

    impl Reducer for HallReducer {
        type State = HallState;
        type Action = HallAction;
        type Environment = HallEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                HallAction::Hold => {
                    state.held += 1;
                    smallvec![Effect::None]
                },
                HallAction::Release => {
                    state.held -= 1;
                    smallvec![Effect::None]
                },
                HallAction::Held => smallvec![Effect::None],
                HallAction::HoldLater => smallvec![Effect::Delay {
                    duration: Duration::from_millis(10),
                    action: Box::new(HallAction::Hold),
                }],
                HallAction::HoldViaEffect => {
                    smallvec![Effect::future(async { Some(HallAction::Hold) })]
                },
                HallAction::HoldThreeInParallel => smallvec![Effect::merge(vec![
                    Effect::future(async { Some(HallAction::Hold) }),
                    Effect::future(async { Some(HallAction::Hold) }),
                    Effect::future(async { Some(HallAction::Hold) }),
                ])],
                HallAction::HoldHoldRelease => smallvec![Effect::chain(vec![
                    Effect::future(async { Some(HallAction::Hold) }),
                    Effect::future(async { Some(HallAction::Hold) }),
                    Effect::future(async { Some(HallAction::Release) }),
                ])],
            }
        }
    }

    fn store() -> Store<HallState, HallAction, HallEnv, HallReducer> {
        Store::new(HallState::default(), HallReducer, HallEnv)
    }

    #[tokio::test]
    async fn send_runs_reducer_synchronously() {
        let store = store();
        let _ = store.send(HallAction::Hold).await;
        let _ = store.send(HallAction::Hold).await;
        let _ = store.send(HallAction::Release).await;
        assert_eq!(store.state(|s| s.held).await, 1);
    }

    #[tokio::test]
    async fn future_effect_feeds_action_back() {
        let store = store();
        let Ok(mut handle) = store.send(HallAction::HoldViaEffect).await else {
            unreachable!("store is running");
        };
        assert!(handle.wait_with_timeout(Duration::from_secs(1)).await.is_ok());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.state(|s| s.held).await, 1);
    }

    #[tokio::test]
    async fn delay_effect_fires_later() {
        let store = store();
        let _ = store.send(HallAction::HoldLater).await;
        assert_eq!(store.state(|s| s.held).await, 0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.state(|s| s.held).await, 1);
    }

    #[tokio::test]
    async fn parallel_effects_all_run() {
        let store = store();
        let _ = store.send(HallAction::HoldThreeInParallel).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.state(|s| s.held).await, 3);
    }

    #[tokio::test]
    async fn sequential_effects_run_in_order() {
        let store = store();
        let _ = store.send(HallAction::HoldHoldRelease).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.state(|s| s.held).await, 1);
    }

    #[tokio::test]
    async fn send_and_wait_for_returns_matching_action() {
        let store = store();
        let result = store
            .send_and_wait_for(
                HallAction::HoldViaEffect,
                |a| matches!(a, HallAction::Hold),
                Duration::from_secs(1),
            )
            .await;
        assert!(matches!(result, Ok(HallAction::Hold)));
    }

    #[tokio::test]
    async fn awaited_action_is_already_reduced() {
        let store = store();
        let result = store
            .send_and_wait_for(
                HallAction::HoldViaEffect,
                |a| matches!(a, HallAction::Hold),
                Duration::from_secs(1),
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(store.state(|s| s.held).await, 1);
    }

    #[tokio::test]
    async fn send_and_wait_for_times_out() {
        let store = store();
        let result = store
            .send_and_wait_for(
                HallAction::Hold,
                |a| matches!(a, HallAction::Held),
                Duration::from_millis(30),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_actions() {
        let store = store();
        assert!(store.shutdown(Duration::from_secs(1)).await.is_ok());
        let result = store.send(HallAction::Hold).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn completed_handle_does_not_block() {
        let mut handle = EffectHandle::completed();
        assert_eq!(handle.pending(), 0);
        handle.wait().await;
    }
}
