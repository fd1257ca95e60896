//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use marquee_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Several actions can be queued with repeated `when_action` calls; they are
/// reduced in order and the effect assertions see the effects of the last one.
///
/// # Example
///
/// ```ignore
/// use marquee_testing::ReducerTest;
///
/// ReducerTest::new(BookingReducer::new())
///     .with_env(test_environment())
///     .given_state(BookingState::default())
///     .when_action(BookingAction::SelectShowtime { showtime })
///     .then_state(|state| assert!(state.step.showtime().is_some()))
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Queue an action to reduce (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test harness reports misuse by panicking
    pub fn run(self) {
        let Some(mut state) = self.initial_state else {
            panic!("Initial state must be set with given_state()");
        };
        let Some(env) = self.environment else {
            panic!("Environment must be set with with_env()");
        };
        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions;
    use smallvec::{SmallVec, smallvec};

    #[derive(Clone, Debug)]
    struct QueueState {
        waiting: u32,
    }

    #[derive(Clone, Debug)]
    enum QueueAction {
        Join,
        Leave,
    }

    struct QueueReducer;

    struct QueueEnv;

    impl Reducer for QueueReducer {
        type State = QueueState;
        type Action = QueueAction;
        type Environment = QueueEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                QueueAction::Join => state.waiting += 1,
                QueueAction::Leave => state.waiting = state.waiting.saturating_sub(1),
            }
            smallvec![Effect::None]
        }
    }

    #[test]
    fn single_action() {
        ReducerTest::new(QueueReducer)
            .with_env(QueueEnv)
            .given_state(QueueState { waiting: 0 })
            .when_action(QueueAction::Join)
            .then_state(|state| assert_eq!(state.waiting, 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn actions_apply_in_order() {
        ReducerTest::new(QueueReducer)
            .with_env(QueueEnv)
            .given_state(QueueState { waiting: 0 })
            .when_action(QueueAction::Join)
            .when_action(QueueAction::Join)
            .when_action(QueueAction::Leave)
            .then_state(|state| assert_eq!(state.waiting, 1))
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }
}
