//! Finite-state machine used to track a run's lifecycle.
//!
//! A [`Definition`] is built once and shared; every tracked run owns its own [`StateMachine`]
//! instance. Instances are not synchronized: exactly one owner mutates a given instance.

mod run;
pub use run::{RunContext, RunLifecycle, RunStateMachine};

use std::{fmt, hash::Hash, sync::Arc};

use thiserror::Error;
use tracing::trace;

/// State of a machine.
pub trait Lifecycle: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Terminal states accept no further transitions.
    fn is_terminal(&self) -> bool;
}

/// Event that triggers a transition.
pub trait Trigger: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("event {event} is not accepted in state {state}")]
    UnhandledEvent { state: String, event: String },

    #[error("state {state} is terminal")]
    Terminal { state: String },
}

/// A declared edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S, E> {
    pub from: S,
    pub event: E,
    pub to: S,
}

/// Immutable set of legal transitions.
#[derive(Debug)]
pub struct Definition<S, E> {
    edges: Vec<Transition<S, E>>,
    /// Edge accepted from every non-terminal state.
    universal: Option<(E, S)>,
}

impl<S: Lifecycle, E: Trigger> Definition<S, E> {
    pub fn builder() -> DefinitionBuilder<S, E> {
        DefinitionBuilder {
            edges: Vec::new(),
            universal: None,
        }
    }

    /// Target of `event` fired in `from`, if declared.
    pub fn target(&self, from: S, event: E) -> Option<S> {
        if from.is_terminal() {
            return None;
        }
        self.edges
            .iter()
            .find(|t| t.from == from && t.event == event)
            .map(|t| t.to)
            .or_else(|| match self.universal {
                Some((e, to)) if e == event => Some(to),
                _ => None,
            })
    }

    /// Event that moves `from` to `to`, if any edge connects them.
    pub fn event_for(&self, from: S, to: S) -> Option<E> {
        if from.is_terminal() {
            return None;
        }
        self.edges
            .iter()
            .find(|t| t.from == from && t.to == to)
            .map(|t| t.event)
            .or_else(|| match self.universal {
                Some((e, target)) if target == to => Some(e),
                _ => None,
            })
    }
}

pub struct DefinitionBuilder<S, E> {
    edges: Vec<Transition<S, E>>,
    universal: Option<(E, S)>,
}

impl<S: Lifecycle, E: Trigger> DefinitionBuilder<S, E> {
    /// Declare `from --event--> to`. The first declaration of a `(from, event)` pair wins.
    pub fn edge(mut self, from: S, event: E, to: S) -> Self {
        debug_assert!(
            !self.edges.iter().any(|t| t.from == from && t.event == event),
            "duplicate edge {from} --{event}-->"
        );
        self.edges.push(Transition { from, event, to });
        self
    }

    /// Declare `any non-terminal --event--> to`.
    pub fn from_any_non_terminal(mut self, event: E, to: S) -> Self {
        self.universal = Some((event, to));
        self
    }

    pub fn build(self) -> Definition<S, E> {
        Definition {
            edges: self.edges,
            universal: self.universal,
        }
    }
}

/// One machine instance, scoped to a single run.
pub struct StateMachine<S, E, C> {
    definition: Arc<Definition<S, E>>,
    current: S,
    context: C,
    history: Vec<Transition<S, E>>,
}

impl<S: Lifecycle, E: Trigger, C> StateMachine<S, E, C> {
    pub fn new(definition: Arc<Definition<S, E>>, initial: S, context: C) -> Self {
        Self {
            definition,
            current: initial,
            context,
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn current_state(&self) -> S {
        self.current
    }

    #[inline]
    pub fn context(&self) -> &C {
        &self.context
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Transitions applied by this instance, oldest first.
    pub fn history(&self) -> &[Transition<S, E>] {
        &self.history
    }

    pub fn can_go_to(&self, target: S) -> Option<E> {
        self.definition.event_for(self.current, target)
    }

    /// Fire `event`; returns the applied transition.
    pub fn send_event(&mut self, event: E) -> Result<Transition<S, E>, StateError> {
        if self.current.is_terminal() {
            return Err(StateError::Terminal {
                state: self.current.to_string(),
            });
        }
        let to = self
            .definition
            .target(self.current, event)
            .ok_or_else(|| StateError::UnhandledEvent {
                state: self.current.to_string(),
                event: event.to_string(),
            })?;
        Ok(self.apply(event, to))
    }

    /// Move to `target` through the edge that connects it to the current state.
    ///
    /// Re-entering the current terminal state is a no-op. Any other request from a terminal
    /// state, or without a connecting edge, fails and leaves the state untouched.
    pub fn go_to_state(&mut self, target: S) -> Result<S, StateError> {
        if self.current.is_terminal() {
            if self.current == target {
                trace!(state = %target, "terminal state re-entered; ignoring");
                return Ok(target);
            }
            return Err(StateError::Terminal {
                state: self.current.to_string(),
            });
        }
        let event = self
            .can_go_to(target)
            .ok_or_else(|| StateError::InvalidTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })?;
        Ok(self.apply(event, target).to)
    }

    fn apply(&mut self, event: E, to: S) -> Transition<S, E> {
        let transition = Transition {
            from: self.current,
            event,
            to,
        };
        trace!(from = %transition.from, event = %event, to = %to, "state transition");
        self.current = to;
        self.history.push(transition);
        transition
    }
}
