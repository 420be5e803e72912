//! This module contains the state type of the NFA.
//! A state owns its outgoing transitions. The targets are ids into the state arena of the NFA the
//! state belongs to.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::StateID;

/// A state of an NFA.
///
/// Transitions on a symbol and epsilon transitions are kept in separate lists, so the epsilon
/// symbol is never part of the symbols a state transitions on. Both lists are ordered with the
/// newest transition first, which is also the order in which the backtracking matcher explores
/// them.
#[derive(Debug, Clone, Default)]
pub struct NfaState {
    id: StateID,
    accepting: bool,
    transitions: BTreeMap<char, Vec<StateID>>,
    epsilon_transitions: Vec<StateID>,
    // Calculated on first request by the owning NFA and cleared whenever the graph changes.
    epsilon_closure: OnceLock<Vec<StateID>>,
}

impl NfaState {
    pub(crate) fn new(id: StateID) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Get the id of the state.
    pub fn id(&self) -> StateID {
        self.id
    }

    /// Returns true if the automaton accepts when it reaches this state without remaining input.
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub(crate) fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    /// Returns true if the state has neither symbol nor epsilon transitions.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.epsilon_transitions.is_empty()
    }

    /// Add a transition on `symbol` to `target`.
    /// The new transition is placed in front of the existing transitions on the same symbol.
    pub(crate) fn add_transition(&mut self, symbol: char, target: StateID) {
        self.transitions.entry(symbol).or_default().insert(0, target);
    }

    /// Add an epsilon transition to `target` in front of the existing epsilon transitions.
    pub(crate) fn add_epsilon_transition(&mut self, target: StateID) {
        self.epsilon_transitions.insert(0, target);
    }

    /// The targets of the transitions on `symbol`, newest first.
    /// The slice is empty if the state has no transition on `symbol`.
    pub fn transitions_for(&self, symbol: char) -> &[StateID] {
        self.transitions
            .get(&symbol)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All symbol transitions of this state, ordered by symbol.
    pub fn transitions(&self) -> impl Iterator<Item = (char, &[StateID])> + '_ {
        self.transitions
            .iter()
            .map(|(symbol, targets)| (*symbol, targets.as_slice()))
    }

    /// The targets of the epsilon transitions of this state, newest first.
    pub fn epsilon_transitions(&self) -> &[StateID] {
        &self.epsilon_transitions
    }

    /// Returns true if any transition of this state, epsilon or not, leads to `target`.
    pub(crate) fn has_transition_to(&self, target: StateID) -> bool {
        self.epsilon_transitions.contains(&target)
            || self
                .transitions
                .values()
                .any(|targets| targets.contains(&target))
    }

    pub(crate) fn epsilon_closure_cell(&self) -> &OnceLock<Vec<StateID>> {
        &self.epsilon_closure
    }

    pub(crate) fn reset_epsilon_closure(&mut self) {
        self.epsilon_closure = OnceLock::new();
    }

    /// Apply an offset to every state number.
    pub(crate) fn offset(&mut self, offset: usize) {
        self.id = self.id + offset;
        for targets in self.transitions.values_mut() {
            for target in targets.iter_mut() {
                *target = *target + offset;
            }
        }
        for target in self.epsilon_transitions.iter_mut() {
            *target = *target + offset;
        }
        self.reset_epsilon_closure();
    }
}
