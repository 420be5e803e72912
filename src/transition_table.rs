//! This module contains the numbered transition table of an NFA.
//! The table is the input of the subset construction that creates the DFA.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::{debug, trace};

use crate::{Nfa, StateID, StateNumber};

/// One row of the NFA transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    // The arena id of the state this row describes.
    state: StateID,
    // Direct transitions on symbols. Epsilon transitions are not part of this map.
    transitions: BTreeMap<char, Vec<StateNumber>>,
    // All states reachable via epsilon transitions only, including the state itself.
    epsilon_closure: Vec<StateNumber>,
}

impl TableRow {
    /// The id of the NFA state this row describes.
    pub fn state(&self) -> StateID {
        self.state
    }

    /// The direct transitions of the state, keyed by symbol.
    pub fn transitions(&self) -> &BTreeMap<char, Vec<StateNumber>> {
        &self.transitions
    }

    /// The epsilon closure of the state.
    pub fn epsilon_closure(&self) -> &[StateNumber] {
        &self.epsilon_closure
    }
}

/// The transition table of an NFA.
///
/// The states reachable from the start state are numbered from 1 in the order of a depth-first
/// traversal. Symbol transitions are visited before epsilon transitions, each in the order the
/// state stores them. The start state therefore always has number 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfaTransitionTable {
    // Row i describes the state with number i + 1.
    rows: Vec<TableRow>,
    // Maps arena ids to numbers. Unreachable states have no number.
    numbers: Vec<Option<StateNumber>>,
    accepting_states: BTreeSet<StateNumber>,
}

impl NfaTransitionTable {
    pub(crate) fn new(nfa: &Nfa) -> Self {
        let now = Instant::now();

        let mut numbers: Vec<Option<StateNumber>> = vec![None; nfa.states().len()];
        let mut visiting_order = Vec::new();
        let mut stack = vec![nfa.start_state()];
        while let Some(state_id) = stack.pop() {
            if numbers[state_id].is_some() {
                continue;
            }
            let number = StateNumber::new(visiting_order.len() + 1);
            trace!("Number state {} as {}", state_id, number);
            numbers[state_id] = Some(number);
            visiting_order.push(state_id);

            let state = nfa.state(state_id);
            let successors = state
                .transitions()
                .flat_map(|(_, targets)| targets.iter().copied())
                .chain(state.epsilon_transitions().iter().copied())
                .collect::<Vec<_>>();
            // Reversed, so that the first successor is popped first
            stack.extend(successors.into_iter().rev());
        }

        let number_of = |state_id: &StateID| numbers[*state_id];
        let mut accepting_states = BTreeSet::new();
        let rows = visiting_order
            .iter()
            .map(|&state_id| {
                let state = nfa.state(state_id);
                if state.is_accepting() {
                    if let Some(number) = number_of(&state_id) {
                        accepting_states.insert(number);
                    }
                }
                TableRow {
                    state: state_id,
                    transitions: state
                        .transitions()
                        .map(|(symbol, targets)| {
                            (symbol, targets.iter().filter_map(number_of).collect())
                        })
                        .collect(),
                    epsilon_closure: nfa
                        .epsilon_closure(state_id)
                        .iter()
                        .filter_map(number_of)
                        .collect(),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "NFA transition table with {} states built in {} microseconds",
            rows.len(),
            now.elapsed().as_micros()
        );

        Self {
            rows,
            numbers,
            accepting_states,
        }
    }

    /// The number of the start state. This is always 1.
    pub fn start_state(&self) -> StateNumber {
        StateNumber::new(1)
    }

    /// The number of states in the table.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows. A table built from an NFA always contains at least
    /// the start state.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The row of the state with the given number.
    pub fn row(&self, number: StateNumber) -> Option<&TableRow> {
        number
            .as_usize()
            .checked_sub(1)
            .and_then(|index| self.rows.get(index))
    }

    /// All rows together with their state numbers, in ascending order.
    pub fn rows(&self) -> impl Iterator<Item = (StateNumber, &TableRow)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, row)| (StateNumber::new(index + 1), row))
    }

    /// The number assigned to the NFA state with the given id. States that are not reachable
    /// from the start state have no number.
    pub fn number_of(&self, state_id: StateID) -> Option<StateNumber> {
        self.numbers.get(state_id.as_usize()).copied().flatten()
    }

    /// The numbers of the accepting states.
    pub fn accepting_states(&self) -> &BTreeSet<StateNumber> {
        &self.accepting_states
    }

    /// The direct targets of the state with the given number on `symbol`.
    pub fn targets(&self, number: StateNumber, symbol: char) -> &[StateNumber] {
        self.row(number)
            .and_then(|row| row.transitions.get(&symbol))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The epsilon closure of the state with the given number.
    pub fn epsilon_closure(&self, number: StateNumber) -> &[StateNumber] {
        self.row(number)
            .map(|row| row.epsilon_closure.as_slice())
            .unwrap_or_default()
    }
}
