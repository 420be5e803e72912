//! This module contains the two matching algorithms.
//! The NFA is matched by backtracking directly on its state graph, which takes time proportional
//! to the number of states times the length of the input. The DFA is matched by walking its
//! transition table, which takes time linear in the length of the input.

use std::collections::BTreeSet;

use crate::{Dfa, Nfa, StateID};

/// A type that can decide whether it accepts an input.
pub trait Matcher {
    /// Returns true if the whole sequence of symbols is accepted.
    fn test_symbols(&self, symbols: &[char]) -> bool;

    /// Returns true if the whole input is accepted. Every `char` of the input is one symbol.
    fn test(&self, input: &str) -> bool {
        let symbols = input.chars().collect::<Vec<_>>();
        self.test_symbols(&symbols)
    }
}

impl Matcher for Nfa {
    fn test_symbols(&self, symbols: &[char]) -> bool {
        self.backtrack(symbols)
    }
}

impl Nfa {
    /// Depth-first search over pairs of state and input position, driven by an explicit stack.
    ///
    /// At each state the transitions on the next symbol are tried before the epsilon
    /// transitions, each in their stored order. A pair is entered at most once: a pair that was
    /// already entered either is on the current path, which is an epsilon cycle, or has been
    /// fully explored without success.
    fn backtrack(&self, symbols: &[char]) -> bool {
        let mut visited: BTreeSet<(usize, StateID)> = BTreeSet::new();
        let mut stack = vec![(self.start_state(), 0)];
        while let Some((state_id, position)) = stack.pop() {
            if !visited.insert((position, state_id)) {
                continue;
            }
            let state = self.state(state_id);
            if position == symbols.len() && state.is_accepting() {
                return true;
            }
            // Pushed in reverse, so that the first transition to try is popped first
            stack.extend(
                state
                    .epsilon_transitions()
                    .iter()
                    .rev()
                    .map(|next| (*next, position)),
            );
            if let Some(symbol) = symbols.get(position) {
                stack.extend(
                    state
                        .transitions_for(*symbol)
                        .iter()
                        .rev()
                        .map(|next| (*next, position + 1)),
                );
            }
        }
        false
    }
}

impl Matcher for Dfa {
    fn test_symbols(&self, symbols: &[char]) -> bool {
        let mut state_id = self.start_state_id();
        for symbol in symbols {
            match self.next_state(state_id, *symbol) {
                Some(next) => state_id = next,
                None => return false,
            }
        }
        self.is_accepting(state_id)
    }
}
