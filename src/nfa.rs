//! This module contains the NFA (Non-deterministic Finite Automaton) implementation.
//! An NFA fragment is built by Thompson construction from single symbols and the combinators
//! defined here. Every fragment has exactly one start state and one end state, and only the end
//! state is accepting.
//! The NFA is later converted to a DFA (Deterministic Finite Automaton) for matching strings.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use log::trace;

use crate::{
    errors::invalid_range, state::NfaState, transition_table::NfaTransitionTable, RegFaError,
    RegFaErrorKind, Result, StateID,
};

/// An NFA fragment with a single start state and a single end state.
///
/// The fragment owns all of its states. Combinators consume their operands and return a new
/// fragment, so a state graph can never be shared between two fragments.
#[derive(Debug, Clone)]
pub struct Nfa {
    states: Vec<NfaState>,
    start_state: StateID,
    end_state: StateID,
    // Calculated on first request
    alphabet: OnceLock<BTreeSet<char>>,
    // Calculated on first request
    transition_table: OnceLock<NfaTransitionTable>,
}

impl Nfa {
    // Two unconnected states. The end state is accepting.
    fn with_two_states() -> Self {
        let mut nfa = Self {
            states: vec![
                NfaState::new(StateID::new(0)),
                NfaState::new(StateID::new(1)),
            ],
            start_state: StateID::new(0),
            end_state: StateID::new(1),
            alphabet: OnceLock::new(),
            transition_table: OnceLock::new(),
        };
        nfa.states[1].set_accepting(true);
        nfa
    }

    /// Single symbol machine: `a`.
    pub fn char(symbol: char) -> Self {
        let mut nfa = Self::with_two_states();
        nfa.add_transition(nfa.start_state, symbol, nfa.end_state);
        nfa
    }

    /// Machine that accepts only the empty input.
    pub fn epsilon() -> Self {
        let mut nfa = Self::with_two_states();
        nfa.add_epsilon_transition(nfa.start_state, nfa.end_state);
        nfa
    }

    /// Machine that accepts nothing at all, not even the empty input.
    /// This is the neutral element of [`Nfa::union`].
    pub fn empty_language() -> Self {
        Self::with_two_states()
    }

    /// Character set machine: `[abc]`.
    /// All symbols share the same start and end state.
    pub fn any_of<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = char>,
    {
        let mut nfa = Self::with_two_states();
        for symbol in symbols {
            nfa.add_transition(nfa.start_state, symbol, nfa.end_state);
        }
        nfa
    }

    /// Character range machine: `[lo-hi]`.
    /// Fails with `InvalidRange` if `lo > hi`.
    pub fn char_range(lo: char, hi: char) -> Result<Self> {
        if lo > hi {
            return Err(invalid_range!(lo, hi));
        }
        Ok(Self::any_of(lo..=hi))
    }

    /// The digit class `\d`, i.e. `0|1|2|...|9`.
    pub fn digits() -> Self {
        Self::union(('0'..='9').map(Self::char))
    }

    /// Digit range machine as union of single digit machines: `lo|lo+1|...|hi`.
    /// Fails with `InvalidRange` if a bound is not a digit or if `lo > hi`.
    pub fn digit_range(lo: u32, hi: u32) -> Result<Self> {
        let digits = Self::digit_symbols(lo, hi)?;
        Ok(Self::union(digits.map(Self::char)))
    }

    /// Same language as [`Nfa::digit_range`], but all digits share one start and one end state.
    pub fn digit_range_opt(lo: u32, hi: u32) -> Result<Self> {
        let digits = Self::digit_symbols(lo, hi)?;
        Ok(Self::any_of(digits))
    }

    /// Digit range with textual bounds as a regex front end would pass them.
    /// Fails with `InvalidArgument` if a bound is not an integral number and with
    /// `InvalidRange` if the bounds are no valid digit range.
    pub fn parse_digit_range(lo: &str, hi: &str) -> Result<Self> {
        let lo_value = Self::parse_digit_bound(lo)?;
        let hi_value = Self::parse_digit_bound(hi)?;
        match (u32::try_from(lo_value), u32::try_from(hi_value)) {
            (Ok(lo_digit), Ok(hi_digit)) => Self::digit_range(lo_digit, hi_digit),
            _ => Err(invalid_range!(lo_value, hi_value)),
        }
    }

    fn parse_digit_bound(text: &str) -> Result<i64> {
        let text = text.trim();
        if let Ok(value) = text.parse::<i64>() {
            return Ok(value);
        }
        match text.parse::<f64>() {
            // Integral floats like "3.0" are accepted
            Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
            _ => Err(RegFaError::new(RegFaErrorKind::InvalidArgument(format!(
                "range bound '{}' is not an integral number",
                text
            )))),
        }
    }

    fn digit_symbols(lo: u32, hi: u32) -> Result<impl Iterator<Item = char>> {
        if lo > 9 || hi > 9 || lo > hi {
            return Err(invalid_range!(lo, hi));
        }
        Ok((lo..=hi).filter_map(|digit| char::from_digit(digit, 10)))
    }

    /// Concatenation of all given fragments, folded from the left.
    /// Without any fragment the result accepts only the empty input.
    pub fn concat<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Nfa>,
    {
        let mut fragments = fragments.into_iter();
        match fragments.next() {
            Some(first) => fragments.fold(first, Nfa::concat_pair),
            None => Self::epsilon(),
        }
    }

    /// Union of all given fragments, folded from the left.
    /// Without any fragment the result accepts nothing.
    pub fn union<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = Nfa>,
    {
        let mut fragments = fragments.into_iter();
        match fragments.next() {
            Some(first) => fragments.fold(first, Nfa::union_pair),
            None => Self::empty_language(),
        }
    }

    /// Concatenates the current NFA with another NFA: `ab`.
    pub fn concat_pair(mut self, nfa: Nfa) -> Self {
        // Move the states of the given NFA to the current NFA
        let (nfa_start_state, nfa_end_state) = self.append(nfa);

        self.states[self.end_state].set_accepting(false);
        self.states[nfa_end_state].set_accepting(true);

        // Connect the end state of the current NFA to the start state of the new NFA
        self.add_epsilon_transition(self.end_state, nfa_start_state);

        self.end_state = nfa_end_state;
        self.invalidated()
    }

    /// Alternation of the current NFA and another NFA: `a|b`.
    pub fn union_pair(mut self, nfa: Nfa) -> Self {
        let (nfa_start_state, nfa_end_state) = self.append(nfa);

        let start_state = self.new_state();
        let end_state = self.new_state();

        self.states[self.end_state].set_accepting(false);
        self.states[nfa_end_state].set_accepting(false);
        self.states[end_state].set_accepting(true);

        // Entry: either into the current NFA or into the new NFA
        self.add_epsilon_transition(start_state, self.start_state);
        self.add_epsilon_transition(start_state, nfa_start_state);

        // Exit: from both NFAs into the new end state
        self.add_epsilon_transition(self.end_state, end_state);
        self.add_epsilon_transition(nfa_end_state, end_state);

        self.start_state = start_state;
        self.end_state = end_state;
        self.invalidated()
    }

    /// Kleene closure: `a*`.
    pub fn star(mut self) -> Self {
        let start_state = self.new_state();
        let end_state = self.new_state();

        self.states[self.end_state].set_accepting(false);
        self.states[end_state].set_accepting(true);

        self.add_epsilon_transition(start_state, self.start_state);
        // Zero repetitions
        self.add_epsilon_transition(start_state, end_state);
        self.add_epsilon_transition(self.end_state, end_state);
        // Repeat from the new end state
        self.add_epsilon_transition(end_state, self.start_state);

        self.start_state = start_state;
        self.end_state = end_state;
        self.invalidated()
    }

    /// One or more repetitions: `a+`, built as `aa*` from an independent copy of the fragment.
    pub fn plus(self) -> Self {
        self.clone().concat_pair(self.star())
    }

    /// Zero or one occurrence: `a?`, built as `a|ε`.
    pub fn optional(self) -> Self {
        self.union_pair(Self::epsilon())
    }

    /// Same language as [`Nfa::star`].
    /// The epsilon loop is spliced directly between the start and end state if nothing leads into
    /// the start state and nothing leaves the end state. Otherwise [`Nfa::star`] is used.
    pub fn star_opt(mut self) -> Self {
        if !self.has_isolated_ends() {
            trace!("star_opt: ends are connected, using wrapper states");
            return self.star();
        }
        self.add_epsilon_transition(self.start_state, self.end_state);
        self.add_epsilon_transition(self.end_state, self.start_state);
        self.invalidated()
    }

    /// Same language as [`Nfa::plus`], built with a single back edge from the end state to the
    /// start state instead of a copy of the fragment.
    pub fn plus_opt(mut self) -> Self {
        self.add_epsilon_transition(self.end_state, self.start_state);
        self.invalidated()
    }

    /// Same language as [`Nfa::optional`].
    /// The skip edge is spliced directly between the start and end state if nothing leads into
    /// the start state and nothing leaves the end state. Otherwise [`Nfa::optional`] is used.
    pub fn optional_opt(mut self) -> Self {
        if !self.has_isolated_ends() {
            trace!("optional_opt: ends are connected, using wrapper states");
            return self.optional();
        }
        self.add_epsilon_transition(self.start_state, self.end_state);
        self.invalidated()
    }

    // A new edge between the start state and the end state only changes the language in the
    // intended way if the start state can't be re-entered and the end state can't be left.
    fn has_isolated_ends(&self) -> bool {
        self.start_state != self.end_state
            && self.states[self.end_state].is_empty()
            && !self
                .states
                .iter()
                .any(|state| state.has_transition_to(self.start_state))
    }

    /// The start state of the NFA.
    pub fn start_state(&self) -> StateID {
        self.start_state
    }

    /// The end state of the NFA. It is the only accepting state.
    pub fn end_state(&self) -> StateID {
        self.end_state
    }

    /// All states of the NFA, indexed by their id.
    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    /// The state with the given id.
    pub fn state(&self, id: StateID) -> &NfaState {
        &self.states[id]
    }

    /// All states reachable from `state` via epsilon transitions only, including `state` itself.
    /// Every state occurs exactly once. The result is calculated once per state and cached.
    pub fn epsilon_closure(&self, state: StateID) -> &[StateID] {
        self.states[state]
            .epsilon_closure_cell()
            .get_or_init(|| self.calculate_epsilon_closure(state))
    }

    fn calculate_epsilon_closure(&self, state: StateID) -> Vec<StateID> {
        let mut visited = vec![false; self.states.len()];
        visited[state] = true;
        let mut closure = vec![state];
        let mut stack = vec![state];
        while let Some(current) = stack.pop() {
            for &target in self.states[current].epsilon_transitions() {
                if !visited[target] {
                    visited[target] = true;
                    closure.push(target);
                    stack.push(target);
                }
            }
        }
        closure
    }

    /// The symbols of all transitions reachable from the start state. Epsilon is never part of
    /// the alphabet.
    pub fn alphabet(&self) -> &BTreeSet<char> {
        self.alphabet.get_or_init(|| {
            let mut alphabet = BTreeSet::new();
            let mut visited = vec![false; self.states.len()];
            let mut stack = vec![self.start_state];
            while let Some(state_id) = stack.pop() {
                if visited[state_id] {
                    continue;
                }
                visited[state_id] = true;
                let state = &self.states[state_id];
                for (symbol, targets) in state.transitions() {
                    alphabet.insert(symbol);
                    stack.extend_from_slice(targets);
                }
                stack.extend_from_slice(state.epsilon_transitions());
            }
            alphabet
        })
    }

    /// The numbered transition table of the NFA. It is built on first request and the numbering
    /// stays the same for the lifetime of the NFA.
    pub fn transition_table(&self) -> &NfaTransitionTable {
        self.transition_table
            .get_or_init(|| NfaTransitionTable::new(self))
    }

    pub(crate) fn new_state(&mut self) -> StateID {
        let state = StateID::new(self.states.len());
        self.states.push(NfaState::new(state));
        state
    }

    pub(crate) fn add_transition(&mut self, from: StateID, symbol: char, target_state: StateID) {
        self.states[from].add_transition(symbol, target_state);
    }

    pub(crate) fn add_epsilon_transition(&mut self, from: StateID, target_state: StateID) {
        self.states[from].add_epsilon_transition(target_state);
    }

    /// Move the states of the given NFA to the current NFA and thereby consume the NFA.
    /// Returns the shifted start and end state of the appended NFA.
    fn append(&mut self, mut nfa: Nfa) -> (StateID, StateID) {
        let offset = self.states.len();
        for state in nfa.states.iter_mut() {
            state.offset(offset);
        }
        self.states.append(&mut nfa.states);
        // Check the index constraints
        debug_assert!(self
            .states
            .iter()
            .enumerate()
            .all(|(i, s)| s.id().as_usize() == i));
        (nfa.start_state + offset, nfa.end_state + offset)
    }

    // Drop everything that was calculated from the previous shape of the graph.
    fn invalidated(mut self) -> Self {
        self.alphabet = OnceLock::new();
        self.transition_table = OnceLock::new();
        for state in self.states.iter_mut() {
            state.reset_epsilon_closure();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegFaErrorKind;

    #[test]
    fn test_nfa_char() {
        let nfa = Nfa::char('a');

        assert_eq!(nfa.states().len(), 2);
        assert_eq!(nfa.start_state().as_usize(), 0);
        assert_eq!(nfa.end_state().as_usize(), 1);
        assert_eq!(nfa.state(nfa.start_state()).transitions_for('a'), &[nfa.end_state()]);
        assert!(nfa.state(nfa.end_state()).is_accepting());
    }

    #[test]
    fn test_nfa_concat() {
        let nfa = Nfa::concat([Nfa::char('a'), Nfa::char('b')]);

        assert_eq!(nfa.states().len(), 4);
        assert_eq!(nfa.start_state().as_usize(), 0);
        assert_eq!(nfa.end_state().as_usize(), 3);
        assert!(!nfa.states()[1].is_accepting());
        assert!(nfa.states()[3].is_accepting());
        assert_eq!(nfa.states()[1].epsilon_transitions(), &[StateID::new(2)]);
    }

    #[test]
    fn test_nfa_union() {
        let nfa = Nfa::union([Nfa::char('a'), Nfa::char('b')]);

        assert_eq!(nfa.states().len(), 6);
        assert_eq!(nfa.start_state().as_usize(), 4);
        assert_eq!(nfa.end_state().as_usize(), 5);
        // Newest transition first
        assert_eq!(
            nfa.state(nfa.start_state()).epsilon_transitions(),
            &[StateID::new(2), StateID::new(0)]
        );
        let accepting = nfa.states().iter().filter(|s| s.is_accepting()).count();
        assert_eq!(accepting, 1);
    }

    #[test]
    fn test_nfa_star() {
        let nfa = Nfa::char('a').star();

        assert_eq!(nfa.states().len(), 4);
        assert_eq!(nfa.start_state().as_usize(), 2);
        assert_eq!(nfa.end_state().as_usize(), 3);
        assert!(!nfa.states()[1].is_accepting());
        assert_eq!(nfa.states()[3].epsilon_transitions(), &[StateID::new(0)]);
    }

    #[test]
    fn test_nfa_plus_and_optional() {
        let nfa = Nfa::char('a').plus();
        assert_eq!(nfa.states().len(), 6);
        assert_eq!(nfa.start_state().as_usize(), 0);
        assert_eq!(nfa.end_state().as_usize(), 5);

        let nfa = Nfa::char('a').optional();
        assert_eq!(nfa.states().len(), 6);
        assert_eq!(nfa.start_state().as_usize(), 4);
        assert_eq!(nfa.end_state().as_usize(), 5);
    }

    #[test]
    fn test_nfa_opt_variants_reuse_states() {
        assert_eq!(Nfa::char('a').star_opt().states().len(), 2);
        assert_eq!(Nfa::char('a').plus_opt().states().len(), 2);
        assert_eq!(Nfa::char('a').optional_opt().states().len(), 2);
        assert_eq!(Nfa::digit_range_opt(0, 9).unwrap().states().len(), 2);
        assert_eq!(Nfa::digit_range(0, 9).unwrap().states().len(), 38);
    }

    #[test]
    fn test_nfa_opt_variants_fall_back_on_connected_ends() {
        // The end state of a star has an outgoing back edge.
        let nfa = Nfa::char('a').star().optional_opt();
        assert_eq!(nfa.states().len(), 8);

        // The start state of a plus_opt has an incoming back edge.
        let nfa = Nfa::concat([Nfa::char('a').plus_opt(), Nfa::char('b')]).star_opt();
        assert_eq!(nfa.states().len(), 6);
    }

    #[test]
    fn test_empty_fragment_lists() {
        let nfa = Nfa::concat(std::iter::empty());
        assert_eq!(nfa.states().len(), 2);
        assert_eq!(nfa.state(nfa.start_state()).epsilon_transitions(), &[nfa.end_state()]);

        let nfa = Nfa::union(std::iter::empty());
        assert!(nfa.states().iter().all(NfaState::is_empty));
        assert!(nfa.alphabet().is_empty());
    }

    #[test]
    fn test_digit_range_errors() {
        for (lo, hi) in [(3, 2), (0, 10), (10, 12)] {
            let error = Nfa::digit_range(lo, hi).unwrap_err();
            assert!(matches!(error.kind(), RegFaErrorKind::InvalidRange { .. }));
            let error = Nfa::digit_range_opt(lo, hi).unwrap_err();
            assert!(matches!(error.kind(), RegFaErrorKind::InvalidRange { .. }));
        }
        assert!(Nfa::digit_range(4, 4).is_ok());
    }

    #[test]
    fn test_parse_digit_range() {
        assert!(Nfa::parse_digit_range("0", "3").is_ok());
        assert!(Nfa::parse_digit_range(" 2 ", "7.0").is_ok());

        let error = Nfa::parse_digit_range("1.5", "3").unwrap_err();
        assert!(matches!(error.kind(), RegFaErrorKind::InvalidArgument(_)));
        let error = Nfa::parse_digit_range("0", "x").unwrap_err();
        assert!(matches!(error.kind(), RegFaErrorKind::InvalidArgument(_)));
        let error = Nfa::parse_digit_range("-1", "3").unwrap_err();
        assert!(matches!(error.kind(), RegFaErrorKind::InvalidRange { .. }));
        let error = Nfa::parse_digit_range("5", "2").unwrap_err();
        assert!(matches!(error.kind(), RegFaErrorKind::InvalidRange { .. }));
    }

    #[test]
    fn test_char_range() {
        let nfa = Nfa::char_range('a', 'e').unwrap();
        assert_eq!(nfa.states().len(), 2);
        assert_eq!(
            nfa.alphabet().iter().collect::<String>(),
            "abcde".to_string()
        );
        assert!(Nfa::char_range('z', 'a').is_err());
    }

    #[test]
    fn test_alphabet_excludes_epsilon() {
        let nfa = Nfa::union([
            Nfa::concat([Nfa::char('x'), Nfa::char('y').star()]),
            Nfa::char('z'),
            Nfa::epsilon(),
        ]);
        assert_eq!(
            nfa.alphabet().iter().copied().collect::<Vec<_>>(),
            vec!['x', 'y', 'z']
        );
        assert!(Nfa::epsilon().alphabet().is_empty());
    }

    #[test]
    fn test_epsilon_closure_of_cycles() {
        // The outer star loops back into the inner star and vice versa.
        let nfa = Nfa::char('a').star().star();
        let end = nfa.end_state();
        let closure = nfa.epsilon_closure(end);

        let unique = closure.iter().collect::<BTreeSet<_>>();
        assert_eq!(unique.len(), closure.len());
        assert_eq!(
            closure,
            &[
                StateID::new(5),
                StateID::new(2),
                StateID::new(3),
                StateID::new(0)
            ]
        );
    }

    #[test]
    fn test_epsilon_closure_self_loop() {
        let nfa = Nfa::epsilon().plus_opt();
        let closure = nfa.epsilon_closure(nfa.start_state());
        assert_eq!(closure, &[StateID::new(0), StateID::new(1)]);
        // Cached
        assert!(std::ptr::eq(
            closure,
            nfa.epsilon_closure(nfa.start_state())
        ));
    }

    #[test]
    fn test_caches_are_reset_after_combination() {
        let nfa = Nfa::char('a');
        assert_eq!(nfa.epsilon_closure(nfa.end_state()), &[StateID::new(1)]);
        assert_eq!(nfa.alphabet().len(), 1);

        let nfa = nfa.concat_pair(Nfa::char('b'));
        assert_eq!(
            nfa.epsilon_closure(StateID::new(1)),
            &[StateID::new(1), StateID::new(2)]
        );
        assert_eq!(nfa.alphabet().len(), 2);
    }
}
