//! This module contains the DFA implementation.
//! The DFA is used to match a string against a regex pattern in linear time.
//! The DFA is generated from the NFA using the subset construction algorithm.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::OnceLock;
use std::time::Instant;

use itertools::Itertools;
use log::{debug, trace};

use crate::{errors::DfaError, DfaStateID, Nfa, RegFaError, Result, StateNumber};

/// The label of a DFA state, i.e. the set of NFA state numbers the DFA state stands for.
///
/// The numbers are kept sorted and free of duplicates, so two labels are equal if and only if
/// they denote the same set, regardless of the order in which the NFA states were found.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DfaLabel(Vec<StateNumber>);

impl DfaLabel {
    /// Create the canonical label of the given set of NFA states.
    pub fn new<I>(nfa_states: I) -> Self
    where
        I: IntoIterator<Item = StateNumber>,
    {
        DfaLabel(nfa_states.into_iter().sorted_unstable().dedup().collect())
    }

    /// The NFA states of the label in ascending order.
    pub fn nfa_states(&self) -> &[StateNumber] {
        &self.0
    }

    /// Returns true if the label denotes the empty set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for DfaLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join(","))
    }
}

/// A state of the DFA.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DfaState {
    id: DfaStateID,
    // The NFA states that constitute this DFA state.
    label: DfaLabel,
}

impl DfaState {
    /// Get the id of the DFA state.
    pub fn id(&self) -> DfaStateID {
        self.id
    }

    /// Get the label of the DFA state.
    pub fn label(&self) -> &DfaLabel {
        &self.label
    }
}

/// The DFA implementation.
#[derive(Debug, Clone)]
pub struct Dfa {
    // The states of the DFA. The start state is always the first state in the vector, i.e. state 0.
    states: Vec<DfaState>,
    // The alphabet of the NFA the DFA was built from.
    alphabet: BTreeSet<char>,
    // The accepting states of the DFA.
    accepting_states: BTreeSet<DfaStateID>,
    // The transitions of the DFA, indexed by the source state. A missing entry means reject.
    transitions: Vec<BTreeMap<char, DfaStateID>>,
    // Maps each known subset to its state. Used to detect revisited subsets.
    ids: BTreeMap<DfaLabel, DfaStateID>,
    // Calculated on first request
    label_table: OnceLock<BTreeMap<DfaLabel, BTreeMap<char, DfaLabel>>>,
    // Calculated on first request
    accepting_labels: OnceLock<BTreeSet<DfaLabel>>,
}

impl Dfa {
    /// Create a DFA from an NFA.
    pub fn new(nfa: &Nfa) -> Self {
        match Self::try_from_nfa(nfa, |_| Ok::<(), Infallible>(())) {
            Ok(dfa) => dfa,
            Err(never) => match never {},
        }
    }

    /// Create a DFA from an NFA, but fail if the DFA would need more than `limit` states.
    pub fn try_with_state_limit(nfa: &Nfa, limit: usize) -> Result<Self> {
        Self::try_from_nfa(nfa, |state_count| {
            if state_count > limit {
                Err(RegFaError::from(DfaError::StateLimitExceeded { limit }))
            } else {
                Ok(())
            }
        })
    }

    /// Create a DFA from an NFA using the subset construction algorithm.
    /// `admit` is called with the new number of states before each state is added.
    fn try_from_nfa<E, F>(nfa: &Nfa, mut admit: F) -> std::result::Result<Self, E>
    where
        F: FnMut(usize) -> std::result::Result<(), E>,
    {
        let now = Instant::now();
        let table = nfa.transition_table();
        let mut dfa = Dfa {
            states: Vec::new(),
            alphabet: nfa.alphabet().clone(),
            accepting_states: BTreeSet::new(),
            transitions: Vec::new(),
            ids: BTreeMap::new(),
            label_table: OnceLock::new(),
            accepting_labels: OnceLock::new(),
        };

        // The initial state of the DFA is the epsilon closure of the start state of the NFA.
        let start_label = DfaLabel::new(
            table
                .epsilon_closure(table.start_state())
                .iter()
                .copied(),
        );
        let (initial_state, _) =
            dfa.add_state_if_new(start_label, table.accepting_states(), &mut admit)?;
        // The work list is used to keep track of the states that still need to be expanded.
        let mut work_list = vec![initial_state];

        while let Some(state_id) = work_list.pop() {
            for &symbol in nfa.alphabet() {
                let move_set = dfa.states[state_id]
                    .label
                    .nfa_states()
                    .iter()
                    .flat_map(|nfa_state| table.targets(*nfa_state, symbol).iter().copied())
                    .collect::<BTreeSet<_>>();
                let target_label = DfaLabel::new(
                    move_set
                        .iter()
                        .flat_map(|nfa_state| table.epsilon_closure(*nfa_state).iter().copied()),
                );
                if target_label.is_empty() {
                    continue;
                }
                let (target_state, is_new) =
                    dfa.add_state_if_new(target_label, table.accepting_states(), &mut admit)?;
                dfa.transitions[state_id].insert(symbol, target_state);
                if is_new {
                    work_list.push(target_state);
                }
            }
        }

        debug!(
            "DFA with {} states and {} accepting states built in {} microseconds",
            dfa.states.len(),
            dfa.accepting_states.len(),
            now.elapsed().as_micros()
        );
        Ok(dfa)
    }

    /// Add a state to the DFA if it does not already exist.
    /// The state is identified by its label. The accepting NFA states are used to determine if
    /// the DFA state is an accepting state.
    /// Returns the id of the state and whether the state was added.
    fn add_state_if_new<E, F>(
        &mut self,
        label: DfaLabel,
        accepting_states: &BTreeSet<StateNumber>,
        admit: &mut F,
    ) -> std::result::Result<(DfaStateID, bool), E>
    where
        F: FnMut(usize) -> std::result::Result<(), E>,
    {
        if let Some(state_id) = self.ids.get(&label) {
            return Ok((*state_id, false));
        }
        admit(self.states.len() + 1)?;

        let state_id = DfaStateID::new(self.states.len());
        if label
            .nfa_states()
            .iter()
            .any(|nfa_state| accepting_states.contains(nfa_state))
        {
            self.accepting_states.insert(state_id);
        }
        trace!("Add state {}: {{{}}}", state_id, label);

        self.ids.insert(label.clone(), state_id);
        self.states.push(DfaState {
            id: state_id,
            label,
        });
        self.transitions.push(BTreeMap::new());
        Ok((state_id, true))
    }

    /// Get the states of the DFA. The start state is the first one.
    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    /// Get the alphabet of the DFA.
    pub fn alphabet(&self) -> &BTreeSet<char> {
        &self.alphabet
    }

    /// The id of the start state. This is always 0.
    pub fn start_state_id(&self) -> DfaStateID {
        DfaStateID::new(0)
    }

    /// The label of the start state.
    pub fn start_state(&self) -> &DfaLabel {
        &self.states[self.start_state_id()].label
    }

    /// The labels of the accepting states.
    pub fn accepting_states(&self) -> &BTreeSet<DfaLabel> {
        self.accepting_labels.get_or_init(|| {
            self.accepting_states
                .iter()
                .map(|state_id| self.states[*state_id].label.clone())
                .collect()
        })
    }

    /// Returns true if the state with the given id is an accepting state.
    pub fn is_accepting(&self, state_id: DfaStateID) -> bool {
        self.accepting_states.contains(&state_id)
    }

    /// The id of the state with the given label, if the DFA has such a state.
    pub fn id_of(&self, label: &DfaLabel) -> Option<DfaStateID> {
        self.ids.get(label).copied()
    }

    /// The state reached from `state_id` on `symbol`. `None` means the input is rejected.
    #[inline]
    pub fn next_state(&self, state_id: DfaStateID, symbol: char) -> Option<DfaStateID> {
        self.transitions
            .get(state_id.as_usize())
            .and_then(|transitions| transitions.get(&symbol))
            .copied()
    }

    /// The transition table of the DFA keyed by state labels. It is built on first request.
    /// States without outgoing transitions have no entry.
    pub fn transition_table(&self) -> &BTreeMap<DfaLabel, BTreeMap<char, DfaLabel>> {
        self.label_table.get_or_init(|| {
            self.states
                .iter()
                .zip(self.transitions.iter())
                .filter(|(_, transitions)| !transitions.is_empty())
                .map(|(state, transitions)| {
                    (
                        state.label.clone(),
                        transitions
                            .iter()
                            .map(|(symbol, target)| {
                                (*symbol, self.states[*target].label.clone())
                            })
                            .collect(),
                    )
                })
                .collect()
        })
    }
}

impl From<&Nfa> for Dfa {
    fn from(nfa: &Nfa) -> Self {
        Dfa::new(nfa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegFaErrorKind;

    // A data type that provides test data for the subset construction tests.
    struct TestData {
        name: &'static str,
        nfa: fn() -> Nfa,
        states: usize,
        accepting_states: usize,
        alphabet: usize,
    }

    fn dragon() -> Nfa {
        // (a|b)*abb
        Nfa::concat([
            Nfa::union([Nfa::char('a'), Nfa::char('b')]).star(),
            Nfa::char('a'),
            Nfa::char('b'),
            Nfa::char('b'),
        ])
    }

    const TEST_DATA: &[TestData] = &[
        TestData {
            name: "char",
            nfa: || Nfa::char('a'),
            states: 2,
            accepting_states: 1,
            alphabet: 1,
        },
        TestData {
            name: "concat",
            nfa: || Nfa::concat([Nfa::char('a'), Nfa::char('b')]),
            states: 3,
            accepting_states: 1,
            alphabet: 2,
        },
        TestData {
            name: "union",
            nfa: || Nfa::union([Nfa::char('a'), Nfa::char('b')]),
            states: 3,
            accepting_states: 2,
            alphabet: 2,
        },
        TestData {
            name: "star",
            nfa: || Nfa::char('a').star(),
            states: 2,
            accepting_states: 2,
            alphabet: 1,
        },
        TestData {
            name: "dragon",
            nfa: dragon,
            states: 5,
            accepting_states: 1,
            alphabet: 2,
        },
        TestData {
            name: "epsilon",
            nfa: Nfa::epsilon,
            states: 1,
            accepting_states: 1,
            alphabet: 0,
        },
        TestData {
            name: "empty_language",
            nfa: Nfa::empty_language,
            states: 1,
            accepting_states: 0,
            alphabet: 0,
        },
    ];

    // Initialize the logger for the tests
    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_dfa_from_nfa() {
        init();

        for data in TEST_DATA {
            let nfa = (data.nfa)();
            let dfa = Dfa::new(&nfa);

            assert_eq!(dfa.states().len(), data.states, "states of {}", data.name);
            assert_eq!(
                dfa.accepting_states().len(),
                data.accepting_states,
                "accepting_states of {}",
                data.name
            );
            assert_eq!(
                dfa.alphabet().len(),
                data.alphabet,
                "alphabet of {}",
                data.name
            );
        }
    }

    #[test]
    fn test_subsets_are_unique_and_bounded() {
        init();

        for data in TEST_DATA {
            let nfa = (data.nfa)();
            let dfa = Dfa::new(&nfa);
            let labels = dfa
                .states()
                .iter()
                .map(DfaState::label)
                .collect::<BTreeSet<_>>();
            assert_eq!(labels.len(), dfa.states().len(), "labels of {}", data.name);
            let nfa_states = nfa.transition_table().len() as u32;
            assert!(dfa.states().len() <= 2usize.pow(nfa_states));
            assert!(labels.iter().all(|label| !label.is_empty()));

            // Building again yields the same automaton
            let again = Dfa::new(&nfa);
            assert_eq!(again.transition_table(), dfa.transition_table());
        }
    }

    #[test]
    fn test_label_is_canonical() {
        let numbers = |numbers: &[usize]| {
            numbers
                .iter()
                .copied()
                .map(StateNumber::new)
                .collect::<Vec<_>>()
        };
        let label = DfaLabel::new(numbers(&[10, 3, 2, 3]));
        assert_eq!(label, DfaLabel::new(numbers(&[2, 3, 10])));
        assert_eq!(label.to_string(), "2,3,10");
        assert!(DfaLabel::new(Vec::new()).is_empty());
    }

    #[test]
    fn test_start_state_and_transitions() {
        let nfa = Nfa::concat([Nfa::char('a'), Nfa::char('b')]);
        let dfa = Dfa::new(&nfa);

        assert_eq!(dfa.start_state().to_string(), "1");
        let table = dfa.transition_table();
        assert_eq!(table.len(), 2);
        let after_a = &table[dfa.start_state()][&'a'];
        assert_eq!(after_a.to_string(), "2,3");
        assert!(!table[dfa.start_state()].contains_key(&'b'));
        assert_eq!(table[after_a][&'b'].to_string(), "4");

        let accepting = dfa.accepting_states();
        assert_eq!(accepting.len(), 1);
        assert!(accepting.iter().all(|label| label.to_string() == "4"));

        let start = dfa.start_state_id();
        assert_eq!(dfa.next_state(start, 'b'), None);
        let next = dfa.next_state(start, 'a');
        assert_eq!(next, dfa.id_of(after_a));

        // Both views are built once
        assert!(std::ptr::eq(table, dfa.transition_table()));
        assert!(std::ptr::eq(accepting, dfa.accepting_states()));
    }

    #[test]
    fn test_state_count_does_not_depend_on_operand_order() {
        init();

        let dragon_swapped = || {
            Nfa::concat([
                Nfa::union([Nfa::char('b'), Nfa::char('a')]).star(),
                Nfa::char('a'),
                Nfa::char('b'),
                Nfa::char('b'),
            ])
        };
        let a_plus = || Nfa::char('a').plus();
        let a_then_b = || Nfa::concat([Nfa::char('a'), Nfa::char('b')]);
        let pairs: &[(Nfa, Nfa)] = &[
            (
                Nfa::union([Nfa::char('a'), Nfa::char('b')]).star(),
                Nfa::union([Nfa::char('b'), Nfa::char('a')]).star(),
            ),
            (dragon(), dragon_swapped()),
            (
                Nfa::union([a_plus(), a_then_b()]),
                Nfa::union([a_then_b(), a_plus()]),
            ),
        ];
        for (first, second) in pairs {
            // The NFA numbering differs, so the subsets are discovered in a different order.
            assert_ne!(first.transition_table(), second.transition_table());
            let first_dfa = Dfa::new(first);
            let second_dfa = Dfa::new(second);
            assert_eq!(first_dfa.states().len(), second_dfa.states().len());
            assert_eq!(
                first_dfa.accepting_states().len(),
                second_dfa.accepting_states().len()
            );
        }
    }

    #[test]
    fn test_epsilon_only_nfa_has_one_state() {
        let dfa = Dfa::new(&Nfa::epsilon());
        assert_eq!(dfa.states().len(), 1);
        assert!(dfa.is_accepting(dfa.start_state_id()));
        assert_eq!(dfa.start_state().to_string(), "1,2");
        assert!(dfa.transition_table().is_empty());
    }

    #[test]
    fn test_state_limit() {
        init();

        let nfa = dragon();
        let error = Dfa::try_with_state_limit(&nfa, 3).unwrap_err();
        assert!(matches!(
            error.kind(),
            RegFaErrorKind::DfaError(DfaError::StateLimitExceeded { limit: 3 })
        ));

        let dfa = Dfa::try_with_state_limit(&nfa, 5).unwrap();
        assert_eq!(dfa.states().len(), 5);
    }
}
