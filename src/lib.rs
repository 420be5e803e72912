#![forbid(missing_docs)]
//! The `regfa` crate provides the finite automata backend of a regular expression engine.
//! NFAs are built by Thompson construction from single symbols and combinators such as
//! concatenation, union and repetition. An NFA can be converted into an equivalent DFA by subset
//! construction, which matches in time linear to the length of the input.
//!
//! ```
//! use regfa::{Dfa, Matcher, Nfa};
//!
//! // xy*|z
//! let nfa = Nfa::union([
//!     Nfa::concat([Nfa::char('x'), Nfa::char('y').star()]),
//!     Nfa::char('z'),
//! ]);
//! let dfa = Dfa::new(&nfa);
//! assert!(nfa.test("xyy") && dfa.test("xyy"));
//! assert!(!nfa.test("za") && !dfa.test("za"));
//! ```

/// Module with error definitions
mod errors;
pub use errors::{DfaError, RegFaError, RegFaErrorKind, Result};

/// Module for several ID types.
mod ids;
pub use ids::{DfaStateID, StateID, StateNumber};

/// The state module contains the state type of the NFA graph.
mod state;
pub use state::NfaState;

/// The nfa module contains the NFA implementation and its combinators.
mod nfa;
pub use nfa::Nfa;

/// Module that provides the numbered transition table of an NFA.
mod transition_table;
pub use transition_table::{NfaTransitionTable, TableRow};

/// Module that provides the DFA and the subset construction.
mod dfa;
pub use dfa::{Dfa, DfaLabel, DfaState};

/// Module with the matching algorithms of NFA and DFA.
mod matcher;
pub use matcher::Matcher;
