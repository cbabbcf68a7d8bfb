//! Safety-property automata observing CFA edges
//!
//! ```text
//! automaton/
//! └── domain/
//!     └── automaton.rs  # guards, transitions, product of several automata
//! ```

pub mod domain;

pub use domain::*;
