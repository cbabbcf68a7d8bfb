//! Automaton domain models

pub mod automaton;

pub use automaton::{
    Automaton, AutomatonMove, AutomatonProduct, EdgeKindTag, Guard, ProductMove, Transition,
};
