//! Transfer relation and predicate abstraction

pub mod abstraction;
pub mod transfer;

pub use abstraction::{AbstractionPolicy, PredicateAbstractor};
pub use transfer::{Successor, TransferRelation};
