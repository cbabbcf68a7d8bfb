//! Range domain: input bounds and the per-path range sub-state

pub mod range;
pub mod range_state;

pub use range::{load_range, save_range, RangeError, RangeInterval, RangeValue};
pub use range_state::RangeState;
