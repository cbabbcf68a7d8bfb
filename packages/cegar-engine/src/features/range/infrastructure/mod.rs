//! Range transfer and remaining-range generation

pub mod path_range;
pub mod restriction;

pub use path_range::PathRangeGenerator;
pub use restriction::RangeRestriction;
