//! Ranged analysis
//!
//! Restricts exploration to the paths between two concrete executions and
//! reports the range left over when an analysis is interrupted.
//!
//! ```text
//! range/
//! ├── domain/
//! │   ├── range.rs          # RangeValue, RangeInterval, range files
//! │   └── range_state.rs    # per-path tie to the bound executions
//! └── infrastructure/
//!     ├── restriction.rs    # range transfer relation
//!     └── path_range.rs     # remaining range on budget exhaustion
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
