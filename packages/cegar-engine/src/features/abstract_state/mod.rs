//! Composite abstract states
//!
//! ## Architecture
//! ```text
//! abstract_state/
//! ├── domain/
//! │   ├── composite.rs        # CompositeState
//! │   ├── callstack.rs        # call frames
//! │   └── predicate_state.rs  # Cartesian predicate cube
//! └── infrastructure/
//!     ├── transfer.rs         # successors along CFA edges
//!     └── abstraction.rs      # abstraction points, cached abstraction
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
