//! Abstract reachability graph
//!
//! ## Architecture
//! ```text
//! arg/
//! ├── domain/
//! │   └── arg.rs          # node arena, covering relation, pruning
//! └── infrastructure/
//!     ├── coverage.rs     # (location, callstack) -> candidates
//!     ├── waitlist.rs     # BFS / DFS frontier
//!     ├── reached.rs      # ARG + frontier + coverage kept in step
//!     ├── explorer.rs     # batched, parallel expansion
//!     └── export.rs       # DOT and JSON
//! ```

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
