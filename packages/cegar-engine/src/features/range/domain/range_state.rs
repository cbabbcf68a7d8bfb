//! Ranged-analysis sub-state
//!
//! Per bound of the configured interval, the concrete execution of that
//! bound's inputs while the explored path still coincides with it. Once
//! the path leaves a bound's execution on the permitted side (or the
//! execution becomes undetermined) the bound is untied and stops
//! restricting the path.

use crate::features::execution::ConcreteRun;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RangeState {
    pub(crate) start: Option<ConcreteRun>,
    pub(crate) end: Option<ConcreteRun>,
}

impl RangeState {
    pub fn new(start: Option<ConcreteRun>, end: Option<ConcreteRun>) -> Self {
        Self { start, end }
    }

    pub fn tied_to_start(&self) -> bool {
        self.start.is_some()
    }

    pub fn tied_to_end(&self) -> bool {
        self.end.is_some()
    }

    /// Neither bound restricts the path any more
    pub fn is_unrestricted(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl std::fmt::Display for RangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tie = |tied: bool| if tied { "tied" } else { "free" };
        write!(
            f,
            "range(start {}, end {})",
            tie(self.tied_to_start()),
            tie(self.tied_to_end())
        )
    }
}
