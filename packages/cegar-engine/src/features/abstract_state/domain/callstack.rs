//! Call stack sub-state

use crate::errors::{EngineError, ModelingError, Result};
use crate::pipeline::verdict::Resource;
use crate::shared::models::CfaNodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallFrame {
    pub call_site: CfaNodeId,
    pub return_node: CfaNodeId,
    pub function: String,
}

/// Frames of the active calls, innermost last. The entry function has no
/// frame, so the root state has an empty stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallStack {
    frames: Arc<Vec<CallFrame>>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Function executing at this stack, given the entry function
    pub fn current_function<'a>(&'a self, entry_function: &'a str) -> &'a str {
        self.top().map(|f| f.function.as_str()).unwrap_or(entry_function)
    }

    /// Stack after entering `frame.function`
    pub fn push(&self, frame: CallFrame, entry_function: &str, max_depth: usize) -> Result<Self> {
        if frame.function == entry_function || self.frames.iter().any(|f| f.function == frame.function)
        {
            return Err(ModelingError::Recursion(frame.function).into());
        }
        if self.depth() >= max_depth {
            return Err(EngineError::exhausted(Resource::CallDepth, max_depth));
        }
        let mut frames = (*self.frames).clone();
        frames.push(frame);
        Ok(Self {
            frames: Arc::new(frames),
        })
    }

    /// Stack after returning to `return_node`; `None` when the innermost
    /// call does not return there
    pub fn pop_to(&self, return_node: CfaNodeId) -> Option<Self> {
        let top = self.top()?;
        if top.return_node != return_node {
            return None;
        }
        let mut frames = (*self.frames).clone();
        frames.pop();
        Some(Self {
            frames: Arc::new(frames),
        })
    }
}

impl fmt::Display for CallStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return f.write_str("[]");
        }
        let names: Vec<String> = self
            .frames
            .iter()
            .map(|fr| format!("{}@{}", fr.function, fr.call_site))
            .collect();
        write!(f, "[{}]", names.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(function: &str, ret: u32) -> CallFrame {
        CallFrame {
            call_site: CfaNodeId(ret - 1),
            return_node: CfaNodeId(ret),
            function: function.to_string(),
        }
    }

    #[test]
    fn test_push_and_matching_pop() {
        let stack = CallStack::new().push(frame("f", 5), "main", 8).unwrap();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.current_function("main"), "f");
        assert!(stack.pop_to(CfaNodeId(6)).is_none());
        let back = stack.pop_to(CfaNodeId(5)).unwrap();
        assert_eq!(back, CallStack::new());
    }

    #[test]
    fn test_recursion_is_rejected() {
        let stack = CallStack::new().push(frame("f", 5), "main", 8).unwrap();
        let err = stack.push(frame("f", 9), "main", 8).unwrap_err();
        assert!(matches!(err, EngineError::Modeling(ModelingError::Recursion(ref f)) if f == "f"));
        assert!(CallStack::new().push(frame("main", 3), "main", 8).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let stack = CallStack::new().push(frame("f", 5), "main", 1).unwrap();
        let err = stack.push(frame("g", 9), "main", 1).unwrap_err();
        assert!(err.is_inconclusive());
    }

    #[test]
    fn test_stack_serializes_as_frame_list() {
        let stack = CallStack::new().push(frame("f", 5), "main", 8).unwrap();
        let json = serde_json::to_string(&stack).unwrap();
        assert!(json.contains("\"function\":\"f\""));
        let back: CallStack = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stack);
    }
}
