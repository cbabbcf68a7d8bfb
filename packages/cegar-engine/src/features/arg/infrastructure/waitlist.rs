//! Frontier of the ARG

use crate::config::SearchOrder;
use crate::features::arg::domain::ArgNodeId;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Waitlist {
    order: SearchOrder,
    items: VecDeque<ArgNodeId>,
}

impl Waitlist {
    pub fn new(order: SearchOrder) -> Self {
        Self {
            order,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, id: ArgNodeId) {
        self.items.push_back(id);
    }

    pub fn pop(&mut self) -> Option<ArgNodeId> {
        match self.order {
            SearchOrder::Bfs => self.items.pop_front(),
            SearchOrder::Dfs => self.items.pop_back(),
        }
    }

    /// Up to `size` nodes in expansion order (DFS always takes one)
    pub fn pop_batch(&mut self, size: usize) -> Vec<ArgNodeId> {
        let size = match self.order {
            SearchOrder::Bfs => size.max(1),
            SearchOrder::Dfs => 1,
        };
        std::iter::from_fn(|| self.pop()).take(size).collect()
    }

    /// Next node `pop` would return
    pub fn peek(&self) -> Option<ArgNodeId> {
        match self.order {
            SearchOrder::Bfs => self.items.front().copied(),
            SearchOrder::Dfs => self.items.back().copied(),
        }
    }

    pub fn retain(&mut self, keep: impl FnMut(&ArgNodeId) -> bool) {
        self.items.retain(keep);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bfs_and_dfs_order() {
        let mut bfs = Waitlist::new(SearchOrder::Bfs);
        let mut dfs = Waitlist::new(SearchOrder::Dfs);
        for i in 0..4 {
            bfs.push(ArgNodeId(i));
            dfs.push(ArgNodeId(i));
        }
        assert_eq!(bfs.peek(), Some(ArgNodeId(0)));
        assert_eq!(bfs.pop_batch(3), vec![ArgNodeId(0), ArgNodeId(1), ArgNodeId(2)]);
        assert_eq!(dfs.pop_batch(3), vec![ArgNodeId(3)]);
        assert_eq!(dfs.pop(), Some(ArgNodeId(2)));
        dfs.retain(|id| id.0 != 0);
        assert_eq!(dfs.len(), 1);
    }
}
