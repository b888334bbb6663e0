//! Bitmask-pruned searches over a suffix tree.
//!
//! Both searches are written once against [`EdgeSource`], which hands out
//! the edges below a node. The in-memory [`SuffixTree`] and the paged
//! [`TabularTree`] implement it, so the pruning logic is shared.
//!
//! [`SuffixTree`]: crate::index::suffix_tree::SuffixTree
//! [`TabularTree`]: crate::index::tabular::TabularTree

mod collect;
pub mod pattern;
pub mod wildcard;

pub use pattern::find_matching;
pub use wildcard::find_all;

use crate::index::types::{Mask, NodeId, ROOT, Sentence};
use rustc_hash::FxHashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One edge as seen by a search: its label, child and masks.
///
/// The label is a slice of a shared text, so cloning is cheap.
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    child: NodeId,
    text: Arc<Sentence>,
    start: u32,
    end: u32,
    child_mask: Mask,
}

impl EdgeRecord {
    /// `text[start..end]` leading to `child`.
    ///
    /// `child_mask` is the OR of every mask reachable below `child`.
    pub fn new(child: NodeId, text: Arc<Sentence>, start: u32, end: u32, child_mask: Mask) -> Self {
        debug_assert!(start < end && end as usize <= text.len());
        Self {
            child,
            text,
            start,
            end,
            child_mask,
        }
    }

    /// Edges are identified by their child, which has a single parent
    #[inline]
    pub fn child(&self) -> NodeId {
        self.child
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn first_char(&self) -> char {
        self.text.chars[self.start as usize]
    }

    #[inline]
    pub fn char_at(&self, offset: usize) -> char {
        self.text.chars[self.start as usize + offset]
    }

    pub fn label(&self) -> &[char] {
        &self.text.chars[self.start as usize..self.end as usize]
    }

    pub fn child_mask(&self) -> Mask {
        self.child_mask
    }

    /// Everything reachable from `offset` into this edge onward
    #[inline]
    pub fn partial_mask(&self, offset: usize) -> Mask {
        if offset < self.len() {
            self.child_mask | self.text.mask_at(self.start as usize + offset)
        } else {
            self.child_mask
        }
    }

    /// Everything reachable through this edge
    #[inline]
    pub fn full_mask(&self) -> Mask {
        self.partial_mask(0)
    }
}

/// Read access to a suffix tree, by node.
///
/// Implementations may fetch edges lazily (paged storage); errors from
/// that fetch are passed through unchanged.
pub trait EdgeSource {
    type Payload: Clone + Eq + Hash;
    type Error;

    fn root(&self) -> NodeId {
        ROOT
    }

    /// Edges leaving `node`, ordered by first character
    fn edges_from(&self, node: NodeId) -> Result<Vec<EdgeRecord>, Self::Error>;

    /// The edge leaving `node` whose label starts with `c`
    fn edge_starting_with(
        &self,
        node: NodeId,
        c: char,
    ) -> Result<Option<EdgeRecord>, Self::Error> {
        Ok(self
            .edges_from(node)?
            .into_iter()
            .find(|e| e.first_char() == c))
    }

    /// Append the payloads attached directly to `node`
    fn payloads_at(&self, node: NodeId, out: &mut Vec<Self::Payload>) -> Result<(), Self::Error>;
}

/// Limits applied to a single search
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Stop collecting once this many results are in; 0 is unlimited.
    /// A node's payloads are always taken whole.
    pub max_results: usize,
    /// Give up and return what was found so far
    pub deadline: Option<Instant>,
}

impl SearchOptions {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max(max_results: usize) -> Self {
        Self {
            max_results,
            deadline: None,
        }
    }

    /// Deadline `timeout` from now; a zero timeout means none
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };
        self
    }
}

/// Counters reported with every search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Search states expanded
    pub states: usize,
    /// Edges skipped by the mask test
    pub pruned: usize,
    /// Tree nodes whose payloads were collected
    pub collected_nodes: u64,
}

/// Result set plus how the search went
#[derive(Debug, Clone)]
pub struct SearchOutcome<P> {
    pub results: FxHashSet<P>,
    pub stats: SearchStats,
    pub timed_out: bool,
}

impl<P> SearchOutcome<P> {
    pub fn empty() -> Self {
        Self {
            results: FxHashSet::default(),
            stats: SearchStats::default(),
            timed_out: false,
        }
    }
}

/// Checks the wall clock every few hundred steps
struct Deadline {
    at: Option<Instant>,
    ticks: u32,
}

impl Deadline {
    const CHECK_EVERY: u32 = 256;

    fn new(at: Option<Instant>) -> Self {
        Self { at, ticks: 0 }
    }

    fn expired(&mut self) -> bool {
        let Some(at) = self.at else {
            return false;
        };
        self.ticks = self.ticks.wrapping_add(1);
        self.ticks % Self::CHECK_EVERY == 0 && Instant::now() >= at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, masks: &[Mask], start: u32, end: u32, child_mask: Mask) -> EdgeRecord {
        let sentence = Sentence::from_parts(text.chars().collect(), masks.to_vec());
        EdgeRecord::new(7, Arc::new(sentence), start, end, child_mask)
    }

    #[test]
    fn test_edge_record_masks() {
        // a=1 b=2 c=4, text "abc"
        let edge = record("abc", &[7, 6, 4], 1, 2, 0b100);
        assert_eq!(edge.len(), 1);
        assert_eq!(edge.first_char(), 'b');
        assert_eq!(edge.label(), &['b']);
        assert_eq!(edge.full_mask(), 0b110);
        assert_eq!(edge.partial_mask(1), 0b100);
        assert_eq!(edge.child(), 7);
    }

    #[test]
    fn test_search_options() {
        let opts = SearchOptions::with_max(5).timeout(Duration::ZERO);
        assert_eq!(opts.max_results, 5);
        assert!(opts.deadline.is_none());
        let opts = SearchOptions::unlimited().timeout(Duration::from_secs(60));
        assert!(opts.deadline.is_some());
    }

    #[test]
    fn test_deadline_in_past_expires() {
        let mut deadline = Deadline::new(Some(Instant::now()));
        let expired = (0..Deadline::CHECK_EVERY).any(|_| deadline.expired());
        assert!(expired);
        let mut none = Deadline::new(None);
        assert!(!(0..1000).any(|_| none.expired()));
    }
}
