use super::{EdgeSource, SearchStats};
use crate::index::types::NodeId;
use roaring::RoaringBitmap;
use rustc_hash::FxHashSet;

/// Gathers payloads from whole subtrees, visiting each node once
pub(super) struct Collector<P> {
    results: FxHashSet<P>,
    visited: RoaringBitmap,
    max_results: usize,
    buffer: Vec<P>,
}

impl<P: Clone + Eq + std::hash::Hash> Collector<P> {
    pub(super) fn new(max_results: usize) -> Self {
        Self {
            results: FxHashSet::default(),
            visited: RoaringBitmap::new(),
            max_results,
            buffer: Vec::new(),
        }
    }

    pub(super) fn is_full(&self) -> bool {
        self.max_results > 0 && self.results.len() >= self.max_results
    }

    /// Add every payload at or below `node`
    pub(super) fn collect_subtree<S>(
        &mut self,
        source: &S,
        node: NodeId,
        stats: &mut SearchStats,
    ) -> Result<(), S::Error>
    where
        S: EdgeSource<Payload = P> + ?Sized,
    {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if self.is_full() {
                break;
            }
            if !self.visited.insert(current) {
                continue;
            }
            stats.collected_nodes += 1;

            self.buffer.clear();
            source.payloads_at(current, &mut self.buffer)?;
            self.results.extend(self.buffer.drain(..));

            for edge in source.edges_from(current)? {
                if !self.visited.contains(edge.child()) {
                    stack.push(edge.child());
                }
            }
        }
        Ok(())
    }

    pub(super) fn into_results(self) -> FxHashSet<P> {
        self.results
    }
}
