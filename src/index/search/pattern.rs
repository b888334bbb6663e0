//! Automaton search: walk automaton states and tree positions in step.
//!
//! The frontier holds `(state, edge, offset)` triples and advances one
//! generation at a time. Once a triple reaches the accepting state the
//! whole subtree below that edge matches, since every path beneath
//! continues a suffix that already contains the accepted string.

use super::collect::Collector;
use super::{Deadline, EdgeRecord, EdgeSource, SearchOptions, SearchOutcome, SearchStats};
use crate::index::types::NodeId;
use crate::query::automaton::{Automaton, StateId};
use rustc_hash::FxHashSet;
use tracing::debug;

/// Sentences containing a substring accepted by `automaton`
pub fn find_matching<S>(
    source: &S,
    automaton: &Automaton,
    options: &SearchOptions,
) -> Result<SearchOutcome<S::Payload>, S::Error>
where
    S: EdgeSource + ?Sized,
{
    let mut stats = SearchStats::default();
    let mut collector = Collector::new(options.max_results);
    let mut deadline = Deadline::new(options.deadline);
    let mut timed_out = false;
    let mut seen: FxHashSet<(StateId, NodeId, usize)> = FxHashSet::default();

    let mut frontier: Vec<(StateId, EdgeRecord, usize)> = Vec::new();
    for edge in source.edges_from(source.root())? {
        if seen.insert((automaton.start(), edge.child(), 0)) {
            frontier.push((automaton.start(), edge, 0));
        }
    }

    'generations: while !frontier.is_empty() {
        let mut next = Vec::new();

        for (state, edge, offset) in frontier {
            if collector.is_full() {
                break 'generations;
            }
            if deadline.expired() {
                timed_out = true;
                break 'generations;
            }
            stats.states += 1;

            if state == automaton.accept() {
                collector.collect_subtree(source, edge.child(), &mut stats)?;
                continue;
            }

            let available = edge.partial_mask(offset);

            for t in automaton.epsilons(state) {
                if !t.allowed(available) {
                    stats.pruned += 1;
                    continue;
                }
                if seen.insert((t.target, edge.child(), offset)) {
                    next.push((t.target, edge.clone(), offset));
                }
            }

            if offset == edge.len() {
                for child in source.edges_from(edge.child())? {
                    if seen.insert((state, child.child(), 0)) {
                        next.push((state, child, 0));
                    }
                }
                continue;
            }

            let c = edge.char_at(offset);
            for t in automaton.step(state, c).into_iter().flatten() {
                if !t.allowed(available) {
                    stats.pruned += 1;
                    continue;
                }
                if seen.insert((t.target, edge.child(), offset + 1)) {
                    next.push((t.target, edge.clone(), offset + 1));
                }
            }
        }

        frontier = next;
    }

    let results = collector.into_results();
    debug!(
        states = stats.states,
        pruned = stats.pruned,
        results = results.len(),
        timed_out,
        "pattern search finished"
    );
    Ok(SearchOutcome {
        results,
        stats,
        timed_out,
    })
}
