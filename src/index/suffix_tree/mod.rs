//! Generalized suffix tree over many sentences.
//!
//! Nodes and edges live in arenas and refer to each other by index.
//! Edge labels are ranges into the inserted sentences, which the tree
//! keeps alive. Payloads sit on the node where a suffix ends; that node
//! may be a leaf or a branch point.
//!
//! Build with [`SuffixTree::add_string`] for every sentence, then call
//! [`SuffixTree::assign_bitsets`] once before searching. Searching an
//! unannotated tree is correct but prunes nothing.

mod builder;
mod dot;

use crate::index::bucketer::SymbolTable;
use crate::index::search::{self, EdgeRecord, EdgeSource, SearchOptions, SearchOutcome};
use crate::index::types::{EdgeId, FULL_MASK, Mask, NodeId, ROOT, Sentence, TextId};
use crate::query::automaton::Automaton;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) struct Node<P> {
    /// Outgoing edges keyed by the first character of their label
    pub(crate) edges: BTreeMap<char, EdgeId>,
    pub(crate) payloads: Vec<P>,
    pub(crate) suffix_link: Option<NodeId>,
}

impl<P> Default for Node<P> {
    fn default() -> Self {
        Self {
            edges: BTreeMap::new(),
            payloads: Vec::new(),
            suffix_link: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    pub(crate) text: TextId,
    pub(crate) start: u32,
    pub(crate) end: u32,
    pub(crate) child: NodeId,
    /// OR of the full masks of the child's edges
    pub(crate) child_mask: Mask,
}

impl Edge {
    #[inline]
    pub(crate) fn len(&self) -> u32 {
        self.end - self.start
    }
}

/// Generalized suffix tree with payload type `P`
#[derive(Debug, Clone)]
pub struct SuffixTree<P> {
    pub(crate) nodes: Vec<Node<P>>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) texts: Vec<Arc<Sentence>>,
    annotated: bool,
    /// Internal node waiting for its suffix link in the current round
    pending_link: Option<NodeId>,
    /// End node of the previous suffix of the sentence being inserted
    pending_end: Option<NodeId>,
}

impl<P> Default for SuffixTree<P> {
    fn default() -> Self {
        Self {
            nodes: vec![Node::default()],
            edges: Vec::new(),
            texts: Vec::new(),
            annotated: false,
            pending_link: None,
            pending_end: None,
        }
    }
}

impl<P> SuffixTree<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of sentences inserted
    pub fn text_count(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether masks are current. Any insertion clears this.
    pub fn is_annotated(&self) -> bool {
        self.annotated
    }

    pub fn payloads(&self, node: NodeId) -> &[P] {
        &self.nodes[node as usize].payloads
    }

    pub fn suffix_link(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node as usize].suffix_link
    }

    /// `(first char, child, label)` for each edge leaving `node`
    pub fn children(&self, node: NodeId) -> impl Iterator<Item = (char, NodeId, &[char])> + '_ {
        self.nodes[node as usize].edges.iter().map(move |(&c, &e)| {
            let edge = &self.edges[e as usize];
            (c, edge.child, self.label(edge))
        })
    }

    pub(crate) fn label(&self, edge: &Edge) -> &[char] {
        &self.texts[edge.text as usize].chars[edge.start as usize..edge.end as usize]
    }

    #[inline]
    pub(crate) fn char_at(&self, text: TextId, index: usize) -> char {
        self.texts[text as usize].chars[index]
    }

    /// Mask of everything reachable through `edge`, ignoring annotation state
    fn full_mask(&self, edge: &Edge) -> Mask {
        edge.child_mask | self.texts[edge.text as usize].mask_at(edge.start as usize)
    }

    /// Child masks of every edge, in arena order
    pub fn edge_masks(&self) -> Vec<Mask> {
        self.edges.iter().map(|e| e.child_mask).collect()
    }

    /// Compute each edge's subtree mask from the leaves up.
    ///
    /// Must run after the last insertion; running it again changes nothing.
    pub fn assign_bitsets(&mut self) {
        // Parents precede children in this order
        let mut order = Vec::with_capacity(self.edges.len());
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            for &e in self.nodes[node as usize].edges.values() {
                order.push(e);
                stack.push(self.edges[e as usize].child);
            }
        }

        for &e in order.iter().rev() {
            let child = self.edges[e as usize].child;
            let mask = self.nodes[child as usize]
                .edges
                .values()
                .fold(0, |acc, &ce| acc | self.full_mask(&self.edges[ce as usize]));
            self.edges[e as usize].child_mask = mask;
        }
        self.annotated = true;
    }

    fn record(&self, e: EdgeId) -> EdgeRecord {
        let edge = &self.edges[e as usize];
        let child_mask = if self.annotated {
            edge.child_mask
        } else {
            FULL_MASK
        };
        EdgeRecord::new(
            edge.child,
            Arc::clone(&self.texts[edge.text as usize]),
            edge.start,
            edge.end,
            child_mask,
        )
    }

    /// String spelled from the root to every node
    fn path_strings(&self) -> FxHashMap<NodeId, Vec<char>> {
        let mut paths = FxHashMap::default();
        let mut stack = vec![(ROOT, Vec::new())];
        while let Some((node, path)) = stack.pop() {
            for edge in self.nodes[node as usize].edges.values() {
                let edge = &self.edges[*edge as usize];
                let mut child_path = path.clone();
                child_path.extend_from_slice(self.label(edge));
                stack.push((edge.child, child_path));
            }
            paths.insert(node, path);
        }
        paths
    }

    /// Structural problems found in the tree, empty when sound.
    ///
    /// Checks edge keys and lengths, reachability of every node, that each
    /// leaf carries a payload, and that suffix links point at the node
    /// spelling the same string minus its first character.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let paths = self.path_strings();

        if paths.len() != self.nodes.len() {
            problems.push(format!(
                "{} nodes reachable of {}",
                paths.len(),
                self.nodes.len()
            ));
        }

        for (id, node) in self.nodes.iter().enumerate() {
            let id = id as NodeId;
            for (&key, &e) in &node.edges {
                let edge = &self.edges[e as usize];
                if edge.len() == 0 {
                    problems.push(format!("edge {} below node {} is empty", e, id));
                } else if self.char_at(edge.text, edge.start as usize) != key {
                    problems.push(format!("edge {} below node {} filed under '{}'", e, id, key));
                }
            }

            if id != ROOT && node.edges.is_empty() && node.payloads.is_empty() {
                problems.push(format!("leaf {} has no payload", id));
            }

            let Some(path) = paths.get(&id) else {
                continue;
            };
            match node.suffix_link {
                Some(link) => match paths.get(&link) {
                    Some(target) if path.len() >= 1 && target[..] == path[1..] => {}
                    _ => problems.push(format!("node {} has a wrong suffix link to {}", id, link)),
                },
                None if path.len() >= 2 => {
                    problems.push(format!("node {} of depth {} has no suffix link", id, path.len()))
                }
                None => {}
            }
        }

        problems
    }
}

impl<P: Clone + Eq + Hash> SuffixTree<P> {
    /// Sentences containing every pattern in order, `patterns[0]` first.
    ///
    /// `max == 0` means no cap. Unknown characters yield an empty set.
    pub fn find_all<S: AsRef<str>>(
        &self,
        patterns: &[S],
        table: &SymbolTable,
        max: usize,
    ) -> FxHashSet<P> {
        self.find_all_with(patterns, table, &SearchOptions::with_max(max))
            .results
    }

    pub fn find_all_with<S: AsRef<str>>(
        &self,
        patterns: &[S],
        table: &SymbolTable,
        options: &SearchOptions,
    ) -> SearchOutcome<P> {
        into_ok(search::find_all(self, patterns, table, options))
    }

    /// Sentences containing a substring the automaton accepts
    pub fn find_matching(&self, automaton: &Automaton) -> FxHashSet<P> {
        self.find_matching_with(automaton, &SearchOptions::unlimited())
            .results
    }

    pub fn find_matching_with(
        &self,
        automaton: &Automaton,
        options: &SearchOptions,
    ) -> SearchOutcome<P> {
        into_ok(search::find_matching(self, automaton, options))
    }
}

fn into_ok<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

impl<P: Clone + Eq + Hash> EdgeSource for SuffixTree<P> {
    type Payload = P;
    type Error = Infallible;

    fn edges_from(&self, node: NodeId) -> Result<Vec<EdgeRecord>, Infallible> {
        Ok(self.nodes[node as usize]
            .edges
            .values()
            .map(|&e| self.record(e))
            .collect())
    }

    fn edge_starting_with(&self, node: NodeId, c: char) -> Result<Option<EdgeRecord>, Infallible> {
        Ok(self.nodes[node as usize]
            .edges
            .get(&c)
            .map(|&e| self.record(e)))
    }

    fn payloads_at(&self, node: NodeId, out: &mut Vec<P>) -> Result<(), Infallible> {
        out.extend_from_slice(&self.nodes[node as usize].payloads);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::bucketer::{Bucketer, count_frequencies};
    use crate::query::parser::compile;

    const CORPUS: [&str; 3] = ["たあがさあさが", "たたあがあさが", "さあさがたあが"];

    fn build(texts: &[&str]) -> (SuffixTree<usize>, SymbolTable) {
        let table = Bucketer::new(4).unwrap().build(count_frequencies(texts));
        let mut tree = SuffixTree::new();
        for (i, text) in texts.iter().enumerate() {
            tree.add_string(Sentence::new(text, &table), i);
        }
        (tree, table)
    }

    fn sorted(set: FxHashSet<usize>) -> Vec<usize> {
        let mut v: Vec<_> = set.into_iter().collect();
        v.sort();
        v
    }

    #[test]
    fn test_find_all_scenario() {
        let (mut tree, table) = build(&CORPUS);
        tree.assign_bitsets();
        assert_eq!(sorted(tree.find_all(&["あが"], &table, 10)), vec![0, 1, 2]);
        assert_eq!(sorted(tree.find_all(&["さあさが"], &table, 10)), vec![0, 2]);
        assert!(tree.find_all(&["がが"], &table, 10).is_empty());
    }

    #[test]
    fn test_find_all_with_gaps() {
        let (mut tree, table) = build(&CORPUS);
        tree.assign_bitsets();
        // "た" then later "さ": sentences 0, 1
        assert_eq!(sorted(tree.find_all(&["た", "さ"], &table, 0)), vec![0, 1]);
        assert_eq!(sorted(tree.find_all(&["たた", "", "が"], &table, 0)), vec![1]);
        assert_eq!(sorted(tree.find_all(&["が", "た"], &table, 0)), vec![2]);
    }

    #[test]
    fn test_unknown_symbol_is_empty() {
        let (mut tree, table) = build(&CORPUS);
        tree.assign_bitsets();
        assert!(tree.find_all(&["あx"], &table, 10).is_empty());
        assert!(tree.find_all(&["あ", "x"], &table, 10).is_empty());
        let empty: [&str; 0] = [];
        assert!(tree.find_all(&empty, &table, 10).is_empty());

        // an unknown character only rules out its own branch
        let automaton = compile("あx", &table).unwrap();
        assert!(tree.find_matching(&automaton).is_empty());
        let automaton = compile("(x|たた)", &table).unwrap();
        assert_eq!(sorted(tree.find_matching(&automaton)), vec![1]);
    }

    #[test]
    fn test_unannotated_gives_same_results() {
        let (mut tree, table) = build(&CORPUS);
        let before = sorted(tree.find_all(&["さあ", "が"], &table, 0));
        tree.assign_bitsets();
        let after = sorted(tree.find_all(&["さあ", "が"], &table, 0));
        assert_eq!(before, after);
        assert_eq!(after, vec![0, 2]);
    }

    /// `a<x>z` for `n` distinct middles drawn from hiragana
    fn a_to_z(n: usize) -> Vec<String> {
        let kana = |i: usize| char::from_u32(0x3042 + i as u32).unwrap_or('?');
        (0..n)
            .map(|i| format!("a{}{}z", kana(i / 20), kana(i % 20)))
            .collect()
    }

    #[test]
    fn test_max_results_caps() {
        let texts = a_to_z(50);
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let table = Bucketer::default().build(count_frequencies(&refs));
        let mut tree = SuffixTree::new();
        for (i, text) in refs.iter().enumerate() {
            tree.add_string(Sentence::new(text, &table), i);
        }
        tree.assign_bitsets();

        // one payload per branch below "a"
        assert_eq!(tree.find_all(&["a"], &table, 5).len(), 5);
        assert_eq!(tree.find_all(&["a"], &table, 0).len(), 50);
        // every sentence ends on the same "z" node, taken whole
        assert_eq!(tree.find_all(&["z"], &table, 5).len(), 50);
    }

    #[test]
    fn test_expired_deadline_returns_partial() {
        let texts = a_to_z(400);
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let table = Bucketer::default().build(count_frequencies(&refs));
        let mut tree = SuffixTree::new();
        for (i, text) in refs.iter().enumerate() {
            tree.add_string(Sentence::new(text, &table), i);
        }
        tree.assign_bitsets();

        let full = tree.find_all_with(&["a", "z"], &table, &SearchOptions::unlimited());
        assert!(!full.timed_out);
        assert_eq!(full.results.len(), 400);

        let options = SearchOptions::unlimited().timeout(std::time::Duration::from_nanos(1));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let partial = tree.find_all_with(&["a", "z"], &table, &options);
        assert!(partial.timed_out);
        assert!(partial.results.len() < 400);
        assert!(partial.results.is_subset(&full.results));

        let automaton = compile("a..z", &table).unwrap();
        let partial = tree.find_matching_with(&automaton, &options);
        assert!(partial.timed_out);
        assert!(partial.results.len() < 400);
    }

    #[test]
    fn test_assign_bitsets_idempotent() {
        let (mut tree, _) = build(&CORPUS);
        tree.assign_bitsets();
        let first = tree.edge_masks();
        tree.assign_bitsets();
        assert_eq!(first, tree.edge_masks());
    }

    #[test]
    fn test_child_mask_is_or_of_children() {
        let (mut tree, _) = build(&CORPUS);
        tree.assign_bitsets();
        for edge in &tree.edges {
            let expected = tree.nodes[edge.child as usize]
                .edges
                .values()
                .fold(0, |acc, &ce| acc | tree.full_mask(&tree.edges[ce as usize]));
            assert_eq!(edge.child_mask, expected);
        }
    }

    #[test]
    fn test_invariants_hold() {
        let (tree, _) = build(&CORPUS);
        assert_eq!(tree.check_invariants(), Vec::<String>::new());
    }

    #[test]
    fn test_find_matching_scenario() {
        let texts = ["はえきです", "がえきだ", "もえき"];
        let (mut tree, table) = build(&texts);
        tree.assign_bitsets();
        let fa = compile("(は|が)えき", &table).unwrap();
        assert_eq!(sorted(tree.find_matching(&fa)), vec![0, 1]);

        let fa = compile("え.", &table).unwrap();
        assert_eq!(sorted(tree.find_matching(&fa)), vec![0, 1, 2]);

        let fa = compile("き[だ]", &table).unwrap();
        assert_eq!(sorted(tree.find_matching(&fa)), vec![0]);
    }

    #[test]
    fn test_children_listing() {
        let (tree, _) = build(&["ab"]);
        let mut firsts: Vec<char> = tree.children(ROOT).map(|(c, _, _)| c).collect();
        firsts.sort();
        assert_eq!(firsts, vec!['a', 'b']);
        let labels: Vec<String> = tree
            .children(ROOT)
            .map(|(_, _, label)| label.iter().collect())
            .collect();
        assert!(labels.contains(&"ab".to_string()));
    }
}
