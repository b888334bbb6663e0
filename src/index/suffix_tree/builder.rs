//! Online construction (Ukkonen) generalized to many sentences.
//!
//! Each sentence is fed one character per round followed by a virtual
//! terminator round. The terminator is never stored: suffixes still
//! pending at the end of a sentence are already spelled by the tree, so
//! their payloads are attached to the node where they end, splitting an
//! edge when that point is mid-label.
//!
//! Every node where a suffix of the current sentence ends is linked to the
//! end node of the next shorter suffix. That keeps suffix links complete
//! when no edge was created for a suffix at all.

use super::{Edge, Node, SuffixTree};
use crate::index::types::{NodeId, ROOT, Sentence, TextId};
use std::sync::Arc;

/// Where the next extension happens
#[derive(Debug, Clone, Copy)]
struct ActivePoint {
    node: NodeId,
    /// Index into the current sentence of the active edge's first char
    edge: usize,
    length: usize,
    /// Suffixes still to be made explicit
    remaining: usize,
}

impl Default for ActivePoint {
    fn default() -> Self {
        Self {
            node: ROOT,
            edge: 0,
            length: 0,
            remaining: 0,
        }
    }
}

impl<P: Clone + PartialEq> SuffixTree<P> {
    /// Insert every suffix of `sentence`, tagging each with `payload`.
    ///
    /// Clears the annotation flag; call `assign_bitsets` again afterward.
    pub fn add_string(&mut self, sentence: Sentence, payload: P) {
        let text_id = self.texts.len() as TextId;
        let text = Arc::new(sentence);
        self.texts.push(Arc::clone(&text));
        self.annotated = false;
        self.pending_end = None;

        let chars = &text.chars[..];
        let mut active = ActivePoint::default();

        for pos in 0..chars.len() {
            self.begin_round();
            active.remaining += 1;
            self.extend(text_id, chars, pos, &mut active, &payload);
        }

        self.begin_round();
        active.remaining += 1;
        self.terminate(chars, &mut active, &payload);

        self.pending_end = None;
    }

    /// Links never span rounds
    fn begin_round(&mut self) {
        self.pending_link = None;
    }

    fn extend(
        &mut self,
        text_id: TextId,
        chars: &[char],
        pos: usize,
        active: &mut ActivePoint,
        payload: &P,
    ) {
        let c = chars[pos];
        let n = chars.len() as u32;

        while active.remaining > 0 {
            if active.length == 0 {
                active.edge = pos;
            }
            let key = chars[active.edge];

            match self.nodes[active.node as usize].edges.get(&key).copied() {
                None => {
                    let leaf = self.add_leaf(active.node, text_id, pos as u32, n, payload);
                    self.link_pending_to(active.node);
                    self.chain_end(leaf);
                }
                Some(e) => {
                    if self.walk_down(e, active) {
                        continue;
                    }
                    let edge = self.edges[e as usize];
                    if self.char_at(edge.text, edge.start as usize + active.length) == c {
                        // Already present; the rest of this round is implicit
                        if active.node != ROOT {
                            self.link_pending_to(active.node);
                        }
                        active.length += 1;
                        break;
                    }
                    let mid = self.split_edge(e, active.length as u32);
                    let leaf = self.add_leaf(mid, text_id, pos as u32, n, payload);
                    self.push_pending(mid);
                    self.chain_end(leaf);
                }
            }

            active.remaining -= 1;
            self.advance(active, pos);
        }
    }

    /// The terminator round. Nothing is created except split points.
    fn terminate(&mut self, chars: &[char], active: &mut ActivePoint, payload: &P) {
        let n = chars.len();

        while active.remaining > 1 {
            let end = if active.length == 0 {
                debug_assert_ne!(active.node, ROOT);
                active.node
            } else {
                let key = chars[active.edge];
                let Some(e) = self.nodes[active.node as usize].edges.get(&key).copied() else {
                    debug_assert!(false, "active edge '{}' missing at sentence end", key);
                    break;
                };
                if self.walk_down(e, active) {
                    continue;
                }
                self.split_edge(e, active.length as u32)
            };

            self.attach(end, payload);
            self.chain_end(end);

            active.remaining -= 1;
            self.advance(active, n);
        }

        active.remaining = 0;
    }

    /// Move to the next shorter suffix after finishing one
    fn advance(&self, active: &mut ActivePoint, pos: usize) {
        if active.node == ROOT && active.length > 0 {
            active.length -= 1;
            active.edge = pos + 1 - active.remaining;
        } else if active.node != ROOT {
            active.node = self.nodes[active.node as usize]
                .suffix_link
                .unwrap_or(ROOT);
        }
    }

    /// Skip over edge `e` when the active length covers all of it
    fn walk_down(&self, e: u32, active: &mut ActivePoint) -> bool {
        let edge = &self.edges[e as usize];
        let len = edge.len() as usize;
        if active.length >= len {
            active.edge += len;
            active.length -= len;
            active.node = edge.child;
            true
        } else {
            false
        }
    }

    /// New leaf labelled `text[start..end]` below `parent`
    fn add_leaf(&mut self, parent: NodeId, text: TextId, start: u32, end: u32, payload: &P) -> NodeId {
        let leaf = self.push_node(Node {
            payloads: vec![payload.clone()],
            ..Node::default()
        });
        let key = self.char_at(text, start as usize);
        let e = self.push_edge(Edge {
            text,
            start,
            end,
            child: leaf,
            child_mask: 0,
        });
        self.nodes[parent as usize].edges.insert(key, e);
        leaf
    }

    /// Cut edge `e` after `at` characters, returning the new middle node
    fn split_edge(&mut self, e: u32, at: u32) -> NodeId {
        let edge = self.edges[e as usize];
        debug_assert!(at > 0 && at < edge.len(), "split at {} of {}", at, edge.len());

        let mid = self.push_node(Node::default());
        let lower = self.push_edge(Edge {
            start: edge.start + at,
            ..edge
        });
        let key = self.char_at(edge.text, (edge.start + at) as usize);
        self.nodes[mid as usize].edges.insert(key, lower);

        let upper = &mut self.edges[e as usize];
        upper.end = edge.start + at;
        upper.child = mid;
        mid
    }

    fn attach(&mut self, node: NodeId, payload: &P) {
        let payloads = &mut self.nodes[node as usize].payloads;
        if payloads.last() != Some(payload) {
            payloads.push(payload.clone());
        }
    }

    fn push_node(&mut self, node: Node<P>) -> NodeId {
        self.nodes.push(node);
        (self.nodes.len() - 1) as NodeId
    }

    fn push_edge(&mut self, edge: Edge) -> u32 {
        self.edges.push(edge);
        (self.edges.len() - 1) as u32
    }

    fn set_link(&mut self, from: NodeId, to: NodeId) {
        let link = &mut self.nodes[from as usize].suffix_link;
        debug_assert!(
            link.is_none() || *link == Some(to),
            "node {} relinked from {:?} to {}",
            from,
            link,
            to
        );
        *link = Some(to);
    }

    /// Resolve the node waiting for a link this round
    fn link_pending_to(&mut self, target: NodeId) {
        if let Some(pending) = self.pending_link.take() {
            self.set_link(pending, target);
        }
    }

    /// `node` was just created: it is the previous one's link target and
    /// now waits for its own
    fn push_pending(&mut self, node: NodeId) {
        if let Some(pending) = self.pending_link.replace(node) {
            self.set_link(pending, node);
        }
    }

    /// Record `node` as where the next suffix of this sentence ends
    fn chain_end(&mut self, node: NodeId) {
        if let Some(previous) = self.pending_end.replace(node) {
            self.set_link(previous, node);
        }
    }
}
