use super::SuffixTree;
use crate::index::types::{NodeId, ROOT};
use std::fmt::{Display, Write};

/// Payloads listed on a node label before eliding the rest
const PAYLOADS_SHOWN: usize = 3;

impl<P: Display> SuffixTree<P> {
    /// Graphviz description: edges labelled with text and child mask in
    /// octal, suffix links dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph suffix_tree {\n  node [shape=circle];\n");

        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            let _ = writeln!(out, "  n{} [label=\"{}\"];", id, self.node_label(id));

            for &e in node.edges.values() {
                let edge = &self.edges[e as usize];
                let text: String = self.label(edge).iter().collect();
                let _ = writeln!(
                    out,
                    "  n{} -> n{} [label=\"{} {:o}\"];",
                    id,
                    edge.child,
                    escape(&text),
                    edge.child_mask
                );
                stack.push(edge.child);
            }

            if let Some(link) = node.suffix_link {
                let _ = writeln!(
                    out,
                    "  n{} -> n{} [style=dashed, color=gray, constraint=false];",
                    id, link
                );
            }
        }

        out.push_str("}\n");
        out
    }

    fn node_label(&self, id: NodeId) -> String {
        let payloads = &self.nodes[id as usize].payloads;
        if payloads.is_empty() {
            return id.to_string();
        }
        let mut shown: Vec<String> = payloads
            .iter()
            .take(PAYLOADS_SHOWN)
            .map(|p| escape(&p.to_string()))
            .collect();
        if payloads.len() > PAYLOADS_SHOWN {
            shown.push(format!("+{}", payloads.len() - PAYLOADS_SHOWN));
        }
        format!("{}\\n{}", id, shown.join(","))
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::bucketer::SymbolTable;
    use crate::index::types::Sentence;

    #[test]
    fn test_dot_lists_edges_and_links() {
        let table = SymbolTable::from_masks([('a', 1), ('b', 2)]).unwrap();
        let mut tree = SuffixTree::new();
        tree.add_string(Sentence::new("abab", &table), 1u32);
        tree.assign_bitsets();
        let dot = tree.to_dot();

        assert!(dot.starts_with("digraph suffix_tree {"));
        assert!(dot.trim_end().ends_with('}'));
        // "ab" branches into "ab" and the end of the sentence
        assert!(dot.contains("[label=\"ab 3\"]"));
        assert!(dot.contains("style=dashed"));
    }
}
