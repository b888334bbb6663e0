use crate::index::bucketer::SymbolTable;
use crate::index::suffix_tree::SuffixTree;
use crate::index::types::ROOT;
use serde::Serialize;
use std::fmt;

/// Shape of a built tree and how its alphabet was bucketed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub sentences: usize,
    pub nodes: usize,
    pub edges: usize,
    pub leaves: usize,
    /// Nodes carrying at least one payload
    pub data_nodes: usize,
    pub payloads: usize,
    pub suffix_links: usize,
    /// Longest root-to-node string, in characters
    pub max_depth: usize,
    pub symbols: usize,
    /// Characters per bucket, by bucket number
    pub bucket_sizes: Vec<usize>,
}

impl TreeStats {
    pub fn collect<P>(tree: &SuffixTree<P>, table: &SymbolTable) -> Self {
        let mut stats = TreeStats {
            sentences: tree.text_count(),
            nodes: tree.node_count(),
            edges: tree.edge_count(),
            symbols: table.len(),
            ..Default::default()
        };

        let mut stack = vec![(ROOT, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            stats.max_depth = stats.max_depth.max(depth);

            let payloads = tree.payloads(node).len();
            if payloads > 0 {
                stats.data_nodes += 1;
                stats.payloads += payloads;
            }
            if tree.suffix_link(node).is_some() {
                stats.suffix_links += 1;
            }

            let mut has_children = false;
            for (_, child, label) in tree.children(node) {
                has_children = true;
                stack.push((child, depth + label.len()));
            }
            if !has_children && node != ROOT {
                stats.leaves += 1;
            }
        }

        stats.bucket_sizes = table.buckets().iter().map(|(_, chars)| chars.len()).collect();
        stats
    }
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tree Statistics")?;
        writeln!(f, "===============")?;
        writeln!(f)?;
        writeln!(f, "Sentences:        {}", self.sentences)?;
        writeln!(f, "Nodes:            {}", self.nodes)?;
        writeln!(f, "Edges:            {}", self.edges)?;
        writeln!(f, "Leaves:           {}", self.leaves)?;
        writeln!(f, "Data nodes:       {}", self.data_nodes)?;
        writeln!(f, "Payloads:         {}", self.payloads)?;
        writeln!(f, "Suffix links:     {}", self.suffix_links)?;
        writeln!(f, "Max depth:        {}", self.max_depth)?;
        writeln!(f)?;
        writeln!(
            f,
            "Symbols:          {} in {} buckets",
            self.symbols,
            self.bucket_sizes.len()
        )?;
        for (bucket, size) in self.bucket_sizes.iter().enumerate() {
            writeln!(f, "  bucket {:2}       {}", bucket, size)?;
        }
        Ok(())
    }
}
