//! Tabular form of a suffix tree: one row per edge, one row per payload.
//!
//! This is the shape a relational store would hold. Rows are written as
//! JSON Lines next to `buckets.json`; [`TabularTree`] reads them back and
//! answers searches through [`EdgeSource`] like the in-memory tree does.
//! [`CachedSource`] keeps recently fetched edge pages in an LRU.

use crate::index::bucketer::SymbolTable;
use crate::index::search::{self, EdgeRecord, EdgeSource, SearchOptions, SearchOutcome};
use crate::index::suffix_tree::SuffixTree;
use crate::index::types::{FULL_MASK, Mask, NodeId, Sentence};
use crate::query::automaton::Automaton;
use anyhow::{Context, Result};
use lru::LruCache;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub const EDGES_FILE: &str = "edges.jsonl";
pub const PAYLOADS_FILE: &str = "payloads.jsonl";
pub const BUCKETS_FILE: &str = "buckets.json";

/// One edge: `text` leads from `from` to `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub from: NodeId,
    pub to: NodeId,
    pub text: String,
    pub child_mask: Mask,
}

/// A payload attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRow<P> {
    pub node: NodeId,
    pub payload: P,
}

/// Every row of an exported tree
#[derive(Debug, Clone)]
pub struct TreeRows<P> {
    pub edges: Vec<EdgeRow>,
    pub payloads: Vec<PayloadRow<P>>,
}

impl<P: Clone> SuffixTree<P> {
    /// Flatten into rows. An unannotated tree exports all-ones masks so
    /// the reloaded form never prunes wrongly.
    pub fn export(&self) -> TreeRows<P> {
        let mut edges = Vec::with_capacity(self.edges.len());
        let mut payloads = Vec::new();

        for (id, node) in self.nodes.iter().enumerate() {
            let from = id as NodeId;
            for &e in node.edges.values() {
                let edge = &self.edges[e as usize];
                edges.push(EdgeRow {
                    from,
                    to: edge.child,
                    text: self.label(edge).iter().collect(),
                    child_mask: if self.is_annotated() {
                        edge.child_mask
                    } else {
                        FULL_MASK
                    },
                });
            }
            payloads.extend(node.payloads.iter().map(|p| PayloadRow {
                node: from,
                payload: p.clone(),
            }));
        }

        TreeRows { edges, payloads }
    }
}

/// A suffix tree rebuilt from its rows.
///
/// Edge rows stay as loaded and are turned into [`EdgeRecord`]s on every
/// fetch, which is the work a page cache saves.
pub struct TabularTree<P> {
    edges: FxHashMap<NodeId, Vec<EdgeRow>>,
    payloads: FxHashMap<NodeId, Vec<P>>,
    table: SymbolTable,
}

impl<P> TabularTree<P> {
    pub fn from_rows(
        edges: impl IntoIterator<Item = EdgeRow>,
        payloads: impl IntoIterator<Item = PayloadRow<P>>,
        table: SymbolTable,
    ) -> Self {
        let mut by_parent: FxHashMap<NodeId, Vec<EdgeRow>> = FxHashMap::default();
        for row in edges {
            if row.text.is_empty() {
                continue;
            }
            by_parent.entry(row.from).or_default().push(row);
        }
        for rows in by_parent.values_mut() {
            rows.sort_by_key(|r| r.text.chars().next());
        }

        let mut by_node: FxHashMap<NodeId, Vec<P>> = FxHashMap::default();
        for row in payloads {
            by_node.entry(row.node).or_default().push(row.payload);
        }

        Self {
            edges: by_parent,
            payloads: by_node,
            table,
        }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    fn record(&self, row: &EdgeRow) -> EdgeRecord {
        let text = Sentence::new(&row.text, &self.table);
        let end = text.len() as u32;
        EdgeRecord::new(row.to, Arc::new(text), 0, end, row.child_mask)
    }
}

impl<P: Clone + Eq + Hash> EdgeSource for TabularTree<P> {
    type Payload = P;
    type Error = Infallible;

    fn edges_from(&self, node: NodeId) -> Result<Vec<EdgeRecord>, Infallible> {
        Ok(self
            .edges
            .get(&node)
            .map(|rows| rows.iter().map(|r| self.record(r)).collect())
            .unwrap_or_default())
    }

    fn payloads_at(&self, node: NodeId, out: &mut Vec<P>) -> Result<(), Infallible> {
        if let Some(found) = self.payloads.get(&node) {
            out.extend_from_slice(found);
        }
        Ok(())
    }
}

impl<P: Serialize> TabularTree<P> {
    /// Write the rows of `tree` plus its symbol table into `dir`
    pub fn write(dir: &Path, rows: &TreeRows<P>, table: &SymbolTable) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        write_jsonl(&dir.join(EDGES_FILE), &rows.edges)?;
        write_jsonl(&dir.join(PAYLOADS_FILE), &rows.payloads)?;

        let buckets = dir.join(BUCKETS_FILE);
        let file = File::create(&buckets)
            .with_context(|| format!("Failed to create {}", buckets.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), table)
            .context("Failed to write symbol table")?;

        info!(
            edges = rows.edges.len(),
            payloads = rows.payloads.len(),
            dir = %dir.display(),
            "exported tabular tree"
        );
        Ok(())
    }
}

impl<P: DeserializeOwned> TabularTree<P> {
    /// Load a tree written by [`TabularTree::write`]
    pub fn load(dir: &Path) -> Result<Self> {
        let buckets = dir.join(BUCKETS_FILE);
        let file = File::open(&buckets)
            .with_context(|| format!("Failed to open {}", buckets.display()))?;
        let table: SymbolTable = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid symbol table in {}", buckets.display()))?;

        let edges: Vec<EdgeRow> = read_jsonl(&dir.join(EDGES_FILE))?;
        let payloads: Vec<PayloadRow<P>> = read_jsonl(&dir.join(PAYLOADS_FILE))?;
        Ok(Self::from_rows(edges, payloads, table))
    }
}

impl<P: Clone + Eq + Hash> TabularTree<P> {
    pub fn find_all_with<S: AsRef<str>>(
        &self,
        patterns: &[S],
        options: &SearchOptions,
    ) -> SearchOutcome<P> {
        match search::find_all(self, patterns, &self.table, options) {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }

    pub fn find_matching_with(&self, automaton: &Automaton, options: &SearchOptions) -> SearchOutcome<P> {
        match search::find_matching(self, automaton, options) {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }
}

fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid row", path.display(), n + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Default number of edge pages kept by [`CachedSource`]
pub const DEFAULT_PAGE_CACHE: usize = 4096;

/// LRU of edge pages in front of another source.
///
/// Pages are keyed by parent node. The cache sits behind a mutex so the
/// wrapped source can still be shared between threads.
pub struct CachedSource<S> {
    inner: S,
    pages: Mutex<LruCache<NodeId, Vec<EdgeRecord>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S> CachedSource<S> {
    /// A zero capacity falls back to [`DEFAULT_PAGE_CACHE`]
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_PAGE_CACHE))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            pages: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// `(hits, misses)` since creation
    pub fn cache_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl<S: EdgeSource> EdgeSource for CachedSource<S> {
    type Payload = S::Payload;
    type Error = S::Error;

    fn root(&self) -> NodeId {
        self.inner.root()
    }

    fn edges_from(&self, node: NodeId) -> Result<Vec<EdgeRecord>, S::Error> {
        if let Ok(mut pages) = self.pages.lock()
            && let Some(page) = pages.get(&node)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(page.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let page = self.inner.edges_from(node)?;
        if let Ok(mut pages) = self.pages.lock() {
            pages.put(node, page.clone());
        }
        Ok(page)
    }

    fn payloads_at(&self, node: NodeId, out: &mut Vec<S::Payload>) -> Result<(), S::Error> {
        self.inner.payloads_at(node, out)
    }
}
