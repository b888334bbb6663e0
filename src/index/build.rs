use crate::index::bucketer::{Bucketer, SymbolTable, count_frequencies};
use crate::index::corpus::{Corpus, load_corpus};
use crate::index::search::{SearchOptions, SearchOutcome};
use crate::index::suffix_tree::SuffixTree;
use crate::index::types::{Sentence, SentenceId};
use crate::query::automaton::Automaton;
use crate::query::parser::{PatternError, compile};
use crate::utils::progress::{ProgressBar, ProgressStyle};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Knobs for [`build_index`]
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub bucket_count: usize,
    pub show_progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            bucket_count: crate::index::bucketer::MAX_BUCKETS,
            show_progress: false,
        }
    }
}

/// A finalized, annotated index and the corpus it was built from.
///
/// Read-only after construction, so queries may run from many threads.
pub struct Index {
    pub table: SymbolTable,
    pub tree: SuffixTree<SentenceId>,
    pub corpus: Corpus,
}

impl Index {
    /// Text of a sentence returned by a search
    pub fn lookup(&self, id: &SentenceId) -> Option<&str> {
        self.corpus.get(id)
    }

    pub fn compile(&self, pattern: &str) -> Result<Automaton, PatternError> {
        compile(pattern, &self.table)
    }

    /// Sentences containing `keys` in order with gaps allowed
    pub fn find_all<S: AsRef<str>>(&self, keys: &[S], options: &SearchOptions) -> SearchOutcome<SentenceId> {
        self.tree.find_all_with(keys, &self.table, options)
    }

    /// Compile `pattern` and return the sentences containing a match
    pub fn find_matching(
        &self,
        pattern: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome<SentenceId>, PatternError> {
        let automaton = self.compile(pattern)?;
        Ok(self.tree.find_matching_with(&automaton, options))
    }

    /// Run many wildcard queries in parallel; results keep query order
    pub fn find_all_batch<S: AsRef<str> + Sync>(
        &self,
        queries: &[Vec<S>],
        options: &SearchOptions,
    ) -> Vec<SearchOutcome<SentenceId>> {
        queries
            .par_iter()
            .map(|keys| self.find_all(keys.as_slice(), options))
            .collect()
    }

    /// Run many pattern queries in parallel; results keep query order
    pub fn find_matching_batch<S: AsRef<str> + Sync>(
        &self,
        patterns: &[S],
        options: &SearchOptions,
    ) -> Vec<Result<SearchOutcome<SentenceId>, PatternError>> {
        patterns
            .par_iter()
            .map(|p| self.find_matching(p.as_ref(), options))
            .collect()
    }
}

/// Load a corpus from `path` and index it
pub fn build_from_path(path: &Path, glob: &str, options: &BuildOptions) -> Result<Index> {
    let corpus =
        load_corpus(path, glob).with_context(|| format!("Failed to load {}", path.display()))?;
    build_index(corpus, options)
}

/// Bucket the corpus alphabet, insert every sentence, then annotate.
pub fn build_index(corpus: Corpus, options: &BuildOptions) -> Result<Index> {
    if corpus.is_empty() {
        bail!("Corpus has no sentences");
    }
    let bucketer = Bucketer::new(options.bucket_count).context("Invalid bucket count")?;

    // Phase 1: symbol table from parallel character counts
    let start = Instant::now();
    let texts = corpus.texts();
    let table = bucketer.build(count_frequencies(&texts));
    info!(
        symbols = table.len(),
        buckets = table.bucket_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "symbol table built"
    );

    // Phase 2: insert sentences in corpus order
    let start = Instant::now();
    let pb = if options.show_progress {
        let pb = ProgressBar::new(corpus.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} sentences ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut tree = SuffixTree::new();
    for (id, text) in corpus.iter() {
        tree.add_string(Sentence::new(text, &table), id.clone());
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!(
        sentences = corpus.len(),
        nodes = tree.node_count(),
        edges = tree.edge_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "suffix tree built"
    );

    // Phase 3: subtree masks
    let start = Instant::now();
    tree.assign_bitsets();
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "masks assigned");

    Ok(Index {
        table,
        tree,
        corpus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Corpus {
        let mut corpus = Corpus::new();
        for (i, text) in ["駅はどこですか。", "駅がどこにありますか", "公園で遊ぶ"]
            .iter()
            .enumerate()
        {
            corpus.push(SentenceId::new("t", i as u32 + 2), text.to_string());
        }
        corpus
    }

    #[test]
    fn test_build_and_search() {
        let index = build_index(corpus(), &BuildOptions::default()).unwrap();
        assert!(index.tree.is_annotated());
        assert!(index.tree.check_invariants().is_empty());

        let found = index.find_all(&["駅", "か"], &SearchOptions::unlimited()).results;
        assert_eq!(found.len(), 2);

        let found = index
            .find_matching("(は|が)ど", &SearchOptions::unlimited())
            .unwrap()
            .results;
        assert_eq!(found.len(), 2);
        for id in &found {
            assert!(index.lookup(id).is_some_and(|t| t.starts_with('駅')));
        }
    }

    #[test]
    fn test_empty_corpus_rejected() {
        assert!(build_index(Corpus::new(), &BuildOptions::default()).is_err());
    }

    #[test]
    fn test_bad_bucket_count_rejected() {
        let options = BuildOptions {
            bucket_count: 0,
            show_progress: false,
        };
        assert!(build_index(corpus(), &options).is_err());
    }

    #[test]
    fn test_batches_keep_order() {
        let index = build_index(corpus(), &BuildOptions::default()).unwrap();
        let opts = SearchOptions::unlimited();

        let queries = vec![vec!["駅"], vec!["公園"], vec!["電車"]];
        let counts: Vec<usize> = index
            .find_all_batch(&queries, &opts)
            .iter()
            .map(|o| o.results.len())
            .collect();
        assert_eq!(counts, vec![2, 1, 0]);

        let outcomes = index.find_matching_batch(&["公.", "(駅"], &opts);
        assert_eq!(outcomes[0].as_ref().map(|o| o.results.len()).ok(), Some(1));
        assert!(outcomes[1].is_err());
    }
}
