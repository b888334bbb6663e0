//! Corpus ingestion from JSON Lines.
//!
//! Each line is either one sentence or a whole article. Articles are split
//! into sentences here: the title becomes sentence 1 and the body
//! sentences follow from 2.

use crate::index::types::{SentenceId, TITLE_INDEX};
use anyhow::{Context, Result, bail};
use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One pre-split sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub source_id: String,
    pub sentence_index: u32,
    pub text: String,
}

/// A titled article, split into sentences on load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Any line a corpus file may hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorpusRecord {
    Sentence(SentenceRecord),
    Article(ArticleRecord),
}

impl CorpusRecord {
    /// Sentences this record contributes, in order
    pub fn into_sentences(self) -> Vec<(SentenceId, String)> {
        match self {
            CorpusRecord::Sentence(s) => {
                vec![(SentenceId::new(s.source_id, s.sentence_index), s.text)]
            }
            CorpusRecord::Article(a) => {
                let mut out = vec![(SentenceId::new(a.id.clone(), TITLE_INDEX), a.title)];
                out.extend(
                    split_sentences(&a.body)
                        .into_iter()
                        .zip(TITLE_INDEX + 1..)
                        .map(|(text, index)| (SentenceId::new(a.id.clone(), index), text)),
                );
                out
            }
        }
    }
}

fn is_leading_space(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\u{3000}'
}

/// Split Japanese prose on `。`, keeping quoted `「…」` text together.
///
/// Leading spaces of each sentence are dropped; a trailing fragment
/// without `。` is kept as the last sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in text.chars() {
        if current.is_empty() && is_leading_space(c) {
            continue;
        }
        match c {
            '「' => depth += 1,
            '」' => depth = depth.saturating_sub(1),
            _ => {}
        }
        current.push(c);
        if c == '。' && depth == 0 {
            sentences.push(std::mem::take(&mut current));
        }
    }

    let rest = current.trim_end();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Loaded sentences in corpus order, with lookup by id
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    sentences: Vec<(SentenceId, String)>,
    by_id: FxHashMap<SentenceId, usize>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sentence. Empty text and repeated ids are skipped.
    pub fn push(&mut self, id: SentenceId, text: String) -> bool {
        if text.is_empty() {
            return false;
        }
        if self.by_id.contains_key(&id) {
            warn!(id = %id, "duplicate sentence id skipped");
            return false;
        }
        self.by_id.insert(id.clone(), self.sentences.len());
        self.sentences.push((id, text));
        true
    }

    pub fn extend_records(&mut self, records: impl IntoIterator<Item = CorpusRecord>) {
        for record in records {
            for (id, text) in record.into_sentences() {
                self.push(id, text);
            }
        }
    }

    /// Text of a sentence
    pub fn get(&self, id: &SentenceId) -> Option<&str> {
        self.by_id
            .get(id)
            .map(|&i| self.sentences[i].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SentenceId, &str)> + '_ {
        self.sentences.iter().map(|(id, text)| (id, text.as_str()))
    }

    pub fn texts(&self) -> Vec<&str> {
        self.sentences.iter().map(|(_, t)| t.as_str()).collect()
    }

    /// Parse JSON Lines from `reader`. Malformed lines are logged and
    /// skipped; `origin` names the input in those messages.
    pub fn read_lines<R: BufRead>(&mut self, reader: R, origin: &str) -> Result<()> {
        for (n, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", origin))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<CorpusRecord>(line) {
                Ok(record) => self.extend_records([record]),
                Err(e) => warn!(file = origin, line = n + 1, error = %e, "skipping malformed record"),
            }
        }
        Ok(())
    }
}

/// Load a corpus file, or every file under a directory whose name matches
/// `glob`. Files are read in path order.
pub fn load_corpus(path: &Path, glob: &str) -> Result<Corpus> {
    let files = corpus_files(path, glob)?;
    if files.is_empty() {
        bail!("No corpus files matching '{}' under {}", glob, path.display());
    }

    let mut corpus = Corpus::new();
    for file in &files {
        let handle =
            File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
        corpus.read_lines(BufReader::new(handle), &file.display().to_string())?;
    }
    debug!(files = files.len(), sentences = corpus.len(), "corpus loaded");
    Ok(corpus)
}

fn corpus_files(path: &Path, glob: &str) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Corpus path does not exist: {}", path.display());
    }

    let matcher: GlobMatcher = Glob::new(glob)
        .with_context(|| format!("Invalid corpus glob '{}'", glob))?
        .compile_matcher();

    let mut files: Vec<PathBuf> = WalkBuilder::new(path)
        .hidden(true)
        .git_ignore(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    Ok(files)
}
