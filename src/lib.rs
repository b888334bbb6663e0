//! # kansearch - Japanese sentence search
//!
//! Sentences are indexed in a generalized suffix tree whose edges carry a
//! bitmask of the characters reachable below them. Two searches run over
//! it: ordered keys with gaps (`駅*どこ`) and small regular-expression-like
//! patterns compiled to an automaton. Both skip subtrees whose mask cannot
//! cover what remains to be matched.
//!
//! ## Architecture
//!
//! - [`index`] - Bucketing, the suffix tree, searches, tabular export, corpus loading
//! - [`query`] - Pattern compiler, automaton, wildcard query helpers
//! - [`output`] - Result formatting
//! - [`utils`] - Configuration and progress bars
//!
//! ## Quick Start
//!
//! ```no_run
//! use kansearch::index::{BuildOptions, SearchOptions, build_from_path};
//! use std::path::Path;
//!
//! let index = build_from_path(Path::new("corpus/"), "*.jsonl", &BuildOptions::default()).unwrap();
//!
//! let found = index.find_all(&["駅", "どこ"], &SearchOptions::with_max(40));
//! for id in &found.results {
//!     println!("{}: {}", id, index.lookup(id).unwrap_or(""));
//! }
//!
//! let found = index.find_matching("(は|が)えき", &SearchOptions::unlimited()).unwrap();
//! println!("{} sentences", found.results.len());
//! ```

pub mod index;
pub mod output;
pub mod query;
pub mod utils;
