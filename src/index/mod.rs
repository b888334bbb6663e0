pub mod bucketer;
pub mod build;
pub mod corpus;
pub mod search;
pub mod stats;
pub mod suffix_tree;
pub mod tabular;
pub mod types;

pub use bucketer::{Bucketer, SymbolTable};
pub use build::{BuildOptions, Index, build_from_path, build_index};
pub use corpus::Corpus;
pub use search::{EdgeSource, SearchOptions, SearchOutcome};
pub use suffix_tree::SuffixTree;
pub use tabular::{CachedSource, TabularTree};
pub use types::*;
