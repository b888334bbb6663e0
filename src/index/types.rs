use serde::{Deserialize, Serialize};
use std::fmt;

/// Bucket bitmask. Each corpus character owns exactly one bit.
pub type Mask = u32;

/// Mask meaning "anything may be below here"; used before annotation.
pub const FULL_MASK: Mask = Mask::MAX;

/// Handle of a node in the suffix tree arena
pub type NodeId = u32;

/// Handle of an edge in the suffix tree arena
pub type EdgeId = u32;

/// Handle of an inserted sentence's text
pub type TextId = u32;

/// The root node always sits at index 0
pub const ROOT: NodeId = 0;

/// Sentence index reserved for an article title
pub const TITLE_INDEX: u32 = 1;

/// Identifies a sentence: the article it came from and its position in it.
///
/// Index 1 is the title, body sentences count up from 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SentenceId {
    pub source_id: String,
    pub sentence_index: u32,
}

impl SentenceId {
    pub fn new(source_id: impl Into<String>, sentence_index: u32) -> Self {
        Self {
            source_id: source_id.into(),
            sentence_index,
        }
    }

    pub fn is_title(&self) -> bool {
        self.sentence_index == TITLE_INDEX
    }
}

impl fmt::Display for SentenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.sentence_index)
    }
}

/// Sentence text prepared for insertion: characters plus the suffix mask
/// of every position (`masks[i]` covers `chars[i..]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub chars: Box<[char]>,
    pub masks: Box<[Mask]>,
}

impl Sentence {
    /// Build from raw text using a symbol table
    pub fn new(text: &str, table: &crate::index::bucketer::SymbolTable) -> Self {
        let chars: Box<[char]> = text.chars().collect();
        let masks = table.suffix_masks_of(&chars).into_boxed_slice();
        Self { chars, masks }
    }

    /// Build from characters with masks already computed
    pub fn from_parts(chars: Vec<char>, masks: Vec<Mask>) -> Self {
        debug_assert_eq!(chars.len(), masks.len());
        Self {
            chars: chars.into_boxed_slice(),
            masks: masks.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Suffix mask at `index`, or 0 past the end
    #[inline]
    pub fn mask_at(&self, index: usize) -> Mask {
        self.masks.get(index).copied().unwrap_or(0)
    }
}

/// True when every bit of `required` is present in `available`.
///
/// A zero requirement always passes.
#[inline]
pub fn mask_allows(required: Mask, available: Mask) -> bool {
    required & available == required
}
