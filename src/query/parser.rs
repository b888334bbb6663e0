//! Pattern compiler.
//!
//! Grammar: literal characters, `.` for any character, `( )` groups,
//! `?` `+` `*` on the preceding character, wildcard or group, `[...]` for
//! any character not listed, and `|` alternation with the lowest
//! precedence.
//!
//! The pattern is read right to left. Each construct is wired backward
//! from the state that follows it, so a quantifier is seen before its
//! operand and no lookahead buffer is needed. A `)` starts a nested scope
//! which returns at its matching `(`.
//!
//! Every transition is tagged with the OR of the masks of the literal
//! characters to its right in the same scope. That is a necessary
//! condition for a match through it, which lets the tree search skip
//! subtrees early.

use crate::index::bucketer::SymbolTable;
use crate::index::types::Mask;
use crate::query::automaton::{Automaton, AutomatonBuilder, StateId, Transition};
use std::collections::BTreeSet;
use std::fmt;

/// Why a pattern was rejected. Positions are 0-based character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// Nothing to compile
    Empty,
    /// `(` without a matching `)`
    UnmatchedOpen { position: usize },
    /// `)` without a matching `(`
    UnmatchedClose { position: usize },
    /// `[` without a matching `]`
    UnclosedClass { position: usize },
    /// `]` without a matching `[`
    UnopenedClass { position: usize },
    /// `[]`
    EmptyClass { position: usize },
    /// Reserved symbol inside `[...]`
    ReservedInClass { position: usize, symbol: char },
    /// Quantifier at the very start of the pattern
    NothingToQuantify { position: usize, symbol: char },
    /// Quantifier applied to something that cannot be repeated
    InvalidQuantifierTarget {
        position: usize,
        symbol: char,
        target: char,
    },
    /// `|` with an empty side
    MissingAlternative { position: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Empty => write!(f, "Pattern is empty"),
            PatternError::UnmatchedOpen { position } => {
                write!(f, "Unmatched '(' at position {}", position)
            }
            PatternError::UnmatchedClose { position } => {
                write!(f, "Unmatched ')' at position {}", position)
            }
            PatternError::UnclosedClass { position } => {
                write!(f, "'[' at position {} has no closing ']'", position)
            }
            PatternError::UnopenedClass { position } => {
                write!(f, "']' at position {} has no opening '['", position)
            }
            PatternError::EmptyClass { position } => {
                write!(f, "Empty character class at position {}", position)
            }
            PatternError::ReservedInClass { position, symbol } => write!(
                f,
                "Reserved symbol '{}' inside character class at position {}",
                symbol, position
            ),
            PatternError::NothingToQuantify { position, symbol } => {
                write!(f, "Nothing to quantify with '{}' at position {}", symbol, position)
            }
            PatternError::InvalidQuantifierTarget {
                position,
                symbol,
                target,
            } => write!(
                f,
                "'{}' cannot quantify '{}' at position {}",
                symbol, target, position
            ),
            PatternError::MissingAlternative { position } => {
                write!(f, "'|' at position {} is missing an alternative", position)
            }
        }
    }
}

impl std::error::Error for PatternError {}

/// Symbols with meaning in the pattern grammar
pub fn is_reserved(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | '|' | '?' | '+' | '*' | '.')
}

/// Compile a pattern into an automaton annotated with masks from `table`
pub fn compile(pattern: &str, table: &SymbolTable) -> Result<Automaton, PatternError> {
    PatternCompiler::new(pattern, table).compile()
}

/// Part of the automaton built for one scope
#[derive(Debug, Clone, Copy)]
struct Fragment {
    start: StateId,
    accept: StateId,
}

struct PatternCompiler<'a> {
    chars: Vec<char>,
    /// Characters before this index have not been read yet
    cursor: usize,
    table: &'a SymbolTable,
    builder: AutomatonBuilder,
}

impl<'a> PatternCompiler<'a> {
    fn new(pattern: &str, table: &'a SymbolTable) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let cursor = chars.len();
        Self {
            chars,
            cursor,
            table,
            builder: AutomatonBuilder::new(),
        }
    }

    fn compile(mut self) -> Result<Automaton, PatternError> {
        if self.chars.is_empty() {
            return Err(PatternError::Empty);
        }
        let accept = self.builder.add_state();
        let fragment = self.parse_scope(accept, 0, None)?;
        debug_assert_eq!(fragment.accept, accept);
        Ok(self.builder.finish(fragment.start, accept))
    }

    fn next_back(&mut self) -> Option<(usize, char)> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some((self.cursor, self.chars[self.cursor]))
    }

    /// Parse leftward until the start of the pattern, or until the `(`
    /// matching the `)` at `group`.
    fn parse_scope(
        &mut self,
        cont: StateId,
        scope_mask: Mask,
        group: Option<usize>,
    ) -> Result<Fragment, PatternError> {
        let mut current = cont;
        let mut mask = scope_mask;

        while let Some((at, c)) = self.next_back() {
            match c {
                '(' => {
                    return match group {
                        Some(_) => Ok(Fragment {
                            start: current,
                            accept: cont,
                        }),
                        None => Err(PatternError::UnmatchedOpen { position: at }),
                    };
                }
                ')' => current = self.parse_scope(current, mask, Some(at))?.start,
                '?' | '+' | '*' => current = self.quantify(at, c, current, mask)?,
                ']' => current = self.negated_class(at, current, mask)?,
                '[' => return Err(PatternError::UnclosedClass { position: at }),
                '|' => return self.alternate(at, current, cont, scope_mask, group),
                '.' => current = self.wildcard(current, mask),
                _ => {
                    mask |= self.table.mask(c);
                    current = self.literal(c, current, mask);
                }
            }
        }

        match group {
            Some(position) => Err(PatternError::UnmatchedClose { position }),
            None => Ok(Fragment {
                start: current,
                accept: cont,
            }),
        }
    }

    fn literal(&mut self, c: char, cont: StateId, mask: Mask) -> StateId {
        let state = self.builder.add_state();
        self.builder.add_char(state, c, Transition::new(cont, mask));
        state
    }

    fn wildcard(&mut self, cont: StateId, mask: Mask) -> StateId {
        let state = self.builder.add_state();
        self.builder.add_any(state, Transition::new(cont, mask));
        state
    }

    /// Build `q` (one of `?` `+` `*`) over the operand to its left
    fn quantify(
        &mut self,
        at: usize,
        q: char,
        current: StateId,
        mask: Mask,
    ) -> Result<StateId, PatternError> {
        if q == '?' {
            let Some((target_at, target)) = self.next_back() else {
                return Err(PatternError::NothingToQuantify {
                    position: at,
                    symbol: q,
                });
            };
            let body = self.operand(target_at, target, q, current, mask)?;
            self.builder.add_epsilon(body, Transition::new(current, mask));
            return Ok(body);
        }

        // The loop runs through its own hub so it cannot leak into a
        // sibling alternative sharing `current`.
        let hub = self.builder.add_state();
        let body = match self.next_back() {
            Some((target_at, target)) => self.operand(target_at, target, q, hub, mask)?,
            None => self.wildcard(hub, mask),
        };
        let loop_mask = mask | self.builder.required_mask(body);
        self.builder.add_epsilon(hub, Transition::new(body, loop_mask));
        self.builder.add_epsilon(hub, Transition::new(current, mask));

        Ok(if q == '+' { body } else { hub })
    }

    /// Build the quantified operand ending at `cont`, returning its start
    fn operand(
        &mut self,
        at: usize,
        target: char,
        q: char,
        cont: StateId,
        mask: Mask,
    ) -> Result<StateId, PatternError> {
        match target {
            ')' => Ok(self.parse_scope(cont, mask, Some(at))?.start),
            '.' => Ok(self.wildcard(cont, mask)),
            '?' if q == '?' => self.quantify(at, target, cont, mask),
            c if is_reserved(c) => Err(PatternError::InvalidQuantifierTarget {
                position: at,
                symbol: q,
                target: c,
            }),
            c => {
                let mask = mask | self.table.mask(c);
                Ok(self.literal(c, cont, mask))
            }
        }
    }

    /// `[...]` read backward from its `]` at `at`
    fn negated_class(
        &mut self,
        at: usize,
        current: StateId,
        mask: Mask,
    ) -> Result<StateId, PatternError> {
        let mut excluded = BTreeSet::new();
        loop {
            match self.next_back() {
                None => return Err(PatternError::UnopenedClass { position: at }),
                Some((open, '[')) => {
                    if excluded.is_empty() {
                        return Err(PatternError::EmptyClass { position: open });
                    }
                    break;
                }
                Some((position, c)) if is_reserved(c) => {
                    return Err(PatternError::ReservedInClass {
                        position,
                        symbol: c,
                    });
                }
                Some((_, c)) => {
                    excluded.insert(c);
                }
            }
        }
        Ok(self
            .builder
            .add_negated(excluded, Transition::new(current, mask)))
    }

    /// Union of the scope's remaining left side with the already built
    /// right side starting at `right`.
    fn alternate(
        &mut self,
        at: usize,
        right: StateId,
        cont: StateId,
        scope_mask: Mask,
        group: Option<usize>,
    ) -> Result<Fragment, PatternError> {
        if right == cont || self.cursor == 0 {
            return Err(PatternError::MissingAlternative { position: at });
        }

        let left_end = self.builder.add_state();
        self.builder
            .add_epsilon(left_end, Transition::new(cont, scope_mask));
        let left = self.parse_scope(left_end, scope_mask, group)?;

        let start = self.builder.add_state();
        let left_mask = self.builder.required_mask(left.start);
        let right_mask = self.builder.required_mask(right);
        self.builder
            .add_epsilon(start, Transition::new(left.start, left_mask));
        self.builder
            .add_epsilon(start, Transition::new(right, right_mask));

        Ok(Fragment {
            start,
            accept: cont,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::bucketer::{Bucketer, count_frequencies};

    fn table_for(texts: &[&str]) -> SymbolTable {
        Bucketer::default().build(count_frequencies(texts))
    }

    fn accepts(pattern: &str, text: &str) -> bool {
        let table = table_for(&[pattern, text, "あいうえおかきくけこ"]);
        let fa = compile(pattern, &table).unwrap();
        let masks = table.suffix_masks(text);
        let pruned = fa.is_in_language(text, &masks);
        assert_eq!(pruned, fa.accepts(text), "pruning changed result for {}", text);
        pruned
    }

    #[test]
    fn test_alternation_group() {
        assert!(accepts("(は|が)えき", "はえき"));
        assert!(accepts("(は|が)えき", "がえき"));
        assert!(!accepts("(は|が)えき", "もえき"));
        assert!(!accepts("(は|が)えき", "えき"));
    }

    #[test]
    fn test_literal_and_single_char_changes() {
        assert!(accepts("あいう", "あいう"));
        assert!(!accepts("あいう", "あいえ"));
        assert!(!accepts("あいう", "かいう"));
        assert!(!accepts("あいう", "あいうう"));
        assert!(!accepts("あいう", "あい"));
    }

    #[test]
    fn test_wildcard() {
        assert!(accepts("あ.う", "あいう"));
        assert!(accepts("あ.う", "あxう"));
        assert!(!accepts("あ.う", "あう"));
    }

    #[test]
    fn test_optional() {
        assert!(accepts("あい?う", "あう"));
        assert!(accepts("あい?う", "あいう"));
        assert!(!accepts("あい?う", "あいいう"));
        assert!(accepts("(あい)?う", "う"));
        assert!(accepts("(あい)?う", "あいう"));
        assert!(!accepts("(あい)?う", "あう"));
    }

    #[test]
    fn test_optional_of_optional() {
        assert!(accepts("あ??い", "い"));
        assert!(accepts("あ??い", "あい"));
        assert!(!accepts("あ??い", "ああい"));
    }

    #[test]
    fn test_plus() {
        assert!(accepts("あい+う", "あいう"));
        assert!(accepts("あい+う", "あいいいう"));
        assert!(!accepts("あい+う", "あう"));
        assert!(accepts("(あい)+う", "あいあいう"));
        assert!(!accepts("(あい)+う", "う"));
    }

    #[test]
    fn test_star() {
        assert!(accepts("あい*う", "あう"));
        assert!(accepts("あい*う", "あいいう"));
        assert!(accepts("(あい)*う", "う"));
        assert!(accepts("(あい)*う", "あいあいう"));
        assert!(!accepts("(あい)*う", "あいあう"));
        assert!(accepts("「.*」", "「おかえり」"));
    }

    #[test]
    fn test_loop_stays_in_its_branch() {
        assert!(accepts("あ*|い", ""));
        assert!(accepts("あ*|い", "ああ"));
        assert!(accepts("あ*|い", "い"));
        assert!(!accepts("あ*|い", "ああい"));
        assert!(!accepts("あ+|い", "あい"));
    }

    #[test]
    fn test_leading_repeat_quantifies_wildcard() {
        assert!(accepts("+あ", "かあ"));
        assert!(!accepts("+あ", "あ"));
        assert!(accepts("*あ", "あ"));
        assert!(accepts("*あ", "かかあ"));
    }

    #[test]
    fn test_negated_class() {
        assert!(accepts("[あい]う", "かう"));
        assert!(!accepts("[あい]う", "あう"));
        assert!(!accepts("[あい]う", "いう"));
        assert!(!accepts("[あい]う", "う"));
    }

    #[test]
    fn test_multi_alternation() {
        assert!(accepts("あ|い|う", "あ"));
        assert!(accepts("あ|い|う", "い"));
        assert!(accepts("あ|い|う", "う"));
        assert!(!accepts("あ|い|う", "あい"));
        assert!(accepts("か(あ|い|う)き", "かいき"));
    }

    #[test]
    fn test_nested_groups() {
        assert!(accepts("((あ|い)う)+え", "あういうえ"));
        assert!(!accepts("((あ|い)う)+え", "ううえ"));
        assert!(accepts("(|あ)い", "い"));
        assert!(accepts("()あ", "あ"));
    }

    #[test]
    fn test_masks_accumulate_right_to_left() {
        let table = SymbolTable::from_masks([('あ', 1), ('い', 2)]).unwrap();
        let fa = compile("あい", &table).unwrap();
        assert_eq!(fa.required_mask(fa.start()), 0b11);
        assert_eq!(fa.required_mask(fa.accept()), 0);
    }

    #[test]
    fn test_errors() {
        let table = table_for(&["はあい"]);
        let err = |p: &str| compile(p, &table).unwrap_err();

        assert_eq!(err(""), PatternError::Empty);
        assert_eq!(err("("), PatternError::UnmatchedOpen { position: 0 });
        assert_eq!(err(")"), PatternError::UnmatchedClose { position: 0 });
        assert_eq!(err("((あ)"), PatternError::UnmatchedOpen { position: 0 });
        assert_eq!(err("(あ))"), PatternError::UnmatchedClose { position: 3 });
        assert_eq!(err("[]"), PatternError::EmptyClass { position: 0 });
        assert_eq!(err("あ]"), PatternError::UnopenedClass { position: 1 });
        assert_eq!(err("[あ"), PatternError::UnclosedClass { position: 0 });
        assert_eq!(
            err("[あ|い]"),
            PatternError::ReservedInClass {
                position: 2,
                symbol: '|'
            }
        );
        assert_eq!(
            err("?"),
            PatternError::NothingToQuantify {
                position: 0,
                symbol: '?'
            }
        );
        assert_eq!(
            err("は++"),
            PatternError::InvalidQuantifierTarget {
                position: 1,
                symbol: '+',
                target: '+'
            }
        );
        assert!(matches!(err("は**"), PatternError::InvalidQuantifierTarget { .. }));
        assert_eq!(err("あ|"), PatternError::MissingAlternative { position: 1 });
        assert_eq!(err("|あ"), PatternError::MissingAlternative { position: 0 });
    }

    #[test]
    fn test_error_display_has_position() {
        let err = PatternError::UnmatchedOpen { position: 4 };
        assert_eq!(err.to_string(), "Unmatched '(' at position 4");
    }
}
