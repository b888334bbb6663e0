//! Nondeterministic finite automaton produced by the pattern compiler.
//!
//! States live in an arena addressed by [`StateId`]. Every transition
//! carries a required mask: the bucket bits that must still be available
//! to the right of the current input position for a match through that
//! transition to be possible. A zero mask never blocks.

use crate::index::types::{Mask, mask_allows};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Handle of an automaton state
pub type StateId = u32;

/// A transition to `target`, allowed only when `mask` is available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub target: StateId,
    pub mask: Mask,
}

impl Transition {
    pub fn new(target: StateId, mask: Mask) -> Self {
        Self { target, mask }
    }

    /// Whether the bits this transition needs are within `available`
    #[inline]
    pub fn allowed(&self, available: Mask) -> bool {
        mask_allows(self.mask, available)
    }
}

/// What a state consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    /// Exact characters plus an optional any-character transition
    Standard {
        chars: BTreeMap<char, Transition>,
        any: Option<Transition>,
    },
    /// Any character outside `excluded`
    Negated {
        excluded: BTreeSet<char>,
        transition: Transition,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub kind: StateKind,
    pub epsilons: Vec<Transition>,
}

impl State {
    fn standard() -> Self {
        Self {
            kind: StateKind::Standard {
                chars: BTreeMap::new(),
                any: None,
            },
            epsilons: Vec::new(),
        }
    }

    /// Every outgoing transition, consuming or not
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        let consuming: Box<dyn Iterator<Item = &Transition>> = match &self.kind {
            StateKind::Standard { chars, any } => Box::new(chars.values().chain(any.iter())),
            StateKind::Negated { transition, .. } => Box::new(std::iter::once(transition)),
        };
        consuming.chain(self.epsilons.iter())
    }
}

/// Immutable automaton with one start and one accepting state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    states: Vec<State>,
    start: StateId,
    accept: StateId,
}

impl Automaton {
    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn accept(&self) -> StateId {
        self.accept
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id as usize]
    }

    /// Epsilon transitions out of `id`
    #[inline]
    pub fn epsilons(&self, id: StateId) -> &[Transition] {
        &self.states[id as usize].epsilons
    }

    /// Consuming transitions out of `id` on input `c`.
    ///
    /// A standard state may offer both an exact and an any-character
    /// transition; a negated state offers at most one.
    #[inline]
    pub fn step(&self, id: StateId, c: char) -> [Option<Transition>; 2] {
        match &self.states[id as usize].kind {
            StateKind::Standard { chars, any } => [chars.get(&c).copied(), *any],
            StateKind::Negated {
                excluded,
                transition,
            } => {
                if excluded.contains(&c) {
                    [None, None]
                } else {
                    [Some(*transition), None]
                }
            }
        }
    }

    /// AND of the masks on every transition leaving `id`; 0 for a dead end
    pub fn required_mask(&self, id: StateId) -> Mask {
        required_mask(&self.states[id as usize])
    }

    /// True when the automaton accepts the whole of `s`.
    ///
    /// `suffix_masks[i]` is the bucket mask available from position `i`
    /// onward; positions past the end have nothing available.
    pub fn is_in_language(&self, s: &str, suffix_masks: &[Mask]) -> bool {
        let chars: Vec<char> = s.chars().collect();
        self.run(&chars, |i| suffix_masks.get(i).copied().unwrap_or(0))
    }

    /// Full match without any mask pruning
    pub fn accepts(&self, s: &str) -> bool {
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();
        self.run(&chars, |i| if i < len { Mask::MAX } else { 0 })
    }

    fn run(&self, chars: &[char], available: impl Fn(usize) -> Mask) -> bool {
        let len = chars.len();
        let mut seen: FxHashSet<(StateId, usize)> = FxHashSet::default();
        let mut frontier = vec![(self.start, 0usize)];
        seen.insert((self.start, 0));

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for (state, index) in frontier {
                if state == self.accept && index == len {
                    return true;
                }
                let avail = available(index);

                for t in self.epsilons(state) {
                    if t.allowed(avail) && seen.insert((t.target, index)) {
                        next.push((t.target, index));
                    }
                }

                if index < len {
                    for t in self.step(state, chars[index]).into_iter().flatten() {
                        if t.allowed(avail) && seen.insert((t.target, index + 1)) {
                            next.push((t.target, index + 1));
                        }
                    }
                }
            }
            frontier = next;
        }
        false
    }

    /// Graphviz description of the automaton
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph automaton {\n  rankdir=LR;\n");
        let _ = writeln!(out, "  start [shape=point];");
        let _ = writeln!(out, "  start -> s{};", self.start);

        for (id, state) in self.states.iter().enumerate() {
            let id = id as StateId;
            let shape = if id == self.accept { "doublecircle" } else { "circle" };
            let label = match &state.kind {
                StateKind::Negated { excluded, .. } => {
                    let set: String = excluded.iter().collect();
                    format!("{} [^{}]", id, escape(&set))
                }
                StateKind::Standard { .. } => id.to_string(),
            };
            let _ = writeln!(out, "  s{} [shape={}, label=\"{}\"];", id, shape, label);

            match &state.kind {
                StateKind::Standard { chars, any } => {
                    for (c, t) in chars {
                        edge_line(&mut out, id, t, &escape(&c.to_string()), "solid");
                    }
                    if let Some(t) = any {
                        edge_line(&mut out, id, t, ".", "solid");
                    }
                }
                StateKind::Negated { transition, .. } => {
                    edge_line(&mut out, id, transition, "not", "solid");
                }
            }
            for t in &state.epsilons {
                edge_line(&mut out, id, t, "ε", "dashed");
            }
        }
        out.push_str("}\n");
        out
    }
}

fn edge_line(out: &mut String, from: StateId, t: &Transition, label: &str, style: &str) {
    let _ = writeln!(
        out,
        "  s{} -> s{} [label=\"{} {:o}\", style={}];",
        from, t.target, label, t.mask, style
    );
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn required_mask(state: &State) -> Mask {
    let mut any = false;
    let mut acc = Mask::MAX;
    for t in state.transitions() {
        any = true;
        acc &= t.mask;
    }
    if any { acc } else { 0 }
}

/// Mutable arena used while compiling a pattern
#[derive(Debug, Default)]
pub struct AutomatonBuilder {
    states: Vec<State>,
}

impl AutomatonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty standard state
    pub fn add_state(&mut self) -> StateId {
        self.states.push(State::standard());
        (self.states.len() - 1) as StateId
    }

    /// Add a state matching anything but `excluded`
    pub fn add_negated(&mut self, excluded: BTreeSet<char>, transition: Transition) -> StateId {
        self.states.push(State {
            kind: StateKind::Negated {
                excluded,
                transition,
            },
            epsilons: Vec::new(),
        });
        (self.states.len() - 1) as StateId
    }

    /// Exact-character transition. Only valid on standard states.
    pub fn add_char(&mut self, from: StateId, c: char, transition: Transition) {
        if let StateKind::Standard { chars, .. } = &mut self.states[from as usize].kind {
            chars.insert(c, transition);
        } else {
            debug_assert!(false, "character transition on negated state {}", from);
        }
    }

    /// Any-character transition. Only valid on standard states.
    pub fn add_any(&mut self, from: StateId, transition: Transition) {
        if let StateKind::Standard { any, .. } = &mut self.states[from as usize].kind {
            *any = Some(transition);
        } else {
            debug_assert!(false, "wildcard transition on negated state {}", from);
        }
    }

    /// Epsilon transition. Self-loops are dropped; a repeated target
    /// keeps one transition needing only the bits both masks share.
    pub fn add_epsilon(&mut self, from: StateId, transition: Transition) {
        if from == transition.target {
            return;
        }
        let epsilons = &mut self.states[from as usize].epsilons;
        match epsilons.iter_mut().find(|t| t.target == transition.target) {
            Some(existing) => existing.mask &= transition.mask,
            None => epsilons.push(transition),
        }
    }

    pub fn required_mask(&self, id: StateId) -> Mask {
        required_mask(&self.states[id as usize])
    }

    pub fn finish(self, start: StateId, accept: StateId) -> Automaton {
        Automaton {
            states: self.states,
            start,
            accept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// a then any character then b
    fn a_dot_b() -> Automaton {
        let mut b = AutomatonBuilder::new();
        let accept = b.add_state();
        let s2 = b.add_state();
        b.add_char(s2, 'b', Transition::new(accept, 0b10));
        let s1 = b.add_state();
        b.add_any(s1, Transition::new(s2, 0b10));
        let s0 = b.add_state();
        b.add_char(s0, 'a', Transition::new(s1, 0b11));
        b.finish(s0, accept)
    }

    #[test]
    fn test_accepts_full_match_only() {
        let fa = a_dot_b();
        assert!(fa.accepts("axb"));
        assert!(fa.accepts("abb"));
        assert!(!fa.accepts("ab"));
        assert!(!fa.accepts("axbx"));
        assert!(!fa.accepts(""));
    }

    #[test]
    fn test_is_in_language_gates_on_masks() {
        let fa = a_dot_b();
        // masks of "axb" with a=1, b=2, x=4
        assert!(fa.is_in_language("axb", &[0b111, 0b110, 0b010]));
        // Claiming b is unavailable prunes the only path
        assert!(!fa.is_in_language("axb", &[0b101, 0b100, 0b000]));
    }

    #[test]
    fn test_epsilon_self_loop_and_duplicates() {
        let mut b = AutomatonBuilder::new();
        let s = b.add_state();
        b.add_epsilon(s, Transition::new(s, 0));
        let t = b.add_state();
        b.add_epsilon(s, Transition::new(t, 0b011));
        b.add_epsilon(s, Transition::new(t, 0b110));
        let fa = b.finish(s, t);
        // merged into one transition needing only the shared bit
        assert_eq!(fa.epsilons(s), &[Transition::new(t, 0b010)]);
    }

    #[test]
    fn test_negated_state() {
        let mut b = AutomatonBuilder::new();
        let accept = b.add_state();
        let excluded: BTreeSet<char> = ['x', 'y'].into_iter().collect();
        let s = b.add_negated(excluded, Transition::new(accept, 0));
        let fa = b.finish(s, accept);
        assert!(fa.accepts("a"));
        assert!(!fa.accepts("x"));
        assert!(!fa.accepts("y"));
        assert_eq!(fa.step(s, 'x'), [None, None]);
    }

    #[test]
    fn test_required_mask() {
        let mut b = AutomatonBuilder::new();
        let end = b.add_state();
        let s = b.add_state();
        b.add_char(s, 'a', Transition::new(end, 0b011));
        b.add_epsilon(s, Transition::new(end, 0b110));
        assert_eq!(b.required_mask(s), 0b010);
        assert_eq!(b.required_mask(end), 0);
    }

    #[test]
    fn test_dot_output() {
        let dot = a_dot_b().to_dot();
        assert!(dot.starts_with("digraph automaton {"));
        assert!(dot.contains("doublecircle"));
        assert!(dot.contains("label=\"a 3\""));
        assert!(dot.contains("label=\". 2\""));
    }
}
