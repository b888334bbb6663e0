//! Wildcard search: `keys[0]`, then each later key somewhere after the
//! previous one, i.e. `k0*k1*k2...`.

use super::collect::Collector;
use super::{Deadline, EdgeRecord, EdgeSource, SearchOptions, SearchOutcome, SearchStats};
use crate::index::bucketer::SymbolTable;
use crate::index::types::{Mask, NodeId, mask_allows};
use rustc_hash::FxHashSet;
use tracing::debug;

/// Position inside the tree plus progress through the keys
struct Cursor {
    edge: EdgeRecord,
    offset: usize,
    key: usize,
    pos: usize,
}

/// Keys as characters plus, for every position, the OR of the masks of
/// everything still to be matched from there.
struct Keys {
    chars: Vec<Vec<char>>,
    required: Vec<Vec<Mask>>,
}

impl Keys {
    /// `None` when a key uses a character the table has never seen
    fn new<S: AsRef<str>>(patterns: &[S], table: &SymbolTable) -> Option<Self> {
        let chars: Vec<Vec<char>> = patterns
            .iter()
            .map(|p| p.as_ref().chars().collect::<Vec<_>>())
            .filter(|k| !k.is_empty())
            .collect();

        let mut required: Vec<Vec<Mask>> = chars.iter().map(|k| vec![0; k.len()]).collect();
        let mut acc = 0;
        for (k, key) in chars.iter().enumerate().rev() {
            for (i, &c) in key.iter().enumerate().rev() {
                acc |= table.get(c)?;
                required[k][i] = acc;
            }
        }
        Some(Self { chars, required })
    }

    fn len(&self) -> usize {
        self.chars.len()
    }

    fn required(&self, key: usize, pos: usize) -> Mask {
        self.required
            .get(key)
            .and_then(|r| r.get(pos))
            .copied()
            .unwrap_or(0)
    }
}

/// Sentences whose text contains the keys in order, with anything
/// between them. Empty keys are ignored.
pub fn find_all<S, Q>(
    source: &S,
    patterns: &[Q],
    table: &SymbolTable,
    options: &SearchOptions,
) -> Result<SearchOutcome<S::Payload>, S::Error>
where
    S: EdgeSource + ?Sized,
    Q: AsRef<str>,
{
    let Some(keys) = Keys::new(patterns, table) else {
        debug!("wildcard query uses an unknown symbol");
        return Ok(SearchOutcome::empty());
    };
    if keys.len() == 0 {
        return Ok(SearchOutcome::empty());
    }

    let mut stats = SearchStats::default();
    let Some((edge, offset)) = descend(source, &keys, &mut stats)? else {
        return Ok(SearchOutcome {
            stats,
            ..SearchOutcome::empty()
        });
    };

    let mut collector = Collector::new(options.max_results);
    let mut deadline = Deadline::new(options.deadline);
    let mut timed_out = false;
    let mut seen: FxHashSet<(NodeId, usize, usize, usize)> = FxHashSet::default();
    let mut stack = vec![Cursor {
        edge,
        offset,
        key: 1,
        pos: 0,
    }];

    while let Some(cur) = stack.pop() {
        if collector.is_full() {
            break;
        }
        if deadline.expired() {
            timed_out = true;
            break;
        }
        stats.states += 1;

        if cur.key == keys.len() {
            collector.collect_subtree(source, cur.edge.child(), &mut stats)?;
            continue;
        }

        let mut push = |c: Cursor, stats: &mut SearchStats| {
            if c.key < keys.len() && !mask_allows(keys.required(c.key, c.pos), c.edge.partial_mask(c.offset)) {
                stats.pruned += 1;
                return;
            }
            if seen.insert((c.edge.child(), c.offset, c.key, c.pos)) {
                stack.push(c);
            }
        };

        let key = &keys.chars[cur.key];

        if cur.offset == cur.edge.len() {
            for next in source.edges_from(cur.edge.child())? {
                // Mid-key, only the edge continuing the key can help
                if cur.pos > 0 && next.first_char() != key[cur.pos] {
                    continue;
                }
                push(
                    Cursor {
                        edge: next,
                        offset: 0,
                        key: cur.key,
                        pos: cur.pos,
                    },
                    &mut stats,
                );
            }
            continue;
        }

        let c = cur.edge.char_at(cur.offset);
        if c == key[cur.pos] {
            let (next_key, next_pos) = if cur.pos + 1 == key.len() {
                (cur.key + 1, 0)
            } else {
                (cur.key, cur.pos + 1)
            };
            push(
                Cursor {
                    edge: cur.edge.clone(),
                    offset: cur.offset + 1,
                    key: next_key,
                    pos: next_pos,
                },
                &mut stats,
            );
        }
        if cur.pos == 0 {
            // Gap character before the next key starts
            push(
                Cursor {
                    edge: cur.edge,
                    offset: cur.offset + 1,
                    key: cur.key,
                    pos: 0,
                },
                &mut stats,
            );
        }
    }

    let results = collector.into_results();
    debug!(
        keys = keys.len(),
        states = stats.states,
        pruned = stats.pruned,
        results = results.len(),
        timed_out,
        "wildcard search finished"
    );
    Ok(SearchOutcome {
        results,
        stats,
        timed_out,
    })
}

/// Match the first key exactly from the root. Returns the edge and the
/// offset just past its last character.
fn descend<S>(
    source: &S,
    keys: &Keys,
    stats: &mut SearchStats,
) -> Result<Option<(EdgeRecord, usize)>, S::Error>
where
    S: EdgeSource + ?Sized,
{
    let first = &keys.chars[0];
    let mut node = source.root();
    let mut i = 0;

    loop {
        let Some(edge) = source.edge_starting_with(node, first[i])? else {
            return Ok(None);
        };
        if !mask_allows(keys.required(0, i), edge.full_mask()) {
            stats.pruned += 1;
            return Ok(None);
        }

        let mut offset = 0;
        while offset < edge.len() && i < first.len() {
            if edge.char_at(offset) != first[i] {
                return Ok(None);
            }
            offset += 1;
            i += 1;
        }

        if i == first.len() {
            return Ok(Some((edge, offset)));
        }
        node = edge.child();
    }
}
