//! Result printing: `source:index: text` lines in color, or JSON

use crate::index::build::Index;
use crate::index::types::SentenceId;
use serde::Serialize;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// A search result resolved to its text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hit {
    pub source_id: String,
    pub sentence_index: u32,
    pub text: String,
}

/// Resolve ids against the index corpus, sorted by id for stable output.
/// Ids without text in the corpus are dropped.
pub fn resolve_hits<'a>(index: &Index, ids: impl IntoIterator<Item = &'a SentenceId>) -> Vec<Hit> {
    let mut ids: Vec<&SentenceId> = ids.into_iter().collect();
    ids.sort();
    ids.into_iter()
        .filter_map(|id| {
            index.lookup(id).map(|text| Hit {
                source_id: id.source_id.clone(),
                sentence_index: id.sentence_index,
                text: text.to_string(),
            })
        })
        .collect()
}

/// Print hits to stdout, highlighting `keys` in order of appearance
pub fn print_hits(hits: &[Hit], keys: &[String], color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);
    write_hits(&mut stdout, hits, keys)
}

pub fn write_hits<W: WriteColor>(out: &mut W, hits: &[Hit], keys: &[String]) -> io::Result<()> {
    for hit in hits {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, "{}", hit.source_id)?;
        out.reset()?;
        write!(out, ":")?;

        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "{}", hit.sentence_index)?;
        out.reset()?;
        write!(out, ": ")?;

        let mut last = 0;
        for (start, end) in key_spans(&hit.text, keys) {
            write!(out, "{}", &hit.text[last..start])?;
            out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            write!(out, "{}", &hit.text[start..end])?;
            out.reset()?;
            last = end;
        }
        writeln!(out, "{}", &hit.text[last..])?;
    }
    Ok(())
}

/// Byte ranges of `keys` found one after another in `text`
fn key_spans(text: &str, keys: &[String]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut from = 0;
    for key in keys.iter().filter(|k| !k.is_empty()) {
        let Some(found) = text[from..].find(key.as_str()) else {
            break;
        };
        let start = from + found;
        let end = start + key.len();
        spans.push((start, end));
        from = end;
    }
    spans
}

/// Pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    serde_json::to_writer_pretty(&mut lock, value).map_err(io::Error::other)?;
    writeln!(lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    fn hit(source: &str, index: u32, text: &str) -> Hit {
        Hit {
            source_id: source.into(),
            sentence_index: index,
            text: text.into(),
        }
    }

    #[test]
    fn test_key_spans_in_order() {
        let keys = vec!["駅".to_string(), "か".to_string()];
        let text = "か駅はどこですか";
        let spans = key_spans(text, &keys);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].0..spans[0].1], "駅");
        // the second key is found after the first
        assert_eq!(spans[1].1, text.len());
    }

    #[test]
    fn test_key_spans_missing_key_stops() {
        let keys = vec!["無".to_string(), "か".to_string()];
        assert!(key_spans("駅はどこですか", &keys).is_empty());
    }

    #[test]
    fn test_write_hits_plain() {
        let mut out = NoColor::new(Vec::new());
        let hits = vec![hit("a", 2, "駅はどこ"), hit("b", 1, "題")];
        write_hits(&mut out, &hits, &["駅".to_string()]).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert_eq!(text, "a:2: 駅はどこ\nb:1: 題\n");
    }

    #[test]
    fn test_hit_json_shape() {
        let json = serde_json::to_value(hit("a", 3, "文")).unwrap();
        assert_eq!(json["source_id"], "a");
        assert_eq!(json["sentence_index"], 3);
        assert_eq!(json["text"], "文");
    }
}
