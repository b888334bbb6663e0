//! Integration tests driving the kansearch binary over a small corpus.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CORPUS: &str = concat!(
    r#"{"id":"a","title":"駅の話","body":"駅はどこですか。　駅まで歩きます。"}"#,
    "\n",
    r#"{"source_id":"b","sentence_index":2,"text":"はえきとがえき"}"#,
    "\n",
    r#"{"source_id":"b","sentence_index":3,"text":"花が好きです。"}"#,
    "\n",
);

/// Temp dir holding the corpus plus a private data dir for the config
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("corpus")).unwrap();
        fs::write(dir.path().join("corpus").join("news.jsonl"), CORPUS).unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        Self { dir }
    }

    fn corpus(&self) -> PathBuf {
        self.dir.path().join("corpus")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, args: &[&str]) -> Output {
        run_in(self.dir.path(), args)
    }
}

fn run_in(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kansearch"))
        .args(args)
        .env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run kansearch")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "kansearch failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_find_prints_sorted_hits() {
    let fx = Fixture::new();
    let corpus = fx.corpus();
    let out = stdout(&fx.run(&["--no-color", "find", corpus.to_str().unwrap(), "駅*か"]));
    assert_eq!(out, "a:2: 駅はどこですか。\n");

    let out = stdout(&fx.run(&["--no-color", "find", corpus.to_str().unwrap(), "駅"]));
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines, vec!["a:1: 駅の話", "a:2: 駅はどこですか。", "a:3: 駅まで歩きます。"]);
}

#[test]
fn test_match_json() {
    let fx = Fixture::new();
    let corpus = fx.corpus();
    let out = stdout(&fx.run(&["--json", "match", corpus.to_str().unwrap(), "(は|が)えき"]));
    let hits: serde_json::Value = serde_json::from_str(&out).unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["source_id"], "b");
    assert_eq!(hits[0]["sentence_index"], 2);
    assert_eq!(hits[0]["text"], "はえきとがえき");
}

#[test]
fn test_invalid_pattern_fails() {
    let fx = Fixture::new();
    let corpus = fx.corpus();
    let output = fx.run(&["match", corpus.to_str().unwrap(), "(駅"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unmatched '('"));
}

#[test]
fn test_check_strings() {
    let fx = Fixture::new();
    let out = stdout(&fx.run(&["check", "(は|が)えき", "はえき", "もえき"]));
    assert_eq!(out, "match\tはえき\nno match\tもえき\n");
}

#[test]
fn test_export_then_search_tables() {
    let fx = Fixture::new();
    let corpus = fx.corpus();
    let tables = fx.path("tables");
    stdout(&fx.run(&["export", corpus.to_str().unwrap(), tables.to_str().unwrap()]));
    assert!(tables.join("edges.jsonl").is_file());
    assert!(tables.join("payloads.jsonl").is_file());
    assert!(tables.join("buckets.json").is_file());

    // exported tables know ids but not text
    let out = stdout(&fx.run(&["--no-color", "find", tables.to_str().unwrap(), "駅*か"]));
    assert_eq!(out, "a:2: \n");
}

#[test]
fn test_stats_and_dot() {
    let fx = Fixture::new();
    let corpus = fx.corpus();
    let out = stdout(&fx.run(&["stats", corpus.to_str().unwrap()]));
    assert!(out.contains("Tree Statistics"));
    assert!(out.contains("Sentences:        5"));

    let out = stdout(&fx.run(&["dot", "--pattern", "あ(い|う)"]));
    assert!(out.starts_with("digraph automaton {"));

    let out = stdout(&fx.run(&["dot", corpus.to_str().unwrap()]));
    assert!(out.starts_with("digraph suffix_tree {"));
}

#[test]
fn test_buckets_respect_flag() {
    let fx = Fixture::new();
    let corpus = fx.corpus();
    let out = stdout(&fx.run(&["--buckets", "2", "buckets", corpus.to_str().unwrap()]));
    assert_eq!(out.lines().count(), 2);
}

#[test]
fn test_config_shows_defaults() {
    let fx = Fixture::new();
    let out = stdout(&fx.run(&["--json", "config"]));
    let config: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(config["bucket_count"], 32);
    assert_eq!(config["max_results"], 40);
}

/// `n` one-line sentences sharing the character 駅
fn many_sentences(n: usize) -> String {
    (0..n)
        .map(|i| format!(r#"{{"source_id":"m","sentence_index":{},"text":"駅{}番"}}"#, i + 2, i) + "\n")
        .collect()
}

#[test]
fn test_cap_applies_to_find_only() {
    let fx = Fixture::new();
    let many = fx.path("many");
    fs::create_dir(&many).unwrap();
    fs::write(many.join("many.jsonl"), many_sentences(45)).unwrap();
    let many = many.to_str().unwrap();

    let out = stdout(&fx.run(&["--no-color", "find", many, "駅"]));
    assert_eq!(out.lines().count(), 40);
    let out = stdout(&fx.run(&["--no-color", "match", many, "駅"]));
    assert_eq!(out.lines().count(), 45);
    let out = stdout(&fx.run(&["--no-color", "match", many, "駅", "--max", "3"]));
    assert!(out.lines().count() >= 3 && out.lines().count() < 45);
}

#[test]
fn test_config_write_saves_file() {
    let fx = Fixture::new();
    stdout(&fx.run(&["--buckets", "8", "config", "--write"]));
    let saved = fx.path("data").join("kansearch").join("config.json");
    let config: serde_json::Value = serde_json::from_str(&fs::read_to_string(saved).unwrap()).unwrap();
    assert_eq!(config["bucket_count"], 8);

    // later runs pick the saved value up
    let out = stdout(&fx.run(&["--json", "config"]));
    let config: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(config["bucket_count"], 8);
}
