#![no_main]

use kansearch::index::bucketer::{Bucketer, count_frequencies};
use kansearch::index::suffix_tree::SuffixTree;
use kansearch::index::types::Sentence;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Newline-separated sentences; the tree must stay well formed and
    // every sentence must find itself
    let texts: Vec<&str> = data.split('\n').take(64).collect();
    let table = Bucketer::new(4).map(|b| b.build(count_frequencies(&texts)));
    let Ok(table) = table else {
        return;
    };

    let mut tree = SuffixTree::new();
    for (i, text) in texts.iter().enumerate() {
        tree.add_string(Sentence::new(text, &table), i);
    }
    tree.assign_bitsets();

    let problems = tree.check_invariants();
    assert!(problems.is_empty(), "{:?}", problems);

    for (i, text) in texts.iter().enumerate() {
        if !text.is_empty() {
            assert!(tree.find_all(&[*text], &table, 0).contains(&i));
        }
    }
});
