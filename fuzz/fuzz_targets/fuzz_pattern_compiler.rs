#![no_main]

use kansearch::index::bucketer::{Bucketer, count_frequencies};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Compiling and running any pattern must not panic
    let table = Bucketer::default().build(count_frequencies(&[data]));
    if let Ok(automaton) = kansearch::query::compile(data, &table) {
        let _ = automaton.accepts(data);
        let _ = automaton.is_in_language(data, &table.suffix_masks(data));
        let _ = automaton.to_dot();
    }
});
