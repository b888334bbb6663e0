pub mod automaton;
pub mod parser;
pub mod wildcard;

pub use automaton::{Automaton, AutomatonBuilder};
pub use parser::{PatternError, compile};
pub use wildcard::{split_query, variations};
