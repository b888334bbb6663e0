use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kansearch::index::bucketer::{Bucketer, count_frequencies};
use kansearch::index::build::{BuildOptions, Index, build_from_path};
use kansearch::index::corpus::load_corpus;
use kansearch::index::search::{self, SearchOptions, SearchOutcome};
use kansearch::index::stats::TreeStats;
use kansearch::index::tabular::{BUCKETS_FILE, CachedSource, TabularTree};
use kansearch::index::types::SentenceId;
use kansearch::output::{self, Hit};
use kansearch::query::{compile, split_query};
use kansearch::utils::{AppConfig, get_config_path};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "kansearch")]
#[command(about = "Wildcard and pattern search over Japanese sentences")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Number of mask buckets (1-32)
    #[arg(long, global = true)]
    buckets: Option<usize>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how the corpus alphabet is spread over buckets
    Buckets {
        /// Corpus file or directory
        corpus: PathBuf,
    },
    /// Sentences containing the `*`-separated keys in order
    Find {
        /// Corpus file or directory, or an exported tree
        corpus: PathBuf,
        /// Query such as `駅*どこ`
        query: String,
        /// Result cap, 0 for none
        #[arg(short, long)]
        max: Option<usize>,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Sentences containing a match of a pattern
    Match {
        /// Corpus file or directory, or an exported tree
        corpus: PathBuf,
        /// Pattern such as `(は|が)えき`
        pattern: String,
        /// Result cap, 0 for none
        #[arg(short, long)]
        max: Option<usize>,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Test strings against a pattern directly
    Check {
        pattern: String,
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Graphviz output for a corpus tree or a compiled pattern
    Dot {
        /// Corpus path, or a pattern with --pattern
        target: String,
        /// Treat the target as a pattern
        #[arg(long)]
        pattern: bool,
    },
    /// Write the tree as edge and payload tables
    Export {
        corpus: PathBuf,
        out_dir: PathBuf,
    },
    /// Build the tree and print its statistics
    Stats {
        corpus: PathBuf,
    },
    /// Show the effective configuration
    Config {
        /// Save it as the config file
        #[arg(long)]
        write: bool,
    },
}

/// What to run against an index
enum Query {
    Keys(Vec<String>),
    Pattern(String),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::load()?;
    if let Some(buckets) = cli.buckets {
        config.bucket_count = buckets;
    }
    let color = !cli.no_color;

    match cli.command {
        Commands::Buckets { corpus } => {
            let sentences = load_corpus(&corpus, &config.corpus_glob)?;
            let texts = sentences.texts();
            let table = Bucketer::new(config.effective_bucket_count())
                .context("Invalid bucket count")?
                .build(count_frequencies(texts.as_slice()));
            let buckets = table.buckets();
            if cli.json {
                output::print_json(&table)?;
            } else {
                for (bucket, chars) in buckets {
                    let chars: String = chars.into_iter().collect();
                    println!("{:2} {}", bucket, chars);
                }
            }
        }
        Commands::Find {
            corpus,
            query,
            max,
            timeout_ms,
        } => {
            let options = config.search_options(max, timeout_ms);
            run_query(&corpus, Query::Keys(split_query(&query)), &config, &options, cli.json, color)?;
        }
        Commands::Match {
            corpus,
            pattern,
            max,
            timeout_ms,
        } => {
            // The configured cap is for wildcard queries only
            let options = config.search_options(Some(max.unwrap_or(0)), timeout_ms);
            run_query(&corpus, Query::Pattern(pattern), &config, &options, cli.json, color)?;
        }
        Commands::Check { pattern, texts } => {
            let mut all = texts.clone();
            all.push(pattern.clone());
            let table = Bucketer::default().build(count_frequencies(all.as_slice()));
            let automaton = compile(&pattern, &table).context("Invalid pattern")?;
            for text in &texts {
                let verdict = if automaton.accepts(text) { "match" } else { "no match" };
                println!("{}\t{}", verdict, text);
            }
        }
        Commands::Dot { target, pattern } => {
            if pattern {
                let table = Bucketer::default().build(count_frequencies(&[target.as_str()]));
                let automaton = compile(&target, &table).context("Invalid pattern")?;
                print!("{}", automaton.to_dot());
            } else {
                let index = open(Path::new(&target), &config, false)?;
                print!("{}", index.tree.to_dot());
            }
        }
        Commands::Export { corpus, out_dir } => {
            let index = open(&corpus, &config, true)?;
            TabularTree::write(&out_dir, &index.tree.export(), &index.table)?;
            println!("Exported to {}", out_dir.display());
        }
        Commands::Stats { corpus } => {
            let index = open(&corpus, &config, true)?;
            let stats = TreeStats::collect(&index.tree, &index.table);
            if cli.json {
                output::print_json(&stats)?;
            } else {
                print!("{}", stats);
            }
        }
        Commands::Config { write } => {
            if write {
                config.bucket_count = config.effective_bucket_count();
                config.save()?;
                eprintln!("Saved {}", get_config_path()?.display());
            }
            if cli.json {
                output::print_json(&config)?;
            } else {
                println!("Config file: {}", get_config_path()?.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open(corpus: &Path, config: &AppConfig, show_progress: bool) -> Result<Index> {
    let options = BuildOptions {
        bucket_count: config.effective_bucket_count(),
        show_progress,
    };
    build_from_path(corpus, &config.corpus_glob, &options)
}

fn run_query(
    corpus: &Path,
    query: Query,
    config: &AppConfig,
    options: &SearchOptions,
    json: bool,
    color: bool,
) -> Result<()> {
    // An exported tree has ids but no sentence text
    if corpus.join(BUCKETS_FILE).is_file() {
        let tree: TabularTree<SentenceId> = TabularTree::load(corpus)?;
        let source = CachedSource::new(tree, config.page_cache_capacity);
        let table = source.inner().table().clone();
        let outcome = match &query {
            Query::Keys(keys) => search::find_all(&source, keys.as_slice(), &table, options),
            Query::Pattern(pattern) => {
                let automaton = compile(pattern, &table).context("Invalid pattern")?;
                search::find_matching(&source, &automaton, options)
            }
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        };
        let mut ids: Vec<&SentenceId> = outcome.results.iter().collect();
        ids.sort();
        let hits: Vec<Hit> = ids
            .into_iter()
            .map(|id| Hit {
                source_id: id.source_id.clone(),
                sentence_index: id.sentence_index,
                text: String::new(),
            })
            .collect();
        return report(&hits, &query, &outcome, json, color);
    }

    let index = open(corpus, config, false)?;
    let outcome = match &query {
        Query::Keys(keys) => {
            if keys.is_empty() {
                bail!("Query has no keys");
            }
            index.find_all(keys.as_slice(), options)
        }
        Query::Pattern(pattern) => index.find_matching(pattern, options).context("Invalid pattern")?,
    };
    let hits = output::resolve_hits(&index, &outcome.results);
    report(&hits, &query, &outcome, json, color)
}

fn report(
    hits: &[Hit],
    query: &Query,
    outcome: &SearchOutcome<SentenceId>,
    json: bool,
    color: bool,
) -> Result<()> {
    if outcome.timed_out {
        tracing::warn!(found = hits.len(), "search timed out; results are partial");
    }
    if json {
        output::print_json(hits)?;
    } else {
        let keys: &[String] = match query {
            Query::Keys(keys) => keys,
            Query::Pattern(_) => &[],
        };
        output::print_hits(hits, keys, color)?;
    }
    Ok(())
}
