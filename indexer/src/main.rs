use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sift_core::persist::{load_docs, load_index, save_docs, save_index, IndexPaths, MetaFile};
use sift_core::{BuildConfig, InvertedIndex, ParseError, QueryEvaluator, QueryParser, Tokenizer, TokenizerConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod fs_store;

use fs_store::FsDocumentStore;

#[derive(Parser)]
#[command(name = "sift-indexer")]
#[command(about = "Build a boolean-search inverted index and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a file or a directory of text files
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Only index files with these extensions (comma separated); all files if omitted
        #[arg(long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,
        /// Keep "don't" as one term instead of "don" + "t"
        #[arg(long, default_value_t = false)]
        keep_apostrophes: bool,
        /// Keep "e-mail" as one term instead of "e" + "mail"
        #[arg(long, default_value_t = false)]
        keep_hyphens: bool,
        /// Skip Unicode NFKC normalization
        #[arg(long, default_value_t = false)]
        no_nfkc: bool,
        /// Documents read from disk per indexing batch
        #[arg(long, default_value_t = 256)]
        batch_size: usize,
        /// Index on the current thread only
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Run a boolean query (AND, OR, NOT, parentheses) against a built index
    Query {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Treat adjacent terms as AND instead of rejecting them
        #[arg(long, default_value_t = false)]
        implicit_and: bool,
        /// Evaluate AND/OR operands on the thread pool
        #[arg(long, default_value_t = false)]
        parallel: bool,
        /// The query, e.g. "(cat OR dog) AND NOT fish"
        query: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            extensions,
            keep_apostrophes,
            keep_hyphens,
            no_nfkc,
            batch_size,
            sequential,
        } => {
            let config = BuildConfig {
                tokenizer: TokenizerConfig { nfkc: !no_nfkc, keep_apostrophes, keep_hyphens },
                batch_size,
                parallel: !sequential,
            };
            build_index(&input, &output, extensions.as_deref(), &config)
        }
        Commands::Query { index, implicit_and, parallel, query } => {
            run_query(&index, &query, implicit_and, parallel)
        }
    }
}

fn build_index(input: &std::path::Path, output: &std::path::Path, extensions: Option<&[String]>, config: &BuildConfig) -> Result<()> {
    let store = FsDocumentStore::discover(input, extensions)?;
    let mut docs = store.doc_meta();
    tracing::info!(files = store.len(), input = %input.display(), "discovered documents");

    let (index, report) = InvertedIndex::build(store, config)?;
    for failure in &report.failures {
        let path = docs.remove(&failure.doc_id).map(|m| m.path).unwrap_or_default();
        println!("skipped {} ({}): {}", failure.doc_id, path, failure.error);
    }

    let paths = IndexPaths::new(output);
    save_index(&paths, &index, &MetaFile::for_index(&index, config.tokenizer))?;
    save_docs(&paths, &docs)?;

    println!(
        "indexed {} documents, {} terms, {} skipped in {:.2}s",
        report.indexed,
        report.terms,
        report.failures.len(),
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn run_query(index_dir: &std::path::Path, query: &str, implicit_and: bool, parallel: bool) -> Result<()> {
    let paths = IndexPaths::new(index_dir);
    let (index, meta) = load_index(&paths)?;
    let docs = load_docs(&paths)?;
    let tokenizer = Tokenizer::new(meta.tokenizer);

    let node = match QueryParser::new(&tokenizer).with_implicit_and(implicit_and).parse(query) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("{}", caret_report(query, &e));
            bail!("invalid query");
        }
    };
    let evaluator = QueryEvaluator::new(&index);
    let hits = if parallel { evaluator.evaluate_parallel(&node) } else { evaluator.evaluate(&node) };
    tracing::debug!(%node, hits = hits.len(), "query evaluated");

    for doc_id in &hits {
        let path = docs.get(&doc_id).map(|m| m.path.as_str()).unwrap_or("");
        println!("{doc_id}\t{path}");
    }
    eprintln!("{} matching documents", hits.len());
    Ok(())
}

/// The query, a caret under the offending character, and the message.
fn caret_report(query: &str, err: &ParseError) -> String {
    let column = query.get(..err.position).map_or(0, |prefix| prefix.chars().count());
    format!("{query}\n{}^\nerror: {err}", " ".repeat(column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::parse_query;

    #[test]
    fn caret_points_at_error() {
        let query = "cät AND";
        let err = parse_query(query, &Tokenizer::default()).unwrap_err();
        assert_eq!(
            caret_report(query, &err),
            "cät AND\n       ^\nerror: unexpected end of query at position 8"
        );
    }
}
