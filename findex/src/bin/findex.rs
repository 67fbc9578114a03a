//! Command-line shell over the findex library: load a bookmark-tree JSON
//! export, then search, list, or export it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use findex::export;
use findex::flatten::flatten;
use findex::highlight::highlight;
use findex::models::{BookmarkNode, FlatRecord};
use findex::ranking::{self, rank};
use findex::search::MatchStrategy;

#[derive(Parser)]
#[command(name = "findex", about = "Flatten and search a bookmark tree export")]
struct Cli {
    /// Bookmark-tree JSON file (an array of nodes, or a single root node)
    #[arg(long, short)]
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank bookmarks against a query
    Search {
        query: String,
        /// Use the token-aware scorer instead of plain subsequence
        #[arg(long)]
        enhanced: bool,
        /// Title weight 1..=5; the URL weight is the complement to 6
        #[arg(long, default_value_t = 3)]
        title_weight: u8,
        /// Treat a /pattern/flags query as a regex filter
        #[arg(long)]
        pattern: bool,
        /// Maximum results to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print every flattened record
    List {
        /// Group records by folder path
        #[arg(long)]
        group: bool,
    },
    /// Print the flattened records as CSV
    Export,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let tree = load_tree(&cli.file)?;
    let records = flatten(&tree);

    match cli.command {
        Command::Search {
            query,
            enhanced,
            title_weight,
            pattern,
            limit,
        } => {
            if pattern && ranking::is_pattern_query(&query) {
                let hits = match ranking::parse_pattern_query(&query) {
                    Some(re) => ranking::filter_pattern(&records, &re),
                    None => Vec::new(),
                };
                for record in hits.iter().take(limit) {
                    print_record(record);
                }
                eprintln!("{} of {} records matched", hits.len(), records.len());
                return Ok(());
            }

            let strategy = if enhanced {
                MatchStrategy::TokenAware
            } else {
                MatchStrategy::Subsequence
            };
            let ranked = rank(&records, &query, strategy, title_weight);
            for result in ranked.iter().take(limit) {
                println!(
                    "{:>8.4}  {}",
                    result.total_score,
                    highlight(&result.record.title, &result.title_match.positions)
                );
                println!("          {}", result.record.url);
                if !result.record.path.is_empty() {
                    println!("          [{}]", result.record.path);
                }
            }
            eprintln!("{} of {} records matched", ranked.len(), records.len());
        }
        Command::List { group } => {
            if group {
                for (path, members) in export::group_by_path(&records) {
                    println!("{path} ({})", members.len());
                    for record in members {
                        println!("  {}\t{}", record.title, record.url);
                    }
                }
            } else {
                for record in &records {
                    print_record(record);
                }
            }
        }
        Command::Export => println!("{}", export::to_csv(&records)),
    }

    Ok(())
}

fn print_record(record: &FlatRecord) {
    let path = if record.path.is_empty() {
        export::ROOT_GROUP
    } else {
        record.path.as_str()
    };
    println!("{}\t{}\t[{}]", record.title, record.url, path);
}

fn load_tree(path: &Path) -> Result<Vec<BookmarkNode>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("parsing bookmark tree JSON")?;
    let nodes = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(nodes)
}
