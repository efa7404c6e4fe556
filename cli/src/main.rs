use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dynarchive_core::archive::{ReadBody, ReadFormat, ReadRequest};
use dynarchive_core::import::{ImportStatus, SourceDir};
use dynarchive_core::models::SearchPage;
use dynarchive_core::search::{RecentQuery, SearchScope};
use dynarchive_core::{load_config, Archive};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dynarchive")]
#[command(about = "Search and read a local archive of outline documents", long_about = None)]
struct Args {
    /// Config file; written with defaults if missing
    #[arg(long, short = 'c', default_value = "dynarchive.toml")]
    config: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import exports from the source directory
    Import {
        /// Override the configured source directory
        #[arg(long)]
        source: Option<PathBuf>,
        /// Re-import documents whose export did not change
        #[arg(long)]
        force: bool,
    },
    /// Full-text search
    Search {
        query: String,
        /// Document id, title or filename
        #[arg(long, short = 'd')]
        document: Option<String>,
        /// Only search below this node
        #[arg(long)]
        below: Option<String>,
        /// With --below, also match the node itself
        #[arg(long)]
        include_root: bool,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// List documents
    Documents,
    /// Render a node and its subtree
    Read {
        node_id: String,
        #[arg(long, short = 'd')]
        document: Option<String>,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long)]
        no_notes: bool,
        /// Return the tree instead of markdown
        #[arg(long)]
        structured: bool,
    },
    /// Recently modified nodes
    Recent {
        #[arg(long, short = 'd')]
        document: Option<String>,
        /// Only changes on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// A node with its breadcrumbs, siblings and children
    Context {
        node_id: String,
        #[arg(long, short = 'd')]
        document: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args.config).with_context(|| format!("loading {}", args.config.display()))?;
    let archive = Archive::open(config).context("opening archive")?;

    if !matches!(args.command, Command::Import { .. }) {
        let mut state = archive.refresh_state()?;
        if let Err(e) = archive.refresh_if_due(&mut state) {
            tracing::warn!("Automatic refresh failed: {}", e);
        }
    }

    run(&archive, args.command, args.json)
}

fn run(archive: &Archive, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Import { source, force } => {
            let source_dir = SourceDir::new(source.unwrap_or_else(|| archive.config().source_dir.clone()));
            let summary = archive.import(&source_dir, force)?;
            if json {
                return print_json(&summary);
            }
            for outcome in &summary.outcomes {
                let status = match &outcome.status {
                    ImportStatus::Imported { nodes } => format!("imported ({} nodes)", nodes),
                    ImportStatus::Unchanged => "unchanged".to_string(),
                    ImportStatus::Failed { error } => format!("FAILED: {}", error),
                };
                println!("{:<40} {}", outcome.source, status);
            }
            println!(
                "{} imported, {} unchanged, {} failed",
                summary.imported(),
                summary.unchanged(),
                summary.failed()
            );
        }
        Command::Search {
            query,
            document,
            below,
            include_root,
            limit,
            offset,
        } => {
            let scope = match (below, document) {
                (Some(node_id), document) => SearchScope::Subtree {
                    document,
                    node_id,
                    include_root,
                },
                (None, Some(document)) => SearchScope::Document(document),
                (None, None) => SearchScope::Corpus,
            };
            let page = archive.search(&query, &scope, limit, offset)?;
            if json {
                return print_json(&page);
            }
            print_page(&page);
        }
        Command::Documents => {
            let list = archive.list_documents()?;
            if json {
                return print_json(&list);
            }
            for entry in &list.documents {
                println!("{:<32} {:>6} nodes  {}", entry.document.title, entry.document.node_count, entry.permalink);
            }
            println!("{} documents, {} nodes", list.documents.len(), list.total_nodes);
        }
        Command::Read {
            node_id,
            document,
            max_depth,
            no_notes,
            structured,
        } => {
            let request = ReadRequest {
                document,
                node_id,
                max_depth,
                include_notes: !no_notes,
                format: if structured { ReadFormat::Structured } else { ReadFormat::Markdown },
            };
            let result = archive.read(&request)?;
            if json || structured {
                return print_json(&result);
            }
            if let Some(warning) = &result.warning {
                eprintln!("warning: {}", warning);
            }
            println!("{}\n{}\n", result.breadcrumbs, result.permalink);
            if let ReadBody::Markdown(markdown) = &result.body {
                print!("{}", markdown);
            }
        }
        Command::Recent {
            document,
            since,
            limit,
            offset,
        } => {
            let since = since.as_deref().map(parse_date).transpose()?;
            let page = archive.recent_changes(&RecentQuery { document, since }, limit, offset)?;
            if json {
                return print_json(&page);
            }
            print_page(&page);
        }
        Command::Context { node_id, document } => {
            let context = archive.node_context(document.as_deref(), &node_id)?;
            if json {
                return print_json(&context);
            }
            let crumbs: Vec<_> = context.breadcrumbs.iter().map(|c| c.content.as_str()).collect();
            println!("{}", crumbs.join(" > "));
            for sibling in &context.siblings_before {
                println!("  {}", sibling.content);
            }
            println!("> {}", context.node.content);
            for child in &context.children {
                println!("    - {} ({})", child.content, child.id);
            }
            for sibling in &context.siblings_after {
                println!("  {}", sibling.content);
            }
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", value))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_page(page: &SearchPage) {
    for result in &page.results {
        println!("[{}] {}", result.document_title, result.breadcrumbs);
        println!("    {}", result.snippet.as_deref().unwrap_or(result.preview.as_str()));
        println!("    {}", result.permalink);
    }
    match page.next_offset {
        Some(next) => println!("{} of {} results (next: --offset {})", page.len(), page.total, next),
        None => println!("{} of {} results", page.len(), page.total),
    }
}
